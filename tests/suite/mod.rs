mod analyzer;
mod status;

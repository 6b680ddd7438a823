//! Analyzer invocation against stand-in executables.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use stan_analyzer::{AnalyzerOptions, LintError, LintRequest, PhpstanLinter, ResolveError};
use stan_types::ValidationSettings;

use crate::common::{fake_phpstan, file_uri};

fn request(root: &Path, text: &str, settings: ValidationSettings) -> LintRequest {
    LintRequest {
        uri: file_uri(&root.join("src").join("Foo.php")),
        text: text.to_string(),
        settings,
        project_root: Some(root.to_path_buf()),
    }
}

#[tokio::test]
async fn runs_in_project_root_with_settings_as_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let exe = fake_phpstan(
        dir.path(),
        "printf '%s\\n' \"$@\" > args.txt\ncat > stdin.txt\necho '{}'",
    );
    let linter = PhpstanLinter::new(exe, AnalyzerOptions::default());
    let settings = ValidationSettings {
        level: Some(2),
        autoload_file: Some("vendor/autoload.php".into()),
        configuration: Some("phpstan.neon".into()),
        ..ValidationSettings::default()
    };

    let diagnostics = linter
        .run(&request(dir.path(), "<?php\necho 1;\n", settings))
        .await
        .unwrap();
    assert!(diagnostics.is_empty());

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    let target = dir.path().join("src").join("Foo.php");
    assert_eq!(
        args.lines().collect::<Vec<_>>(),
        [
            "analyse",
            "--error-format=json",
            "--no-progress",
            "--level=2",
            "--autoload-file=vendor/autoload.php",
            "--configuration=phpstan.neon",
            target.to_str().unwrap(),
        ]
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("stdin.txt")).unwrap(),
        "<?php\necho 1;\n"
    );
}

#[tokio::test]
async fn stderr_is_part_of_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let exe = fake_phpstan(
        dir.path(),
        "cat > /dev/null\nprintf '{\"a.php\":' \nprintf '[{\"line\":4,\"message\":\"From stderr\"}]}' >&2\nexit 1",
    );
    let linter = PhpstanLinter::new(exe, AnalyzerOptions::default());

    let diagnostics = linter
        .run(&request(dir.path(), "<?php", ValidationSettings::default()))
        .await
        .unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].range().start.line, 3);
    assert_eq!(diagnostics[0].message(), "From stderr");
}

#[tokio::test]
async fn slow_analyzer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let exe = fake_phpstan(dir.path(), "exec sleep 5");
    let options = AnalyzerOptions {
        timeout: Some(Duration::from_millis(200)),
        ..AnalyzerOptions::default()
    };
    let linter = PhpstanLinter::new(exe, options);

    let err = linter
        .run(&request(dir.path(), "<?php", ValidationSettings::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, LintError::TimedOut { .. }), "{err}");
    assert_eq!(err.category(), "timeout");
}

#[tokio::test]
async fn oversized_output_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let exe = fake_phpstan(
        dir.path(),
        "cat > /dev/null\nhead -c 5000 /dev/zero | tr '\\000' x",
    );
    let options = AnalyzerOptions {
        max_output_bytes: 1024,
        ..AnalyzerOptions::default()
    };
    let linter = PhpstanLinter::new(exe, options);

    let err = linter
        .run(&request(dir.path(), "<?php", ValidationSettings::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, LintError::OutputTooLarge { limit: 1024 }), "{err}");
}

#[tokio::test]
async fn general_errors_without_findings_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let exe = fake_phpstan(
        dir.path(),
        "cat > /dev/null\necho '{\"totals\":{},\"files\":[],\"errors\":[\"Config file phpstan.neon not found\"]}'\nexit 1",
    );
    let linter = PhpstanLinter::new(exe, AnalyzerOptions::default());

    let err = linter
        .run(&request(dir.path(), "<?php", ValidationSettings::default()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Config file phpstan.neon not found");
}

#[tokio::test]
async fn locate_prefers_the_composer_binary() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("composer.json"), r#"{"config":{"bin-dir":"tools"}}"#).unwrap();
    fs::write(
        root.join("composer.lock"),
        r#"{"packages":[],"packages-dev":[{"name":"phpstan/phpstan"}]}"#,
    )
    .unwrap();
    fs::create_dir(root.join("tools")).unwrap();
    let exe = fake_phpstan(&root.join("tools"), "cat > /dev/null\necho '{}'");

    let linter = PhpstanLinter::locate(Some(root), None, AnalyzerOptions::default())
        .await
        .unwrap();
    assert_eq!(linter.executable(), exe.as_path());
}

#[tokio::test]
async fn locate_reports_uninstalled_composer_project() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("composer.json"), "{}").unwrap();

    let err = PhpstanLinter::locate(Some(dir.path()), None, AnalyzerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::ComposerUninitialized));
    assert!(err.to_string().contains("composer install"));
}

#[tokio::test]
async fn locate_probes_the_override() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("phpstan");
    fs::write(&broken, "#!/bin/sh\nexit 3\n").unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&broken, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let err = PhpstanLinter::locate(None, Some(&broken), AnalyzerOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::Probe { .. }), "{err}");
}

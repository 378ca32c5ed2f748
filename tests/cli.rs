use assert_cmd::Command;
use predicates::prelude::*;

/// A missing build directory must fail fast with the operator hint, before
/// any upload is attempted (no network involved in this test).
#[test]
fn sync_cli_fails_actionably_when_the_root_is_not_built() {
    let mut cmd = Command::cargo_bin("site-sync").expect("binary exists");
    cmd.arg("sync")
        .arg("--root")
        .arg("/no/such/out")
        .env("SITE_BUCKET", "test-bucket")
        .env("STORAGE_TOKEN", "dummy-token");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("run the site build first"));
}

/// Without SITE_BUCKET or a config file there is no destination; the CLI
/// must refuse rather than guess a bucket.
#[test]
fn sync_cli_fails_without_a_bucket_source() {
    let mut cmd = Command::cargo_bin("site-sync").expect("binary exists");
    cmd.arg("sync")
        .arg("--root")
        .arg("/no/such/out")
        .env_remove("SITE_BUCKET")
        .env("STORAGE_TOKEN", "dummy-token");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("SITE_BUCKET"));
}

#[test]
fn help_names_the_sync_subcommand() {
    let mut cmd = Command::cargo_bin("site-sync").expect("binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sync"));
}

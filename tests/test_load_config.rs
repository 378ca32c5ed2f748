use std::env;
use std::fs::write;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::NamedTempFile;

use site_sync::config::BucketSource;
use site_sync::load_config::load_config;

fn clear_env() {
    env::remove_var("SITE_BUCKET");
    env::remove_var("STORAGE_TOKEN");
    env::remove_var("PULUMI_ACCESS_TOKEN");
}

/// Static config plus required env vars produces a fully merged SyncConfig.
#[test]
#[serial]
fn stack_output_config_merges_with_env_secrets() {
    clear_env();
    let config_yaml = r#"
root: ./site/out
concurrency: 4
bucket:
  type: stack_output
  organization: acme
  project: website-infra
  stack: prod
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    env::set_var("STORAGE_TOKEN", "storage-test-token");
    env::set_var("PULUMI_ACCESS_TOKEN", "deploy-test-token");

    let config = load_config(Some(config_file.path()), None).expect("config should load");

    assert_eq!(config.local_root, PathBuf::from("./site/out"));
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.storage_token, "storage-test-token");
    assert_eq!(config.deploy_token.as_deref(), Some("deploy-test-token"));
    match &config.bucket {
        BucketSource::StackOutput { reference, output } => {
            assert_eq!(reference.organization, "acme");
            assert_eq!(reference.project, "website-infra");
            assert_eq!(reference.stack, "prod");
            // Omitted output name falls back to the provisioner's convention.
            assert_eq!(output, "websiteBucket");
        }
        other => panic!("expected stack_output bucket source, got {other:?}"),
    }
}

/// SITE_BUCKET overrides whatever bucket source the config file declares,
/// and a named bucket needs no deployment token.
#[test]
#[serial]
fn site_bucket_env_overrides_config_bucket() {
    clear_env();
    let config_yaml = r#"
bucket:
  type: stack_output
  organization: acme
  project: website-infra
  stack: prod
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    env::set_var("SITE_BUCKET", "override-bucket");
    env::set_var("STORAGE_TOKEN", "storage-test-token");

    let config = load_config(Some(config_file.path()), None).expect("config should load");
    match &config.bucket {
        BucketSource::Name(name) => assert_eq!(name, "override-bucket"),
        other => panic!("expected named bucket source, got {other:?}"),
    }
    assert!(config.deploy_token.is_none());
}

/// No config file at all: env bucket, default root and concurrency.
#[test]
#[serial]
fn defaults_apply_without_a_config_file() {
    clear_env();
    env::set_var("SITE_BUCKET", "env-bucket");
    env::set_var("STORAGE_TOKEN", "storage-test-token");

    let config = load_config(None, None).expect("config should load");
    assert_eq!(config.local_root, PathBuf::from("out"));
    assert_eq!(config.concurrency, 8);

    // The --root flag wins over the default.
    let config = load_config(None, Some(PathBuf::from("./dist"))).expect("config should load");
    assert_eq!(config.local_root, PathBuf::from("./dist"));
}

#[test]
#[serial]
fn missing_storage_token_is_an_error() {
    clear_env();
    env::set_var("SITE_BUCKET", "env-bucket");

    let err = load_config(None, None).unwrap_err();
    assert!(err.to_string().contains("STORAGE_TOKEN"), "got: {err}");
}

#[test]
#[serial]
fn stack_output_without_deploy_token_is_an_error() {
    clear_env();
    let config_yaml = r#"
bucket:
  type: stack_output
  organization: acme
  project: website-infra
  stack: prod
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();
    env::set_var("STORAGE_TOKEN", "storage-test-token");

    let err = load_config(Some(config_file.path()), None).unwrap_err();
    assert!(err.to_string().contains("PULUMI_ACCESS_TOKEN"), "got: {err}");
}

#[test]
#[serial]
fn no_bucket_source_anywhere_is_an_error() {
    clear_env();
    env::set_var("STORAGE_TOKEN", "storage-test-token");

    let err = load_config(None, None).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("SITE_BUCKET"), "got: {msg}");
}

#[test]
#[serial]
fn invalid_yaml_is_reported_as_a_parse_error() {
    clear_env();
    env::set_var("STORAGE_TOKEN", "storage-test-token");
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"bucket: [not, a, mapping").unwrap();

    let err = load_config(Some(config_file.path()), None).unwrap_err();
    assert!(err.to_string().contains("parse"), "got: {err}");
}

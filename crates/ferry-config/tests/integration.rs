use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use ferry_config::defaults::{
    ENV_DESTINATION_BUCKET, ENV_FTP_HOST, ENV_FTP_PASSWORD, ENV_FTP_USER, ENV_KEY_SUFFIX,
    ENV_OUTCOME_POLICY, ENV_QUERY_DATABASE, ENV_QUERY_OUTPUT, ENV_RECORD_SELECTION,
    ENV_RECORD_TIMEOUT_SECS, ENV_ROLE_ARN, ENV_SCRATCH_DIR, ENV_ZIP_FILE,
};
use ferry_config::{
    ConfigError, DeliveryMode, FerryConfig, OutcomePolicy, QueryConfig, RecordSelection,
};

fn base_env() -> HashMap<&'static str, String> {
    HashMap::from([
        (ENV_FTP_HOST, "ftp.example.org".to_string()),
        (ENV_FTP_USER, "nla".to_string()),
        (ENV_FTP_PASSWORD, "secret".to_string()),
        (ENV_ZIP_FILE, "true".to_string()),
        (ENV_ROLE_ARN, "arn:aws:iam::123456789012:role/ferry".to_string()),
        (ENV_DESTINATION_BUCKET, "ferry-mirror".to_string()),
    ])
}

fn load(env: &HashMap<&'static str, String>) -> Result<FerryConfig, ConfigError> {
    FerryConfig::from_lookup(|name| env.get(name).cloned())
}

#[test]
fn minimal_environment_applies_defaults() -> anyhow::Result<()> {
    let config = load(&base_env())?;

    assert_eq!(config.transfer.host, "ftp.example.org");
    assert_eq!(config.transfer.port, 21);
    assert_eq!(config.transfer.connect_timeout, Duration::from_secs(30));
    assert_eq!(config.delivery, DeliveryMode::Archive);
    assert_eq!(config.role.session_name, "ferry");
    assert_eq!(config.mirror_bucket, "ferry-mirror");
    assert_eq!(config.naming.prefix, "theguardian");
    assert_eq!(config.naming.key_suffix, ".csv");
    assert_eq!(config.selection, RecordSelection::All);
    assert_eq!(config.outcome_policy, OutcomePolicy::AllOrNothing);
    assert_eq!(config.record_timeout, Duration::from_secs(300));
    assert_eq!(config.scratch_dir, PathBuf::from("/tmp/ferry"));
    assert_eq!(config.aws.region, "eu-west-1");
    assert_eq!(config.aws.metric_namespace, "AWS/Lambda");
    Ok(())
}

#[test]
fn overrides_are_respected() -> anyhow::Result<()> {
    let mut env = base_env();
    env.insert(ENV_FTP_HOST, "ftp.example.org:2121".to_string());
    env.insert(ENV_ZIP_FILE, "false".to_string());
    env.insert(ENV_KEY_SUFFIX, "tsv".to_string());
    env.insert(ENV_RECORD_SELECTION, "first".to_string());
    env.insert(ENV_OUTCOME_POLICY, "partial".to_string());
    env.insert(ENV_RECORD_TIMEOUT_SECS, "45".to_string());
    env.insert(ENV_SCRATCH_DIR, "/var/tmp/ferry".to_string());

    let config = load(&env)?;
    assert_eq!(config.transfer.port, 2121);
    assert_eq!(config.delivery, DeliveryMode::Passthrough);
    assert_eq!(config.naming.key_suffix, ".tsv");
    assert_eq!(config.selection, RecordSelection::First);
    assert_eq!(config.outcome_policy, OutcomePolicy::Partial);
    assert_eq!(config.record_timeout, Duration::from_secs(45));
    assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/ferry"));
    Ok(())
}

#[test]
fn each_required_variable_is_enforced() {
    for name in [
        ENV_FTP_HOST,
        ENV_FTP_USER,
        ENV_FTP_PASSWORD,
        ENV_ZIP_FILE,
        ENV_ROLE_ARN,
        ENV_DESTINATION_BUCKET,
    ] {
        let mut env = base_env();
        env.remove(name);
        assert_eq!(
            load(&env).map(|_| ()),
            Err(ConfigError::MissingEnv { name }),
            "expected {name} to be required"
        );
    }
}

#[test]
fn malformed_values_name_the_offending_variable() {
    let cases = [
        (ENV_ZIP_FILE, "maybe"),
        (ENV_RECORD_TIMEOUT_SECS, "0"),
        (ENV_RECORD_SELECTION, "some"),
        (ENV_OUTCOME_POLICY, "lenient"),
        (ENV_FTP_HOST, "ftp.example.org:port"),
    ];
    for (name, value) in cases {
        let mut env = base_env();
        env.insert(name, value.to_string());
        let err = load(&env).expect_err("malformed value should fail");
        assert_eq!(err.field(), name);
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }
}

#[test]
fn query_config_requires_output_and_database() -> anyhow::Result<()> {
    let mut env = HashMap::from([
        (ENV_ROLE_ARN, "arn:aws:iam::123456789012:role/query".to_string()),
        (ENV_QUERY_OUTPUT, "s3://ferry-query-results/".to_string()),
        (ENV_QUERY_DATABASE, "clean".to_string()),
    ]);
    let config = QueryConfig::from_lookup(|name| env.get(name).cloned())?;
    assert_eq!(config.database, "clean");
    assert_eq!(config.output_location, "s3://ferry-query-results/");
    assert_eq!(config.region, "eu-west-1");

    env.remove(ENV_QUERY_DATABASE);
    let err = QueryConfig::from_lookup(|name| env.get(name).cloned())
        .expect_err("database is required");
    assert_eq!(
        err,
        ConfigError::MissingEnv {
            name: ENV_QUERY_DATABASE
        }
    );
    Ok(())
}

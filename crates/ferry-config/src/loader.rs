//! Assembles [`FerryConfig`] and [`QueryConfig`] from environment variables.
//!
//! Loading happens once at process start; a missing or malformed variable
//! fails fast before any record is touched.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::defaults::{
    DEFAULT_AWS_REGION, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_FILE_PREFIX, DEFAULT_FTP_PORT,
    DEFAULT_KEY_SUFFIX, DEFAULT_METRIC_NAMESPACE, DEFAULT_RECORD_TIMEOUT_SECS,
    DEFAULT_ROLE_SESSION_NAME, DEFAULT_SCRATCH_DIR, ENV_AWS_REGION, ENV_CONNECT_TIMEOUT_SECS,
    ENV_DESTINATION_BUCKET, ENV_FILE_PREFIX, ENV_FTP_HOST, ENV_FTP_PASSWORD, ENV_FTP_PORT,
    ENV_FTP_USER, ENV_KEY_SUFFIX, ENV_METRIC_NAMESPACE, ENV_OUTCOME_POLICY, ENV_QUERY_DATABASE,
    ENV_QUERY_OUTPUT, ENV_RECORD_SELECTION, ENV_RECORD_TIMEOUT_SECS, ENV_ROLE_ARN,
    ENV_ROLE_SESSION_NAME, ENV_SCRATCH_DIR, ENV_ZIP_FILE,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AwsSettings, DeliveryMode, FerryConfig, NamingPolicy, OutcomePolicy, QueryConfig,
    RecordSelection, RoleConfig, TransferEndpoint,
};
use crate::validate::{
    normalize_suffix, parse_flag, parse_port, parse_seconds, split_host, validate_prefix,
};

/// Lookup over a variable source; `None` means unset.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> ConfigResult<String> {
        self.optional(name)
            .map(|value| value.trim().to_string())
            .ok_or(ConfigError::MissingEnv { name })
    }

    fn or_default(&self, name: &'static str, fallback: &str) -> String {
        self.optional(name)
            .map_or_else(|| fallback.to_string(), |value| value.trim().to_string())
    }

    fn seconds(&self, name: &'static str, fallback: u64) -> ConfigResult<Duration> {
        self.optional(name)
            .map_or(Ok(Duration::from_secs(fallback)), |value| {
                parse_seconds(name, &value)
            })
    }

    fn role(&self) -> ConfigResult<RoleConfig> {
        Ok(RoleConfig {
            role_arn: self.required(ENV_ROLE_ARN)?,
            session_name: self.or_default(ENV_ROLE_SESSION_NAME, DEFAULT_ROLE_SESSION_NAME),
        })
    }

    fn transfer(&self) -> ConfigResult<TransferEndpoint> {
        let raw_host = self.required(ENV_FTP_HOST)?;
        let (host, embedded_port) = split_host(ENV_FTP_HOST, &raw_host)?;
        let port = match self.optional(ENV_FTP_PORT) {
            Some(value) => parse_port(ENV_FTP_PORT, &value)?,
            None => embedded_port.unwrap_or(DEFAULT_FTP_PORT),
        };
        let user = self.required(ENV_FTP_USER)?;
        let password = (self.lookup)(ENV_FTP_PASSWORD)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingEnv {
                name: ENV_FTP_PASSWORD,
            })?;
        Ok(TransferEndpoint {
            host,
            port,
            user,
            password,
            connect_timeout: self.seconds(ENV_CONNECT_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS)?,
        })
    }
}

impl FerryConfig {
    /// Load the delivery configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable encountered.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the delivery configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable encountered.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let transfer = env.transfer()?;
        let zip = parse_flag(ENV_ZIP_FILE, &env.required(ENV_ZIP_FILE)?)?;
        let role = env.role()?;
        let mirror_bucket = env.required(ENV_DESTINATION_BUCKET)?;

        let naming = NamingPolicy {
            prefix: validate_prefix(
                ENV_FILE_PREFIX,
                &env.or_default(ENV_FILE_PREFIX, DEFAULT_FILE_PREFIX),
            )?,
            key_suffix: normalize_suffix(
                ENV_KEY_SUFFIX,
                &env.or_default(ENV_KEY_SUFFIX, DEFAULT_KEY_SUFFIX),
            )?,
        };
        let selection = env
            .optional(ENV_RECORD_SELECTION)
            .map_or(Ok(RecordSelection::default()), |value| value.parse())?;
        let outcome_policy = env
            .optional(ENV_OUTCOME_POLICY)
            .map_or(Ok(OutcomePolicy::default()), |value| value.parse())?;

        let config = Self {
            transfer,
            delivery: DeliveryMode::from_flag(zip),
            role,
            mirror_bucket,
            naming,
            selection,
            outcome_policy,
            record_timeout: env.seconds(ENV_RECORD_TIMEOUT_SECS, DEFAULT_RECORD_TIMEOUT_SECS)?,
            scratch_dir: PathBuf::from(env.or_default(ENV_SCRATCH_DIR, DEFAULT_SCRATCH_DIR)),
            aws: AwsSettings {
                region: env.or_default(ENV_AWS_REGION, DEFAULT_AWS_REGION),
                metric_namespace: env.or_default(ENV_METRIC_NAMESPACE, DEFAULT_METRIC_NAMESPACE),
            },
        };

        debug!(
            delivery = config.delivery.as_str(),
            endpoint = %config.transfer.address(),
            mirror_bucket = %config.mirror_bucket,
            "delivery configuration loaded"
        );
        Ok(config)
    }
}

impl QueryConfig {
    /// Load the query job configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable encountered.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load the query job configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid variable encountered.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        Ok(Self {
            role: env.role()?,
            output_location: env.required(ENV_QUERY_OUTPUT)?,
            database: env.required(ENV_QUERY_DATABASE)?,
            region: env.or_default(ENV_AWS_REGION, DEFAULT_AWS_REGION),
        })
    }
}

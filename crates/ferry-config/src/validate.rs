//! Value parsers applied to raw environment strings.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Parse a boolean flag; accepts `true/false`, `1/0`, `yes/no`, `on/off`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for anything else.
pub fn parse_flag(field: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, value, "not_a_flag")),
    }
}

/// Parse a TCP port in `1..=65535`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a valid port.
pub fn parse_port(field: &'static str, value: &str) -> ConfigResult<u16> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(field, value, "not_a_port"))?;
    if port == 0 {
        return Err(ConfigError::invalid(field, value, "zero"));
    }
    Ok(port)
}

/// Parse a strictly positive number of seconds.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero values.
pub fn parse_seconds(field: &'static str, value: &str) -> ConfigResult<Duration> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, value, "not_an_integer"))?;
    if secs == 0 {
        return Err(ConfigError::invalid(field, value, "zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Normalise a key suffix so it always carries a leading dot.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the suffix is empty or only a dot.
pub fn normalize_suffix(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, value, "empty_suffix"));
    }
    Ok(format!(".{}", trimmed.to_ascii_lowercase()))
}

/// Split `host[:port]`, returning the port when one is embedded.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for an empty host or a malformed port.
pub fn split_host(field: &'static str, value: &str) -> ConfigResult<(String, Option<u16>)> {
    let trimmed = value.trim();
    let (host, port) = match trimmed.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(parse_port(field, port)?)),
        _ => (trimmed, None),
    };
    if host.is_empty() {
        return Err(ConfigError::invalid(field, value, "empty_host"));
    }
    Ok((host.to_string(), port))
}

/// Ensure a destination prefix is usable as a file-name stem.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the prefix contains a path separator.
pub fn validate_prefix(field: &'static str, value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, value, "empty_prefix"));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(ConfigError::invalid(field, value, "path_separator"));
    }
    Ok(trimmed.to_string())
}

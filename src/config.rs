use std::str::FromStr;

/// Application-level constants
pub const APP_NAME: &str = "clinical-differential";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "DIFFERENTIAL_";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    "info,clinical_differential=debug,audit=info,hyper=warn,reqwest=warn".to_string()
}

/// Full environment variable name for a config key.
pub fn env_key(key: &str) -> String {
    format!("{ENV_PREFIX}{key}")
}

/// Read a prefixed variable as a trimmed, non-empty string.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(env_key(key))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a prefixed variable. Unparseable values are ignored with
/// a warning so the caller keeps its default.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key = %env_key(key), "Ignoring unparseable config override");
            None
        }
    }
}

//! # PMOSpotify Configuration Module
//!
//! This module provides configuration management for PMOSpotify, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let port = config.get_http_port();
//! let origins = config.get_cors_allowed_origins()?;
//!
//! // Update configuration values
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! Source-specific settings (the `sources.spotify` section) are exposed by
//! extension traits living in the crates that consume them.

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::info;

// Sealed secrets stored in config.yaml
pub mod encryption;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmospotify.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOSpotify configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOSPOTIFY_CONFIG";
const ENV_PREFIX: &str = "PMOSPOTIFY_CONFIG__";

/// Set by most hosting platforms; takes precedence over `host.http_port`.
const ENV_PORT: &str = "PORT";

// Default values for configuration
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_LOG_EXPOSE_HTTP: bool = false;

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().map(|v| v as usize).unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, size: usize) -> Result<()> {
            let n = Number::from(size);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Configuration manager for PMOSpotify
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// # Examples
///
/// ```no_run
/// use pmoconfig::get_config;
///
/// let config = get_config();
/// let port = config.get_http_port();
/// println!("HTTP port: {}", port);
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(".pmospotify").exists() {
            return ".pmospotify".to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(".pmospotify");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Default fallback
        ".pmospotify".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOSPOTIFY_CONFIG` environment variable
    /// 3. `.pmospotify` in the current directory
    /// 4. `.pmospotify` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// # Arguments
    ///
    /// * `directory` - The directory containing the config.yaml file, or empty to use defaults
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value = Self::lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value = Self::lower_keys_value(serde_yaml::from_slice(&yaml_data)?);
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = default_value;

        Self::apply_env_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Directory holding `config.yaml`
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "http_port"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data();
            Self::set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key_value = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        Self::get_value_internal(&self.data(), path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    /// Reads a string value, treating a missing key, `null` or `""` as absent
    pub fn get_string(&self, path: &[&str]) -> Option<String> {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Reads a string value that may be sealed (`encrypted:...`)
    ///
    /// Returns `Ok(None)` when the key is absent or empty.
    pub fn get_secret(&self, path: &[&str]) -> Result<Option<String>> {
        self.get_string(path)
            .map(|value| encryption::get_secret(&value))
            .transpose()
    }

    /// Seals `secret` and stores it at `path`
    pub fn set_secret(&self, path: &[&str], secret: &str) -> Result<()> {
        let sealed = encryption::seal_secret(secret)?;
        self.set_value(path, Value::String(sealed))
    }

    fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!(env_var=%key, "Ignoring config override: {}", e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Gets the HTTP port
    ///
    /// The `PORT` environment variable wins over `host.http_port`. Falls back to
    /// 8080 when neither is usable.
    pub fn get_http_port(&self) -> u16 {
        if let Ok(port) = env::var(ENV_PORT) {
            match port.trim().parse::<u16>() {
                Ok(port) => return port,
                Err(_) => tracing::warn!("Invalid {} value '{}', ignoring", ENV_PORT, port),
            }
        }

        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    tracing::warn!("HTTP port {} out of range, using default {}", n, DEFAULT_HTTP_PORT);
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(Value::String(s)) => match s.parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    tracing::warn!(
                        "Invalid HTTP port '{}', using default {}",
                        s,
                        DEFAULT_HTTP_PORT
                    );
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(_) => {
                tracing::warn!(
                    "HTTP port not a number or string, using default {}",
                    DEFAULT_HTTP_PORT
                );
                DEFAULT_HTTP_PORT
            }
            Err(err) => {
                tracing::warn!(
                    "Failed to get HTTP port: {}, using default {}",
                    err,
                    DEFAULT_HTTP_PORT
                );
                DEFAULT_HTTP_PORT
            }
        }
    }

    /// Sets the HTTP port in configuration
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        let n = Number::from(port);
        self.set_value(&["host", "http_port"], Value::Number(n))
    }

    /// Address the HTTP listener binds to (default `0.0.0.0`)
    pub fn get_bind_address(&self) -> String {
        self.get_string(&["host", "bind_address"])
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    /// Origins allowed by the CORS layer
    ///
    /// Accepts either a YAML list or a single comma-separated string (handy for
    /// environment overrides).
    pub fn get_cors_allowed_origins(&self) -> Result<Vec<String>> {
        match self.get_value(&["host", "cors", "allowed_origins"]) {
            Ok(Value::Sequence(seq)) => Ok(seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    _ => None,
                })
                .collect()),
            Ok(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Replaces the CORS allowed origins
    pub fn set_cors_allowed_origins(&self, origins: &[String]) -> Result<()> {
        let seq = origins.iter().cloned().map(Value::String).collect();
        self.set_value(&["host", "cors", "allowed_origins"], Value::Sequence(seq))
    }

    impl_usize_config!(
        get_log_cache_size,
        set_log_cache_size,
        &["host", "logger", "buffer_capacity"],
        DEFAULT_LOG_BUFFER_CAPACITY
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_bool_config!(
        get_log_expose_http,
        set_log_expose_http,
        &["host", "logger", "expose_http"],
        DEFAULT_LOG_EXPOSE_HTTP
    );

    /// Minimum log level (`ERROR`, `WARN`, `INFO`, `DEBUG` or `TRACE`)
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["host", "logger", "min_level"]) {
            Ok(Value::String(s)) => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["host", "logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access.
///
/// ```no_run
/// use pmoconfig::get_config;
///
/// let config = get_config();
/// let port = config.get_http_port();
/// ```
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings, keys from `external` are merged recursively into `default`
/// - For scalars and sequences, external values replace default values
/// - `null` never replaces a default
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // an empty config.yaml parses as null
        (_, Value::Null) => {}
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_with(yaml: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults_are_embedded() {
        let (_dir, config) = load_with("{}");
        assert_eq!(config.get_log_cache_size().unwrap(), DEFAULT_LOG_BUFFER_CAPACITY);
        assert!(!config.get_log_expose_http().unwrap());
        assert_eq!(config.get_bind_address(), DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_external_file_overrides_defaults() {
        let (_dir, config) = load_with(
            "host:\n  bind_address: 127.0.0.1\n  logger:\n    min_level: debug\n",
        );
        assert_eq!(config.get_bind_address(), "127.0.0.1");
        assert_eq!(config.get_log_min_level().unwrap(), "debug");
        // untouched siblings keep their defaults
        assert!(config.get_log_enable_console().unwrap());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let (_dir, config) = load_with("Host:\n  Bind_Address: 10.0.0.1\n");
        assert_eq!(config.get_bind_address(), "10.0.0.1");
        assert_eq!(
            config.get_value(&["HOST", "BIND_ADDRESS"]).unwrap(),
            Value::String("10.0.0.1".into())
        );
    }

    #[test]
    fn test_set_value_is_persisted() {
        let (dir, config) = load_with("{}");
        config.set_http_port(9123).unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(
            reloaded.get_value(&["host", "http_port"]).unwrap(),
            Value::Number(9123.into())
        );
    }

    #[test]
    fn test_env_overrides_nested_paths() {
        let mut value: Value = serde_yaml::from_str("host:\n  http_port: 1\n").unwrap();
        let vars = vec![
            ("PMOSPOTIFY_CONFIG__HOST__HTTP_PORT".to_string(), "4242".to_string()),
            ("PMOSPOTIFY_CONFIG__SOURCES__SPOTIFY__LIMIT".to_string(), "12".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        Config::apply_env_overrides(&mut value, vars.into_iter());

        assert_eq!(
            Config::get_value_internal(&value, &["host", "http_port"]).unwrap(),
            Value::Number(4242.into())
        );
        assert_eq!(
            Config::get_value_internal(&value, &["sources", "spotify", "limit"]).unwrap(),
            Value::Number(12.into())
        );
        assert!(Config::get_value_internal(&value, &["unrelated"]).is_err());
    }

    #[test]
    fn test_cors_origins_accept_list_or_csv() {
        let (_dir, config) =
            load_with("host:\n  cors:\n    allowed_origins: [\"https://a.example\", \"\"]\n");
        assert_eq!(
            config.get_cors_allowed_origins().unwrap(),
            vec!["https://a.example".to_string()]
        );

        config
            .set_value(
                &["host", "cors", "allowed_origins"],
                Value::String("https://a.example, https://b.example".into()),
            )
            .unwrap();
        assert_eq!(config.get_cors_allowed_origins().unwrap().len(), 2);
    }

    #[test]
    fn test_get_string_treats_blank_as_absent() {
        let (_dir, config) = load_with("sources:\n  spotify:\n    client_id: \"  \"\n");
        assert_eq!(config.get_string(&["sources", "spotify", "client_id"]), None);
        assert_eq!(config.get_string(&["sources", "missing"]), None);
    }

    #[test]
    fn test_merge_yaml_replaces_sequences() {
        let mut base: Value = serde_yaml::from_str("a: [1, 2]\nb: {c: 1, d: 2}").unwrap();
        let ext: Value = serde_yaml::from_str("a: [3]\nb: {d: 5}").unwrap();
        merge_yaml(&mut base, &ext);
        let expected: Value = serde_yaml::from_str("a: [3]\nb: {c: 1, d: 5}").unwrap();
        assert_eq!(base, expected);
    }
}

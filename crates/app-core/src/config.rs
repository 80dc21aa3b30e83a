//! Thread-safe configuration with optional hot reload from a YAML file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use config::{Config as RawConfig, File};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load or parse configuration file")]
    Load(#[from] config::ConfigError),

    #[error("Failed to initialize file watcher")]
    Watch(#[from] notify::Error),

    #[error("Configuration lock was poisoned, indicating a panic in another thread")]
    LockPoisoned,
}

/// A snapshot-consistent view over the configuration file.
///
/// Reads go through an `RwLock` so a reload in the watcher thread never
/// tears a value mid-read. Dropping the `Config` drops the watcher and ends
/// the reload thread.
#[derive(Debug)]
pub struct Config {
    inner: Arc<RwLock<RawConfig>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Config {
    pub fn builder<P: AsRef<Path>>(path: P) -> ConfigBuilder {
        ConfigBuilder::new(path.as_ref().to_path_buf())
    }

    #[cfg(any(test, feature = "testing"))]
    pub fn builder_test() -> test_utils::TestConfigBuilder {
        test_utils::TestConfigBuilder::new()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let guard = self.inner.read().map_err(|_| ConfigError::LockPoisoned)?;
        guard.get(key).map_err(ConfigError::from)
    }
}

pub struct ConfigBuilder {
    path: PathBuf,
    watch: bool,
    poll_interval: Duration,
}

impl ConfigBuilder {
    fn new(path: PathBuf) -> Self {
        Self { path, watch: false, poll_interval: Duration::from_secs(2) }
    }

    /// Enables reloading the file whenever it changes on disk.
    pub fn watch(mut self) -> Self {
        self.watch = true;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let shared = Arc::new(RwLock::new(Self::load(&self.path)?));

        let watcher = if self.watch { Some(self.spawn_watcher(Arc::clone(&shared))?) } else { None };

        Ok(Config { inner: shared, _watcher: watcher })
    }

    fn spawn_watcher(&self, shared: Arc<RwLock<RawConfig>>) -> Result<RecommendedWatcher, ConfigError> {
        let (tx, rx) = mpsc::channel();
        let mut watcher =
            RecommendedWatcher::new(tx, notify::Config::default().with_poll_interval(self.poll_interval))?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        thread::spawn(move || {
            tracing::info!("Watching configuration file for changes: {}", path.to_string_lossy());
            while let Ok(event) = rx.recv() {
                match event {
                    // Some editors replace the file instead of modifying it
                    // in place, which surfaces as a Create event.
                    Ok(Event { kind: EventKind::Modify(_) | EventKind::Create(_), .. }) => {
                        match Self::load(&path) {
                            Ok(fresh) => match shared.write() {
                                Ok(mut guard) => {
                                    *guard = fresh;
                                    tracing::info!("Configuration reloaded");
                                },
                                Err(_) => {
                                    tracing::error!("Failed to acquire write lock for reloading config");
                                },
                            },
                            Err(e) => tracing::error!("Failed to reload configuration file: {e}"),
                        }
                    },
                    Ok(_) => {},
                    Err(e) => tracing::error!("File watcher error: {e:?}"),
                }
            }
        });

        Ok(watcher)
    }

    fn load(path: &Path) -> Result<RawConfig, config::ConfigError> {
        RawConfig::builder().add_source(File::from(path).required(true)).build()
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod test_utils {
    use std::collections::HashMap;

    use config::Value;

    use super::*;

    /// Builds a `Config` out of in-memory key/value overrides, no file needed.
    #[derive(Default)]
    pub struct TestConfigBuilder {
        values: HashMap<String, Value>,
    }

    impl TestConfigBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
            self.values.insert(key.to_string(), value.into());
            self
        }

        pub fn build(self) -> Config {
            let mut builder = RawConfig::builder();
            for (key, value) in self.values {
                builder = builder.set_override(key, value).unwrap();
            }
            let raw = builder.build().expect("Failed to create config from test values");

            Config { inner: Arc::new(RwLock::new(raw)), _watcher: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use serde::Deserialize;
    use tempfile::NamedTempFile;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct ServerSection {
        address: String,
        port: u16,
    }

    fn write_temp_config(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_get_scalar_and_section() {
        let file = write_temp_config(
            r#"
            app_name: "identity"
            server:
                address: "0.0.0.0"
                port: 8080
        "#,
        );

        let config = Config::builder(file.path()).build().expect("Failed to build config");

        let app_name: String = config.get("app_name").expect("Failed to get app_name");
        let server: ServerSection = config.get("server").expect("Failed to get server section");

        assert_eq!(app_name, "identity");
        assert_eq!(server, ServerSection { address: "0.0.0.0".to_string(), port: 8080 });
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let result = Config::builder("/nonexistent/path/config.yaml").build();

        assert!(matches!(result.unwrap_err(), ConfigError::Load(_)));
    }

    #[test]
    fn test_invalid_yaml_is_a_load_error() {
        let file = write_temp_config(
            r#"
            app_name: "unterminated
            server: [nope: yaml
        "#,
        );

        let result = Config::builder(file.path()).build();
        assert!(matches!(result.unwrap_err(), ConfigError::Load(_)));
    }

    #[test]
    fn test_missing_key() {
        let file = write_temp_config("app_name: identity\n");
        let config = Config::builder(file.path()).build().expect("Failed to build config");

        assert!(config.get::<u16>("server.port").is_err());
    }

    #[test]
    fn test_watch_reloads_on_change() {
        let file = write_temp_config("greeting: before\n");
        let config = Config::builder(file.path())
            .watch()
            .poll_interval(Duration::from_millis(100))
            .build()
            .expect("Failed to build config with watch");

        let initial: String = config.get("greeting").expect("Failed to get greeting");
        assert_eq!(initial, "before");

        fs::write(file.path(), "greeting: after\n").expect("Failed to update config file");

        // Give the watcher time to pick up the modification.
        thread::sleep(Duration::from_millis(500));

        let reloaded: String = config.get("greeting").expect("Failed to get greeting");
        assert_eq!(reloaded, "after");
    }

    #[test]
    fn test_builder_test_overrides() {
        let config = Config::builder_test()
            .with("session.cookie_name", "sid")
            .with("server.port", 3000)
            .build();

        let cookie_name: String = config.get("session.cookie_name").unwrap();
        let port: i32 = config.get("server.port").unwrap();

        assert_eq!(cookie_name, "sid");
        assert_eq!(port, 3000);
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

pub const DEFAULT_OFF_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

const ENV_DB_PATH: &str = "CALTRACK_DB_PATH";
const ENV_OFF_URL: &str = "CALTRACK_OFF_URL";
const ENV_LOOKUP_TIMEOUT: &str = "CALTRACK_LOOKUP_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub off_url: String,
    pub lookup_timeout: Duration,
}

impl Config {
    /// Resolve configuration from the `--db` flag, then the environment, then
    /// the platform data directory.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let config = Self::from_env(db_override, |key| std::env::var(key).ok())?;

        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory: {}", parent.display())
            })?;
        }

        Ok(config)
    }

    fn from_env(
        db_override: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let db_path = match db_override.or_else(|| env(ENV_DB_PATH).map(PathBuf::from)) {
            Some(path) => path,
            None => default_db_path()?,
        };

        let off_url = env(ENV_OFF_URL)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_OFF_URL.to_string());

        let timeout_secs = match env(ENV_LOOKUP_TIMEOUT) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| {
                    format!("{ENV_LOOKUP_TIMEOUT} must be a positive number of seconds, got '{raw}'")
                })?,
            None => DEFAULT_LOOKUP_TIMEOUT_SECS,
        };

        Ok(Config {
            db_path,
            off_url,
            lookup_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "caltrack").context("Could not determine home directory")?;
    Ok(proj_dirs.data_dir().join("caltrack.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_env(Some(PathBuf::from("/tmp/x.db")), env_from(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.off_url, DEFAULT_OFF_URL);
        assert_eq!(config.lookup_timeout, Duration::from_secs(10));
    }

    #[test]
    fn flag_wins_over_environment() {
        let env = env_from(&[(ENV_DB_PATH, "/env/caltrack.db")]);
        let config = Config::from_env(Some(PathBuf::from("/flag.db")), env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/flag.db"));

        let env = env_from(&[(ENV_DB_PATH, "/env/caltrack.db")]);
        let config = Config::from_env(None, env).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/env/caltrack.db"));
    }

    #[test]
    fn environment_overrides_lookup_settings() {
        let env = env_from(&[
            (ENV_OFF_URL, "http://localhost:9999/"),
            (ENV_LOOKUP_TIMEOUT, "3"),
        ]);
        let config = Config::from_env(Some(PathBuf::from("db")), env).unwrap();
        assert_eq!(config.off_url, "http://localhost:9999");
        assert_eq!(config.lookup_timeout, Duration::from_secs(3));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        for raw in ["0", "-1", "soon"] {
            let env = env_from(&[(ENV_LOOKUP_TIMEOUT, raw)]);
            assert!(Config::from_env(Some(PathBuf::from("db")), env).is_err());
        }
    }

    #[test]
    fn load_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("caltrack.db");
        let config = Config::load(Some(path.clone())).unwrap();
        assert_eq!(config.db_path, path);
        assert!(dir.path().join("nested").is_dir());
    }
}

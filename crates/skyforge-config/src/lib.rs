pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "SKYFORGE_CONFIG";
pub const SECRET_ENV: &str = "SKYFORGE_SECRET_KEY";

const CANDIDATES: [&str; 2] = ["skyforge.local.yaml", "skyforge.yaml"];

/// Daemon settings. Every key is optional in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Root of the IaC module repository (one sub-directory per module)
    pub module_root: PathBuf,

    /// Parent of the per-resource workspaces
    pub workspace_root: PathBuf,

    /// JSON state file; in-memory store when absent
    pub state_path: Option<PathBuf>,

    pub terraform_bin: String,

    /// Run `plan -out=tfplan` before apply
    pub run_plan: bool,

    /// Per-step timeout for the IaC tool
    pub step_timeout_secs: Option<u64>,

    pub workers: usize,
    pub sync_interval_secs: u64,

    /// Prefix for derived names (resource groups, buckets)
    pub resource_prefix: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            module_root: PathBuf::from("terraform").join("modules"),
            workspace_root: std::env::temp_dir().join("skyforge-workspaces"),
            state_path: None,
            terraform_bin: "terraform".to_string(),
            run_plan: true,
            step_timeout_secs: None,
            workers: 4,
            sync_interval_secs: 600,
            resource_prefix: "skyforge".to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    fn validate(self) -> Result<Self> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue("workers"));
        }
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("sync_interval_secs"));
        }
        Ok(self)
    }
}

/// Skyforge's per-user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("skyforge"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the daemon configuration file
///
/// Search order:
/// 1. `SKYFORGE_CONFIG` (direct path, must exist)
/// 2. current directory: `skyforge.local.yaml`, `skyforge.yaml`
/// 3. `<config_dir>/skyforge/config.yaml`
///
/// `Ok(None)` means no file anywhere; built-in defaults apply.
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// Parse one configuration file
pub fn load_from(path: &Path) -> Result<DaemonConfig> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return DaemonConfig::default().validate();
    }
    let config: DaemonConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()
}

/// Discover and load the daemon configuration
pub fn load() -> Result<DaemonConfig> {
    match find_config_file()? {
        Some(path) => {
            tracing::info!("Loading configuration from {}", path.display());
            load_from(&path)
        }
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(DaemonConfig::default())
        }
    }
}

/// Operator secret the credential vault key is derived from
pub fn secret_key(explicit: Option<&str>) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(SECRET_ENV).ok())
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::MissingSecret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn in_dir<F: FnOnce()>(dir: &Path, f: F) {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        f();
        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.sync_interval(), Duration::from_secs(600));
        assert!(config.run_plan);
        assert_eq!(config.terraform_bin, "terraform");
        assert!(config.workspace_root.ends_with("skyforge-workspaces"));
        assert!(config.step_timeout().is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("skyforge.yaml");
        fs::write(
            &path,
            "workers: 8\nrun_plan: false\nstep_timeout_secs: 900\nmodule_root: /srv/modules\n",
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.workers, 8);
        assert!(!config.run_plan);
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(900)));
        assert_eq!(config.module_root, PathBuf::from("/srv/modules"));
        assert_eq!(config.sync_interval_secs, 600);
    }

    #[test]
    fn test_load_rejects_unknown_keys_and_zero_workers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.yaml");

        fs::write(&path, "wokers: 2\n").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse { .. })));

        fs::write(&path, "workers: 0\n").unwrap();
        assert!(matches!(
            load_from(&path),
            Err(ConfigError::InvalidValue("workers"))
        ));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("skyforge.yaml"), "workers: 1\n").unwrap();
        fs::write(temp_dir.path().join("skyforge.local.yaml"), "workers: 2\n").unwrap();

        temp_env::with_var_unset(CONFIG_ENV, || {
            in_dir(temp_dir.path(), || {
                let found = find_config_file().unwrap().unwrap();
                assert!(found.ends_with("skyforge.local.yaml"));
                assert_eq!(load().unwrap().workers, 2);
            });
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "sync_interval_secs: 30\n").unwrap();

        temp_env::with_var(CONFIG_ENV, Some(config_path.as_os_str()), || {
            assert_eq!(find_config_file().unwrap(), Some(config_path.clone()));
            assert_eq!(load().unwrap().sync_interval_secs, 30);
        });
    }

    #[test]
    #[serial]
    fn test_env_var_pointing_nowhere_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("missing.yaml");

        temp_env::with_var(CONFIG_ENV, Some(missing.as_os_str()), || {
            assert!(matches!(
                find_config_file(),
                Err(ConfigError::ConfigFileNotFound(_))
            ));
        });
    }

    #[test]
    #[serial]
    fn test_secret_key_sources() {
        temp_env::with_var(SECRET_ENV, Some("from-env"), || {
            assert_eq!(secret_key(None).unwrap(), "from-env");
            assert_eq!(secret_key(Some("explicit")).unwrap(), "explicit");
        });

        temp_env::with_var_unset(SECRET_ENV, || {
            assert!(matches!(secret_key(None), Err(ConfigError::MissingSecret)));
            assert!(matches!(secret_key(Some("  ")), Err(ConfigError::MissingSecret)));
        });
    }
}

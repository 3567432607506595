use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `WAVFORGE_BATCH__MAX_WORKERS=8`.
pub const ENV_PREFIX: &str = "WAVFORGE_";

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "WAVFORGE_CONFIG";

/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "wavforge.toml";

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load defaults with environment variable overrides only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::new()
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Picks the config file: an explicit path, then `WAVFORGE_CONFIG`, then
/// `wavforge.toml` if it exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(ENV_CONFIG_PATH).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[batch]
max_workers = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.batch.max_workers, 2);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[batch]
max_workers = "many"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/wavforge.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[target]
sample_rate_hz = 16000

[ledger]
backup_dir = "/tmp/wav-backups"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.target.sample_rate_hz, 16000);
        assert_eq!(config.target.channels, 1);
        assert_eq!(config.ledger.backup_dir, PathBuf::from("/tmp/wav-backups"));
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "wavforge.toml",
                r#"
[batch]
max_workers = 2

[transcoder]
timeout_secs = 30
"#,
            )?;
            jail.set_env("WAVFORGE_BATCH__MAX_WORKERS", "16");
            jail.set_env("WAVFORGE_TARGET__SAMPLE_RATE_HZ", "16000");

            let config = load_config(Path::new("wavforge.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.batch.max_workers, 16);
            assert_eq!(config.target.sample_rate_hz, 16000);
            assert_eq!(config.transcoder.timeout_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn test_env_only() {
        Jail::expect_with(|jail| {
            jail.set_env("WAVFORGE_LEDGER__VERIFY_CHECKSUMS", "false");
            jail.set_env("WAVFORGE_CONFIG", "elsewhere.toml");

            let config = load_config_from_env().map_err(|e| e.to_string())?;
            assert!(!config.ledger.verify_checksums);
            assert_eq!(config.batch.max_workers, 4);
            Ok(())
        });
    }

    #[test]
    fn test_resolve_config_path() {
        Jail::expect_with(|jail| {
            assert_eq!(resolve_config_path(None), None);

            jail.create_file("wavforge.toml", "")?;
            assert_eq!(
                resolve_config_path(None),
                Some(PathBuf::from("wavforge.toml"))
            );

            jail.set_env("WAVFORGE_CONFIG", "custom.toml");
            assert_eq!(resolve_config_path(None), Some(PathBuf::from("custom.toml")));

            assert_eq!(
                resolve_config_path(Some(Path::new("explicit.toml"))),
                Some(PathBuf::from("explicit.toml"))
            );
            Ok(())
        });
    }
}

use figment::{
    providers::{Env, Format, Json, Serialized},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides, e.g. `SUBGRAB_AI_EVALUATOR__API_KEY`.
const ENV_PREFIX: &str = "SUBGRAB_";

fn base_figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
}

fn env_overrides() -> Env {
    // SUBGRAB_CONFIG names the file itself, it is not a setting.
    Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"])
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = base_figment()
        .merge(Json::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration, falling back to defaults (plus environment) when the
/// file does not exist yet.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    match load_config(path) {
        Err(ConfigError::FileNotFound(_)) => base_figment()
            .merge(env_overrides())
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string())),
        other => other,
    }
}

/// Load configuration from a JSON string (useful for testing)
pub fn load_config_from_str(json: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Write configuration as pretty-printed JSON, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
    }
    let json =
        serde_json::to_string_pretty(config).map_err(|e| ConfigError::WriteError(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ConfigError::WriteError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(r#"{"concurrency": 5, "language": "zh-CN"}"#).unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.language, "zh-CN");
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let result = load_config_from_str(r#"{"retries": "many"}"#);
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/subgrab.json"));
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_or_default_missing_file() {
        let config = load_config_or_default(Path::new("/nonexistent/subgrab.json")).unwrap();
        assert_eq!(config.timeout, 60.0);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"{{"save_dir": "/srv/subs", "timeout": 15, "ai_evaluator": {{"model": "other-model"}}}}"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.save_dir, "/srv/subs");
        assert_eq!(config.timeout, 15.0);
        assert_eq!(config.ai_evaluator.model, "other-model");
        assert_eq!(config.ai_evaluator.base_url, "https://api.deepseek.com");
    }

    #[test]
    fn test_save_then_load_preserves_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("subgrab.json");

        let mut config = load_config_from_str(r#"{"custom_key": [1, 2]}"#).unwrap();
        config.min_score = 2.5;
        config.ai_evaluator.api_key = "sk-1".to_string();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.min_score, 2.5);
        assert_eq!(loaded.ai_evaluator.api_key, "sk-1");
        assert_eq!(loaded.extra.get("custom_key"), Some(&serde_json::json!([1, 2])));
    }
}

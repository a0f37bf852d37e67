//! Compiled forms of the configurable heuristic pattern lists.

use regex_lite::Regex;

use super::{ConfigError, PatternConfig};

/// Pattern lists from [`PatternConfig`], compiled once at startup.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub invalid_content: Vec<Regex>,
    pub unnatural_phrases: Vec<String>,
    pub repeated_pronouns: Vec<String>,
    pub name_prefixes: Vec<Regex>,
    pub name_codes: Vec<Regex>,
    pub episode: Regex,
}

impl CompiledPatterns {
    /// Compile every regex in the config. All matching is case-insensitive.
    pub fn from_config(config: &PatternConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            invalid_content: compile_all("patterns.invalid_content", &config.invalid_content)?,
            unnatural_phrases: config.unnatural_phrases.clone(),
            repeated_pronouns: config.repeated_pronouns.clone(),
            name_prefixes: compile_all("patterns.name_prefixes", &config.name_prefixes)?,
            name_codes: compile_all("patterns.name_codes", &config.name_codes)?,
            episode: compile("patterns.episode", &config.episode)?,
        })
    }
}

impl Default for CompiledPatterns {
    fn default() -> Self {
        Self::from_config(&PatternConfig::default()).expect("built-in patterns compile")
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("(?i){}", pattern))
        .map_err(|e| ConfigError::ValidationError(format!("{}: invalid regex {:?}: {}", field, pattern, e)))
}

fn compile_all(field: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile(field, p)).collect()
}

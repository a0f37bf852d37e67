use super::{types::Config, CompiledPatterns, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Timeouts are positive and finite
/// - Concurrency within 1..=20, retries at most 10
/// - Ranking weights are non-negative, batch size non-zero
/// - Every pattern compiles
/// - AI evaluation has an API key when enabled
/// - Watch directory entries have a path
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    for (name, value) in [
        ("timeout", config.timeout),
        ("search_timeout", config.search_timeout),
        ("ai_evaluator.timeout", config.ai_evaluator.timeout),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(format!("{} must be a positive number of seconds", name)));
        }
    }

    if !(1..=20).contains(&config.concurrency) {
        return Err(invalid("concurrency must be between 1 and 20"));
    }

    if config.retries > 10 {
        return Err(invalid("retries cannot exceed 10"));
    }

    if !config.min_score.is_finite() {
        return Err(invalid("min_score must be a finite number"));
    }

    let ranking = &config.ranking;
    for (name, value) in [
        ("ranking.filename_weight", ranking.filename_weight),
        ("ranking.quality_weight", ranking.quality_weight),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!("{} must be a non-negative number", name)));
        }
    }
    if ranking.evaluation_batch_size == 0 {
        return Err(invalid("ranking.evaluation_batch_size cannot be 0"));
    }

    CompiledPatterns::from_config(&config.patterns)?;

    if config.ai_evaluator.enabled && config.ai_evaluator.api_key.trim().is_empty() {
        return Err(invalid("ai_evaluator.enabled requires ai_evaluator.api_key"));
    }

    if config
        .directory_watcher
        .watch_directories
        .iter()
        .any(|d| d.path.as_os_str().is_empty())
    {
        return Err(invalid("directory_watcher.watch_directories entries need a path"));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

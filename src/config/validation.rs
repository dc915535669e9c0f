use crate::config::types::{
    AnalyzerConfig, Config, CrawlerConfig, IndexConfig, OutputConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_index_config(&config.index)?;
    if let Some(analyzer) = &config.analyzer {
        validate_analyzer_config(analyzer)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth < 1 {
        return Err(ConfigError::Validation(
            "max-depth must be >= 1 (the root page is depth 1)".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.analysis_threshold > 10 {
        return Err(ConfigError::Validation(format!(
            "analysis-threshold must be between 0 and 10, got {}",
            config.analysis_threshold
        )));
    }

    if config.page_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "page-timeout-secs must be > 0".to_string(),
        ));
    }

    if config.max_links_per_page == 0 {
        return Err(ConfigError::Validation(
            "max-links-per-page must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates vector store limits
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.headroom_bytes >= config.document_limit_bytes {
        return Err(ConfigError::Validation(format!(
            "headroom-bytes ({}) must be smaller than document-limit-bytes ({})",
            config.headroom_bytes, config.document_limit_bytes
        )));
    }

    if config.metadata_value_limit_bytes < 32 {
        return Err(ConfigError::Validation(format!(
            "metadata-value-limit-bytes must be >= 32, got {}",
            config.metadata_value_limit_bytes
        )));
    }

    if config.metadata_total_limit_bytes < config.metadata_value_limit_bytes {
        return Err(ConfigError::Validation(
            "metadata-total-limit-bytes must be >= metadata-value-limit-bytes".to_string(),
        ));
    }

    if config.listing_cap == 0 {
        return Err(ConfigError::Validation(
            "listing-cap must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates the analyzer endpoint section
fn validate_analyzer_config(config: &AnalyzerConfig) -> Result<(), ConfigError> {
    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid analyzer endpoint: {}", e)))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analyzer model cannot be empty".to_string(),
        ));
    }

    if config.input_chars == 0 {
        return Err(ConfigError::Validation(
            "analyzer input-chars must be > 0".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "analyzer timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

//! Cross-field validation helpers

use std::borrow::Cow;
use url::Url;
use validator::ValidationError;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Build a validation error carrying a human readable message
pub fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Validate a log level name
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.trim().to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(error(
            "invalid_log_level",
            "logging.level must be one of: trace, debug, info, warn, error",
        ))
    }
}

/// Validate that a provider endpoint is an absolute http(s) URL with a host
pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    let url = Url::parse(value).map_err(|_| error("invalid_url", "provider URL does not parse"))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(error(
            "unsupported_url",
            "provider URL must be http or https with a host",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        for level in ["trace", "debug", "INFO", "warn", " error "] {
            assert!(validate_log_level(level).is_ok(), "{level} should be accepted");
        }
        assert!(validate_log_level("verbose").is_err());
        assert!(validate_log_level("").is_err());
    }

    #[test]
    fn test_http_urls() {
        assert!(validate_http_url("https://hub.pinata.cloud").is_ok());
        assert!(validate_http_url("http://127.0.0.1:2281/").is_ok());
        assert!(validate_http_url("ftp://example.com").is_err());
        assert!(validate_http_url("not a url").is_err());
    }

    #[test]
    fn test_error_carries_message() {
        let err = error("code", "a message");
        assert_eq!(err.code, "code");
        assert_eq!(err.message.as_deref(), Some("a message"));
    }
}

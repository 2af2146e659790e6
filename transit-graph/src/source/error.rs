//! Stop point API error types.

/// Errors that can occur when fetching station records.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication failed
    #[error("unauthorized: check TFL_APP_KEY")]
    Unauthorized,

    /// Too many requests
    #[error("rate limited by the API")]
    RateLimited,

    /// API returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Cache operation failed
    #[error("cache error: {message}")]
    Cache { message: String },

    /// Every attempt failed
    #[error("gave up on {mode} after {attempts} attempts: {last}")]
    RetriesExhausted {
        mode: String,
        attempts: u32,
        last: Box<SourceError>,
    },
}

impl SourceError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SourceError::RateLimited => true,
            SourceError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(SourceError::RateLimited.is_transient());
        assert!(
            SourceError::Api {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !SourceError::Api {
                status: 404,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!SourceError::Unauthorized.is_transient());
    }

    #[test]
    fn exhausted_names_last_error() {
        let err = SourceError::RetriesExhausted {
            mode: "tube".to_string(),
            attempts: 4,
            last: Box::new(SourceError::RateLimited),
        };
        assert_eq!(err.to_string(), "gave up on tube after 4 attempts: rate limited by the API");
    }
}

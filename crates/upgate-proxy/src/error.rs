//! Error types for the proxy layer.

use thiserror::Error;

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors raised while translating events or driving the response adapter.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("parsing proxy event: {0}")]
    Event(#[from] serde_json::Error),

    #[error("decoding base64 body: {0}")]
    Base64Body(#[from] base64::DecodeError),

    #[error("creating request: {0}")]
    Request(#[from] http::Error),

    /// The response was already turned into an [`Output`](crate::Output).
    /// Writing to it afterwards is a bug in the caller.
    #[error("response already finalized")]
    Finalized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalized_display() {
        assert_eq!(ProxyError::Finalized.to_string(), "response already finalized");
    }

    #[test]
    fn event_error_from_serde() {
        let err: ProxyError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProxyError::Event(_)));
        assert!(err.to_string().starts_with("parsing proxy event"));
    }

    #[test]
    fn error_is_std_error() {
        let err = ProxyError::Finalized;
        let _: &dyn std::error::Error = &err;
    }
}

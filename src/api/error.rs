use thiserror::Error;

/// Errors returned by an exchange capability.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error payload returned by the exchange.
    #[error("Binance API error {code}: {message}")]
    Api { code: i32, message: String },

    /// Response did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Client was constructed without what a call needs (e.g. credentials).
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// Parse a Binance error body.
    ///
    /// Binance returns errors in the format: `{"code": -1000, "msg": "..."}`
    pub fn from_api_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i32,
            msg: String,
        }

        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => Self::Api {
                code: err.code,
                message: err.msg,
            },
            Err(_) => Self::Parse(format!("HTTP {} with unparseable body: {}", status, body)),
        }
    }

    /// Whether a repeat of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            // -1000 unknown, -1001 disconnected, -1003 too many requests
            Self::Api { code, .. } => matches!(code, -1000 | -1001 | -1003),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_error_body() {
        let err = ExchangeError::from_api_response(400, r#"{"code":-4164,"msg":"Order's notional must be no smaller than 100"}"#);
        match err {
            ExchangeError::Api { code, message } => {
                assert_eq!(code, -4164);
                assert!(message.contains("notional"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_body_is_parse_error() {
        let err = ExchangeError::from_api_response(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, ExchangeError::Parse(_)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_transient_classification() {
        let busy = ExchangeError::Api {
            code: -1003,
            message: "Too many requests".to_string(),
        };
        let rejected = ExchangeError::Api {
            code: -2019,
            message: "Margin is insufficient".to_string(),
        };
        assert!(busy.is_transient());
        assert!(!rejected.is_transient());
        assert!(!ExchangeError::Parse("x".to_string()).is_transient());
    }
}

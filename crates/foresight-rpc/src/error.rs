use thiserror::Error;

/// Provider-pressure classification both adaptive loops depend on. The fetch
/// and timestamp components only ever branch on this, never on raw messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// Rate limit or timeout: back off and retry the same request.
    Throttled,
    /// The provider rejected the requested block window as too wide.
    RangeTooLarge,
    /// Anything else; retrying the same request is unlikely to help.
    Other,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error talking to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    InvalidResponse(String),

    #[error("no rpc endpoints configured")]
    NoEndpoints,
}

/// Codes providers use for throttling. -32005 is the de-facto
/// "limit exceeded" code; 429 leaks through from HTTP-level limiters.
const THROTTLE_CODES: &[i64] = &[429, -32005, -32016];

const THROTTLE_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "too many requests",
    "request limit",
    "capacity exceeded",
    "try again",
];

const RANGE_MARKERS: &[&str] = &[
    "block range",
    "range too large",
    "query returned more than",
    "response size exceeded",
    "exceed maximum block range",
    "requested too many blocks",
];

impl RpcError {
    pub fn kind(&self) -> RpcErrorKind {
        match self {
            Self::Timeout { .. } => RpcErrorKind::Throttled,
            Self::Rpc { code, message } => {
                let lowered = message.to_lowercase();
                if RANGE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    RpcErrorKind::RangeTooLarge
                } else if THROTTLE_CODES.contains(code)
                    || THROTTLE_MARKERS.iter().any(|m| lowered.contains(m))
                {
                    RpcErrorKind::Throttled
                } else {
                    RpcErrorKind::Other
                }
            }
            Self::Transport { message, .. } => {
                let lowered = message.to_lowercase();
                if lowered.contains("429") || THROTTLE_MARKERS.iter().any(|m| lowered.contains(m))
                {
                    RpcErrorKind::Throttled
                } else {
                    RpcErrorKind::Other
                }
            }
            Self::InvalidResponse(_) | Self::NoEndpoints => RpcErrorKind::Other,
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.kind() == RpcErrorKind::Throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classifies_as_throttled() {
        let err = RpcError::Timeout { timeout_ms: 15_000 };
        assert_eq!(err.kind(), RpcErrorKind::Throttled);
    }

    #[test]
    fn test_limit_exceeded_code() {
        let err = RpcError::Rpc {
            code: -32005,
            message: "limit exceeded".to_string(),
        };
        assert_eq!(err.kind(), RpcErrorKind::Throttled);
    }

    #[test]
    fn test_range_signature_wins_over_throttle_markers() {
        // Some providers phrase range rejections with "limit" wording; the
        // range signature must take priority so the span cap gets lowered.
        let err = RpcError::Rpc {
            code: -32602,
            message: "query returned more than 10000 results, narrow the block range".to_string(),
        };
        assert_eq!(err.kind(), RpcErrorKind::RangeTooLarge);
    }

    #[test]
    fn test_unknown_error_is_other() {
        let err = RpcError::Rpc {
            code: -32000,
            message: "header not found".to_string(),
        };
        assert_eq!(err.kind(), RpcErrorKind::Other);
    }
}

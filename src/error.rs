//! Grepable error codes shared by every error surface of the bridge.

/// Stable code and retryable flag for log lines and exit reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

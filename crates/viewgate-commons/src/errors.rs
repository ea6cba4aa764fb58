// Error types module
use thiserror::Error;

/// Result alias used throughout the gateway crates.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the viewgate query gateway.
///
/// Every failure path surfaces as one stable variant with a human-readable
/// message. Messages never contain rewritten SQL text or upstream stack
/// traces; the offending SQL is logged server-side only.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Stored query missing or inactive. Never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The SQL safety validator vetoed the query text.
    #[error("SQL rejected: {0}")]
    SqlRejected(String),

    /// Undefined, missing or malformed view parameter.
    #[error("Parameter error: {0}")]
    Parameter(String),

    /// Could not acquire an admission slot before the deadline.
    #[error("Admission timeout: {0}")]
    AdmissionTimeout(String),

    /// The circuit breaker for the named dependency is open.
    #[error("Circuit open for dependency '{0}'")]
    CircuitOpen(String),

    /// The call to the analytical engine failed for a reason other than the
    /// circuit being open. Counts against the breaker.
    #[error("Upstream call failed: {0}")]
    UpstreamCall(String),

    /// Deadline exceeded mid-flight. Resources are still released.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        GatewayError::NotFound(msg.into())
    }

    /// Create a SQL rejection error
    pub fn sql_rejected<S: Into<String>>(msg: S) -> Self {
        GatewayError::SqlRejected(msg.into())
    }

    /// Create a parameter error
    pub fn parameter<S: Into<String>>(msg: S) -> Self {
        GatewayError::Parameter(msg.into())
    }

    /// Create an admission timeout error
    pub fn admission_timeout<S: Into<String>>(msg: S) -> Self {
        GatewayError::AdmissionTimeout(msg.into())
    }

    /// Create an upstream call error
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        GatewayError::UpstreamCall(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        GatewayError::Cancelled(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GatewayError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        GatewayError::Internal(msg.into())
    }

    /// True for errors detected before any network resource is acquired.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::NotFound(_)
                | GatewayError::SqlRejected(_)
                | GatewayError::Parameter(_)
        )
    }
}

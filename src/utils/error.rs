use thiserror::Error;

#[derive(Error, Debug)]
pub enum IssueError {
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Carrier-prefixed wrapper the gateway adapters put around any protocol
    /// failure so the caller always sees which carrier broke and why.
    #[error("{carrier}: {message}")]
    Carrier {
        carrier: &'static str,
        message: String,
        #[source]
        source: Box<IssueError>,
    },

    /// A named stage of a page protocol failed (missing field, undetected
    /// confirmation screen, empty download, ...).
    #[error("Automation failed at stage '{stage}': {message}")]
    Automation { stage: &'static str, message: String },

    /// Deliberate control exit: the flow reached the confirmation screen and
    /// stopped before payment because dry-run mode is on. Not a defect.
    #[error("Reached confirmation screen; stopping before payment (dry run)")]
    DryRunStop,

    #[error("Browser request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error: {message}")]
    WebDriver { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Repository error: {message}")]
    Repository { message: String },

    #[error("Configuration error: {field}: {reason}")]
    Config { field: String, reason: String },
}

/// HTTP-equivalent class of an error, used by callers (the CLI today, an HTTP
/// handler eventually) to pick a status code or exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 400-equivalent: the request itself is malformed.
    Validation,
    /// 409-equivalent: the order is not in a state that allows issuance.
    Conflict,
    /// 404-equivalent.
    NotFound,
    /// 502-equivalent: the carrier automation or browser broke.
    External,
    /// Internal: repository, config, serialization.
    Internal,
}

impl IssueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssueError::OrderNotFound { .. } => ErrorKind::NotFound,
            IssueError::InvalidOperation { .. } => ErrorKind::Conflict,
            IssueError::InvalidInput { .. } => ErrorKind::Validation,
            IssueError::Carrier { .. }
            | IssueError::Automation { .. }
            | IssueError::DryRunStop
            | IssueError::Http(_)
            | IssueError::WebDriver { .. } => ErrorKind::External,
            IssueError::Io(_)
            | IssueError::Serialization(_)
            | IssueError::Repository { .. }
            | IssueError::Config { .. } => ErrorKind::Internal,
        }
    }

    /// True when the error is the dry-run control exit rather than a failure,
    /// including when a gateway has wrapped it with a carrier prefix.
    pub fn is_dry_run_stop(&self) -> bool {
        match self {
            IssueError::DryRunStop => true,
            IssueError::Carrier { source, .. } => source.is_dry_run_stop(),
            _ => false,
        }
    }

    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        IssueError::Automation {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IssueError>;

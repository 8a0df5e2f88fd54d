use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::roster::tools::export::ExportStage;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Exit status used when a required setting is absent or invalid.
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit status used when the download directory cannot be used.
pub const EXIT_ENVIRONMENT: i32 = 3;
/// Exit status used when the portal UI did not behave as expected.
pub const EXIT_AUTOMATION: i32 = 4;
/// Exit status used when the export never finished downloading.
pub const EXIT_DOWNLOAD_TIMEOUT: i32 = 5;

/// Error type covering the failure cases of one extraction and
/// reconciliation run.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Transport-level failure talking to an HTTP service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebDriver endpoint refused to open a browser session.
    #[error("failed to start browser session: {0}")]
    BrowserSession(#[from] fantoccini::error::NewSessionError),

    /// A WebDriver command failed for a reason other than a missing element.
    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    /// Signing the service-account assertion failed.
    #[error("failed to sign service-account assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// A required setting is absent or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The download directory could not be created or written to.
    #[error("download directory {path} is unusable: {reason}")]
    Environment { path: PathBuf, reason: String },

    /// An expected portal element never appeared within its deadline.
    #[error("{stage}: {detail} (url: {url}; page: {snippet})")]
    Automation {
        stage: ExportStage,
        detail: String,
        url: String,
        snippet: String,
    },

    /// The export was triggered but no completed file showed up in time.
    #[error("timed out after {waited:?} waiting for a completed export in {dir}")]
    DownloadTimeout { dir: PathBuf, waited: Duration },

    /// A row could not be coerced into its header's shape.
    #[error("row does not fit header {header:?}: {row:?}")]
    DataShape { header: Vec<String>, row: Vec<String> },

    /// The identity key column is missing from one side of the reconciliation.
    #[error("identity key column '{column}' missing in {side}")]
    SheetSchema { column: String, side: String },

    /// The OAuth token endpoint refused the service-account assertion.
    #[error("token exchange returned {status}: {body}")]
    TokenExchange { status: u16, body: String },

    /// The remote spreadsheet API answered with an error status.
    #[error("spreadsheet API returned {status}: {body}")]
    RemoteStore { status: u16, body: String },

    /// The notification endpoint rejected the message.
    #[error("notification endpoint returned {status}: {body}")]
    NotificationDelivery { status: u16, body: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    /// Process exit status the binary reports for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Configuration(_) => EXIT_CONFIGURATION,
            ToolError::Environment { .. } => EXIT_ENVIRONMENT,
            ToolError::Automation { .. } => EXIT_AUTOMATION,
            ToolError::DownloadTimeout { .. } => EXIT_DOWNLOAD_TIMEOUT,
            _ => 1,
        }
    }
}

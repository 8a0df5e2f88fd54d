//! Retrieval of the roster export artifact.
//!
//! [`PortalExporter`] drives the member portal through a WebDriver session;
//! [`LocalArtifact`] hands back a file that is already on disk. Both sit
//! behind [`ExportRetriever`] so the reconciliation pipeline never depends on
//! a live browser.

pub mod download;
pub mod portal;
pub mod stage;

use std::path::PathBuf;
use std::time::Duration;

pub use portal::{PortalExporter, PortalSettings};
pub use stage::ExportStage;

use crate::roster::tools::error::{Result, ToolError};

/// Produces one export artifact per call.
pub trait ExportRetriever {
    /// Returns the path of a completed export file.
    fn retrieve(&mut self) -> Result<PathBuf>;
}

/// Deadlines and poll intervals for each bounded wait of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportTimings {
    /// Interval between UI condition checks.
    pub ui_poll: Duration,
    /// Deadline for the login inputs to appear.
    pub login_fields: Duration,
    /// Deadline for the URL to reflect a signed-in route.
    pub post_login: Duration,
    /// Deadline for the export control to appear.
    pub export_control: Duration,
    /// Deadline for the confirmation control to appear.
    pub confirm_control: Duration,
    /// Interval between download directory checks.
    pub download_poll: Duration,
    /// Deadline for a completed file to appear.
    pub download: Duration,
}

impl Default for ExportTimings {
    fn default() -> Self {
        Self {
            ui_poll: Duration::from_millis(500),
            login_fields: Duration::from_secs(30),
            post_login: Duration::from_secs(20),
            export_control: Duration::from_secs(30),
            confirm_control: Duration::from_secs(30),
            download_poll: Duration::from_millis(500),
            download: Duration::from_secs(60),
        }
    }
}

/// Retriever that returns an export downloaded earlier.
#[derive(Debug, Clone)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExportRetriever for LocalArtifact {
    fn retrieve(&mut self) -> Result<PathBuf> {
        if !self.path.is_file() {
            return Err(ToolError::Configuration(format!(
                "artifact not found: {}",
                self.path.display()
            )));
        }
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_artifact_returns_existing_file() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().join("roster.xlsx");
        std::fs::write(&path, b"data").expect("file written");

        let mut retriever = LocalArtifact::new(&path);
        assert_eq!(retriever.retrieve().expect("artifact"), path);
    }

    #[test]
    fn local_artifact_rejects_missing_file() {
        let mut retriever = LocalArtifact::new("/nonexistent/roster.xlsx");
        let err = retriever.retrieve().expect_err("missing");
        assert!(matches!(err, ToolError::Configuration(_)));
    }

    #[test]
    fn default_timings_match_portal_deadlines() {
        let timings = ExportTimings::default();
        assert_eq!(timings.login_fields, Duration::from_secs(30));
        assert_eq!(timings.post_login, Duration::from_secs(20));
        assert_eq!(timings.download, Duration::from_secs(60));
        assert_eq!(timings.download_poll, Duration::from_millis(500));
    }
}

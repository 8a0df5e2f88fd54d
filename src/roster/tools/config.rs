//! Validated run configuration.
//!
//! The binary gathers raw values from flags and environment variables, then
//! builds one [`Settings`] value through [`Settings::validate`]. Components
//! receive the pieces they need from it; nothing reads the environment after
//! start-up.

use std::fmt;
use std::path::PathBuf;

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::export::PortalSettings;

/// Where the export artifact comes from.
#[derive(Debug, Clone)]
pub enum ExportSource {
    /// Sign in to the portal and download a fresh export.
    Portal(PortalSettings),
    /// Reuse a file that was downloaded earlier.
    Artifact(PathBuf),
}

/// Everything one run needs, checked once at start-up.
#[derive(Clone)]
pub struct Settings {
    pub source: ExportSource,
    pub ntfy_url: String,
    pub ntfy_topic: String,
    pub ntfy_token: String,
    pub sheets_api_url: String,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub service_account_file: PathBuf,
    pub key_column: String,
    pub dry_run: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("source", &self.source)
            .field("ntfy_url", &self.ntfy_url)
            .field("ntfy_topic", &self.ntfy_topic)
            .field("ntfy_token", &"<REDACTED>")
            .field("sheets_api_url", &self.sheets_api_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("sheet_name", &self.sheet_name)
            .field("service_account_file", &self.service_account_file)
            .field("key_column", &self.key_column)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Settings {
    /// Rejects blank required values and a missing service-account file.
    /// The error names the offending setting, never its value.
    pub fn validate(self) -> Result<Self> {
        let mut required = vec![
            ("NTFY_TOKEN", self.ntfy_token.as_str()),
            ("NTFY_TOPIC", self.ntfy_topic.as_str()),
            ("NTFY_URL", self.ntfy_url.as_str()),
            ("SHEETS_API_URL", self.sheets_api_url.as_str()),
            ("SPREADSHEET_ID", self.spreadsheet_id.as_str()),
            ("SHEET_NAME", self.sheet_name.as_str()),
            ("KEY_COLUMN", self.key_column.as_str()),
        ];
        match &self.source {
            ExportSource::Portal(portal) => {
                required.extend([
                    ("PORTAL_USER", portal.username.as_str()),
                    ("PORTAL_PASS", portal.password.as_str()),
                    ("PORTAL_LOGIN_URL", portal.login_url.as_str()),
                    ("PORTAL_ROSTER_URL", portal.roster_url.as_str()),
                    ("WEBDRIVER_URL", portal.webdriver_url.as_str()),
                ]);
                if portal.download_dir.as_os_str().is_empty() {
                    return Err(missing("DOWNLOAD_DIR"));
                }
            }
            ExportSource::Artifact(path) => {
                if !path.is_file() {
                    return Err(ToolError::Configuration(format!(
                        "artifact not found: {}",
                        path.display()
                    )));
                }
            }
        }

        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(missing(name));
        }

        if !self.service_account_file.is_file() {
            return Err(ToolError::Configuration(format!(
                "SERVICE_ACCOUNT_FILE does not point to a file: {}",
                self.service_account_file.display()
            )));
        }

        Ok(self)
    }
}

fn missing(name: &str) -> ToolError {
    ToolError::Configuration(format!("required setting {name} is empty"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::tools::export::ExportTimings;
    use std::fs;
    use tempfile::TempDir;

    fn portal() -> PortalSettings {
        PortalSettings {
            webdriver_url: "http://localhost:9515".into(),
            login_url: "https://portal.example.org/s/login/".into(),
            roster_url: "https://portal.example.org/s/my-chapter".into(),
            post_login_path: "/s".into(),
            username: "advisor@example.org".into(),
            password: "hunter2".into(),
            download_dir: PathBuf::from("./downloads"),
            timings: ExportTimings::default(),
        }
    }

    fn settings(dir: &TempDir) -> Settings {
        let credentials = dir.path().join("service_account.json");
        fs::write(&credentials, b"{}").expect("credentials written");
        Settings {
            source: ExportSource::Portal(portal()),
            ntfy_url: "https://ntfy.sh".into(),
            ntfy_topic: "BBYO".into(),
            ntfy_token: "tk_secret".into(),
            sheets_api_url: "https://sheets.googleapis.com/v4".into(),
            spreadsheet_id: "sheet-123".into(),
            sheet_name: "Sheet1".into(),
            service_account_file: credentials,
            key_column: "Full Name".into(),
            dry_run: false,
        }
    }

    #[test]
    fn complete_settings_validate() {
        let dir = tempfile::tempdir().expect("temporary directory");
        assert!(settings(&dir).validate().is_ok());
    }

    #[test]
    fn blank_token_is_reported_by_name() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let mut config = settings(&dir);
        config.ntfy_token = "   ".into();

        let err = config.validate().expect_err("blank token");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("NTFY_TOKEN"));
    }

    #[test]
    fn blank_portal_password_is_rejected() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let mut config = settings(&dir);
        let mut portal = portal();
        portal.password.clear();
        config.source = ExportSource::Portal(portal);

        let err = config.validate().expect_err("blank password");
        assert!(err.to_string().contains("PORTAL_PASS"));
    }

    #[test]
    fn artifact_source_skips_portal_credentials() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let artifact = dir.path().join("roster.xlsx");
        fs::write(&artifact, b"data").expect("artifact written");
        let mut config = settings(&dir);
        config.source = ExportSource::Artifact(artifact);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_service_account_file_is_rejected() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let mut config = settings(&dir);
        config.service_account_file = dir.path().join("absent.json");

        let err = config.validate().expect_err("missing credentials");
        assert!(matches!(err, ToolError::Configuration(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let rendered = format!("{:?}", settings(&dir));
        assert!(!rendered.contains("tk_secret"));
        assert!(!rendered.contains("hunter2"));
    }
}

use std::fmt;

/// Progress of one portal export. A run moves strictly forward through these
/// stages; any failure is reported together with the stage it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportStage {
    Init,
    SessionReady,
    LoginSubmitted,
    PortalNavigated,
    ExportTriggered,
    ExportConfirmed,
    DownloadComplete,
}

impl ExportStage {
    /// Stage that follows this one, or `None` once the download is complete.
    pub fn next(self) -> Option<Self> {
        use ExportStage::*;
        match self {
            Init => Some(SessionReady),
            SessionReady => Some(LoginSubmitted),
            LoginSubmitted => Some(PortalNavigated),
            PortalNavigated => Some(ExportTriggered),
            ExportTriggered => Some(ExportConfirmed),
            ExportConfirmed => Some(DownloadComplete),
            DownloadComplete => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ExportStage::DownloadComplete
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStage::Init => "INIT",
            ExportStage::SessionReady => "SESSION_READY",
            ExportStage::LoginSubmitted => "LOGIN_SUBMITTED",
            ExportStage::PortalNavigated => "PORTAL_NAVIGATED",
            ExportStage::ExportTriggered => "EXPORT_TRIGGERED",
            ExportStage::ExportConfirmed => "EXPORT_CONFIRMED",
            ExportStage::DownloadComplete => "DOWNLOAD_COMPLETE",
        };
        f.write_str(name)
    }
}

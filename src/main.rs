use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use roster_tools::config::{ExportSource, Settings};
use roster_tools::error::EXIT_CONFIGURATION;
use roster_tools::export::{
    ExportRetriever, ExportTimings, LocalArtifact, PortalExporter, PortalSettings,
};
use roster_tools::io::ntfy::{DEFAULT_NTFY_URL, NtfySink};
use roster_tools::io::service_account::{SPREADSHEETS_SCOPE, ServiceAccountKey};
use roster_tools::io::sheets::{DEFAULT_SHEETS_API_URL, SheetsLedger};
use roster_tools::pipeline::{self, RunOptions};
use roster_tools::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    // A missing .env file is fine; deployments usually inject the variables.
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_CONFIGURATION } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args.into_settings()?),
        Command::Check(args) => {
            let settings = args.into_settings()?;
            info!(?settings, "configuration is valid");
            Ok(())
        }
    }
}

fn execute_run(settings: Settings) -> Result<()> {
    let http = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()?;

    let key = ServiceAccountKey::from_file(&settings.service_account_file)?;
    let token = key.fetch_access_token(&http, SPREADSHEETS_SCOPE)?;
    let ledger = SheetsLedger::new(
        http.clone(),
        &settings.sheets_api_url,
        &settings.spreadsheet_id,
        &settings.sheet_name,
        token,
    )?;
    let sink = NtfySink::new(
        http,
        &settings.ntfy_url,
        &settings.ntfy_topic,
        &settings.ntfy_token,
    )?;

    let mut retriever: Box<dyn ExportRetriever> = match settings.source {
        ExportSource::Portal(portal) => Box::new(PortalExporter::new(portal)),
        ExportSource::Artifact(path) => Box::new(LocalArtifact::new(path)),
    };

    let mut options = RunOptions::new(&settings.key_column);
    options.dry_run = settings.dry_run;

    let outcome = pipeline::run(retriever.as_mut(), &ledger, &sink, &options)?;
    info!(?outcome, "run finished");
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Append newly exported portal members to the roster ledger."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the roster, append new members and send the summary.
    Run(RunArgs),
    /// Validate the configuration and exit.
    Check(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Portal account name.
    #[arg(long, env = "PORTAL_USER", required_unless_present = "artifact")]
    portal_user: Option<String>,

    /// Portal account password.
    #[arg(
        long,
        env = "PORTAL_PASS",
        hide_env_values = true,
        required_unless_present = "artifact"
    )]
    portal_pass: Option<String>,

    /// Portal sign-in page.
    #[arg(
        long,
        env = "PORTAL_LOGIN_URL",
        default_value = "https://bbyo.my.site.com/s/login/"
    )]
    portal_login_url: String,

    /// Page holding the roster export control.
    #[arg(
        long,
        env = "PORTAL_ROSTER_URL",
        default_value = "https://bbyo.my.site.com/s/my-chapter"
    )]
    portal_roster_url: String,

    /// Path prefix the portal lands on after signing in.
    #[arg(long, env = "PORTAL_POST_LOGIN_PATH", default_value = "/s")]
    post_login_path: String,

    /// WebDriver endpoint used to drive the browser.
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    webdriver_url: String,

    /// Directory the browser downloads the export into.
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "./downloads")]
    download_dir: PathBuf,

    /// Reconcile this already-downloaded export instead of using the portal.
    #[arg(long)]
    artifact: Option<PathBuf>,

    /// Notification access token.
    #[arg(long, env = "NTFY_TOKEN", hide_env_values = true)]
    ntfy_token: String,

    /// Notification topic.
    #[arg(long, env = "NTFY_TOPIC", default_value = "BBYO")]
    ntfy_topic: String,

    /// Notification server.
    #[arg(long, env = "NTFY_URL", default_value = DEFAULT_NTFY_URL)]
    ntfy_url: String,

    /// Identifier of the ledger spreadsheet.
    #[arg(long, env = "SPREADSHEET_ID")]
    spreadsheet_id: String,

    /// Tab of the ledger spreadsheet.
    #[arg(long, env = "SHEET_NAME", default_value = "Sheet1")]
    sheet_name: String,

    /// Service-account credential file for the spreadsheet API.
    #[arg(
        long,
        env = "SERVICE_ACCOUNT_FILE",
        default_value = "./service_account.json"
    )]
    service_account_file: PathBuf,

    /// Spreadsheet API base URL.
    #[arg(long, env = "SHEETS_API_URL", default_value = DEFAULT_SHEETS_API_URL)]
    sheets_api_url: String,

    /// Column identifying a member in both the export and the ledger.
    #[arg(long, env = "KEY_COLUMN", default_value = "Full Name")]
    key_column: String,

    /// Reconcile and report without appending or notifying.
    #[arg(long)]
    dry_run: bool,
}

impl RunArgs {
    fn into_settings(self) -> Result<Settings> {
        let source = match self.artifact {
            Some(path) => ExportSource::Artifact(path),
            None => ExportSource::Portal(PortalSettings {
                webdriver_url: self.webdriver_url,
                login_url: self.portal_login_url,
                roster_url: self.portal_roster_url,
                post_login_path: self.post_login_path,
                username: self.portal_user.unwrap_or_default(),
                password: self.portal_pass.unwrap_or_default(),
                download_dir: self.download_dir,
                timings: ExportTimings::default(),
            }),
        };

        Settings {
            source,
            ntfy_url: self.ntfy_url,
            ntfy_topic: self.ntfy_topic,
            ntfy_token: self.ntfy_token,
            sheets_api_url: self.sheets_api_url,
            spreadsheet_id: self.spreadsheet_id,
            sheet_name: self.sheet_name,
            service_account_file: self.service_account_file,
            key_column: self.key_column,
            dry_run: self.dry_run,
        }
        .validate()
    }
}

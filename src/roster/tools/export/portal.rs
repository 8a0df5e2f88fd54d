use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::Capabilities;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info, instrument, warn};

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::export::download;
use crate::roster::tools::export::{ExportRetriever, ExportStage, ExportTimings};
use crate::roster::tools::poll::{WaitError, await_condition};

const USERNAME_INPUT: &str = "//input[@type='text' or @type='email']";
const PASSWORD_INPUT: &str = "//input[@type='password']";
const EXPORT_CONTROL: &str = "//button[@data-element-id='button' and .//span[text()='Export']]";
const CONFIRM_CONTROL: &str =
    "//button[contains(@class,'slds-button_brand') and normalize-space(text())='Export']";

/// WebDriver key code for Enter.
const ENTER_KEY: &str = "\u{E007}";
const SNIPPET_CHARS: usize = 500;

const CHROME_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--window-size=1920,1080",
];

/// Everything the exporter needs to sign in and download the roster.
#[derive(Clone)]
pub struct PortalSettings {
    /// WebDriver endpoint, e.g. a local chromedriver.
    pub webdriver_url: String,
    pub login_url: String,
    pub roster_url: String,
    /// Path prefix the portal redirects to after a successful sign-in.
    pub post_login_path: String,
    pub username: String,
    pub password: String,
    pub download_dir: PathBuf,
    pub timings: ExportTimings,
}

impl fmt::Debug for PortalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalSettings")
            .field("webdriver_url", &self.webdriver_url)
            .field("login_url", &self.login_url)
            .field("roster_url", &self.roster_url)
            .field("post_login_path", &self.post_login_path)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("download_dir", &self.download_dir)
            .field("timings", &self.timings)
            .finish()
    }
}

/// Downloads the roster export by driving the member portal in a headless
/// browser.
#[derive(Debug)]
pub struct PortalExporter {
    settings: PortalSettings,
}

impl PortalExporter {
    pub fn new(settings: PortalSettings) -> Self {
        Self { settings }
    }
}

impl ExportRetriever for PortalExporter {
    #[instrument(level = "info", skip_all, fields(roster = %self.settings.roster_url))]
    fn retrieve(&mut self) -> Result<PathBuf> {
        let download_dir = download::prepare_download_dir(&self.settings.download_dir)?;
        let session = BrowserSession::open(&self.settings.webdriver_url, &download_dir)?;

        let run = ExportRun {
            session: &session,
            settings: &self.settings,
            download_dir,
            stage: ExportStage::Init,
        };
        // `session` is dropped after the run on every path, closing the browser.
        run.execute()
    }
}

/// A WebDriver session plus the runtime that drives it. Dropping the value
/// closes the browser.
struct BrowserSession {
    runtime: Runtime,
    client: Client,
}

impl BrowserSession {
    fn open(webdriver_url: &str, download_dir: &Path) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let mut builder = ClientBuilder::native();
        builder.capabilities(chrome_capabilities(download_dir));
        let client = runtime.block_on(builder.connect(webdriver_url))?;
        info!(webdriver = webdriver_url, "browser session started");
        Ok(Self { runtime, client })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        match self.runtime.block_on(self.client.clone().close()) {
            Ok(()) => debug!("browser session closed"),
            Err(err) => warn!(error = %err, "failed to close browser session"),
        }
    }
}

struct ExportRun<'a> {
    session: &'a BrowserSession,
    settings: &'a PortalSettings,
    download_dir: PathBuf,
    stage: ExportStage,
}

impl ExportRun<'_> {
    fn execute(mut self) -> Result<PathBuf> {
        self.advance(ExportStage::SessionReady);

        self.submit_login()?;
        self.advance(ExportStage::LoginSubmitted);

        self.open_roster()?;
        self.advance(ExportStage::PortalNavigated);

        let export = self.await_element(
            EXPORT_CONTROL,
            self.settings.timings.export_control,
            "export control",
        )?;
        download::clear_download_dir(&self.download_dir)?;
        self.session.block_on(export.click())?;
        self.advance(ExportStage::ExportTriggered);

        let confirm = self.await_element(
            CONFIRM_CONTROL,
            self.settings.timings.confirm_control,
            "export confirmation control",
        )?;
        self.activate(&confirm)?;
        self.advance(ExportStage::ExportConfirmed);

        let timings = &self.settings.timings;
        let path = download::wait_for_export(
            &self.download_dir,
            timings.download_poll,
            timings.download,
        )
        .inspect_err(|err| error!(stage = %self.stage, error = %err, "export never finished"))?;
        self.advance(ExportStage::DownloadComplete);
        debug_assert!(self.stage.is_terminal());
        info!(file = %path.display(), "export downloaded");
        Ok(path)
    }

    fn advance(&mut self, next: ExportStage) {
        debug_assert_eq!(self.stage.next(), Some(next));
        info!(from = %self.stage, to = %next, "export stage reached");
        self.stage = next;
    }

    fn submit_login(&self) -> Result<()> {
        let client = &self.session.client;
        self.session.block_on(client.goto(&self.settings.login_url))?;

        let timeout = self.settings.timings.login_fields;
        let username = self.await_element(USERNAME_INPUT, timeout, "username input")?;
        self.session.block_on(username.clear())?;
        self.session
            .block_on(username.send_keys(&self.settings.username))?;

        let password = self.await_element(PASSWORD_INPUT, timeout, "password input")?;
        self.session.block_on(password.clear())?;
        self.session
            .block_on(password.send_keys(&self.settings.password))?;
        self.session.block_on(password.send_keys(ENTER_KEY))?;
        Ok(())
    }

    fn open_roster(&self) -> Result<()> {
        let client = &self.session.client;
        let settings = self.settings;

        let signed_in = await_condition(
            settings.timings.ui_poll,
            settings.timings.post_login,
            || -> std::result::Result<Option<()>, CmdError> {
                let url = self.session.block_on(client.current_url())?;
                Ok(is_signed_in(url.as_str(), &settings.login_url, &settings.post_login_path)
                    .then_some(()))
            },
        );
        match signed_in {
            Ok(()) => {}
            Err(WaitError::TimedOut(waited)) => {
                return Err(self.diagnose(format!("still on the login page after {waited:?}")));
            }
            Err(WaitError::Failed(err)) => return Err(err.into()),
        }

        self.session.block_on(client.goto(&settings.roster_url))?;
        Ok(())
    }

    fn await_element(&self, xpath: &str, timeout: Duration, what: &str) -> Result<Element> {
        let client = &self.session.client;
        let found = await_condition(self.settings.timings.ui_poll, timeout, || {
            match self.session.block_on(client.find(Locator::XPath(xpath))) {
                Ok(element) => Ok(Some(element)),
                Err(err) if err.is_no_such_element() => Ok(None),
                Err(err) => Err(err),
            }
        });

        match found {
            Ok(element) => Ok(element),
            Err(WaitError::TimedOut(waited)) => {
                Err(self.diagnose(format!("{what} not found within {waited:?}")))
            }
            Err(WaitError::Failed(err)) => Err(err.into()),
        }
    }

    /// Clicks `element`, falling back to a script click when the browser
    /// refuses the native one.
    fn activate(&self, element: &Element) -> Result<()> {
        if let Err(err) = self.session.block_on(element.click()) {
            warn!(stage = %self.stage, error = %err, "native click rejected, invoking by script");
            let target = serde_json::to_value(element)?;
            self.session.block_on(
                self.session
                    .client
                    .execute("arguments[0].click();", vec![target]),
            )?;
        }
        Ok(())
    }

    /// Builds the automation failure for the current stage, capturing the
    /// page URL and the start of its source.
    fn diagnose(&self, detail: String) -> ToolError {
        let client = &self.session.client;
        let url = self
            .session
            .block_on(client.current_url())
            .map(|url| url.to_string())
            .unwrap_or_else(|err| format!("<unavailable: {err}>"));
        let snippet = self
            .session
            .block_on(client.source())
            .map(|source| page_snippet(&source))
            .unwrap_or_else(|err| format!("<unavailable: {err}>"));

        error!(stage = %self.stage, %url, %snippet, "{detail}");
        ToolError::Automation {
            stage: self.stage,
            detail,
            url,
            snippet,
        }
    }
}

fn chrome_capabilities(download_dir: &Path) -> Capabilities {
    let mut capabilities = Capabilities::new();
    capabilities.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": CHROME_ARGS,
            "prefs": {
                "download.default_directory": download_dir.display().to_string(),
                "download.prompt_for_download": false,
                "download.directory_upgrade": true,
                "safebrowsing.enabled": true,
            },
        }),
    );
    capabilities
}

/// `true` once the browser has left the login page for a route under
/// `post_login_path`. Paths are compared without query strings or a trailing
/// slash, and the prefix only matches whole path segments.
fn is_signed_in(current_url: &str, login_url: &str, post_login_path: &str) -> bool {
    let Ok(current) = reqwest::Url::parse(current_url) else {
        return false;
    };
    let path = current.path().trim_end_matches('/');

    let login_path = reqwest::Url::parse(login_url)
        .map(|url| url.path().trim_end_matches('/').to_owned())
        .unwrap_or_default();
    if path == login_path {
        return false;
    }

    let prefix = post_login_path.trim_end_matches('/');
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn page_snippet(source: &str) -> String {
    source.chars().take(SNIPPET_CHARS).collect()
}

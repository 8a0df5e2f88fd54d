use std::fmt;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::model::RecordSet;

/// Public endpoint of the spreadsheet values API.
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

/// The persisted member ledger. Appends only ever add rows at the end.
pub trait Ledger {
    /// Reads every row of the ledger. A sheet with no rows yields an empty
    /// record set.
    fn read(&self) -> Result<RecordSet>;

    /// Appends `rows` after the last populated row. Values are positional and
    /// follow the sheet's existing column order. Returns the number of rows
    /// the store reports as written.
    fn append(&self, rows: &[Vec<String>]) -> Result<usize>;
}

/// Ledger backed by one tab of a hosted spreadsheet.
#[derive(Clone)]
pub struct SheetsLedger {
    http: Client,
    base_url: Url,
    spreadsheet_id: String,
    range: String,
    access_token: String,
}

impl fmt::Debug for SheetsLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsLedger")
            .field("base_url", &self.base_url.as_str())
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("access_token", &"<REDACTED>")
            .finish()
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: &'a [Vec<String>],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: Option<usize>,
}

impl SheetsLedger {
    /// `range` is usually just the tab name, which addresses the whole tab.
    pub fn new(
        http: Client,
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            ToolError::Configuration(format!("invalid spreadsheet API URL '{base_url}': {err}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ToolError::Configuration(format!(
                "spreadsheet API URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            access_token: access_token.into(),
        })
    }

    fn values_url(&self, suffix: &str) -> Url {
        let target = format!("{}{suffix}", self.range);
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                target.as_str(),
            ]);
        }
        url
    }
}

impl Ledger for SheetsLedger {
    #[instrument(level = "info", skip(self), fields(spreadsheet = %self.spreadsheet_id, range = %self.range))]
    fn read(&self) -> Result<RecordSet> {
        let response = self
            .http
            .get(self.values_url(""))
            .bearer_auth(&self.access_token)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::RemoteStore {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let range: ValueRange = response.json()?;
        let mut rows = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(value_to_cell).collect::<Vec<String>>());

        let Some(header) = rows.next() else {
            info!("ledger has no header or rows");
            return Ok(RecordSet::empty());
        };
        let records = RecordSet::from_raw(header, rows.collect(), 2)?;
        info!(
            columns = records.schema().len(),
            rows = records.len(),
            "read ledger"
        );
        Ok(records)
    }

    #[instrument(level = "info", skip_all, fields(spreadsheet = %self.spreadsheet_id, rows = rows.len()))]
    fn append(&self, rows: &[Vec<String>]) -> Result<usize> {
        let mut url = self.values_url(":append");
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&AppendBody { values: rows })
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::RemoteStore {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let reply: AppendResponse = response.json()?;
        Ok(reply
            .updates
            .and_then(|updates| updates.updated_rows)
            .unwrap_or(rows.len()))
    }
}

/// Text of a value returned by the values API. Formatted values arrive as
/// strings; anything else is rendered without JSON quoting.
fn value_to_cell(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(base: &str, range: &str) -> SheetsLedger {
        SheetsLedger::new(Client::new(), base, "sheet-123", range, "token").expect("ledger")
    }

    #[test]
    fn values_url_encodes_tab_name() {
        let url = ledger("https://sheets.example.com/v4", "Roster 2025").values_url("");
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet-123/values/Roster%202025"
        );
    }

    #[test]
    fn append_url_keeps_colon_suffix() {
        let url = ledger("https://sheets.example.com/v4/", "Sheet1").values_url(":append");
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/sheet-123/values/Sheet1:append"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        let err = SheetsLedger::new(Client::new(), "mailto:ops@example.com", "id", "Sheet1", "t")
            .expect_err("not a base");
        assert!(matches!(err, ToolError::Configuration(_)));
    }

    #[test]
    fn non_string_values_render_plainly() {
        assert_eq!(value_to_cell(serde_json::json!(2025)), "2025");
        assert_eq!(value_to_cell(serde_json::json!(null)), "");
        assert_eq!(value_to_cell(serde_json::json!("B")), "B");
    }
}

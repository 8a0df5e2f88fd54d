//! Computes which exported members are missing from the ledger and prepares
//! the append payload and the summary message for them.

use std::collections::HashSet;

use tracing::debug;

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::model::RecordSet;

/// Graduation year column shown in the summary.
pub const GRAD_YEAR_COLUMN: &str = "Grad Year";
/// Group (AZA/BBG) column shown in the summary.
pub const GROUP_COLUMN: &str = "AZA or BBG";
/// Chapter column shown in the summary.
pub const CHAPTER_COLUMN: &str = "Chapter Name";

/// Returns the extract records whose `key` value does not occur in the
/// ledger, in extract order. An empty ledger yields the whole extract.
///
/// Fails with [`ToolError::SheetSchema`] when a non-empty ledger or the
/// extract lacks the key column.
pub fn new_records(extract: &RecordSet, ledger: &RecordSet, key: &str) -> Result<RecordSet> {
    if ledger.is_empty() {
        debug!("ledger is empty, every extract record is new");
        return Ok(extract.clone());
    }

    let missing = |side: &str| ToolError::SheetSchema {
        column: key.to_string(),
        side: side.to_string(),
    };
    let ledger_key = ledger.schema().position(key).ok_or_else(|| missing("ledger"))?;
    let extract_key = extract.schema().position(key).ok_or_else(|| missing("export"))?;

    let known: HashSet<&str> = ledger
        .records()
        .iter()
        .map(|record| record.values()[ledger_key].as_str())
        .collect();

    Ok(extract.filter(|record| !known.contains(record.values()[extract_key].as_str())))
}

/// Rows handed to the ledger append. When the ledger has no header yet the
/// extract header goes first so the sheet gains a schema.
pub fn append_payload(new: &RecordSet, ledger_has_header: bool) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(new.len() + 1);
    if !ledger_has_header {
        rows.push(new.schema().columns().to_vec());
    }
    rows.extend(new.records().iter().map(|record| record.values().to_vec()));
    rows
}

/// Builds the notification text: a count line followed by one
/// `name | year | group | chapter` line per new member.
///
/// The projected columns are fixed; a missing one is a configuration error.
pub fn summary_message(new: &RecordSet, key: &str) -> Result<String> {
    let columns = [key, GRAD_YEAR_COLUMN, GROUP_COLUMN, CHAPTER_COLUMN];
    let positions = columns
        .iter()
        .map(|column| {
            new.schema().position(column).ok_or_else(|| {
                ToolError::Configuration(format!("summary column '{column}' missing from export"))
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut message = format!("Appended {} new member rows:", new.len());
    for record in new.records() {
        let line: Vec<&str> = positions
            .iter()
            .map(|&idx| record.values()[idx].as_str())
            .collect();
        message.push('\n');
        message.push_str(&line.join(" | "));
    }
    Ok(message)
}

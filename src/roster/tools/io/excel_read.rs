use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::roster::tools::error::Result;
use crate::roster::tools::model::RecordSet;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads the first worksheet of an export workbook. The first row is the
/// header; rows with no content at all are skipped. A workbook without
/// sheets or without any populated cell yields an empty record set.
pub fn read_first_sheet(path: &Path) -> Result<RecordSet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let Some(range) = workbook.worksheet_range_at(0) else {
        warn!(path = %path.display(), "workbook contains no sheets");
        return Ok(RecordSet::empty());
    };
    let range = range?;

    // Sheet rows are 1-based and the header occupies the first populated row.
    let first_data_row = range.start().map_or(2, |(row, _)| row as usize + 2);

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RecordSet::empty());
    };
    let header: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let body: Vec<Vec<String>> = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, DataType::Empty)))
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    debug!(columns = header.len(), rows = body.len(), "read export sheet");

    RecordSet::from_raw(header, body, first_data_row)
}

/// Canonical text for a cell. Numbers and dates lose their native typing so
/// the ledger stays purely textual.
pub fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.clone(),
        DataType::Float(value) => value.to_string(),
        DataType::Int(value) => value.to_string(),
        DataType::Bool(true) => "True".to_string(),
        DataType::Bool(false) => "False".to_string(),
        DataType::DateTime(serial) => {
            excel_serial_to_string(*serial).unwrap_or_else(|| serial.to_string())
        }
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

fn excel_serial_to_string(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round();
    if !millis.is_finite() || millis.abs() > 1e15 {
        return None;
    }
    let timestamp = epoch.checked_add_signed(Duration::milliseconds(millis as i64))?;
    Some(timestamp.format(DATETIME_FORMAT).to_string())
}

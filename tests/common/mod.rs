#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use roster_tools::export::ExportRetriever;
use roster_tools::io::ntfy::NotificationSink;
use roster_tools::io::sheets::Ledger;
use roster_tools::model::RecordSet;
use roster_tools::{Result, ToolError};
use rust_xlsxwriter::Workbook;

pub const MEMBER_HEADER: [&str; 4] = ["Full Name", "Grad Year", "AZA or BBG", "Chapter Name"];

/// A cell written into a fixture export.
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(f64),
    Blank,
}

/// Writes a workbook whose first sheet holds `header` and `rows`. Extra
/// sheets are appended after it.
pub fn write_export(
    path: &Path,
    header: &[&str],
    rows: &[Vec<Cell<'_>>],
    extra_sheets: &[&str],
) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Members").expect("sheet named");
    for (col, title) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *title).expect("header written");
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(value) => {
                    sheet.write_string(row_num, col as u16, *value).expect("cell written");
                }
                Cell::Number(value) => {
                    sheet.write_number(row_num, col as u16, *value).expect("cell written");
                }
                Cell::Blank => {}
            }
        }
    }
    for name in extra_sheets {
        let extra = workbook.add_worksheet();
        extra.set_name(*name).expect("sheet named");
        extra.write_string(0, 0, "decoy").expect("cell written");
    }
    workbook.save(path).expect("workbook saved");
}

/// One member row with a numeric graduation year.
pub fn member<'a>(name: &'a str, year: f64, group: &'a str, chapter: &'a str) -> Vec<Cell<'a>> {
    vec![
        Cell::Text(name),
        Cell::Number(year),
        Cell::Text(group),
        Cell::Text(chapter),
    ]
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Retriever handing back a prepared file.
pub struct FixtureRetriever {
    pub path: PathBuf,
    pub calls: usize,
}

impl FixtureRetriever {
    pub fn new(path: PathBuf) -> Self {
        Self { path, calls: 0 }
    }
}

impl ExportRetriever for FixtureRetriever {
    fn retrieve(&mut self) -> Result<PathBuf> {
        self.calls += 1;
        Ok(self.path.clone())
    }
}

/// Ledger kept in memory; appends extend the stored rows.
#[derive(Default)]
pub struct MemoryLedger {
    pub rows: RefCell<Vec<Vec<String>>>,
    pub appends: RefCell<Vec<Vec<Vec<String>>>>,
}

impl MemoryLedger {
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: RefCell::new(rows),
            appends: RefCell::default(),
        }
    }
}

impl Ledger for MemoryLedger {
    fn read(&self) -> Result<RecordSet> {
        let rows = self.rows.borrow();
        let Some((header, body)) = rows.split_first() else {
            return Ok(RecordSet::empty());
        };
        RecordSet::from_raw(header.clone(), body.to_vec(), 2)
    }

    fn append(&self, rows: &[Vec<String>]) -> Result<usize> {
        self.rows.borrow_mut().extend(rows.iter().cloned());
        self.appends.borrow_mut().push(rows.to_vec());
        Ok(rows.len())
    }
}

/// Sink recording every message; optionally rejects them.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: RefCell<Vec<String>>,
    pub reject: bool,
}

impl NotificationSink for RecordingSink {
    fn send(&self, message: &str) -> Result<()> {
        self.messages.borrow_mut().push(message.to_string());
        if self.reject {
            return Err(ToolError::NotificationDelivery {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

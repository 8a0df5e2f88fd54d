use tracing::warn;

use crate::roster::tools::error::{Result, ToolError};

/// Ordered column names taken from the header row of a ledger or export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Creates a schema from the header cells in their original order.
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Index of the first column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

/// One member row. Values are stored in schema order, so a record is only
/// meaningful next to the [`RecordSet`] that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Ordered records sharing one [`Schema`]. Used both for the persisted
/// ledger and the freshly downloaded extract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    schema: Schema,
    records: Vec<Record>,
}

impl RecordSet {
    /// A set with neither header nor rows, as returned for a blank sheet.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a record set from a header and raw rows, padding or truncating
    /// every row to the header width. `first_row_number` is the 1-based sheet
    /// row of the first data row and is only used for log messages.
    pub fn from_raw(
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        first_row_number: usize,
    ) -> Result<Self> {
        let schema = Schema::new(header);

        if schema.is_empty() {
            if let Some(row) = rows.into_iter().find(|row| row.iter().any(|v| !v.is_empty())) {
                return Err(ToolError::DataShape {
                    header: Vec::new(),
                    row,
                });
            }
            return Ok(Self::empty());
        }

        let width = schema.len();
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(offset, row)| {
                if row.len() != width {
                    warn!(
                        row = first_row_number + offset,
                        found = row.len(),
                        expected = width,
                        "row width differs from header, adjusting"
                    );
                }
                Record {
                    values: normalize_row(row, width),
                }
            })
            .collect();

        Ok(Self { schema, records })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the set holds no records, regardless of whether a header
    /// is present.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Value of `column` in `record`, if the column exists.
    pub fn field<'a>(&self, record: &'a Record, column: &str) -> Option<&'a str> {
        self.schema
            .position(column)
            .and_then(|idx| record.values.get(idx))
            .map(String::as_str)
    }

    /// Returns a set with the same schema containing only the records the
    /// predicate keeps, in their original order.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Record) -> bool,
    {
        Self {
            schema: self.schema.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Consumes the set and returns the rows as plain value vectors.
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.records.into_iter().map(Record::into_values).collect()
    }
}

/// Pads `row` with empty strings or truncates it so it has exactly `width`
/// values. Existing values keep their order.
pub fn normalize_row(mut row: Vec<String>, width: usize) -> Vec<String> {
    row.resize(width, String::new());
    row
}

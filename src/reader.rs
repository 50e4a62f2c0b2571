// 📄 CSV Row Reader
//
// Streams delimited rows; the first non-empty line is the header and every
// later line becomes a Row keyed by it.
//
// Ragged rows: a short row only exposes the columns it actually has (the rest
// are absent, never empty strings); values beyond the header width are dropped.

use crate::error::{HeaderError, ImportError, Result};
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Subject columns every import file must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["firstname", "lastname", "email", "username"];

// ============================================================================
// HEADER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSpec {
    columns: Vec<String>,
}

impl HeaderSpec {
    pub fn new(columns: Vec<String>) -> std::result::Result<Self, HeaderError> {
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(HeaderError::Empty);
        }
        Ok(HeaderSpec { columns })
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

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Check the matching field first, then the fixed required columns.
    pub fn validate(&self, matching_field: &str) -> std::result::Result<(), HeaderError> {
        if !self.contains(matching_field) {
            return Err(HeaderError::MissingMatchKey(matching_field.to_string()));
        }

        for column in REQUIRED_COLUMNS {
            if !self.contains(column) {
                return Err(HeaderError::MissingRequired(column.to_string()));
            }
        }

        Ok(())
    }
}

// ============================================================================
// ROW
// ============================================================================

/// One data line, keyed by the shared header.
#[derive(Debug, Clone)]
pub struct Row {
    line: u64,
    header: Rc<HeaderSpec>,
    values: Vec<String>,
}

impl Row {
    pub fn new(line: u64, header: Rc<HeaderSpec>, mut values: Vec<String>) -> Self {
        values.truncate(header.len());
        Row {
            line,
            header,
            values,
        }
    }

    /// 1-based index of this row among the data lines.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .position(column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Value of `column` if present and not empty.
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).filter(|v| !v.is_empty())
    }

    /// Present columns in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .columns()
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// READER
// ============================================================================

pub struct CsvRowReader<R: Read> {
    inner: csv::Reader<R>,
    header: Rc<HeaderSpec>,
    record: StringRecord,
    line: u64,
}

impl CsvRowReader<File> {
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let inner = builder(delimiter)
            .from_path(path)
            .map_err(|source| ImportError::SourceUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        Self::with_source(inner, path.to_path_buf())
    }
}

impl<R: Read> CsvRowReader<R> {
    pub fn from_reader(reader: R, delimiter: u8) -> Result<Self> {
        Self::with_source(builder(delimiter).from_reader(reader), PathBuf::from("<stream>"))
    }

    fn with_source(mut inner: csv::Reader<R>, path: PathBuf) -> Result<Self> {
        let columns: Vec<String> = inner
            .headers()
            .map_err(|source| ImportError::SourceUnreadable { path, source })?
            .iter()
            .map(str::to_string)
            .collect();

        let header = HeaderSpec::new(columns)?;

        Ok(CsvRowReader {
            inner,
            header: Rc::new(header),
            record: StringRecord::new(),
            line: 0,
        })
    }

    pub fn header(&self) -> &HeaderSpec {
        &self.header
    }
}

impl<R: Read> Iterator for CsvRowReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                self.line += 1;
                let values = self.record.iter().map(str::to_string).collect();
                Some(Ok(Row::new(self.line, Rc::clone(&self.header), values)))
            }
            Err(source) => {
                self.line += 1;
                Some(Err(ImportError::MalformedRow {
                    line: self.line,
                    source,
                }))
            }
        }
    }
}

fn builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(delimiter).has_headers(true).flexible(true);
    builder
}

// 📒 Workbook readers
// Turns the advice-provider spreadsheet into named sheets of heading → cell rows.
//
// Two sources are supported:
// - a spreadsheet file (.xls, .xlsx, .xlsm, .ods) read with calamine
// - a directory holding one "<SHEET NAME>.csv" per sheet

use crate::error::{ImportError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// ============================================================================
// SHEET NAMES
// ============================================================================

pub const ORGANISATION_SHEET: &str = "LOCAL ADVICE ORG";
pub const OFFICE_SHEET: &str = "OFFICE LOCATION";
pub const CRIMINAL_CATEGORY_SHEET: &str = "CAT OF LAW CRIME";
pub const CIVIL_CATEGORY_SHEET: &str = "CAT OF LAW CIVIL";
pub const OUTREACH_SHEET: &str = "OUTREACH SERVICE";

/// Every sheet a run reads; a workbook missing any of them is rejected up front
pub const REQUIRED_SHEETS: [&str; 5] = [
    ORGANISATION_SHEET,
    OFFICE_SHEET,
    CRIMINAL_CATEGORY_SHEET,
    CIVIL_CATEGORY_SHEET,
    OUTREACH_SHEET,
];

// ============================================================================
// CELLS, ROWS, SHEETS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Int(i64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(n) => Cell::Int(*n),
            // Spreadsheet numbers are floats; ids and phone numbers want the integer part
            Data::Float(f) => Cell::Int(f.trunc() as i64),
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// One data row: column heading → cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, Cell>,
}

impl Row {
    pub fn new(cells: HashMap<String, Cell>) -> Self {
        Row { cells }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Cell rendered as text (integers in decimal, empty as "")
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(|c| c.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headings: Vec<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Build a sheet from a heading row and positional data rows
    pub fn from_grid(name: &str, headings: Vec<String>, grid: Vec<Vec<Cell>>) -> Self {
        let rows = grid
            .into_iter()
            .map(|cells| {
                Row::new(
                    headings
                        .iter()
                        .cloned()
                        .zip(cells.into_iter().chain(std::iter::repeat(Cell::Empty)))
                        .collect(),
                )
            })
            .collect();

        Sheet {
            name: name.to_string(),
            headings,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Text of `column` in `row`; a column missing from the heading row is fatal
    pub fn text(&self, row: &Row, column: &str) -> Result<String> {
        row.text(column).ok_or_else(|| ImportError::MissingColumn {
            sheet: self.name.clone(),
            column: column.to_string(),
        })
    }
}

/// All sheets of one source, loaded eagerly
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: HashMap<String, Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.insert(sheet.name.clone(), sheet);
    }

    /// Builder form of `add_sheet`, handy for fixtures
    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.add_sheet(sheet);
        self
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .get(name)
            .ok_or_else(|| ImportError::MissingSheet(name.to_string()))
    }

    /// Fail on the first required sheet that is absent
    pub fn ensure_required_sheets(&self) -> Result<()> {
        for name in REQUIRED_SHEETS {
            self.sheet(name)?;
        }
        Ok(())
    }
}

// ============================================================================
// SOURCE DETECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Spreadsheet,
    CsvDirectory,
}

/// Detect the source format from the path alone
pub fn detect_source(path: &Path) -> Result<SourceFormat> {
    if path.is_dir() {
        return Ok(SourceFormat::CsvDirectory);
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(SourceFormat::Spreadsheet),
        _ => Err(ImportError::UnsupportedSource(path.display().to_string())),
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Reads the required sheets of a source into a Workbook
pub trait SheetReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Workbook>;
}

pub fn get_reader(format: SourceFormat) -> Box<dyn SheetReader> {
    match format {
        SourceFormat::Spreadsheet => Box::new(SpreadsheetReader),
        SourceFormat::CsvDirectory => Box::new(CsvDirectoryReader),
    }
}

/// Detect, read and validate in one go
pub fn open_workbook(path: &Path) -> Result<Workbook> {
    let reader = get_reader(detect_source(path)?);
    let workbook = reader.read(path)?;
    workbook.ensure_required_sheets()?;
    Ok(workbook)
}

pub struct SpreadsheetReader;

impl SheetReader for SpreadsheetReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let mut source = open_workbook_auto(path)?;
        let mut workbook = Workbook::new();

        for name in REQUIRED_SHEETS {
            let range = match source.worksheet_range(name) {
                Ok(range) => range,
                Err(_) => return Err(ImportError::MissingSheet(name.to_string())),
            };

            let mut rows = range.rows();
            let headings: Vec<String> = match rows.next() {
                Some(first) => first.iter().map(|c| c.to_string()).collect(),
                None => Vec::new(),
            };
            let grid = rows
                .map(|r| r.iter().map(Cell::from).collect())
                .collect();

            workbook.add_sheet(Sheet::from_grid(name, headings, grid));
        }

        Ok(workbook)
    }
}

pub struct CsvDirectoryReader;

impl SheetReader for CsvDirectoryReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let mut workbook = Workbook::new();

        for name in REQUIRED_SHEETS {
            let file = path.join(format!("{}.csv", name));
            if !file.exists() {
                return Err(ImportError::MissingSheet(name.to_string()));
            }

            // Short rows are padded by Sheet::from_grid, like spreadsheet rows
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(&file)?;
            let headings: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

            let mut grid = Vec::new();
            for record in rdr.records() {
                let record = record?;
                // CSV is untyped: keep text as text so "0113..." stays a phone number
                grid.push(
                    record
                        .iter()
                        .map(|v| {
                            if v.is_empty() {
                                Cell::Empty
                            } else {
                                Cell::Text(v.to_string())
                            }
                        })
                        .collect(),
                );
            }

            workbook.add_sheet(Sheet::from_grid(name, headings, grid));
        }

        Ok(workbook)
    }
}

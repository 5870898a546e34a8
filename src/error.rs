// ⚠️ Error taxonomy for the importer
//
// Geocoding misses never become an ImportError. OfficeNotFound is the one
// recoverable variant: category linking logs it and the row carries on.
// Every other variant aborts the run. Cancellation is not an error at all
// (see importer::Outcome).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geocoder setup failed: {0}")]
    Geocoder(#[from] crate::geocode::GeocodeError),

    #[error("Unsupported source {0}: expected .xls/.xlsx/.ods or a directory of CSV sheets")]
    UnsupportedSource(String),

    #[error("Sheet not found: {0}")]
    MissingSheet(String),

    #[error("Sheet {sheet} has no column {column:?}")]
    MissingColumn { sheet: String, column: String },

    #[error("Malformed address record {0:?}: expected 5 '|' separated fields")]
    MalformedAddress(String),

    #[error("Organisation {firm} conflicts with an existing record (type id {type_id}): {source}")]
    DuplicateOrganisation {
        firm: String,
        type_id: i64,
        #[source]
        source: rusqlite::Error,
    },

    #[error("No organisation with firm number {0}")]
    MissingOrganisation(String),

    #[error("No office for firm {firm} with account number {account}")]
    OfficeNotFound { firm: String, account: String },

    #[error("An import is already running")]
    AlreadyRunning,

    #[error("Import worker panicked")]
    WorkerPanicked,
}

impl ImportError {
    /// True when this is a SQLite UNIQUE/constraint failure
    pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

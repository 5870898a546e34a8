// Adviser Import - Core Library
// Loads the legal-advice provider workbook into SQLite, used by the CLI and the API server

pub mod config;
pub mod db;
pub mod deduplication;
pub mod entities;
pub mod error;
pub mod geocode;
pub mod importer;
pub mod logging;
pub mod memo;
pub mod progress;
pub mod supervisor;
pub mod workbook;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::ImportConfig;
pub use db::{setup_database, EntityCounts, Store};
pub use deduplication::{resolve_location, AddressRecord};
pub use entities::{
    Category, Location, NewOrganisation, Office, Organisation, OrganisationType,
    OutreachService, OutreachType, Point,
};
pub use error::{ImportError, Result};
pub use geocode::{GeocodeError, GeocodeResolver, Geocoder, PostcodesIo};
pub use importer::{Importer, Outcome, Phase};
pub use memo::Memo;
pub use progress::{InterruptFlag, Progress, ProgressHandle};
pub use supervisor::{supervise, supervise_until, ImportController, SharedGeocoder};
pub use workbook::{
    detect_source, get_reader, open_workbook, Cell, Row, Sheet, SheetReader, SourceFormat,
    Workbook,
};

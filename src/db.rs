use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SQLite-backed entity store
///
/// Entity-specific queries live next to their types in `crate::entities`;
/// this module owns the connection and the schema.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(Store { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Store { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Row counts for every entity table
    pub fn entity_counts(&self) -> Result<EntityCounts> {
        let count = |table: &str| -> Result<i64> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n)
        };

        Ok(EntityCounts {
            organisation_types: count("organisation_types")?,
            organisations: count("organisations")?,
            locations: count("locations")?,
            offices: count("offices")?,
            outreach_types: count("outreach_types")?,
            outreach_services: count("outreach_services")?,
            categories: count("categories")?,
            office_categories: count("office_categories")?,
        })
    }
}

/// Per-table row counts, printed after a run and served by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub organisation_types: i64,
    pub organisations: i64,
    pub locations: i64,
    pub offices: i64,
    pub outreach_types: i64,
    pub outreach_services: i64,
    pub categories: i64,
    pub office_categories: i64,
}

impl EntityCounts {
    pub fn lines(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("Organisation types", self.organisation_types),
            ("Organisations", self.organisations),
            ("Locations", self.locations),
            ("Offices", self.offices),
            ("Outreach types", self.outreach_types),
            ("Outreach services", self.outreach_services),
            ("Categories", self.categories),
            ("Office categories", self.office_categories),
        ]
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Organisations
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS organisation_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS organisations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            firm TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            website TEXT NOT NULL,
            contracted TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES organisation_types(id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Locations (one row per normalised address/city/postcode)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            postcode TEXT NOT NULL,
            longitude REAL,
            latitude REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (address, city, postcode)
        )",
        [],
    )?;

    // ==========================================================================
    // Offices
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS offices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telephone TEXT NOT NULL,
            account_number TEXT NOT NULL,
            organisation_id INTEGER NOT NULL REFERENCES organisations(id),
            location_id INTEGER NOT NULL REFERENCES locations(id),
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (telephone, account_number, organisation_id, location_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Outreach
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS outreach_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    // office_id is nullable; NULLs never collide in a UNIQUE index, so the
    // find-or-create query matches it with IS instead
    conn.execute(
        "CREATE TABLE IF NOT EXISTS outreach_services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type_id INTEGER NOT NULL REFERENCES outreach_types(id),
            location_id INTEGER NOT NULL REFERENCES locations(id),
            office_id INTEGER REFERENCES offices(id),
            UNIQUE (type_id, location_id, office_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Categories of law
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            civil INTEGER NOT NULL,
            UNIQUE (code, civil)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS office_categories (
            office_id INTEGER NOT NULL REFERENCES offices(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            PRIMARY KEY (office_id, category_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_locations_postcode ON locations(postcode)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_offices_account ON offices(account_number)",
        [],
    )?;

    Ok(())
}

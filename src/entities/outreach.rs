// 🚐 Outreach services
//
// Part-time and outreach locations served by an office. The office is
// optional: an outreach row whose account number matches no office is still
// recorded, with office_id NULL.

use crate::db::Store;
use crate::error::Result;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachType {
    pub id: i64,
    /// Raw "PT or Outreach Indicator" value
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachService {
    pub id: i64,
    pub type_id: i64,
    pub location_id: i64,
    pub office_id: Option<i64>,
}

impl Store {
    pub fn find_or_create_outreach_type(&self, name: &str) -> Result<OutreachType> {
        let conn = self.connection();
        let existing = conn
            .query_row(
                "SELECT id FROM outreach_types WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO outreach_types (name) VALUES (?1)", params![name])?;
                conn.last_insert_rowid()
            }
        };

        Ok(OutreachType {
            id,
            name: name.to_string(),
        })
    }

    pub fn find_or_create_outreach_service(
        &self,
        type_id: i64,
        location_id: i64,
        office_id: Option<i64>,
    ) -> Result<OutreachService> {
        let conn = self.connection();
        // IS matches NULL office ids, = would not
        let existing = conn
            .query_row(
                "SELECT id FROM outreach_services
                 WHERE type_id = ?1 AND location_id = ?2 AND office_id IS ?3",
                params![type_id, location_id, office_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO outreach_services (type_id, location_id, office_id) VALUES (?1, ?2, ?3)",
                    params![type_id, location_id, office_id],
                )?;
                conn.last_insert_rowid()
            }
        };

        Ok(OutreachService {
            id,
            type_id,
            location_id,
            office_id,
        })
    }
}

// 📂 Category of law
//
// Civil and criminal categories share codes in places, so the key is
// (code, civil). The civil flag keeps the two keyspaces apart.

use crate::db::Store;
use crate::error::Result;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub code: String,
    pub civil: bool,
}

impl Store {
    pub fn find_or_create_category(&self, code: &str, civil: bool) -> Result<Category> {
        let conn = self.connection();
        let existing = conn
            .query_row(
                "SELECT id FROM categories WHERE code = ?1 AND civil = ?2",
                params![code, civil],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO categories (code, civil) VALUES (?1, ?2)",
                    params![code, civil],
                )?;
                conn.last_insert_rowid()
            }
        };

        Ok(Category {
            id,
            code: code.to_string(),
            civil,
        })
    }
}

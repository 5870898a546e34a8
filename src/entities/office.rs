// 🏠 Office entity
//
// An office belongs to one organisation and sits at one location. The
// composite (telephone, account number, organisation, location) is its key.
// Account numbers are stored uppercased; use Office::normalize_account().

use crate::db::Store;
use crate::entities::category::Category;
use crate::error::Result;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: i64,
    pub telephone: String,
    pub account_number: String,
    pub organisation_id: i64,
    pub location_id: i64,
}

impl Office {
    pub fn normalize_account(account_number: &str) -> String {
        account_number.to_uppercase()
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Office {
            id: row.get(0)?,
            telephone: row.get(1)?,
            account_number: row.get(2)?,
            organisation_id: row.get(3)?,
            location_id: row.get(4)?,
        })
    }
}

const OFFICE_COLUMNS: &str = "o.id, o.telephone, o.account_number, o.organisation_id, o.location_id";

impl Store {
    pub fn find_or_create_office(
        &self,
        telephone: &str,
        account_number: &str,
        organisation_id: i64,
        location_id: i64,
    ) -> Result<Office> {
        let conn = self.connection();
        let existing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM offices o
                     WHERE o.telephone = ?1 AND o.account_number = ?2
                       AND o.organisation_id = ?3 AND o.location_id = ?4",
                    OFFICE_COLUMNS
                ),
                params![telephone, account_number, organisation_id, location_id],
                Office::from_row,
            )
            .optional()?;

        if let Some(office) = existing {
            return Ok(office);
        }

        conn.execute(
            "INSERT INTO offices (telephone, account_number, organisation_id, location_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![telephone, account_number, organisation_id, location_id],
        )?;

        Ok(Office {
            id: conn.last_insert_rowid(),
            telephone: telephone.to_string(),
            account_number: account_number.to_string(),
            organisation_id,
            location_id,
        })
    }

    /// First office with this (already uppercased) account number
    pub fn find_office_by_account(&self, account_number: &str) -> Result<Option<Office>> {
        let office = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM offices o WHERE o.account_number = ?1 ORDER BY o.id LIMIT 1",
                    OFFICE_COLUMNS
                ),
                params![account_number],
                Office::from_row,
            )
            .optional()?;
        Ok(office)
    }

    /// First office of the organisation with `firm` holding this account number
    pub fn find_office_by_firm_and_account(&self, firm: &str, account_number: &str) -> Result<Option<Office>> {
        let office = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM offices o
                     JOIN organisations org ON org.id = o.organisation_id
                     WHERE org.firm = ?1 AND o.account_number = ?2
                     ORDER BY o.id LIMIT 1",
                    OFFICE_COLUMNS
                ),
                params![firm, account_number],
                Office::from_row,
            )
            .optional()?;
        Ok(office)
    }

    /// Attach a category to an office. Returns false when it was already attached.
    pub fn add_office_category(&self, office_id: i64, category_id: i64) -> Result<bool> {
        let added = self.connection().execute(
            "INSERT OR IGNORE INTO office_categories (office_id, category_id) VALUES (?1, ?2)",
            params![office_id, category_id],
        )?;
        Ok(added == 1)
    }

    pub fn office_categories(&self, office_id: i64) -> Result<Vec<Category>> {
        let mut stmt = self.connection().prepare(
            "SELECT c.id, c.code, c.civil FROM categories c
             JOIN office_categories oc ON oc.category_id = c.id
             WHERE oc.office_id = ?1
             ORDER BY c.civil DESC, c.code",
        )?;

        let categories = stmt
            .query_map(params![office_id], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    civil: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(categories)
    }
}

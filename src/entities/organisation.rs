// 🏢 Organisation entities
//
// An OrganisationType is just a name ("Charity", "Law Centre", ...).
// An Organisation is keyed by its firm number; the remaining columns are
// plain values. Find-or-create matches on every column, so a firm whose
// name/website/status changed between sheets collides with the UNIQUE firm
// key and surfaces as ImportError::DuplicateOrganisation.

use crate::db::Store;
use crate::error::{ImportError, Result};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: i64,
    /// Firm number from the source sheet (unique)
    pub firm: String,
    pub name: String,
    pub website: String,
    /// "LA Contracted Status" as given
    pub contracted: String,
    pub type_id: i64,
}

/// Column values for an organisation that may not exist yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrganisation<'a> {
    pub firm: &'a str,
    pub name: &'a str,
    pub website: &'a str,
    pub contracted: &'a str,
    pub type_id: i64,
}

impl Organisation {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Organisation {
            id: row.get(0)?,
            firm: row.get(1)?,
            name: row.get(2)?,
            website: row.get(3)?,
            contracted: row.get(4)?,
            type_id: row.get(5)?,
        })
    }
}

const ORGANISATION_COLUMNS: &str = "id, firm, name, website, contracted, type_id";

impl Store {
    pub fn find_or_create_organisation_type(&self, name: &str) -> Result<OrganisationType> {
        let conn = self.connection();
        let existing = conn
            .query_row(
                "SELECT id FROM organisation_types WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO organisation_types (name) VALUES (?1)", params![name])?;
                conn.last_insert_rowid()
            }
        };

        Ok(OrganisationType {
            id,
            name: name.to_string(),
        })
    }

    /// Fetch the organisation with exactly these values, or insert it.
    ///
    /// Inserting over an existing firm number with different values is a
    /// constraint violation and comes back as DuplicateOrganisation.
    pub fn find_or_create_organisation(&self, new: &NewOrganisation<'_>) -> Result<Organisation> {
        let conn = self.connection();
        let existing = conn
            .query_row(
                &format!(
                    "SELECT {} FROM organisations
                     WHERE firm = ?1 AND name = ?2 AND website = ?3 AND contracted = ?4 AND type_id = ?5",
                    ORGANISATION_COLUMNS
                ),
                params![new.firm, new.name, new.website, new.contracted, new.type_id],
                Organisation::from_row,
            )
            .optional()?;

        if let Some(org) = existing {
            return Ok(org);
        }

        let inserted = conn.execute(
            "INSERT INTO organisations (firm, name, website, contracted, type_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.firm, new.name, new.website, new.contracted, new.type_id],
        );

        match inserted {
            Ok(_) => Ok(Organisation {
                id: conn.last_insert_rowid(),
                firm: new.firm.to_string(),
                name: new.name.to_string(),
                website: new.website.to_string(),
                contracted: new.contracted.to_string(),
                type_id: new.type_id,
            }),
            Err(e) if ImportError::is_constraint_violation(&e) => Err(ImportError::DuplicateOrganisation {
                firm: new.firm.to_string(),
                type_id: new.type_id,
                source: e,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// First organisation with this firm number
    pub fn find_organisation_by_firm(&self, firm: &str) -> Result<Option<Organisation>> {
        let org = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM organisations WHERE firm = ?1 ORDER BY id LIMIT 1",
                    ORGANISATION_COLUMNS
                ),
                params![firm],
                Organisation::from_row,
            )
            .optional()?;
        Ok(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme(type_id: i64) -> NewOrganisation<'static> {
        NewOrganisation {
            firm: "101",
            name: "Acme Legal",
            website: "www.acme.example",
            contracted: "Yes",
            type_id,
        }
    }

    #[test]
    fn test_organisation_type_find_or_create() {
        let store = Store::open_in_memory().unwrap();

        let charity = store.find_or_create_organisation_type("Charity").unwrap();
        let again = store.find_or_create_organisation_type("Charity").unwrap();
        let other = store.find_or_create_organisation_type("Law Centre").unwrap();

        assert_eq!(charity, again);
        assert_ne!(charity.id, other.id);
        assert_eq!(store.entity_counts().unwrap().organisation_types, 2);
    }

    #[test]
    fn test_organisation_find_or_create_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let charity = store.find_or_create_organisation_type("Charity").unwrap();

        let first = store.find_or_create_organisation(&acme(charity.id)).unwrap();
        let second = store.find_or_create_organisation(&acme(charity.id)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.firm, "101");
        assert_eq!(store.entity_counts().unwrap().organisations, 1);
    }

    #[test]
    fn test_changed_firm_values_are_a_duplicate() {
        let store = Store::open_in_memory().unwrap();
        let charity = store.find_or_create_organisation_type("Charity").unwrap();
        store.find_or_create_organisation(&acme(charity.id)).unwrap();

        let renamed = NewOrganisation {
            name: "Acme Legal Services",
            ..acme(charity.id)
        };

        match store.find_or_create_organisation(&renamed) {
            Err(ImportError::DuplicateOrganisation { firm, type_id, .. }) => {
                assert_eq!(firm, "101");
                assert_eq!(type_id, charity.id);
            }
            other => panic!("expected duplicate organisation, got {:?}", other),
        }
    }

    #[test]
    fn test_find_organisation_by_firm() {
        let store = Store::open_in_memory().unwrap();
        let charity = store.find_or_create_organisation_type("Charity").unwrap();
        let created = store.find_or_create_organisation(&acme(charity.id)).unwrap();

        assert_eq!(store.find_organisation_by_firm("101").unwrap(), Some(created));
        assert_eq!(store.find_organisation_by_firm("999").unwrap(), None);
    }
}

// 📍 Location entity
//
// Identity is the normalised (address, city, postcode) triple. The point is
// optional: a postcode the geocoder could not resolve leaves it NULL until a
// later row repairs it with set_location_point().

use crate::db::Store;
use crate::error::Result;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Geographic point (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub longitude: f64,
    pub latitude: f64,
}

impl Point {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Point {
            longitude,
            latitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    /// Non-blank address lines joined with '\n'
    pub address: String,
    pub city: String,
    pub postcode: String,
    pub point: Option<Point>,
}

impl Location {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let longitude: Option<f64> = row.get(4)?;
        let latitude: Option<f64> = row.get(5)?;

        Ok(Location {
            id: row.get(0)?,
            address: row.get(1)?,
            city: row.get(2)?,
            postcode: row.get(3)?,
            point: match (longitude, latitude) {
                (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
                _ => None,
            },
        })
    }
}

const LOCATION_COLUMNS: &str = "id, address, city, postcode, longitude, latitude";

impl Store {
    pub fn find_location(&self, address: &str, city: &str, postcode: &str) -> Result<Option<Location>> {
        let location = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM locations WHERE address = ?1 AND city = ?2 AND postcode = ?3",
                    LOCATION_COLUMNS
                ),
                params![address, city, postcode],
                Location::from_row,
            )
            .optional()?;
        Ok(location)
    }

    pub fn find_location_by_id(&self, id: i64) -> Result<Option<Location>> {
        let location = self
            .connection()
            .query_row(
                &format!("SELECT {} FROM locations WHERE id = ?1", LOCATION_COLUMNS),
                params![id],
                Location::from_row,
            )
            .optional()?;
        Ok(location)
    }

    /// Fetch by (address, city, postcode) or insert with the given point.
    /// An existing row keeps whatever point it already has.
    pub fn find_or_create_location(
        &self,
        address: &str,
        city: &str,
        postcode: &str,
        point: Option<Point>,
    ) -> Result<Location> {
        if let Some(existing) = self.find_location(address, city, postcode)? {
            return Ok(existing);
        }

        let conn = self.connection();
        conn.execute(
            "INSERT INTO locations (address, city, postcode, longitude, latitude)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                address,
                city,
                postcode,
                point.map(|p| p.longitude),
                point.map(|p| p.latitude),
            ],
        )?;

        Ok(Location {
            id: conn.last_insert_rowid(),
            address: address.to_string(),
            city: city.to_string(),
            postcode: postcode.to_string(),
            point,
        })
    }

    /// Backfill the point of an existing location
    pub fn set_location_point(&self, id: i64, point: Point) -> Result<()> {
        self.connection().execute(
            "UPDATE locations SET longitude = ?1, latitude = ?2 WHERE id = ?3",
            params![point.longitude, point.latitude, id],
        )?;
        Ok(())
    }

    /// Point of the first located row sharing this postcode
    pub fn find_point_by_postcode(&self, postcode: &str) -> Result<Option<Point>> {
        let point = self
            .connection()
            .query_row(
                "SELECT longitude, latitude FROM locations
                 WHERE postcode = ?1 AND longitude IS NOT NULL AND latitude IS NOT NULL
                 ORDER BY id LIMIT 1",
                params![postcode],
                |row| Ok(Point::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(point)
    }

    /// (postcode, point) for every location that already has a point
    pub fn located_postcodes(&self) -> Result<Vec<(String, Point)>> {
        let mut stmt = self.connection().prepare(
            "SELECT postcode, longitude, latitude FROM locations
             WHERE longitude IS NOT NULL AND latitude IS NOT NULL
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, Point::new(row.get(1)?, row.get(2)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

// 🔍 Location deduplication
//
// Offices and outreach services both point at a Location. Rows repeat the
// same address many times, sometimes with stray whitespace or blank middle
// lines, so addresses are normalised before lookup and each distinct
// (address, city, postcode) gets exactly one Location row.

use crate::db::Store;
use crate::entities::Location;
use crate::error::{ImportError, Result};
use crate::geocode::{GeocodeResolver, Geocoder};
use tracing::debug;

// ============================================================================
// ADDRESS RECORD
// ============================================================================

/// Separator of the joined address record
pub const FIELD_SEPARATOR: char = '|';

/// Normalised address as used for Location identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    /// Non-blank address lines joined by '\n'
    pub address: String,
    pub city: String,
    pub postcode: String,
}

impl AddressRecord {
    /// Join raw sheet fields into "line1|line2|line3|city|postcode"
    pub fn join(fields: [&str; 5]) -> String {
        fields.join(&FIELD_SEPARATOR.to_string())
    }

    /// Parse a joined record. Every field is trimmed and blank address lines
    /// are dropped.
    pub fn parse(joined: &str) -> Result<Self> {
        let fields: Vec<&str> = joined.split(FIELD_SEPARATOR).map(str::trim).collect();
        let [line1, line2, line3, city, postcode] = fields[..] else {
            return Err(ImportError::MalformedAddress(joined.to_string()));
        };

        let address = [line1, line2, line3]
            .into_iter()
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(AddressRecord {
            address,
            city: city.to_string(),
            postcode: postcode.to_string(),
        })
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Find or create the Location for a joined address record.
///
/// - existing location without a point: geocode and backfill on success
/// - existing location with a point: returned untouched
/// - no location yet: geocode, then create with whatever point came back
pub fn resolve_location(
    store: &Store,
    resolver: &mut GeocodeResolver,
    geocoder: &dyn Geocoder,
    joined: &str,
) -> Result<Location> {
    let record = AddressRecord::parse(joined)?;

    if let Some(mut existing) = store.find_location(&record.address, &record.city, &record.postcode)? {
        if existing.point.is_none() {
            if let Some(point) = resolver.resolve(store, geocoder, &record.postcode) {
                // previously unknown postcode found
                debug!(location = existing.id, postcode = %record.postcode, "backfilling point");
                store.set_location_point(existing.id, point)?;
                existing.point = Some(point);
            }
        }
        return Ok(existing);
    }

    let point = resolver.resolve(store, geocoder, &record.postcode);
    store.find_or_create_location(&record.address, &record.city, &record.postcode, point)
}

// Test fixtures shared by the module tests

use crate::entities::Point;
use crate::geocode::{GeocodeError, Geocoder};
use crate::workbook::{
    Cell, Sheet, Workbook, CIVIL_CATEGORY_SHEET, CRIMINAL_CATEGORY_SHEET, OFFICE_SHEET,
    ORGANISATION_SHEET, OUTREACH_SHEET,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Geocoder answering from a fixed table and counting calls.
/// Unknown postcodes are "not found"; outages fail as service errors.
#[derive(Default)]
pub struct ScriptedGeocoder {
    points: Mutex<HashMap<String, Point>>,
    outages: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_point(self, postcode: &str, point: Point) -> Self {
        self.points.lock().unwrap().insert(postcode.to_string(), point);
        self
    }

    pub fn with_outage(self, postcode: &str) -> Self {
        self.outages.lock().unwrap().insert(postcode.to_string());
        self
    }

    /// Make a postcode resolvable from now on
    pub fn restore(&self, postcode: &str, point: Point) {
        self.outages.lock().unwrap().remove(postcode);
        self.points.lock().unwrap().insert(postcode.to_string(), point);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, postcode: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == postcode).count()
    }
}

impl Geocoder for ScriptedGeocoder {
    fn geocode(&self, postcode: &str) -> Result<Point, GeocodeError> {
        self.calls.lock().unwrap().push(postcode.to_string());

        if self.outages.lock().unwrap().contains(postcode) {
            return Err(GeocodeError::Status(503));
        }
        self.points
            .lock()
            .unwrap()
            .get(postcode)
            .copied()
            .ok_or_else(|| GeocodeError::PostcodeNotFound(postcode.to_string()))
    }
}

fn text_grid(rows: &[&[&str]]) -> Vec<Vec<Cell>> {
    rows.iter()
        .map(|r| r.iter().map(|v| Cell::Text(v.to_string())).collect())
        .collect()
}

fn headings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Builder for a workbook with all five sheets, empty unless rows are added
pub struct WorkbookFixture {
    organisations: Vec<Vec<Cell>>,
    offices: Vec<Vec<Cell>>,
    outreach: Vec<Vec<Cell>>,
    civil: Vec<Vec<Cell>>,
    criminal: Vec<Vec<Cell>>,
}

impl WorkbookFixture {
    pub fn new() -> Self {
        WorkbookFixture {
            organisations: Vec::new(),
            offices: Vec::new(),
            outreach: Vec::new(),
            civil: Vec::new(),
            criminal: Vec::new(),
        }
    }

    /// firm, name, type, website, contracted
    pub fn organisation(mut self, row: [&str; 5]) -> Self {
        self.organisations.extend(text_grid(&[&row[..]]));
        self
    }

    /// firm, account, telephone, line1, line2, line3, city, postcode
    pub fn office(mut self, row: [&str; 8]) -> Self {
        self.offices.extend(text_grid(&[&row[..]]));
        self
    }

    /// account, indicator, line1, line2, line3, city, postcode
    pub fn outreach(mut self, row: [&str; 7]) -> Self {
        self.outreach.extend(text_grid(&[&row[..]]));
        self
    }

    /// firm, account, code
    pub fn civil(mut self, row: [&str; 3]) -> Self {
        self.civil.extend(text_grid(&[&row[..]]));
        self
    }

    /// firm, account, code
    pub fn criminal(mut self, row: [&str; 3]) -> Self {
        self.criminal.extend(text_grid(&[&row[..]]));
        self
    }

    pub fn build(self) -> Workbook {
        Workbook::new()
            .with_sheet(Sheet::from_grid(
                ORGANISATION_SHEET,
                headings(&[
                    "Firm Number",
                    "Firm Name",
                    "Type of Organisation",
                    "Website",
                    "LA Contracted Status",
                ]),
                self.organisations,
            ))
            .with_sheet(Sheet::from_grid(
                OFFICE_SHEET,
                headings(&[
                    "Firm Number",
                    "Account Number",
                    "Telephone Number",
                    "Address Line 1",
                    "Address Line 2",
                    "Address Line 3",
                    "City",
                    "Postcode",
                ]),
                self.offices,
            ))
            .with_sheet(Sheet::from_grid(
                OUTREACH_SHEET,
                headings(&[
                    "Account Number",
                    "PT or Outreach Indicator",
                    "PT or Outreach Loc Address Line1",
                    "PT or Outreach Loc Address Line2",
                    "PT or Outreach Loc Address Line3",
                    "City (outreach)",
                    "PT or Outreach Loc Postcode",
                ]),
                self.outreach,
            ))
            .with_sheet(Sheet::from_grid(
                CIVIL_CATEGORY_SHEET,
                headings(&["Firm Number", "Account Number", "Civil Category Code"]),
                self.civil,
            ))
            .with_sheet(Sheet::from_grid(
                CRIMINAL_CATEGORY_SHEET,
                headings(&["Firm Number", "Account Number", "Crime Category Code"]),
                self.criminal,
            ))
    }
}

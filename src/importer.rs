// 📥 Import orchestrator
//
// Loads the advice-provider workbook into the store, phase by phase:
//
//   [priming] → organisations → offices → outreach → civil categories → criminal categories → done
//
// Phases are strictly ordered (offices need organisations, outreach and
// categories need offices) and each is idempotent, so an interrupted run is
// resumed simply by running again. The interrupt flag is checked before
// every phase and every row; a row that has started always finishes.

use crate::db::Store;
use crate::deduplication::{resolve_location, AddressRecord};
use crate::entities::{Category, Location, NewOrganisation, Office, OutreachType};
use crate::error::{ImportError, Result};
use crate::geocode::{GeocodeResolver, Geocoder};
use crate::memo::Memo;
use crate::progress::{InterruptFlag, Progress, ProgressHandle, TASK_PRIMING};
use crate::workbook::{
    Row, Sheet, Workbook, CIVIL_CATEGORY_SHEET, CRIMINAL_CATEGORY_SHEET, OFFICE_SHEET,
    ORGANISATION_SHEET, OUTREACH_SHEET,
};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::{error, info, warn};

// ============================================================================
// PHASES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Organisations,
    Offices,
    Outreach,
    CivilCategories,
    CriminalCategories,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Organisations,
        Phase::Offices,
        Phase::Outreach,
        Phase::CivilCategories,
        Phase::CriminalCategories,
    ];

    /// Progress task name
    pub fn task(&self) -> &'static str {
        match self {
            Phase::Organisations => "Importing organisations",
            Phase::Offices => "Importing offices",
            Phase::Outreach => "Importing outreach locations",
            Phase::CivilCategories => "Importing civil categories",
            Phase::CriminalCategories => "Importing criminal categories",
        }
    }

    pub fn sheet(&self) -> &'static str {
        match self {
            Phase::Organisations => ORGANISATION_SHEET,
            Phase::Offices => OFFICE_SHEET,
            Phase::Outreach => OUTREACH_SHEET,
            Phase::CivilCategories => CIVIL_CATEGORY_SHEET,
            Phase::CriminalCategories => CRIMINAL_CATEGORY_SHEET,
        }
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Completed,
    Interrupted,
}

// ============================================================================
// IMPORTER
// ============================================================================

/// One import run. Owns the run-scoped caches; they are cleared when run()
/// returns, whatever the result.
pub struct Importer<'a> {
    store: &'a Store,
    workbook: &'a Workbook,
    geocoder: &'a dyn Geocoder,
    progress: ProgressHandle,
    interrupt: InterruptFlag,
    prime_geocoder: bool,

    points: GeocodeResolver,
    outreach_types: Memo<String, OutreachType>,
    categories: Memo<(String, bool), Category>,
    offices: Memo<(String, String), Office>,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a Store, workbook: &'a Workbook, geocoder: &'a dyn Geocoder) -> Self {
        Importer {
            store,
            workbook,
            geocoder,
            progress: ProgressHandle::new(),
            interrupt: InterruptFlag::new(),
            prime_geocoder: true,
            points: GeocodeResolver::new(),
            outreach_types: Memo::new(),
            categories: Memo::new(),
            offices: Memo::new(),
        }
    }

    /// Publish progress through an externally held handle
    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    /// Watch an externally held interrupt flag
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Seed the postcode cache from already located rows before importing
    pub fn prime_geocoder(mut self, prime: bool) -> Self {
        self.prime_geocoder = prime;
        self
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    pub fn run(&mut self) -> Result<Outcome> {
        let result = self.run_phases();
        self.clear_caches();

        match &result {
            Ok(Outcome::Completed) => info!("Import complete"),
            Ok(Outcome::Interrupted) => info!(at = %self.progress.snapshot(), "Import interrupted"),
            Err(e) => error!(at = %self.progress.snapshot(), "Import failed: {}", e),
        }
        result
    }

    fn run_phases(&mut self) -> Result<Outcome> {
        self.progress.set(Progress::default());

        if self.prime_geocoder {
            if self.interrupt.is_raised() {
                return Ok(Outcome::Interrupted);
            }
            self.prime_geocoder_cache()?;
        }

        for phase in Phase::ALL {
            if self.interrupt.is_raised() {
                return Ok(Outcome::Interrupted);
            }
            if self.run_phase(phase)?.is_break() {
                return Ok(Outcome::Interrupted);
            }
        }

        self.progress.set(Progress::done());
        Ok(Outcome::Completed)
    }

    fn prime_geocoder_cache(&mut self) -> Result<()> {
        self.progress.set(Progress::task(TASK_PRIMING));
        let primed = self.points.prime(self.store)?;
        info!(postcodes = primed, "{}", TASK_PRIMING);
        Ok(())
    }

    fn run_phase(&mut self, phase: Phase) -> Result<ControlFlow<()>> {
        let workbook = self.workbook;
        let sheet = workbook.sheet(phase.sheet())?;

        self.progress.set(Progress::phase(phase.task(), sheet.len()));
        info!(rows = sheet.len(), "{}", phase.task());

        for row in &sheet.rows {
            if self.interrupt.is_raised() {
                return Ok(ControlFlow::Break(()));
            }

            match phase {
                Phase::Organisations => self.import_organisation(sheet, row)?,
                Phase::Offices => self.import_office(sheet, row)?,
                Phase::Outreach => self.import_outreach(sheet, row)?,
                Phase::CivilCategories => self.import_category(sheet, row, true)?,
                Phase::CriminalCategories => self.import_category(sheet, row, false)?,
            }

            self.progress.increment();
        }

        Ok(ControlFlow::Continue(()))
    }

    fn clear_caches(&mut self) {
        self.points.clear();
        self.outreach_types.clear();
        self.categories.clear();
        self.offices.clear();
    }

    // ========================================================================
    // ROW HANDLERS
    // ========================================================================

    fn import_organisation(&mut self, sheet: &Sheet, row: &Row) -> Result<()> {
        let kind = self
            .store
            .find_or_create_organisation_type(&sheet.text(row, "Type of Organisation")?)?;

        let firm = sheet.text(row, "Firm Number")?;
        let name = sheet.text(row, "Firm Name")?;
        let website = sheet.text(row, "Website")?;
        let contracted = sheet.text(row, "LA Contracted Status")?;

        let new = NewOrganisation {
            firm: &firm,
            name: &name,
            website: &website,
            contracted: &contracted,
            type_id: kind.id,
        };

        match self.store.find_or_create_organisation(&new) {
            Ok(_) => Ok(()),
            Err(e @ ImportError::DuplicateOrganisation { .. }) => {
                error!(
                    firm = %firm,
                    name = %name,
                    website = %website,
                    contracted = %contracted,
                    type_id = kind.id,
                    "Organisation row conflicts with an existing firm"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn import_office(&mut self, sheet: &Sheet, row: &Row) -> Result<()> {
        let location = self.location(
            sheet,
            row,
            ["Address Line 1", "Address Line 2", "Address Line 3", "City", "Postcode"],
        )?;

        let firm = sheet.text(row, "Firm Number")?;
        let organisation = self
            .store
            .find_organisation_by_firm(&firm)?
            .ok_or(ImportError::MissingOrganisation(firm))?;

        self.store.find_or_create_office(
            &sheet.text(row, "Telephone Number")?,
            &Office::normalize_account(&sheet.text(row, "Account Number")?),
            organisation.id,
            location.id,
        )?;
        Ok(())
    }

    fn import_outreach(&mut self, sheet: &Sheet, row: &Row) -> Result<()> {
        let location = self.location(
            sheet,
            row,
            [
                "PT or Outreach Loc Address Line1",
                "PT or Outreach Loc Address Line2",
                "PT or Outreach Loc Address Line3",
                "City (outreach)",
                "PT or Outreach Loc Postcode",
            ],
        )?;

        let account = Office::normalize_account(&sheet.text(row, "Account Number")?);
        let office = self.store.find_office_by_account(&account)?;
        if office.is_none() {
            warn!("No office with acct no {} for outreach service", account);
        }

        let store = self.store;
        let kind = self.outreach_types.try_resolve(
            sheet.text(row, "PT or Outreach Indicator")?,
            |name| store.find_or_create_outreach_type(name),
        )?;

        store.find_or_create_outreach_service(kind.id, location.id, office.map(|o| o.id))?;
        Ok(())
    }

    fn import_category(&mut self, sheet: &Sheet, row: &Row, civil: bool) -> Result<()> {
        let column = if civil {
            "Civil Category Code"
        } else {
            "Crime Category Code"
        };

        let store = self.store;
        let category = self
            .categories
            .try_resolve((sheet.text(row, column)?, civil), |(code, civil)| {
                store.find_or_create_category(code, *civil)
            })?;

        let firm = sheet.text(row, "Firm Number")?;
        let account = Office::normalize_account(&sheet.text(row, "Account Number")?);

        // a missing office is not cached, the lookup is repeated on the next row
        let office = self.offices.try_resolve((firm, account), |(firm, account)| {
            store
                .find_office_by_firm_and_account(firm, account)?
                .ok_or_else(|| ImportError::OfficeNotFound {
                    firm: firm.clone(),
                    account: account.clone(),
                })
        });

        match office {
            Ok(office) => {
                store.add_office_category(office.id, category.id)?;
            }
            Err(ImportError::OfficeNotFound { firm, account }) => {
                warn!("Office for firm {} with acct no {} not found", firm, account);
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn location(&mut self, sheet: &Sheet, row: &Row, columns: [&str; 5]) -> Result<Location> {
        let mut fields = Vec::with_capacity(5);
        for column in columns {
            fields.push(sheet.text(row, column)?);
        }
        let joined = AddressRecord::join([
            fields[0].as_str(),
            fields[1].as_str(),
            fields[2].as_str(),
            fields[3].as_str(),
            fields[4].as_str(),
        ]);

        resolve_location(self.store, &mut self.points, self.geocoder, &joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::EntityCounts;
    use crate::entities::Point;
    use crate::geocode::GeocodeError;
    use crate::progress::TASK_INITIALISING;
    use crate::testing::{ScriptedGeocoder, WorkbookFixture};

    const LEEDS: Point = Point {
        longitude: -1.5491,
        latitude: 53.7997,
    };
    const YORK: Point = Point {
        longitude: -1.0815,
        latitude: 53.9600,
    };

    fn acme() -> WorkbookFixture {
        WorkbookFixture::new()
            .organisation(["101", "Acme Legal", "Charity", "www.acme.example", "Yes"])
            .office(["101", "0a123b", "0113 496 0000", "12 High St", "", "", "Leeds", "LS1 1AA"])
    }

    fn full_workbook() -> Workbook {
        acme()
            .organisation(["102", "York Advice", "Law Centre", "", "No"])
            .office(["102", "1B234C", "01904 000000", "3 Minster Yard", "", "", "York", "YO1 7HH"])
            // same address as the Acme office, different firm
            .office(["102", "1B234D", "01904 000001", " 12 High St ", " ", "", "Leeds", "LS1 1AA"])
            .outreach(["0A123B", "PT", "Central Library", "Calverley St", "", "Leeds", "LS1 3AB"])
            .outreach(["9Z999Z", "Outreach", "Town Hall", "", "", "York", "YO1 9QN"])
            .civil(["101", "0A123B", "HOU"])
            .civil(["101", "0A123B", "DEB"])
            .civil(["102", "1B234C", "HOU"])
            .civil(["999", "XXXXXX", "HOU"])
            .criminal(["102", "1B234C", "PRE"])
            .build()
    }

    fn geocoder() -> ScriptedGeocoder {
        ScriptedGeocoder::new()
            .with_point("LS1 1AA", LEEDS)
            .with_point("YO1 7HH", YORK)
            .with_point("LS1 3AB", LEEDS)
    }

    fn run(store: &Store, workbook: &Workbook, geocoder: &dyn Geocoder) -> Result<Outcome> {
        Importer::new(store, workbook, geocoder).run()
    }

    #[test]
    fn test_organisation_office_example() {
        let store = Store::open_in_memory().unwrap();
        let workbook = acme().build();
        let geocoder = geocoder();

        assert_eq!(run(&store, &workbook, &geocoder).unwrap(), Outcome::Completed);

        let org = store.find_organisation_by_firm("101").unwrap().unwrap();
        assert_eq!(org.name, "Acme Legal");

        let location = store.find_location("12 High St", "Leeds", "LS1 1AA").unwrap().unwrap();
        assert_eq!(location.point, Some(LEEDS));

        let office = store.find_office_by_account("0A123B").unwrap().unwrap();
        assert_eq!(office.organisation_id, org.id);
        assert_eq!(office.location_id, location.id);
        assert_eq!(office.telephone, "0113 496 0000");

        let counts = store.entity_counts().unwrap();
        assert_eq!(counts.organisations, 1);
        assert_eq!(counts.locations, 1);
        assert_eq!(counts.offices, 1);
    }

    #[test]
    fn test_full_import() {
        let store = Store::open_in_memory().unwrap();
        let workbook = full_workbook();
        let geocoder = geocoder();

        let mut importer = Importer::new(&store, &workbook, &geocoder);
        let progress = importer.progress();
        assert_eq!(importer.run().unwrap(), Outcome::Completed);
        assert_eq!(progress.snapshot(), Progress::done());

        let counts = store.entity_counts().unwrap();
        assert_eq!(
            counts,
            EntityCounts {
                organisation_types: 2,
                organisations: 2,
                // High St shared by two offices; library; minster; town hall
                locations: 4,
                offices: 3,
                outreach_types: 2,
                outreach_services: 2,
                categories: 3,
                office_categories: 4,
            }
        );

        // both offices at the High St address share one Location
        let acme = store.find_office_by_account("0A123B").unwrap().unwrap();
        let other = store.find_office_by_account("1B234D").unwrap().unwrap();
        assert_eq!(acme.location_id, other.location_id);

        let codes: Vec<String> = store
            .office_categories(acme.id)
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["DEB".to_string(), "HOU".to_string()]);

        let york = store.find_office_by_account("1B234C").unwrap().unwrap();
        let york_categories = store.office_categories(york.id).unwrap();
        assert_eq!(york_categories.len(), 2);
        assert!(york_categories.iter().any(|c| c.code == "PRE" && !c.civil));

        // outreach with an unknown account number is kept without an office
        let town_hall = store.find_location("Town Hall", "York", "YO1 9QN").unwrap().unwrap();
        assert_eq!(town_hall.point, None);
        let orphan = store
            .find_or_create_outreach_service(
                store.find_or_create_outreach_type("Outreach").unwrap().id,
                town_hall.id,
                None,
            )
            .unwrap();
        assert_eq!(orphan.office_id, None);
        assert_eq!(store.entity_counts().unwrap().outreach_services, 2);
    }

    #[test]
    fn test_rerun_creates_no_duplicates() {
        let store = Store::open_in_memory().unwrap();
        let workbook = full_workbook();
        let geocoder = geocoder();

        run(&store, &workbook, &geocoder).unwrap();
        let first = store.entity_counts().unwrap();
        run(&store, &workbook, &geocoder).unwrap();
        let second = store.entity_counts().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_priming_skips_known_postcodes() {
        let store = Store::open_in_memory().unwrap();
        let workbook = full_workbook();
        let geocoder = geocoder();

        run(&store, &workbook, &geocoder).unwrap();
        let after_first = geocoder.calls();
        assert_eq!(geocoder.calls_for("LS1 1AA"), 1);

        run(&store, &workbook, &geocoder).unwrap();
        // only the postcode that never resolved is asked again
        assert_eq!(geocoder.calls() - after_first, 1);
        assert_eq!(geocoder.calls_for("YO1 9QN"), 2);
    }

    #[test]
    fn test_coordinate_backfill_on_later_run() {
        let store = Store::open_in_memory().unwrap();
        let workbook = acme().build();
        let geocoder = ScriptedGeocoder::new().with_outage("LS1 1AA");

        run(&store, &workbook, &geocoder).unwrap();
        let location = store.find_location("12 High St", "Leeds", "LS1 1AA").unwrap().unwrap();
        assert_eq!(location.point, None);

        geocoder.restore("LS1 1AA", LEEDS);
        run(&store, &workbook, &geocoder).unwrap();

        let repaired = store.find_location_by_id(location.id).unwrap().unwrap();
        assert_eq!(repaired.point, Some(LEEDS));
        assert_eq!(store.entity_counts().unwrap().locations, 1);
    }

    #[test]
    fn test_duplicate_organisation_aborts_run() {
        let store = Store::open_in_memory().unwrap();
        let workbook = WorkbookFixture::new()
            .organisation(["101", "Acme Legal", "Charity", "", "Yes"])
            .organisation(["101", "Acme Legal LLP", "Charity", "", "Yes"])
            .office(["101", "0A123B", "0113", "12 High St", "", "", "Leeds", "LS1 1AA"])
            .build();
        let geocoder = geocoder();

        let mut importer = Importer::new(&store, &workbook, &geocoder);
        let progress = importer.progress();

        match importer.run() {
            Err(ImportError::DuplicateOrganisation { firm, .. }) => assert_eq!(firm, "101"),
            other => panic!("expected duplicate organisation, got {:?}", other),
        }

        // frozen at the failing row
        let seen = progress.snapshot();
        assert_eq!(seen.task, Phase::Organisations.task());
        assert_eq!(seen.count, Some(1));
        assert_eq!(store.entity_counts().unwrap().offices, 0);
        assert!(importer.points.is_empty());
    }

    #[test]
    fn test_office_without_organisation_is_fatal() {
        let store = Store::open_in_memory().unwrap();
        let workbook = WorkbookFixture::new()
            .office(["404", "0A123B", "0113", "12 High St", "", "", "Leeds", "LS1 1AA"])
            .build();

        let result = run(&store, &workbook, &geocoder());
        assert!(matches!(result, Err(ImportError::MissingOrganisation(firm)) if firm == "404"));
    }

    #[test]
    fn test_missing_office_skips_category_but_counts_row() {
        let store = Store::open_in_memory().unwrap();
        let workbook = acme()
            .civil(["101", "NOPE01", "HOU"])
            .civil(["101", "NOPE01", "DEB"])
            .build();

        let geocoder = geocoder();

        let mut importer = Importer::new(&store, &workbook, &geocoder);
        let progress = importer.progress();
        assert_eq!(importer.run().unwrap(), Outcome::Completed);
        assert!(progress.snapshot().is_done());

        let counts = store.entity_counts().unwrap();
        assert_eq!(counts.categories, 2);
        assert_eq!(counts.office_categories, 0);
    }

    #[test]
    fn test_category_lookup_uppercases_account() {
        let store = Store::open_in_memory().unwrap();
        let workbook = acme().civil(["101", "0a123b", "HOU"]).build();

        run(&store, &workbook, &geocoder()).unwrap();
        assert_eq!(store.entity_counts().unwrap().office_categories, 1);
    }

    #[test]
    fn test_interrupt_before_start() {
        let store = Store::open_in_memory().unwrap();
        let workbook = full_workbook();
        let geocoder = geocoder();

        let mut importer = Importer::new(&store, &workbook, &geocoder);
        importer.interrupt_flag().raise();

        assert_eq!(importer.run().unwrap(), Outcome::Interrupted);
        assert_eq!(importer.progress().snapshot().task, TASK_INITIALISING);
        assert_eq!(store.entity_counts().unwrap(), EntityCounts::default());
        assert_eq!(geocoder.calls(), 0);
    }

    /// Raises the interrupt while geocoding one postcode, i.e. mid-row
    struct InterruptOn {
        postcode: &'static str,
        flag: InterruptFlag,
        inner: ScriptedGeocoder,
    }

    impl Geocoder for InterruptOn {
        fn geocode(&self, postcode: &str) -> std::result::Result<Point, GeocodeError> {
            if postcode == self.postcode {
                self.flag.raise();
            }
            self.inner.geocode(postcode)
        }
    }

    #[test]
    fn test_interrupt_mid_phase_keeps_finished_rows() {
        let store = Store::open_in_memory().unwrap();
        let workbook = WorkbookFixture::new()
            .organisation(["101", "Acme Legal", "Charity", "", "Yes"])
            .office(["101", "A1", "1", "1 First St", "", "", "Leeds", "LS1 1AA"])
            .office(["101", "A2", "2", "2 Second St", "", "", "Leeds", "LS2 2BB"])
            .office(["101", "A3", "3", "3 Third St", "", "", "Leeds", "LS3 3CC"])
            .civil(["101", "A1", "HOU"])
            .build();

        let flag = InterruptFlag::new();
        let geocoder = InterruptOn {
            postcode: "LS2 2BB",
            flag: flag.clone(),
            inner: ScriptedGeocoder::new(),
        };

        let mut importer = Importer::new(&store, &workbook, &geocoder).with_interrupt(flag);
        let progress = importer.progress();

        // interrupt raised during row 2 of offices: row 2 completes, row 3 never starts
        assert_eq!(importer.run().unwrap(), Outcome::Interrupted);

        let counts = store.entity_counts().unwrap();
        assert_eq!(counts.offices, 2);
        assert_eq!(counts.locations, 2);
        assert_eq!(counts.categories, 0);
        assert!(store.find_office_by_account("A3").unwrap().is_none());

        let seen = progress.snapshot();
        assert_eq!(seen.task, Phase::Offices.task());
        assert_eq!(seen.count, Some(2));
        assert_eq!(seen.total, Some(3));
    }

    #[test]
    fn test_interrupted_run_resumes() {
        let store = Store::open_in_memory().unwrap();
        let workbook = full_workbook();

        let flag = InterruptFlag::new();
        let interrupting = InterruptOn {
            postcode: "YO1 7HH",
            flag: flag.clone(),
            inner: geocoder(),
        };
        let outcome = Importer::new(&store, &workbook, &interrupting)
            .with_interrupt(flag)
            .run()
            .unwrap();
        assert_eq!(outcome, Outcome::Interrupted);

        assert_eq!(store.entity_counts().unwrap().outreach_services, 0);

        assert_eq!(run(&store, &workbook, &geocoder()).unwrap(), Outcome::Completed);

        let fresh = Store::open_in_memory().unwrap();
        run(&fresh, &workbook, &geocoder()).unwrap();
        assert_eq!(store.entity_counts().unwrap(), fresh.entity_counts().unwrap());
    }

    #[test]
    fn test_no_prime_still_uses_stored_points() {
        let store = Store::open_in_memory().unwrap();
        let workbook = acme().build();
        let geocoder = geocoder();

        run(&store, &workbook, &geocoder).unwrap();
        Importer::new(&store, &workbook, &geocoder)
            .prime_geocoder(false)
            .run()
            .unwrap();

        // existing location already has its point; nothing to geocode
        assert_eq!(geocoder.calls(), 1);
    }

    #[test]
    fn test_missing_sheet_fails_at_its_phase() {
        let store = Store::open_in_memory().unwrap();
        let workbook = Workbook::new();

        let result = run(&store, &workbook, &geocoder());
        assert!(matches!(result, Err(ImportError::MissingSheet(name)) if name == ORGANISATION_SHEET));
    }
}

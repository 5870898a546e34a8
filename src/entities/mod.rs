// Entity Models
//
// Every entity is keyed the way the source sheets identify it and is created
// through find-or-create on the Store. Each module adds its queries to Store
// next to the type they return.

pub mod organisation;
pub mod location;
pub mod office;
pub mod outreach;
pub mod category;

pub use organisation::{NewOrganisation, Organisation, OrganisationType};
pub use location::{Location, Point};
pub use office::Office;
pub use outreach::{OutreachService, OutreachType};
pub use category::Category;

//! Entity structs for all Cursus domain objects.
//!
//! Each entity maps to a table in the libSQL database. All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and schema
//! validation.

mod audit;
mod course;
mod enrollment;
mod group;
mod learner;
mod module;
mod organization;
mod progress;

pub use audit::AuditEntry;
pub use course::Course;
pub use enrollment::Enrollment;
pub use group::{Group, GroupOccupancy};
pub use learner::Learner;
pub use module::Module;
pub use organization::Organization;
pub use progress::{ModuleProgress, ModuleState};

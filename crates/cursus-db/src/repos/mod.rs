//! Repository modules implementing the engine operations.
//!
//! Each module adds methods to `CursusService` via `impl CursusService` blocks.

pub mod aggregate;
pub mod audit;
pub mod course;
pub mod enrollment;
pub mod group;
pub mod module;
pub mod progress;
pub mod tenant;

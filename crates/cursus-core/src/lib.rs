//! # cursus-core
//!
//! Core types shared across all Cursus crates:
//! - Entity structs for the catalog, tenant directory, enrollments and progress
//! - Status enums with state machine transitions
//! - ID prefix constants
//! - Error kinds callers branch on
//! - Audit detail sub-types
//! - Injectable clock

pub mod audit_detail;
pub mod clock;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;

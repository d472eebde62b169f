//! Update builder types for entity mutations.
//!
//! Each builder produces an update struct with `Option` fields. Only `Some` fields
//! generate SET clauses in the dynamic UPDATE SQL. `Option<Option<T>>` fields
//! distinguish "leave unchanged" (`None`) from "clear" (`Some(None)`). The
//! serialized update (changed fields only) becomes the audit `detail` payload.

pub mod course;
pub mod enrollment;
pub mod group;
pub mod module;

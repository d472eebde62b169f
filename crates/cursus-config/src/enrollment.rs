//! Enrollment policy switches.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnrollmentConfig {
    /// Let a learner enroll again over their own cancelled enrollment.
    /// When off, the cancelled record keeps its uniqueness slot and a second
    /// enroll fails as already enrolled.
    #[serde(default)]
    pub allow_reenroll_cancelled: bool,
}

//! Module update builder. Position is never part of an update; use
//! `reorder_modules` instead.

use cursus_core::enums::{ModuleStatus, ModuleType};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ModuleStatus>,
}

pub struct ModuleUpdateBuilder(ModuleUpdate);

impl ModuleUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(ModuleUpdate::default())
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn module_type(mut self, module_type: ModuleType) -> Self {
        self.0.module_type = Some(module_type);
        self
    }

    #[must_use]
    pub const fn duration_seconds(mut self, duration_seconds: Option<i64>) -> Self {
        self.0.duration_seconds = Some(duration_seconds);
        self
    }

    #[must_use]
    pub const fn status(mut self, status: ModuleStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn build(self) -> ModuleUpdate {
        self.0
    }
}

impl Default for ModuleUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

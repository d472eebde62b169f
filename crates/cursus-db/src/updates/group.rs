//! Group update builder.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// `Some(None)` removes the capacity limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Option<i64>>,
}

pub struct GroupUpdateBuilder(GroupUpdate);

impl GroupUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(GroupUpdate::default())
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.0.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.0.description = Some(description);
        self
    }

    #[must_use]
    pub const fn capacity(mut self, capacity: Option<i64>) -> Self {
        self.0.capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn build(self) -> GroupUpdate {
        self.0
    }
}

impl Default for GroupUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Suspension scope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::shared::models::EntityType;

/// Active window during which direct re-indexing of `types` is deferred
///
/// Scopes have no identity beyond their value: two scopes with the same
/// types and start are interchangeable on exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspensionScope {
    pub types: BTreeSet<EntityType>,
    /// Entry time minus the buffer window
    pub start: DateTime<Utc>,
}

impl SuspensionScope {
    pub fn new(types: BTreeSet<EntityType>, start: DateTime<Utc>) -> Self {
        Self { types, start }
    }

    pub fn contains(&self, ty: &EntityType) -> bool {
        self.types.contains(ty)
    }
}

impl fmt::Display for SuspensionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.types.iter().map(EntityType::label).collect();
        write!(f, "{{{}}} since {}", labels.join(", "), self.start.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scope_json_is_readable() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let scope = SuspensionScope::new(
            BTreeSet::from([EntityType::new("library", "book")]),
            start,
        );

        let json = serde_json::to_string(&scope).unwrap();
        assert!(json.starts_with(r#"{"types":["library.book"],"start":"2024-05-01T08:30:00"#));
        assert_eq!(serde_json::from_str::<SuspensionScope>(&json).unwrap(), scope);
    }
}

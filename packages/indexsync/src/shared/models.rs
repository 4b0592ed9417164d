//! Core models shared by every feature slice
//!
//! - `EntityType`: identity of a persistent type in the primary store
//! - `PrimaryKey`: row identity within one entity type
//! - `RelationPath`: lookup path from a root entity to a related one
//! - `IndexKey`: registry identity of an index definition
//! - `Record`: a live instance handed over by the primary store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;

use crate::errors::SyncError;

/// Persistent entity type, written `app_label.model_name`
///
/// Serialized as its dotted label so suspension scopes stay readable in a
/// shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType {
    pub app_label: String,
    pub model_name: String,
}

impl EntityType {
    pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.into(),
        }
    }

    /// Dotted label (`app_label.model_name`)
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model_name)
    }
}

impl FromStr for EntityType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((app, model)) if !app.is_empty() && !model.is_empty() && !model.contains('.') => {
                Ok(Self::new(app, model))
            }
            _ => Err(SyncError::InvalidEntityType(s.to_string())),
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.label()
    }
}

/// Primary key of a stored row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int(v) => write!(f, "{}", v),
            PrimaryKey::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey::Int(value)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        PrimaryKey::Text(value.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(value: String) -> Self {
        PrimaryKey::Text(value)
    }
}

/// Relation lookup path, segments joined by `__` (e.g. `author__publisher`)
///
/// Read from the root entity's side: the path names the relation fields to
/// follow from a root entity to reach an instance of the dependency type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationPath(String);

impl RelationPath {
    pub const SEPARATOR: &'static str = "__";

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR).filter(|s| !s.is_empty())
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Registry identity of an index definition: `(entity type, index name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub entity_type: EntityType,
    pub name: String,
}

impl IndexKey {
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_type, self.name)
    }
}

/// A live instance delivered by the primary store
///
/// `entity_type` is the concrete runtime type, which can differ from the
/// type an event was declared for.
pub trait Record: Send + Sync + fmt::Debug {
    fn entity_type(&self) -> EntityType;

    /// `None` while the instance has never been saved
    fn primary_key(&self) -> Option<PrimaryKey>;

    /// Last modification time, when the store tracks one
    fn modified_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Downcast hook for index definitions that build documents from the
    /// concrete record type
    fn as_any(&self) -> &dyn Any;
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which replica-set members reads may be served from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPreference {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// A partial target. Unset fields fall through to the next layer.
///
/// Built with chained setters and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    read_preference: Option<ReadPreference>,
}

impl TargetOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = Some(read_preference);
        self
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client.as_deref()
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn read_preference_value(&self) -> Option<ReadPreference> {
        self.read_preference
    }

    pub fn is_empty(&self) -> bool {
        self.client.is_none()
            && self.database.is_none()
            && self.collection.is_none()
            && self.read_preference.is_none()
    }

    /// Field-wise precedence: each field of `self` wins when set, otherwise
    /// the field comes from `fallback`.
    pub fn or(&self, fallback: &TargetOverride) -> TargetOverride {
        TargetOverride {
            client: self.client.clone().or_else(|| fallback.client.clone()),
            database: self.database.clone().or_else(|| fallback.database.clone()),
            collection: self.collection.clone().or_else(|| fallback.collection.clone()),
            read_preference: self.read_preference.or(fallback.read_preference),
        }
    }
}

/// A fully resolved destination for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub client: String,
    pub database: String,
    pub collection: String,
    pub read_preference: ReadPreference,
}

impl Target {
    /// A target with the default read preference.
    pub fn new(
        client: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Target {
            client: client.into(),
            database: database.into(),
            collection: collection.into(),
            read_preference: ReadPreference::default(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}.{}", self.client, self.database, self.collection)
    }
}

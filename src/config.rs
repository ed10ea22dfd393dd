use serde::{Deserialize, Serialize};

use crate::error::OdmError;
use crate::target::ReadPreference;

/// Session-wide settings.
///
/// Missing keys take their defaults when loading from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether nested `atomically` blocks join their parent unless the call
    /// says otherwise.
    pub join_contexts: bool,
    pub default_client: String,
    pub default_database: String,
    pub read_preference: ReadPreference,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            join_contexts: false,
            default_client: "default".to_string(),
            default_database: "default".to_string(),
            read_preference: ReadPreference::Primary,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, OdmError> {
        serde_json::from_str(json).map_err(|e| OdmError::Config(e.to_string()))
    }

    pub fn join_contexts(mut self, join: bool) -> Self {
        self.join_contexts = join;
        self
    }

    pub fn default_client(mut self, client: impl Into<String>) -> Self {
        self.default_client = client.into();
        self
    }

    pub fn default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    pub fn read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = read_preference;
        self
    }
}

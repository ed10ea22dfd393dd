use super::{ReadPreference, Target, TargetOverride};
use crate::config::Config;

/// Merges the four target layers, highest priority first:
/// explicit scope override, session-wide override, model-declared default,
/// configured default client and database.
///
/// Each field is resolved on its own; an override naming only a database
/// leaves collection resolution to the lower layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetResolver {
    default_client: String,
    default_database: String,
    default_read_preference: ReadPreference,
}

impl TargetResolver {
    pub fn new(config: &Config) -> Self {
        TargetResolver {
            default_client: config.default_client.clone(),
            default_database: config.default_database.clone(),
            default_read_preference: config.read_preference,
        }
    }

    /// Resolve a target. `model_collection` is the model's `COLLECTION`,
    /// used when no layer names a collection.
    pub fn resolve(
        &self,
        explicit: Option<&TargetOverride>,
        process: Option<&TargetOverride>,
        model: &TargetOverride,
        model_collection: &str,
    ) -> Target {
        let empty = TargetOverride::new();
        let merged = explicit
            .unwrap_or(&empty)
            .or(process.unwrap_or(&empty))
            .or(model);

        Target {
            client: merged
                .client_name()
                .unwrap_or(&self.default_client)
                .to_string(),
            database: merged
                .database_name()
                .unwrap_or(&self.default_database)
                .to_string(),
            collection: merged
                .collection_name()
                .unwrap_or(model_collection)
                .to_string(),
            read_preference: merged
                .read_preference_value()
                .unwrap_or(self.default_read_preference),
        }
    }
}

use super::Entity;
use crate::target::TargetOverride;

/// A model type mapped to a collection.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Default, Document)]
/// #[document(collection = "artists", database = "music")]
/// struct Artist {
///     entity: Entity,
/// }
/// ```
pub trait Document {
    /// Collection used when no override names one.
    const COLLECTION: &'static str;

    fn entity(&self) -> &Entity;
    fn entity_mut(&mut self) -> &mut Entity;

    /// Model-declared default target (client, database, collection).
    fn storage_options() -> TargetOverride {
        TargetOverride::new()
    }
}

/// Identity of an entity's context stack: `"<collection>:<id>"`.
pub(crate) fn entity_key<D: Document>(doc: &D) -> String {
    format!("{}:{}", D::COLLECTION, doc.entity().id())
}

#[macro_export]
macro_rules! impl_document {
    ($ty:ty, $entity:ident, $collection:expr) => {
        impl $crate::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn entity(&self) -> &$crate::Entity {
                &self.$entity
            }

            fn entity_mut(&mut self) -> &mut $crate::Entity {
                &mut self.$entity
            }
        }
    };
    ($ty:ty, $entity:ident, $collection:expr, $options:expr) => {
        impl $crate::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn entity(&self) -> &$crate::Entity {
                &self.$entity
            }

            fn entity_mut(&mut self) -> &mut $crate::Entity {
                &mut self.$entity
            }

            fn storage_options() -> $crate::TargetOverride {
                $options
            }
        }
    };
}

//! Where an operation is sent: layered overrides resolved to a
//! `{client, database, collection}` target, and runtime scopes that bind one.

mod resolver;
mod scope;
mod target_override;

pub use resolver::TargetResolver;
pub use scope::{ScopeKey, ScopedTarget};
pub(crate) use scope::TargetScope;
pub use target_override::{ReadPreference, Target, TargetOverride};

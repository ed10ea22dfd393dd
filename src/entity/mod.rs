mod dirty;
mod document;
mod entity;
pub(crate) mod path;

pub use dirty::DirtyTracker;
pub use document::Document;
pub(crate) use document::entity_key;
pub use entity::Entity;

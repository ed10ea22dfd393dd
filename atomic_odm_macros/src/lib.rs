mod document;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(Document)] derive macro
// ============================================================================

/// Derive macro for the `Document` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Default, Document)]
/// #[document(collection = "artists", database = "music", client = "primary")]
/// struct Artist {
///     #[document(entity)]
///     record: Entity,
/// }
/// ```
///
/// - `#[document(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `database` and `client` declare the model's default target. Both are
///   optional; anything left out falls through to the session defaults.
/// - `#[document(entity)]` marks the field holding the `Entity`.
///   If omitted, defaults to a field named `entity`.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    document::derive_document(input)
}

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr};

#[derive(Default)]
struct ModelOptions {
    collection: Option<String>,
    database: Option<String>,
    client: Option<String>,
}

pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let options = extract_options(input)?;
    let entity_field = extract_entity_field(input)?;

    let collection = options
        .collection
        .unwrap_or_else(|| format!("{}s", to_snake_case(&name.to_string())));

    let database = options.database.map(|db| quote! { .database(#db) });
    let client = options.client.map(|client| quote! { .client(#client) });

    Ok(quote! {
        impl ::atomic_odm::Document for #name {
            const COLLECTION: &'static str = #collection;

            fn entity(&self) -> &::atomic_odm::Entity {
                &self.#entity_field
            }

            fn entity_mut(&mut self) -> &mut ::atomic_odm::Entity {
                &mut self.#entity_field
            }

            fn storage_options() -> ::atomic_odm::TargetOverride {
                ::atomic_odm::TargetOverride::new() #database #client
            }
        }
    })
}

fn extract_options(input: &DeriveInput) -> syn::Result<ModelOptions> {
    let mut options = ModelOptions::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let slot = if meta.path.is_ident("collection") {
                &mut options.collection
            } else if meta.path.is_ident("database") {
                &mut options.database
            } else if meta.path.is_ident("client") {
                &mut options.client
            } else {
                return Err(meta.error("expected `collection`, `database` or `client`"));
            };
            let value: LitStr = meta.value()?.parse()?;
            *slot = Some(value.value());
            Ok(())
        })?;
    }
    Ok(options)
}

fn extract_entity_field(input: &DeriveInput) -> syn::Result<syn::Ident> {
    let Data::Struct(data_struct) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Document derive: only structs are supported",
        ));
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return Err(syn::Error::new(
            input.ident.span(),
            "Document derive: expected named fields",
        ));
    };

    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("document") {
                continue;
            }
            let mut is_entity = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("entity") {
                    is_entity = true;
                    Ok(())
                } else {
                    Err(meta.error("expected `entity`"))
                }
            })?;
            if is_entity {
                if let Some(ident) = &field.ident {
                    return Ok(ident.clone());
                }
            }
        }
    }

    // Default: look for a field named "entity"
    fields
        .named
        .iter()
        .filter_map(|field| field.ident.as_ref())
        .find(|ident| *ident == "entity")
        .cloned()
        .ok_or_else(|| {
            syn::Error::new(
                Span::call_site(),
                "Document derive: no field marked with #[document(entity)] and no field named `entity`",
            )
        })
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}

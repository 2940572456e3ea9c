//! Derive macro for static entity descriptions.
//!
//! This crate provides `#[derive(Entity)]`, which turns field annotations
//! into a `'static` `EntityDescription` checked at compile time.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr};

/// Derives the `Entity` trait for a struct.
///
/// # Attributes
///
/// - `#[entity(table = "table_name")]` - Specifies the SQL table name
///   (optional, defaults to snake_case of struct name)
/// - `#[entity(required(field, other = "message"))]` - Fields inserts must
///   supply, each with an optional validation message
///
/// # Field Attributes
///
/// Only fields carrying `#[field(...)]` are persisted.
///
/// - `#[field(type = "VARCHAR(255)")]` - Column type in the dialect's DDL
/// - `#[field(key = "PRI")]` - Key role: `PRI`, `UNI` or `MUL`
/// - `#[field(name = "column_name")]` - Column name (defaults to field name)
///
/// # Example
///
/// ```ignore
/// #[derive(Entity)]
/// #[entity(table = "users", required(email, name = "Please enter a name"))]
/// struct User {
///     #[field(type = "INT AUTO_INCREMENT", key = "PRI")]
///     id: i64,
///     #[field(type = "VARCHAR(255)", key = "UNI")]
///     email: String,
///     #[field(type = "VARCHAR(64)")]
///     name: String,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, field))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_entity_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_entity_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let entity_attrs = parse_entity_attrs(&input.attrs, struct_name)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Entity derive only supports structs",
            ));
        }
    };

    // Collect persisted fields
    let mut field_infos: Vec<FieldInfo> = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let Some(attrs) = parse_field_attrs(&field.attrs)? else {
            continue;
        };
        let column_name = attrs.name.unwrap_or_else(|| ident.unraw().to_string());
        if field_infos.iter().any(|f| f.column_name == column_name) {
            return Err(syn::Error::new_spanned(
                field,
                format!("column '{column_name}' is declared more than once"),
            ));
        }
        field_infos.push(FieldInfo {
            column_name,
            storage_type: attrs.storage_type,
            key_role: attrs.key_role,
            required: None,
        });
    }

    // Attach required declarations
    for required in entity_attrs.required {
        let Some(info) = field_infos
            .iter_mut()
            .find(|f| f.column_name == required.name.unraw().to_string())
        else {
            return Err(syn::Error::new(
                required.name.span(),
                format!(
                    "required field '{}' is not a persisted field of {struct_name}",
                    required.name
                ),
            ));
        };
        info.required = Some(required.message);
    }

    let field_tokens: Vec<TokenStream2> = field_infos
        .iter()
        .map(|info| {
            let name = &info.column_name;
            let storage_type = &info.storage_type;
            let key_role = key_role_tokens(&info.key_role);
            let required = info.required.is_some();
            let message = match info.required.as_ref().and_then(Option::as_ref) {
                Some(message) => quote! { ::core::option::Option::Some(#message) },
                None => quote! { ::core::option::Option::None },
            };
            quote! {
                ::sqlmend_core::FieldMetadata::from_static(
                    #name,
                    #storage_type,
                    #key_role,
                    #required,
                    #message,
                )
            }
        })
        .collect();

    let table_name = &entity_attrs.table;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sqlmend_core::Entity for #struct_name #ty_generics #where_clause {
            const TABLE: &'static str = #table_name;

            fn description() -> ::sqlmend_core::EntityDescription {
                static FIELDS: &[::sqlmend_core::FieldMetadata] = &[
                    #(#field_tokens),*
                ];
                ::sqlmend_core::EntityDescription::from_static(FIELDS)
            }
        }
    })
}

struct FieldInfo {
    column_name: String,
    storage_type: String,
    key_role: String,
    required: Option<Option<String>>,
}

struct RequiredField {
    name: Ident,
    message: Option<String>,
}

struct EntityAttrs {
    table: String,
    required: Vec<RequiredField>,
}

struct FieldAttrs {
    name: Option<String>,
    storage_type: String,
    key_role: String,
}

fn key_role_tokens(code: &str) -> TokenStream2 {
    match code {
        "PRI" => quote! { ::sqlmend_core::KeyRole::Primary },
        "UNI" => quote! { ::sqlmend_core::KeyRole::Unique },
        "MUL" => quote! { ::sqlmend_core::KeyRole::Multi },
        _ => quote! { ::sqlmend_core::KeyRole::None },
    }
}

fn parse_entity_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<EntityAttrs> {
    let mut result = EntityAttrs {
        table: to_snake_case(&struct_name.to_string()),
        required: Vec::new(),
    };

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                result.table = value.value();
                Ok(())
            } else if meta.path.is_ident("required") {
                meta.parse_nested_meta(|inner| {
                    let name = inner
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| inner.error("expected a field name"))?;
                    let message = if inner.input.peek(syn::Token![=]) {
                        let value: LitStr = inner.value()?.parse()?;
                        Some(value.value())
                    } else {
                        None
                    };
                    result.required.push(RequiredField { name, message });
                    Ok(())
                })
            } else {
                Err(meta.error("unsupported entity attribute"))
            }
        })?;
    }

    if result.table.is_empty() {
        return Err(syn::Error::new_spanned(struct_name, "table name must not be empty"));
    }
    Ok(result)
}

/// Returns `None` for fields without `#[field]`, which are not persisted.
fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<Option<FieldAttrs>> {
    let Some(attr) = attrs.iter().find(|a| a.path().is_ident("field")) else {
        return Ok(None);
    };

    let mut name = None;
    let mut storage_type: Option<LitStr> = None;
    let mut key_role = String::new();

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("type") {
            storage_type = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("key") {
            let value: LitStr = meta.value()?.parse()?;
            let code = value.value().trim().to_ascii_uppercase();
            if !matches!(code.as_str(), "PRI" | "UNI" | "MUL") {
                return Err(syn::Error::new_spanned(
                    &value,
                    "key must be one of \"PRI\", \"UNI\" or \"MUL\"",
                ));
            }
            key_role = code;
        } else if meta.path.is_ident("name") {
            let value: LitStr = meta.value()?.parse()?;
            name = Some(value.value());
        } else {
            return Err(meta.error("unsupported field attribute"));
        }
        Ok(())
    })?;

    let Some(storage_type) = storage_type else {
        return Err(syn::Error::new_spanned(attr, "missing `type = \"...\"`"));
    };
    let storage_type_value = storage_type.value().trim().to_string();
    if storage_type_value.is_empty() {
        return Err(syn::Error::new_spanned(&storage_type, "type must not be empty"));
    }

    Ok(Some(FieldAttrs {
        name,
        storage_type: storage_type_value,
        key_role,
    }))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

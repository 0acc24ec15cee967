//! Procedural macros for tablemap.
//!
//! `tablemap-macros` is the compile-time codegen layer. It turns plain
//! structs into mapped entities by generating a static schema descriptor:
//! the table declaration plus one getter/setter pair per field.
//!
//! - `#[derive(Entity)]` implements `tablemap_core::Entity`.
//! - `#[derive(SqlEnum)]` maps a fieldless enum onto its integer
//!   discriminant so it can be used as an entity field.

use proc_macro::TokenStream;
use quote::{format_ident, quote};

mod parse;
mod validate;

use parse::{EntityDef, parse_entity};

/// Derive macro for the `Entity` trait.
///
/// # Attributes
///
/// Struct level:
/// - `#[tablemap(table = "People")]` - table (or view) name
/// - `#[tablemap(view)]` - read-only entity; inserts and updates are rejected
/// - `#[tablemap(rename_all = "PascalCase")]` - column naming for fields
///   without `column` (`PascalCase` default, `camelCase`, `none`)
///
/// Field level:
/// - `#[tablemap(primary_key)]` - part of the primary key
/// - `#[tablemap(auto_increment)]` - key assigned by the database
/// - `#[tablemap(guid)]` - key generated client-side before insert
/// - `#[tablemap(column = "name")]` - explicit column name
/// - `#[tablemap(created_at)]` / `#[tablemap(updated_at)]` - auto-stamped
///   timestamps
/// - `#[tablemap(skip)]` - not mapped
///
/// # Example
///
/// ```ignore
/// use tablemap::Entity;
///
/// #[derive(Entity, Default, Debug)]
/// #[tablemap(table = "People")]
/// struct Person {
///     #[tablemap(primary_key, auto_increment)]
///     id: i32,
///     name: String,
///     age: Option<i32>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(tablemap))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let entity = match parse_entity(&input) {
        Ok(e) => e,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_entity(&entity) {
        return e.to_compile_error().into();
    }

    generate_entity_impl(&entity).into()
}

/// Generate the Entity trait implementation from a parsed definition.
fn generate_entity_impl(entity: &EntityDef) -> proc_macro2::TokenStream {
    let name = &entity.name;
    let field_count = entity.fields.len();

    let table_name = match &entity.table_name {
        Some(t) => quote! { ::core::option::Option::Some(#t) },
        None => quote! { ::core::option::Option::None },
    };
    let view = entity.view;
    let created_at = optional_column(entity.created_at().map(|f| f.column_name.as_str()));
    let updated_at = optional_column(entity.updated_at().map(|f| f.column_name.as_str()));

    let mut accessors = Vec::with_capacity(field_count);
    let mut defs = Vec::with_capacity(field_count);

    for field in &entity.fields {
        let ident = &field.name;
        let ty = &field.ty;
        let getter = format_ident!("__tablemap_get_{}", ident);
        let setter = format_ident!("__tablemap_set_{}", ident);
        let column = &field.column_name;
        let primary_key = field.primary_key;
        let auto_increment = field.auto_increment;
        let guid = field.guid;

        accessors.push(quote! {
            fn #getter(entity: &#name) -> tablemap_core::Value {
                <#ty as tablemap_core::FieldValue>::to_value(&entity.#ident)
            }

            fn #setter(
                entity: &mut #name,
                value: tablemap_core::Value,
            ) -> tablemap_core::Result<()> {
                entity.#ident = <#ty as tablemap_core::FieldValue>::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        });

        defs.push(quote! {
            tablemap_core::FieldDef {
                name: #column,
                kind: <#ty as tablemap_core::FieldValue>::KIND,
                primary_key: #primary_key,
                auto_increment: #auto_increment,
                guid: #guid,
                get: #getter,
                set: #setter,
            }
        });
    }

    quote! {
        impl tablemap_core::Entity for #name {
            fn schema() -> &'static tablemap_core::EntitySchema<Self> {
                #(#accessors)*

                static FIELDS: [tablemap_core::FieldDef<#name>; #field_count] = [
                    #(#defs),*
                ];

                static SCHEMA: tablemap_core::EntitySchema<#name> = tablemap_core::EntitySchema {
                    table_name: #table_name,
                    view: #view,
                    created_at: #created_at,
                    updated_at: #updated_at,
                    fields: &FIELDS,
                };

                &SCHEMA
            }
        }
    }
}

fn optional_column(column: Option<&str>) -> proc_macro2::TokenStream {
    match column {
        Some(c) => quote! { ::core::option::Option::Some(#c) },
        None => quote! { ::core::option::Option::None },
    }
}

/// Derive macro for integer-backed SQL enums.
///
/// Generates `SqlEnum` and `FieldValue` implementations. The stored value is
/// the variant's discriminant (`Variant as i32`); explicit discriminants are
/// honoured.
///
/// # Example
///
/// ```ignore
/// #[derive(SqlEnum, Debug, Clone, Copy, PartialEq, Default)]
/// enum Status {
///     #[default]
///     Active = 1,
///     Suspended = 2,
/// }
/// ```
#[proc_macro_derive(SqlEnum)]
pub fn derive_sql_enum(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);
    match generate_sql_enum_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn generate_sql_enum_impl(input: &syn::DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "SqlEnum cannot be derived for generic enums",
        ));
    }

    let syn::Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "SqlEnum can only be derived for enums",
        ));
    };

    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            input,
            "SqlEnum requires at least one variant",
        ));
    }

    let mut variants = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        if !variant.fields.is_empty() {
            return Err(syn::Error::new_spanned(
                variant,
                "SqlEnum variants must be unit variants (no fields)",
            ));
        }
        variants.push(&variant.ident);
    }

    let type_name = name.to_string();

    let to_arms = variants.iter().map(|ident| {
        quote! { #name::#ident => #name::#ident as i32 }
    });
    let from_arms = variants.iter().map(|ident| {
        quote! { v if v == #name::#ident as i32 => ::core::option::Option::Some(#name::#ident) }
    });

    Ok(quote! {
        impl tablemap_core::SqlEnum for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn to_discriminant(&self) -> i32 {
                match self {
                    #(#to_arms,)*
                }
            }

            fn from_discriminant(value: i32) -> ::core::option::Option<Self> {
                match value {
                    #(#from_arms,)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl tablemap_core::FieldValue for #name {
            const KIND: tablemap_core::FieldKind =
                tablemap_core::FieldKind::Scalar(tablemap_core::ScalarKind::Enum);

            fn to_value(&self) -> tablemap_core::Value {
                tablemap_core::Value::Int(tablemap_core::SqlEnum::to_discriminant(self))
            }

            fn from_value(value: tablemap_core::Value) -> tablemap_core::Result<Self> {
                tablemap_core::field::enum_from_value(value)
            }
        }

        impl ::core::convert::From<#name> for tablemap_core::Value {
            fn from(v: #name) -> Self {
                tablemap_core::Value::Int(tablemap_core::SqlEnum::to_discriminant(&v))
            }
        }
    })
}

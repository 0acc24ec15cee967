//! Parsing logic for the Entity derive macro.
//!
//! This module extracts struct-level and field-level `#[tablemap(...)]`
//! attributes from the derive input to build `EntityDef` and `FieldDef`
//! structures used for code generation.

use proc_macro2::Span;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Ident, Lit, Result, Type};

/// How Rust field names become column names when `column` is not given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenameRule {
    /// `created_at` -> `CreatedAt`
    #[default]
    PascalCase,
    /// `created_at` -> `createdAt`
    CamelCase,
    /// Field name unchanged
    None,
}

impl RenameRule {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "PascalCase" => Some(Self::PascalCase),
            "camelCase" => Some(Self::CamelCase),
            "none" | "snake_case" => Some(Self::None),
            _ => None,
        }
    }

    pub fn apply(self, field: &str) -> String {
        match self {
            RenameRule::PascalCase => to_pascal_case(field),
            RenameRule::CamelCase => {
                let pascal = to_pascal_case(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            RenameRule::None => field.to_string(),
        }
    }
}

/// Parsed entity definition from a struct with `#[derive(Entity)]`.
#[derive(Debug)]
pub struct EntityDef {
    /// The struct name (e.g., `Person`).
    pub name: Ident,
    /// Declared table name; `None` is reported at runtime as a schema error.
    pub table_name: Option<String>,
    /// Read-only projection.
    pub view: bool,
    /// Mapped fields in declaration order (skipped fields excluded).
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Column stamped on insert.
    pub fn created_at(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.created_at)
    }

    /// Column stamped on insert and update.
    pub fn updated_at(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.updated_at)
    }
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name (e.g., `created_at`).
    pub name: Ident,
    /// The SQL column name (e.g., `"CreatedAt"`).
    pub column_name: String,
    pub ty: Type,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub guid: bool,
    pub created_at: bool,
    pub updated_at: bool,
}

/// Parse a `DeriveInput` into an `EntityDef`.
pub fn parse_entity(input: &DeriveInput) -> Result<EntityDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let StructAttrs {
        table_name,
        view,
        rename_all,
    } = parse_struct_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields, rename_all)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Entity can only be derived for structs, not unions",
            ));
        }
    };

    Ok(EntityDef {
        name,
        table_name,
        view,
        fields,
    })
}

struct StructAttrs {
    table_name: Option<String>,
    view: bool,
    rename_all: RenameRule,
}

/// Parse struct-level `#[tablemap(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"`
/// - `view` (read-only entity)
/// - `rename_all = "PascalCase" | "camelCase" | "none"`
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut table_name: Option<String> = None;
    let mut view = false;
    let mut rename_all: Option<RenameRule> = None;

    for attr in attrs {
        if !attr.path().is_ident("tablemap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate tablemap attribute: table",
                    ));
                }
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    table_name = Some(lit_str.value());
                    Ok(())
                } else {
                    Err(Error::new_spanned(
                        value,
                        "expected string literal for table name",
                    ))
                }
            } else if meta.path.is_ident("view") {
                view = true;
                Ok(())
            } else if meta.path.is_ident("rename_all") {
                let value: Lit = meta.value()?.parse()?;
                let Lit::Str(lit_str) = value else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for rename_all",
                    ));
                };
                let Some(rule) = RenameRule::parse(&lit_str.value()) else {
                    return Err(Error::new_spanned(
                        lit_str,
                        "rename_all must be one of: 'PascalCase', 'camelCase', 'none'",
                    ));
                };
                rename_all = Some(rule);
                Ok(())
            } else {
                Err(Error::new_spanned(
                    meta.path,
                    "unknown tablemap struct attribute (supported: table, view, rename_all)",
                ))
            }
        })?;
    }

    Ok(StructAttrs {
        table_name,
        view,
        rename_all: rename_all.unwrap_or_default(),
    })
}

fn parse_fields(fields: &Fields, rename_all: RenameRule) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => {
            let mut parsed = Vec::with_capacity(named.named.len());
            for field in &named.named {
                if let Some(def) = parse_field(field, rename_all)? {
                    parsed.push(def);
                }
            }
            Ok(parsed)
        }
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Entity requires a struct with fields, not a unit struct",
        )),
    }
}

/// Intermediate struct for collecting field attributes.
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    primary_key: bool,
    auto_increment: bool,
    guid: bool,
    created_at: bool,
    updated_at: bool,
    skip: bool,
}

/// Parse a single field; `None` for `#[tablemap(skip)]` fields.
fn parse_field(field: &Field, rename_all: RenameRule) -> Result<Option<FieldDef>> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let attrs = parse_field_attrs(&field.attrs)?;
    if attrs.skip {
        return Ok(None);
    }

    let rust_name = name.to_string();
    let rust_name = rust_name.strip_prefix("r#").unwrap_or(&rust_name);
    let column_name = attrs
        .column
        .unwrap_or_else(|| rename_all.apply(rust_name));

    Ok(Some(FieldDef {
        name,
        column_name,
        ty: field.ty.clone(),
        primary_key: attrs.primary_key,
        auto_increment: attrs.auto_increment,
        guid: attrs.guid,
        created_at: attrs.created_at,
        updated_at: attrs.updated_at,
    }))
}

/// Parse all `#[tablemap(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("tablemap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("auto_increment") {
                result.auto_increment = true;
            } else if path.is_ident("guid") {
                result.guid = true;
            } else if path.is_ident("created_at") {
                result.created_at = true;
            } else if path.is_ident("updated_at") {
                result.updated_at = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("column") {
                let value: Lit = meta.value()?.parse()?;
                if let Lit::Str(lit_str) = value {
                    result.column = Some(lit_str.value());
                } else {
                    return Err(Error::new_spanned(
                        value,
                        "expected string literal for column name",
                    ));
                }
            } else {
                return Err(Error::new_spanned(
                    path,
                    "unknown tablemap field attribute (supported: primary_key, auto_increment, \
                     guid, column, created_at, updated_at, skip)",
                ));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Convert snake_case to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut upper_next = true;
    for ch in s.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("id"), "Id");
        assert_eq!(to_pascal_case("created_at"), "CreatedAt");
        assert_eq!(to_pascal_case("already"), "Already");
        assert_eq!(to_pascal_case("_leading"), "Leading");
        assert_eq!(to_pascal_case("userID"), "UserID");
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(RenameRule::CamelCase.apply("created_at"), "createdAt");
        assert_eq!(RenameRule::None.apply("created_at"), "created_at");
        assert_eq!(RenameRule::PascalCase.apply("age"), "Age");
    }

    #[test]
    fn test_parse_entity_basic() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "People")]
            struct Person {
                #[tablemap(primary_key, auto_increment)]
                id: i32,
                name: String,
                age: i32,
            }
        };

        let def = parse_entity(&input).unwrap();
        assert_eq!(def.table_name.as_deref(), Some("People"));
        assert!(!def.view);
        let columns: Vec<_> = def.fields.iter().map(|f| f.column_name.as_str()).collect();
        assert_eq!(columns, vec!["Id", "Name", "Age"]);
        assert!(def.fields[0].primary_key && def.fields[0].auto_increment);
    }

    #[test]
    fn test_parse_entity_without_table_name() {
        let input: DeriveInput = parse_quote! {
            struct Loose {
                id: i32,
            }
        };
        let def = parse_entity(&input).unwrap();
        assert_eq!(def.table_name, None);
    }

    #[test]
    fn test_parse_view_and_timestamps() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "ActiveOrders", view, rename_all = "none")]
            struct ActiveOrder {
                #[tablemap(primary_key, guid)]
                order_id: Uuid,
                #[tablemap(created_at)]
                created_at: NaiveDateTime,
                #[tablemap(updated_at, column = "Modified")]
                updated_at: NaiveDateTime,
                #[tablemap(skip)]
                cache: Vec<u8>,
            }
        };

        let def = parse_entity(&input).unwrap();
        assert!(def.view);
        assert_eq!(def.fields.len(), 3);
        assert_eq!(def.fields[0].column_name, "order_id");
        assert!(def.fields[0].guid);
        assert_eq!(def.created_at().map(|f| f.column_name.as_str()), Some("created_at"));
        assert_eq!(def.updated_at().map(|f| f.column_name.as_str()), Some("Modified"));
    }

    #[test]
    fn test_unknown_struct_attr_errors() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(schema = "dbo")]
            struct Event {
                id: i64,
            }
        };
        let err = parse_entity(&input).unwrap_err();
        assert!(err.to_string().contains("unknown tablemap struct attribute"), "{err}");
    }

    #[test]
    fn test_unknown_field_attr_errors() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "Events")]
            struct Event {
                #[tablemap(unique)]
                id: i64,
            }
        };
        let err = parse_entity(&input).unwrap_err();
        assert!(err.to_string().contains("unknown tablemap field attribute"), "{err}");
    }

    #[test]
    fn test_duplicate_table_errors() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "A", table = "B")]
            struct Event {
                id: i64,
            }
        };
        assert!(parse_entity(&input).is_err());
    }

    #[test]
    fn test_bad_rename_rule_errors() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "A", rename_all = "SCREAMING")]
            struct Event {
                id: i64,
            }
        };
        let err = parse_entity(&input).unwrap_err();
        assert!(err.to_string().contains("rename_all"), "{err}");
    }

    #[test]
    fn test_generic_struct_rejected() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "A")]
            struct Wrapper<T> {
                inner: T,
            }
        };
        let err = parse_entity(&input).unwrap_err();
        assert!(err.to_string().contains("generic"), "{err}");
    }

    #[test]
    fn test_tuple_struct_rejected() {
        let input: DeriveInput = parse_quote! {
            #[tablemap(table = "A")]
            struct Pair(i32, i32);
        };
        assert!(parse_entity(&input).is_err());
    }
}

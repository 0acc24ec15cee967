//! Compile-time validation for the Entity derive macro.
//!
//! Declaration mistakes are reported with spans pointing at the offending
//! field. All problems are collected and reported together.

use std::collections::HashSet;

use syn::Error;

use crate::parse::EntityDef;

/// Validate a parsed entity definition.
pub fn validate_entity(entity: &EntityDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    if entity.fields.is_empty() {
        errors.push(Error::new(
            entity.name.span(),
            "Entity struct must have at least one mapped field",
        ));
    }

    if let Some(table) = &entity.table_name {
        if table.trim().is_empty() {
            errors.push(Error::new(entity.name.span(), "table name cannot be empty"));
        }
    }

    let mut seen = HashSet::new();
    for field in &entity.fields {
        if !seen.insert(field.column_name.to_lowercase()) {
            errors.push(Error::new(
                field.name.span(),
                format!("duplicate column name '{}'", field.column_name),
            ));
        }
        if field.column_name.is_empty() {
            errors.push(Error::new(field.name.span(), "column name cannot be empty"));
        }
        if (field.auto_increment || field.guid) && !field.primary_key {
            errors.push(Error::new(
                field.name.span(),
                "auto_increment and guid require primary_key",
            ));
        }
        if field.auto_increment && field.guid {
            errors.push(Error::new(
                field.name.span(),
                "a key is either auto_increment or guid, not both",
            ));
        }
        if field.primary_key && (field.created_at || field.updated_at) {
            errors.push(Error::new(
                field.name.span(),
                "a primary key cannot be a timestamp field",
            ));
        }
        if field.created_at && field.updated_at {
            errors.push(Error::new(
                field.name.span(),
                "a field is either created_at or updated_at, not both",
            ));
        }
    }

    for (flag, count) in [
        ("created_at", entity.fields.iter().filter(|f| f.created_at).count()),
        ("updated_at", entity.fields.iter().filter(|f| f.updated_at).count()),
    ] {
        if count > 1 {
            errors.push(Error::new(
                entity.name.span(),
                format!("only one field may be marked {}", flag),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

//! Per-statement parameter accumulation and clause synthesis.
//!
//! A [`ParameterBuilder`] hands out placeholders and collects the values bound
//! to them. Every value that reaches SQL through the builder travels as a
//! bound parameter; only bracket-quoted column names appear in the text.

use tablemap_core::{
    BindTarget, BoundParameter, DuplicateParameterError, Entity, Error, Result, Statement, Value,
    ValidationErrorKind, quote_bracket,
};

/// Collects bound parameters for one statement.
///
/// Placeholders are handed out in call order and never reused.
#[derive(Debug, Clone, Default)]
pub struct ParameterBuilder {
    counter: usize,
    params: Vec<BoundParameter>,
}

impl ParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to the next free `@pN` placeholder and return it.
    pub fn add_parameter(&mut self, value: impl Into<Value>) -> String {
        let name = loop {
            self.counter += 1;
            let candidate = format!("@p{}", self.counter);
            if !self.is_taken(&candidate) {
                break candidate;
            }
        };
        self.params
            .push(BoundParameter::new(name.clone(), value.into()));
        name
    }

    /// Bind `value` to `@name`. The leading `@` is optional.
    pub fn add_named_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<String> {
        let name = if name.starts_with('@') {
            name.to_string()
        } else {
            format!("@{}", name)
        };
        if self.is_taken(&name) {
            return Err(DuplicateParameterError { name }.into());
        }
        self.params
            .push(BoundParameter::new(name.clone(), value.into()));
        Ok(name)
    }

    fn is_taken(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Parameters accumulated so far, in registration order.
    pub fn parameters(&self) -> &[BoundParameter] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `WHERE [f1] = @p1 AND [f2] = @p2`, or an empty string for no conditions.
    pub fn build_where_clause(&mut self, conditions: &[(&str, Value)]) -> String {
        if conditions.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = conditions
            .iter()
            .map(|(field, value)| {
                let placeholder = self.add_parameter(value.clone());
                format!("{} = {}", quote_bracket(field), placeholder)
            })
            .collect();
        format!("WHERE {}", parts.join(" AND "))
    }

    /// WHERE clause matching `entity` on the given key columns.
    pub fn build_primary_key_where_clause<E: Entity>(
        &mut self,
        keys: &[&str],
        entity: &E,
    ) -> Result<String> {
        if keys.is_empty() {
            return Err(Error::validation(
                ValidationErrorKind::MissingPrimaryKey,
                "no primary key fields to match on",
            ));
        }
        let conditions: Vec<(&str, Value)> = keys
            .iter()
            .map(|key| (*key, field_or_null(entity, key)))
            .collect();
        Ok(self.build_where_clause(&conditions))
    }

    /// `VALUES (@p1,@p2)` with one parameter per field of `entity`.
    pub fn build_insert_values_clause<E: Entity>(&mut self, fields: &[&str], entity: &E) -> String {
        let placeholders: Vec<String> = fields
            .iter()
            .map(|field| self.add_parameter(field_or_null(entity, field)))
            .collect();
        format!("VALUES ({})", placeholders.join(","))
    }

    /// `SET [f1] = @p1, [f2] = @p2` with one parameter per field of `entity`.
    pub fn build_update_set_clause<E: Entity>(&mut self, fields: &[&str], entity: &E) -> String {
        let assignments: Vec<String> = fields
            .iter()
            .map(|field| {
                let placeholder = self.add_parameter(field_or_null(entity, field));
                format!("{} = {}", quote_bracket(field), placeholder)
            })
            .collect();
        format!("SET {}", assignments.join(", "))
    }

    /// Replace whatever `target` had bound with this builder's parameters.
    pub fn apply_parameters<T: BindTarget + ?Sized>(&self, target: &mut T) {
        target.clear_parameters();
        for param in &self.params {
            target.bind_parameter(param);
        }
    }

    /// Finish into a [`Statement`] carrying `sql` and every bound parameter.
    pub fn into_statement(self, sql: impl Into<String>) -> Statement {
        Statement {
            sql: sql.into(),
            params: self.params,
        }
    }
}

fn field_or_null<E: Entity>(entity: &E, field: &str) -> Value {
    entity.field_value(field).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tablemap_core::ParamType;
    use tablemap_macros::Entity;

    #[derive(Entity, Debug, Default)]
    #[tablemap(table = "People")]
    struct Person {
        #[tablemap(primary_key, auto_increment)]
        id: i32,
        name: String,
        age: Option<i32>,
    }

    fn bob() -> Person {
        Person {
            id: 7,
            name: "Bob".to_string(),
            age: Some(41),
        }
    }

    // ==================== Placeholders ====================

    #[test]
    fn test_positional_placeholders() {
        let mut builder = ParameterBuilder::new();
        assert_eq!(builder.add_parameter("a"), "@p1");
        assert_eq!(builder.add_parameter(2), "@p2");
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.parameters()[0].param_type, ParamType::NVarChar(4000));
        assert_eq!(builder.parameters()[1].param_type, ParamType::Int);
    }

    #[test]
    fn test_named_parameters() {
        let mut builder = ParameterBuilder::new();
        assert_eq!(builder.add_named_parameter("name", "x").unwrap(), "@name");
        assert_eq!(builder.add_named_parameter("@age", 3).unwrap(), "@age");

        let err = builder.add_named_parameter("@NAME", "y").unwrap_err();
        assert!(matches!(err, Error::DuplicateParameter(ref d) if d.name == "@NAME"));
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_positional_skips_taken_names() {
        let mut builder = ParameterBuilder::new();
        builder.add_named_parameter("p1", 0).unwrap();
        builder.add_named_parameter("P2", 0).unwrap();
        assert_eq!(builder.add_parameter(1), "@p3");
    }

    // ==================== Clauses ====================

    #[test]
    fn test_where_clause() {
        let mut builder = ParameterBuilder::new();
        let clause = builder.build_where_clause(&[
            ("Name", Value::from("Bob")),
            ("Age", Value::Int(41)),
        ]);
        assert_eq!(clause, "WHERE [Name] = @p1 AND [Age] = @p2");
        assert_eq!(builder.parameters()[0].value, Value::Text("Bob".into()));
    }

    #[test]
    fn test_empty_where_clause() {
        let mut builder = ParameterBuilder::new();
        assert_eq!(builder.build_where_clause(&[]), "");
        assert!(builder.is_empty());
    }

    #[test]
    fn test_primary_key_where_clause() {
        let mut builder = ParameterBuilder::new();
        let clause = builder
            .build_primary_key_where_clause(&["Id"], &bob())
            .unwrap();
        assert_eq!(clause, "WHERE [Id] = @p1");
        assert_eq!(builder.parameters()[0].value, Value::Int(7));

        let err = builder
            .build_primary_key_where_clause(&[], &bob())
            .unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationErrorKind::MissingPrimaryKey)
        );
    }

    #[test]
    fn test_insert_values_clause() {
        let mut builder = ParameterBuilder::new();
        let clause = builder.build_insert_values_clause(&["Name", "Age"], &bob());
        assert_eq!(clause, "VALUES (@p1,@p2)");
        assert_eq!(builder.parameters()[1].value, Value::Int(41));
    }

    #[test]
    fn test_update_set_clause() {
        let mut builder = ParameterBuilder::new();
        let set = builder.build_update_set_clause(&["Name", "Age"], &bob());
        let filter = builder
            .build_primary_key_where_clause(&["Id"], &bob())
            .unwrap();
        assert_eq!(set, "SET [Name] = @p1, [Age] = @p2");
        assert_eq!(filter, "WHERE [Id] = @p3");
    }

    #[test]
    fn test_null_field_binds_variant() {
        let person = Person {
            age: None,
            ..bob()
        };
        let mut builder = ParameterBuilder::new();
        builder.build_insert_values_clause(&["Age"], &person);
        assert_eq!(builder.parameters()[0].value, Value::Null);
        assert_eq!(builder.parameters()[0].param_type, ParamType::Variant);
    }

    // ==================== Binding ====================

    #[test]
    fn test_apply_parameters_is_idempotent() {
        let mut builder = ParameterBuilder::new();
        builder.add_parameter(1);
        builder.add_parameter("x");

        let mut stmt = Statement::new("SELECT 1");
        stmt.bind_parameter(&BoundParameter::new("@stale", Value::Null));
        builder.apply_parameters(&mut stmt);
        builder.apply_parameters(&mut stmt);

        assert_eq!(stmt.params().len(), 2);
        assert!(stmt.param("@stale").is_none());
        assert_eq!(stmt.param("@p1"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_into_statement() {
        let mut builder = ParameterBuilder::new();
        let clause = builder.build_where_clause(&[("Id", Value::Int(5))]);
        let stmt = builder.into_statement(format!("SELECT * FROM People {}", clause));
        assert_eq!(stmt.sql(), "SELECT * FROM People WHERE [Id] = @p1");
        assert_eq!(stmt.param("p1"), Some(&Value::Int(5)));
    }

    // ==================== Properties ====================

    proptest! {
        #[test]
        fn prop_placeholders_are_unique(
            ops in proptest::collection::vec(proptest::option::of("[a-z]{1,3}[0-9]?"), 0..40),
        ) {
            let mut builder = ParameterBuilder::new();
            for op in ops {
                match op {
                    Some(name) => {
                        let _ = builder.add_named_parameter(&name, 0);
                    }
                    None => {
                        builder.add_parameter(0);
                    }
                }
            }
            let mut seen = HashSet::new();
            for param in builder.parameters() {
                prop_assert!(seen.insert(param.name.to_lowercase()), "{}", param.name);
            }
        }
    }
}

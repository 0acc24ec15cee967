//! SQL identifier quoting utilities.

/// Quote a SQL identifier using T-SQL square brackets.
///
/// Embedded closing brackets are escaped by doubling them (`]` → `]]`).
///
/// # Examples
///
/// ```
/// use tablemap_core::quote_bracket;
///
/// assert_eq!(quote_bracket("Name"), "[Name]");
/// assert_eq!(quote_bracket("a]b"), "[a]]b]");
/// ```
#[inline]
pub fn quote_bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Sanitize a SQL identifier by removing non-alphanumeric/underscore characters.
///
/// Used for table names, which are emitted unbracketed.
///
/// ```
/// use tablemap_core::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("People"), "People");
/// assert_eq!(sanitize_identifier("dbo.People"), "dbo.People");
/// assert_eq!(sanitize_identifier("x;DROP TABLE--"), "xDROPTABLE");
/// ```
#[inline]
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

//! Statement synthesis and the entity collection for tablemap.
//!
//! `tablemap-query` is the **SQL construction layer**. It turns entity
//! metadata from `tablemap-core` into parameterized T-SQL and runs it through
//! a `Connector`.
//!
//! # Role In The Architecture
//!
//! - **Parameter builder**: [`ParameterBuilder`] hands out `@pN`
//!   placeholders and synthesizes WHERE / VALUES / SET clauses.
//! - **Predicates**: [`predicate::Expr`] and [`Translator`] render a closed
//!   set of filter expressions.
//! - **Injection guard**: [`validate_sql`] scores raw SQL before the `_raw`
//!   entry points run it.
//! - **Entity collection**: [`EntityCollection`] implements find, list,
//!   filter, add, edit and remove against one table.
//!
//! Most users reach these through the `tablemap` facade crate.

pub mod collection;
pub mod guard;
pub mod options;
pub mod params;
pub mod predicate;

pub use collection::EntityCollection;
pub use guard::{RiskLevel, SqlValidation, sanitize_input, validate_sql};
pub use options::{CollectionOptions, CollectionSettings, LiteralMode, RawSqlPolicy};
pub use params::ParameterBuilder;
pub use predicate::{BinaryOp, Expr, Translator};

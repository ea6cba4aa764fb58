//! Stored-view data model.
//!
//! These types mirror what the document store persists for a named view: the
//! base SQL text, the declared field schema and the declared parameters. The
//! gateway only ever reads them per execution; create/update/delete of views
//! belongs to the store collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, persisted SQL template plus declared parameters and field schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredQuery {
    /// Unique identifier of the view.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Base SQL text, possibly containing `{name}` parameter placeholders.
    pub sql: String,

    /// Ordered declared fields of the result set.
    #[serde(default)]
    pub fields: Vec<ViewField>,

    /// Ordered declared parameters.
    #[serde(default)]
    pub parameters: Vec<ViewParameter>,

    /// Inactive views are treated as not found.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Owning user, if any. Used only for catalog filtering.
    #[serde(default)]
    pub owner_id: Option<String>,

    /// Owning catalog/project, if any. Used only for catalog filtering.
    #[serde(default)]
    pub catalog_id: Option<String>,
}

fn default_active() -> bool {
    true
}

/// One declared result field of a stored view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewField {
    pub name: String,

    /// Semantic type name as declared in the store (free-form).
    #[serde(default)]
    pub field_type: String,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Optional size hint (e.g. varchar width).
    #[serde(default)]
    pub size: Option<u32>,
}

fn default_nullable() -> bool {
    true
}

/// Declared type of a view parameter, parsed case-insensitively from the
/// stored declaration. Unknown declarations fall back to `Other` and are
/// treated like strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Int,
    Decimal,
    Date,
    Other(String),
}

impl ParameterType {
    /// Parse a stored type declaration such as `"int"` or `"DECIMAL"`.
    pub fn parse(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" => ParameterType::String,
            "int" | "integer" | "bigint" | "long" => ParameterType::Int,
            "decimal" | "float" | "double" | "numeric" => ParameterType::Decimal,
            "date" => ParameterType::Date,
            other => ParameterType::Other(other.to_string()),
        }
    }
}

/// One declared parameter of a stored view.
///
/// A `{name}` placeholder in the base SQL must resolve to exactly one
/// declared parameter or substitution fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewParameter {
    pub name: String,

    /// Declared type (`string`, `int`, `decimal`, `date`, ...).
    #[serde(default)]
    pub param_type: String,

    #[serde(default)]
    pub required: bool,

    /// Default value used when the caller supplies none.
    #[serde(default)]
    pub default: Option<String>,

    /// Closed list of allowed values, when declared.
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
}

impl ViewParameter {
    /// The parsed declared type.
    pub fn parameter_type(&self) -> ParameterType {
        ParameterType::parse(&self.param_type)
    }
}

/// Logical join operator of a filter clause relative to the clause before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinOp {
    And,
    Or,
}

impl Default for JoinOp {
    fn default() -> Self {
        JoinOp::And
    }
}

impl JoinOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinOp::And => "AND",
            JoinOp::Or => "OR",
        }
    }
}

/// One caller-supplied filter clause.
///
/// A clause with an empty field name or empty condition is dropped silently
/// before SQL assembly; it is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    #[serde(default)]
    pub field: String,

    /// Comparison condition: `=`, `IN`, `BETWEEN`, `>=`, ...
    #[serde(default)]
    pub condition: String,

    #[serde(default)]
    pub values: Vec<String>,

    /// Join operator relative to the preceding clause.
    #[serde(default)]
    pub join: JoinOp,
}

impl FilterClause {
    /// True when the clause carries enough content to be rendered.
    pub fn is_renderable(&self) -> bool {
        !self.field.trim().is_empty() && !self.condition.trim().is_empty()
    }
}

/// Per-execution options supplied by the caller alongside the view id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub filters: Vec<FilterClause>,

    #[serde(default)]
    pub limit: Option<u32>,

    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl QueryOptions {
    /// True when any rewriting input (fields, filters or limit) was supplied,
    /// which means the query builder must run.
    pub fn requests_rewrite(&self) -> bool {
        !self.fields.is_empty() || !self.filters.is_empty() || self.limit.is_some()
    }
}

//! Report table definitions consumed by the report viewer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One table of a diagnose report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableDef {
    /// Category path used by the viewer navigation (e.g. `["header"]`).
    pub category: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub comment: String,
    pub column: Vec<String>,
    pub rows: Vec<TableRowDef>,
}

/// A table row; `sub_values` holds expandable detail rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TableRowDef {
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_values: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl TableRowDef {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }
}

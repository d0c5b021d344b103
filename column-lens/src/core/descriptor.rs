//! Column and table references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analyzers::classifier::{classify, ProfilingStrategy};
use crate::error::{ProfileError, Result};
use crate::security::SqlSecurity;

/// A (possibly qualified) table reference: `catalog.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    /// Creates an unqualified table reference.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// Creates a fully qualified table reference.
    pub fn qualified(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Parses a dotted path of one to three parts.
    ///
    /// ```rust
    /// use column_lens::core::TableRef;
    ///
    /// let table = TableRef::parse("main.sales.orders").unwrap();
    /// assert_eq!(table.schema.as_deref(), Some("sales"));
    /// assert!(TableRef::parse("a.b.c.d").is_err());
    /// ```
    pub fn parse(path: &str) -> Result<Self> {
        let parts: Vec<&str> = path.split('.').collect();
        let table = match parts.as_slice() {
            [table] => Self::new(*table),
            [schema, table] => Self {
                catalog: None,
                schema: Some((*schema).to_string()),
                table: (*table).to_string(),
            },
            [catalog, schema, table] => Self::qualified(*catalog, *schema, *table),
            _ => {
                return Err(ProfileError::invalid_descriptor(format!(
                    "table path '{path}' must have one to three dot-separated parts"
                )))
            }
        };
        table.validate()?;
        Ok(table)
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    fn parts(&self) -> impl Iterator<Item = &str> {
        self.catalog
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(std::iter::once(self.table.as_str()))
    }

    /// Checks every path part for emptiness and unsafe content.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.is_some() && self.schema.is_none() {
            return Err(ProfileError::invalid_descriptor(format!(
                "table '{}' has a catalog but no schema",
                self.table
            )));
        }
        self.parts()
            .try_for_each(SqlSecurity::validate_identifier)
            .map_err(|e| match e {
                ProfileError::InvalidDescriptor { message } => {
                    ProfileError::invalid_descriptor(format!("table reference: {message}"))
                }
                other => other,
            })
    }

    /// Renders the quoted table path for use in a `FROM` clause.
    pub fn to_sql(&self) -> Result<String> {
        let quoted = self
            .parts()
            .map(SqlSecurity::escape_identifier)
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join("."))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.parts().collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Identity and declared type of one column selected for profiling.
///
/// Identity is the full table path plus the column name; the declared type
/// only drives strategy selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub table: TableRef,
    pub column: String,
    pub declared_type: String,
}

impl ColumnDescriptor {
    pub fn new(table: TableRef, column: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
            declared_type: declared_type.into(),
        }
    }

    /// The dotted `table.column` path used as the snapshot mapping key.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }

    /// The profiling strategy implied by the declared type.
    pub fn strategy(&self) -> ProfilingStrategy {
        classify(&self.declared_type)
    }

    /// Rejects malformed references before any plan is built.
    pub fn validate(&self) -> Result<()> {
        self.table.validate()?;
        SqlSecurity::validate_identifier(&self.column).map_err(|e| match e {
            ProfileError::InvalidDescriptor { message } => {
                ProfileError::invalid_descriptor(format!("column reference: {message}"))
            }
            other => other,
        })
    }

    /// The quoted column name.
    pub fn column_sql(&self) -> Result<String> {
        SqlSecurity::escape_identifier(&self.column)
    }
}

impl fmt::Display for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.qualified_name(), self.declared_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_paths() {
        assert_eq!(TableRef::new("orders").to_string(), "orders");
        assert_eq!(
            TableRef::qualified("main", "sales", "orders").to_sql().unwrap(),
            "\"main\".\"sales\".\"orders\""
        );
        let parsed = TableRef::parse("sales.orders").unwrap();
        assert_eq!(parsed, TableRef::new("orders").with_schema("sales"));
    }

    #[test]
    fn test_catalog_without_schema_rejected() {
        let table = TableRef::new("orders").with_catalog("main");
        assert!(matches!(
            table.validate(),
            Err(ProfileError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_descriptor_validation() {
        let ok = ColumnDescriptor::new(TableRef::new("orders"), "amount", "DOUBLE");
        assert!(ok.validate().is_ok());
        assert_eq!(ok.qualified_name(), "orders.amount");
        assert_eq!(ok.strategy(), ProfilingStrategy::Numeric);

        let bad_column = ColumnDescriptor::new(TableRef::new("orders"), "", "INT");
        assert!(matches!(
            bad_column.validate(),
            Err(ProfileError::InvalidDescriptor { .. })
        ));

        let bad_table = ColumnDescriptor::new(TableRef::new("orders;--"), "id", "INT");
        assert!(bad_table.validate().is_err());
    }
}

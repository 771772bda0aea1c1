//! Schema-related data models.
//!
//! This module defines the reflected shape of a database: tables, their
//! columns, constraints and indexes.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Marker written into every schema document.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub references_table: String,
    pub references_column: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            references_table: table.into(),
            references_column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as reported by the catalog (e.g., `varchar(30)`)
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<String>,
    pub autoincrement: Option<bool>,
    /// Omitted entirely when the column references nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnInfo {
    /// Create a new column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            primary_key: false,
            default: None,
            autoincrement: None,
            foreign_key: None,
        }
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.primary_key = is_pk;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_autoincrement(mut self, autoincrement: bool) -> Self {
        self.autoincrement = Some(autoincrement);
        self
    }

    /// Set the referenced table and column.
    pub fn with_foreign_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef::new(table, column));
        self
    }
}

/// Kind of table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKeyConstraint,
    ForeignKeyConstraint,
    UniqueConstraint,
    CheckConstraint,
}

impl ConstraintKind {
    /// Parse from an `information_schema.table_constraints.constraint_type` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PRIMARY KEY" => Some(Self::PrimaryKeyConstraint),
            "FOREIGN KEY" => Some(Self::ForeignKeyConstraint),
            "UNIQUE" => Some(Self::UniqueConstraint),
            "CHECK" => Some(Self::CheckConstraint),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryKeyConstraint => write!(f, "PrimaryKeyConstraint"),
            Self::ForeignKeyConstraint => write!(f, "ForeignKeyConstraint"),
            Self::UniqueConstraint => write!(f, "UniqueConstraint"),
            Self::CheckConstraint => write!(f, "CheckConstraint"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    #[serde(rename = "type")]
    pub kind: ConstraintKind,
    pub name: Option<String>,
    pub columns: Vec<String>,
}

impl ConstraintInfo {
    pub fn new(kind: ConstraintKind, columns: Vec<String>) -> Self {
        Self {
            kind,
            name: None,
            columns,
        }
    }

    /// Set the constraint name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexInfo {
    /// Create a new index info.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: Some(name.into()),
            columns,
            unique: false,
        }
    }

    /// Set whether this is a unique index.
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub constraints: Vec<ConstraintInfo>,
    pub indexes: Vec<IndexInfo>,
}

impl TableSchema {
    /// Create a new table schema.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Add a column definition.
    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintInfo) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_index(mut self, index: IndexInfo) -> Self {
        self.indexes.push(index);
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Reflected tables of one database snapshot, in reflection order.
///
/// Serializes as a JSON object keyed by table name. Table names are unique;
/// inserting an existing name replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDescription {
    tables: Vec<TableSchema>,
}

impl SchemaDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: TableSchema) {
        match self
            .tables
            .iter_mut()
            .find(|t| t.table_name == table.table_name)
        {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, table_name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.table_name == table_name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Serialize for SchemaDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for table in &self.tables {
            map.serialize_entry(&table.table_name, table)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaMetadata {
    pub number_of_tables: usize,
    pub schema_version: &'static str,
}

/// Full structured schema: tables plus a small header.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDocument {
    pub tables: SchemaDescription,
    pub metadata: SchemaMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_kind_parsing() {
        assert_eq!(
            ConstraintKind::parse("PRIMARY KEY"),
            Some(ConstraintKind::PrimaryKeyConstraint)
        );
        assert_eq!(
            ConstraintKind::parse("foreign key"),
            Some(ConstraintKind::ForeignKeyConstraint)
        );
        assert_eq!(ConstraintKind::parse("UNIQUE"), Some(ConstraintKind::UniqueConstraint));
        assert_eq!(ConstraintKind::parse("NOT NULL"), None);
        assert_eq!(
            ConstraintKind::UniqueConstraint.to_string(),
            "UniqueConstraint"
        );
    }

    #[test]
    fn test_column_without_foreign_key_omits_key() {
        let column = ColumnInfo::new("name", "TEXT", true);
        let json = serde_json::to_value(&column).unwrap();
        assert!(json.get("foreign_key").is_none());
        // default and autoincrement are present even when unset
        assert!(json["default"].is_null());
        assert!(json["autoincrement"].is_null());
        assert_eq!(json["type"], "TEXT");
    }

    #[test]
    fn test_column_with_foreign_key() {
        let column = ColumnInfo::new("order_id", "INTEGER", false).with_foreign_key("orders", "id");
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["foreign_key"]["references_table"], "orders");
        assert_eq!(json["foreign_key"]["references_column"], "id");
    }

    #[test]
    fn test_description_preserves_insertion_order() {
        let description = SchemaDescription::new()
            .with_table(TableSchema::new("zebra"))
            .with_table(TableSchema::new("apple"))
            .with_table(TableSchema::new("mango"));

        let json = serde_json::to_string(&description).unwrap();
        let zebra = json.find("zebra").unwrap();
        let apple = json.find("apple").unwrap();
        let mango = json.find("mango").unwrap();
        assert!(zebra < apple && apple < mango);
    }

    #[test]
    fn test_description_replaces_duplicate_names() {
        let mut description = SchemaDescription::new();
        description.insert(TableSchema::new("users"));
        description.insert(
            TableSchema::new("users").with_column(ColumnInfo::new("id", "INTEGER", false)),
        );
        assert_eq!(description.len(), 1);
        assert_eq!(description.get("users").unwrap().columns.len(), 1);
    }

    #[test]
    fn test_table_schema_builder() {
        let schema = TableSchema::new("users")
            .with_column(ColumnInfo::new("id", "bigint", false).with_primary_key(true))
            .with_column(ColumnInfo::new("email", "varchar(255)", false))
            .with_constraint(
                ConstraintInfo::new(ConstraintKind::PrimaryKeyConstraint, vec!["id".into()])
                    .with_name("users_pkey"),
            )
            .with_index(IndexInfo::new("idx_email", vec!["email".into()]).with_unique(true));

        assert_eq!(schema.columns.len(), 2);
        assert!(schema.column("id").unwrap().primary_key);
        assert_eq!(schema.constraints[0].name.as_deref(), Some("users_pkey"));
        assert!(schema.indexes[0].unique);
    }
}

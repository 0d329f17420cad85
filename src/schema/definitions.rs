use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::schema::config::NamingConfig;
use crate::schema::errors::{
    invalid_column_error, invalid_schema_error, invalid_table_error, load_error, Result,
    SchemaDiagnostic,
};

/// Marker that turns a column into the table's optimistic-lock counter.
pub const VERSION_MARKER: &str = "@VERSION";

/// Declared SQL type of a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    TinyInt,
    /// Fixed-length character string, `CHAR(n)`
    Char(Option<u32>),
    DateTime,
    Real,
    Blob,
    /// Any other type name, emitted exactly as declared
    Custom(String),
}

impl ColumnType {
    /// Parse a declared type name, keeping unknown names verbatim.
    pub fn parse(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        match upper.as_str() {
            "TEXT" => ColumnType::Text,
            "INTEGER" => ColumnType::Integer,
            "TINYINT" => ColumnType::TinyInt,
            "CHAR" => ColumnType::Char(None),
            "DATETIME" => ColumnType::DateTime,
            "REAL" => ColumnType::Real,
            "BLOB" => ColumnType::Blob,
            _ => match parse_char_length(&upper) {
                Some(len) => ColumnType::Char(Some(len)),
                None => ColumnType::Custom(declared.trim().to_string()),
            },
        }
    }

    /// The type name as it appears in DDL.
    pub fn sql_name(&self) -> String {
        match self {
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::TinyInt => "TINYINT".to_string(),
            ColumnType::Char(None) => "CHAR".to_string(),
            ColumnType::Char(Some(len)) => format!("CHAR({})", len),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Real => "REAL".to_string(),
            ColumnType::Blob => "BLOB".to_string(),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    /// Whether values of this type are whole numbers.
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::TinyInt)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

fn parse_char_length(upper: &str) -> Option<u32> {
    let inner = upper.strip_prefix("CHAR")?.trim_start();
    let inner = inner.strip_prefix('(')?.strip_suffix(')')?;
    inner.trim().parse().ok()
}

/// Role a column plays in optimistic locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Plain,
    PrimaryKey,
    Version,
}

/// Column definition for a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    column_type: ColumnType,
    constraints: Vec<String>,
    primary_key: bool,
    version: bool,
    has_default: bool,
    /// Position of the `DEFAULT 0` pair injected for the version marker
    version_default_at: Option<usize>,
}

impl ColumnSpec {
    /// Create a plain column with no constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            constraints: Vec::new(),
            primary_key: false,
            version: false,
            has_default: false,
            version_default_at: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.constraints.push("PRIMARY".to_string());
        self.constraints.push("KEY".to_string());
        self
    }

    /// Mark this column as the optimistic-lock counter, starting at 0.
    pub fn version(mut self) -> Self {
        if self.version_default_at.is_none() {
            self.version_default_at = Some(self.constraints.len());
            self.constraints.push("DEFAULT".to_string());
            self.constraints.push("0".to_string());
        }
        self.version = true;
        self.has_default = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.has_default = true;
        self.constraints.push("DEFAULT".to_string());
        self.constraints.push(value.into());
        self
    }

    /// Append a raw constraint token, emitted verbatim.
    pub fn constraint(mut self, token: impl Into<String>) -> Self {
        self.constraints.push(token.into());
        self
    }

    /// Parse a declaration of the form `<name> <TYPE> <tokens...>`.
    ///
    /// Problems that do not prevent building the column are returned as
    /// diagnostics instead of errors.
    pub fn parse(table: &str, declaration: &str) -> Result<(ColumnSpec, Vec<SchemaDiagnostic>)> {
        let mut tokens = declaration.split_whitespace().peekable();

        let name = tokens.next().ok_or_else(|| {
            invalid_column_error(format!("empty column declaration in table {}", table))
        })?;
        let mut type_name = tokens.next().ok_or_else(|| {
            invalid_column_error(format!("column {}.{} has no type", table, name))
        })?
        .to_string();
        // Parenthesised type arguments may be split across tokens: `CHAR (4)`,
        // `DECIMAL(10, 2)`.
        if tokens.peek().is_some_and(|t| t.starts_with('(')) && !type_name.contains('(') {
            if let Some(next) = tokens.next() {
                type_name.push_str(next);
            }
        }
        while type_name.contains('(') && !type_name.contains(')') {
            match tokens.next() {
                Some(next) => {
                    type_name.push(' ');
                    type_name.push_str(next);
                }
                None => {
                    return Err(invalid_column_error(format!(
                        "column {}.{} has an unterminated type {}",
                        table, name, type_name
                    )))
                }
            }
        }

        let mut column = ColumnSpec::new(name, ColumnType::parse(&type_name));
        let mut diagnostics = Vec::new();

        while let Some(token) = tokens.next() {
            if token.eq_ignore_ascii_case(VERSION_MARKER) {
                column = column.version();
            } else if token.eq_ignore_ascii_case("PRIMARY")
                && tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("KEY"))
            {
                let key = tokens.next().unwrap_or("KEY");
                column.primary_key = true;
                column.constraints.push(token.to_string());
                column.constraints.push(key.to_string());
            } else if token.eq_ignore_ascii_case("KEY") {
                let diagnostic = SchemaDiagnostic {
                    table: table.to_string(),
                    column: name.to_string(),
                    message: "KEY without preceding PRIMARY ignored".to_string(),
                };
                diagnostics.push(diagnostic);
            } else {
                if token.eq_ignore_ascii_case("DEFAULT") {
                    column.has_default = true;
                }
                column.constraints.push(token.to_string());
            }
        }

        column.validate(table)?;
        Ok((column, diagnostics))
    }

    fn validate(&self, table: &str) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(invalid_column_error(format!(
                "{:?} in table {} is not a valid identifier",
                self.name, table
            )));
        }
        if self.primary_key && self.version {
            return Err(invalid_column_error(format!(
                "column {}.{} cannot be both primary key and version",
                table, self.name
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    /// Constraint tokens in emission order. Version columns carry `DEFAULT 0`.
    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn role(&self) -> ColumnRole {
        if self.primary_key {
            ColumnRole::PrimaryKey
        } else if self.version {
            ColumnRole::Version
        } else {
            ColumnRole::Plain
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_version(&self) -> bool {
        self.version
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    /// Column name with the configured prefix applied.
    pub fn storage_name(&self, naming: &NamingConfig) -> String {
        naming.column_name(&self.name)
    }

    /// Render the column back into its declaration form.
    pub fn declaration(&self) -> String {
        let mut parts = vec![self.name.clone(), self.column_type.sql_name()];
        let mut i = 0;
        while i < self.constraints.len() {
            if Some(i) == self.version_default_at {
                parts.push(VERSION_MARKER.to_string());
                i += 2;
                continue;
            }
            parts.push(self.constraints[i].clone());
            i += 1;
        }
        parts.join(" ")
    }
}

/// Validated table definition.
///
/// Every table has exactly one primary-key column and exactly one version
/// column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDocument", into = "TableDocument")]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    key_index: usize,
    version_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDocument {
    name: String,
    columns: Vec<String>,
}

impl TryFrom<TableDocument> for TableSpec {
    type Error = crate::schema::Error;

    fn try_from(doc: TableDocument) -> Result<Self> {
        let declarations: Vec<&str> = doc.columns.iter().map(String::as_str).collect();
        TableSpec::from_descriptor(&doc.name, &declarations)
    }
}

impl From<TableSpec> for TableDocument {
    fn from(table: TableSpec) -> Self {
        TableDocument {
            columns: table.columns.iter().map(ColumnSpec::declaration).collect(),
            name: table.name,
        }
    }
}

impl TableSpec {
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Build a table from column declaration strings, logging diagnostics.
    pub fn from_descriptor(name: &str, declarations: &[&str]) -> Result<TableSpec> {
        let (table, diagnostics) = Self::from_descriptor_with_diagnostics(name, declarations)?;
        for diagnostic in &diagnostics {
            tracing::warn!(
                table = %diagnostic.table,
                column = %diagnostic.column,
                "{}",
                diagnostic.message
            );
        }
        Ok(table)
    }

    /// Build a table from column declaration strings, returning diagnostics.
    pub fn from_descriptor_with_diagnostics(
        name: &str,
        declarations: &[&str],
    ) -> Result<(TableSpec, Vec<SchemaDiagnostic>)> {
        let mut builder = TableSpec::builder(name);
        let mut diagnostics = Vec::new();
        for declaration in declarations {
            let (column, mut found) = ColumnSpec::parse(name, declaration)?;
            diagnostics.append(&mut found);
            builder = builder.column(column);
        }
        Ok((builder.build()?, diagnostics))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name with the configured prefix applied.
    pub fn storage_name(&self, naming: &NamingConfig) -> String {
        naming.table_name(&self.name)
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index of the column whose storage name is `storage_name`.
    pub fn storage_column_index(&self, naming: &NamingConfig, storage_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.storage_name(naming) == storage_name)
    }

    pub fn primary_key(&self) -> &ColumnSpec {
        &self.columns[self.key_index]
    }

    pub fn primary_key_index(&self) -> usize {
        self.key_index
    }

    pub fn version_column(&self) -> &ColumnSpec {
        &self.columns[self.version_index]
    }

    pub fn version_index(&self) -> usize {
        self.version_index
    }
}

/// Incremental constructor for [`TableSpec`]; rules are checked in `build`.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableBuilder {
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<TableSpec> {
        let name = self.name;
        if !is_valid_identifier(&name) {
            return Err(invalid_table_error(format!(
                "{:?} is not a valid table name",
                name
            )));
        }
        if self.columns.is_empty() {
            return Err(invalid_table_error(format!("table {} has no columns", name)));
        }

        for (i, column) in self.columns.iter().enumerate() {
            column.validate(&name)?;
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(invalid_table_error(format!(
                    "table {} declares column {} twice",
                    name, column.name
                )));
            }
        }

        let key_index = single_index(&name, &self.columns, ColumnSpec::is_primary_key, "primary key")?;
        let version_index = single_index(&name, &self.columns, ColumnSpec::is_version, "version")?;

        Ok(TableSpec {
            name,
            columns: self.columns,
            key_index,
            version_index,
        })
    }
}

fn single_index(
    table: &str,
    columns: &[ColumnSpec],
    pred: fn(&ColumnSpec) -> bool,
    what: &str,
) -> Result<usize> {
    let matching: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| pred(c))
        .map(|(i, _)| i)
        .collect();
    match matching.as_slice() {
        [index] => Ok(*index),
        [] => Err(invalid_table_error(format!(
            "table {} has no {} column",
            table, what
        ))),
        _ => Err(invalid_table_error(format!(
            "table {} has {} {} columns, expected exactly one",
            table,
            matching.len(),
            what
        ))),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An ordered set of tables sharing one naming configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDocument", into = "SchemaDocument")]
pub struct Schema {
    naming: NamingConfig,
    tables: Vec<Arc<TableSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    naming: NamingConfig,
    tables: Vec<TableSpec>,
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = crate::schema::Error;

    fn try_from(doc: SchemaDocument) -> Result<Self> {
        Schema::new(doc.naming, doc.tables)
    }
}

impl From<Schema> for SchemaDocument {
    fn from(schema: Schema) -> Self {
        SchemaDocument {
            naming: schema.naming,
            tables: schema
                .tables
                .into_iter()
                .map(|t| Arc::try_unwrap(t).unwrap_or_else(|shared| (*shared).clone()))
                .collect(),
        }
    }
}

impl Schema {
    pub fn new(naming: NamingConfig, tables: Vec<TableSpec>) -> Result<Self> {
        for (i, table) in tables.iter().enumerate() {
            if tables[..i].iter().any(|t| t.name == table.name) {
                return Err(invalid_schema_error(format!(
                    "table {} declared twice",
                    table.name
                )));
            }
        }
        Ok(Self {
            naming,
            tables: tables.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    pub fn tables(&self) -> &[Arc<TableSpec>] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableSpec>> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| load_error(e.to_string()))
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| load_error(e.to_string()))
    }

    /// Load a schema file, trying YAML first and falling back to JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| load_error(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content).or_else(|yaml_err| {
            Self::from_json_str(&content).map_err(|json_err| {
                load_error(format!(
                    "{} is neither a valid YAML ({}) nor JSON ({}) schema",
                    path.display(),
                    yaml_err,
                    json_err
                ))
            })
        })
    }
}

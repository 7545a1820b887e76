//! Database schema definitions

use std::borrow::Cow;

/// SQL to create the objects table
pub const CREATE_OBJECTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
  resource TEXT NOT NULL,
  obj_id   INTEGER NOT NULL,
  updated  TEXT NOT NULL,
  payload  TEXT NOT NULL,
  PRIMARY KEY (resource, obj_id)
)"#;

/// SQL to create the per-resource recency index
pub const CREATE_OBJECTS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS objects_resource_updated_idx
  ON objects (resource, updated DESC)"#;

pub const DROP_OBJECTS_TABLE: &str = "DROP TABLE IF EXISTS objects";

/// All schema creation statements
pub fn all_schema_statements() -> [&'static str; 2] {
    [CREATE_OBJECTS_TABLE, CREATE_OBJECTS_INDEX]
}

/// Contents of `00_schema.sql`. Safe to apply repeatedly.
pub fn schema_script() -> String {
    let mut script = String::new();
    for stmt in all_schema_statements() {
        script.push_str(stmt);
        script.push_str(";\n");
    }
    script
}

/// Doubles single quotes so `s` can sit inside a SQL string literal.
pub fn escape_literal(s: &str) -> Cow<'_, str> {
    if s.contains('\'') {
        Cow::Owned(s.replace('\'', "''"))
    } else {
        Cow::Borrowed(s)
    }
}

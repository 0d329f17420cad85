//! SQL literals rendered for inlining into generated statements.

use std::fmt;

use crate::database::DatabaseValue;

/// A value already rendered as SQLite literal text (`NULL`, `42`, `1.5`,
/// `'O''Brien'`, `X'0A0B'`).
///
/// String content is escaped by doubling embedded single quotes, so a literal
/// can be spliced into a statement without further quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SqlLiteral(String);

impl SqlLiteral {
    pub fn null() -> Self {
        SqlLiteral("NULL".to_string())
    }

    pub fn integer(value: i64) -> Self {
        SqlLiteral(value.to_string())
    }

    /// Non-finite floats have no SQL spelling and render as `NULL`.
    pub fn float(value: f64) -> Self {
        if value.is_finite() {
            SqlLiteral(format!("{:?}", value))
        } else {
            Self::null()
        }
    }

    pub fn text(value: &str) -> Self {
        SqlLiteral(format!("'{}'", value.replace('\'', "''")))
    }

    pub fn blob(value: &[u8]) -> Self {
        let hex: String = value.iter().map(|b| format!("{:02X}", b)).collect();
        SqlLiteral(format!("X'{}'", hex))
    }

    /// Render a typed value.
    pub fn from_value(value: &DatabaseValue) -> Self {
        match value {
            DatabaseValue::Null => Self::null(),
            DatabaseValue::Boolean(b) => Self::integer(i64::from(*b)),
            DatabaseValue::Integer(i) => Self::integer(*i),
            DatabaseValue::Float(f) => Self::float(*f),
            DatabaseValue::Text(s) => Self::text(s),
            DatabaseValue::Blob(b) => Self::blob(b),
        }
    }

    /// The literal as it appears in SQL text.
    pub fn as_sql(&self) -> &str {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.eq_ignore_ascii_case("NULL")
    }

    /// Decode the literal back into a typed value.
    pub fn to_value(&self) -> DatabaseValue {
        let sql = self.0.as_str();
        if self.is_null() {
            return DatabaseValue::Null;
        }
        if sql.len() >= 2 && sql.starts_with('\'') && sql.ends_with('\'') {
            return DatabaseValue::Text(sql[1..sql.len() - 1].replace("''", "'"));
        }
        if sql.len() >= 3 && (sql.starts_with("X'") || sql.starts_with("x'")) && sql.ends_with('\'')
        {
            if let Some(bytes) = decode_hex(&sql[2..sql.len() - 1]) {
                return DatabaseValue::Blob(bytes);
            }
        }
        if let Ok(i) = sql.parse::<i64>() {
            return DatabaseValue::Integer(i);
        }
        if let Ok(f) = sql.parse::<f64>() {
            return DatabaseValue::Float(f);
        }
        DatabaseValue::Text(sql.to_string())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.to_value() {
            DatabaseValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.to_value() {
            DatabaseValue::Integer(i) => Some(i as f64),
            DatabaseValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self.to_value() {
            DatabaseValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&DatabaseValue> for SqlLiteral {
    fn from(value: &DatabaseValue) -> Self {
        SqlLiteral::from_value(value)
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_literal_doubles_quotes() {
        let literal = SqlLiteral::text("O'Brien's");
        assert_eq!(literal.as_sql(), "'O''Brien''s'");
        assert_eq!(literal.as_text().as_deref(), Some("O'Brien's"));
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(SqlLiteral::integer(-7).as_sql(), "-7");
        assert_eq!(SqlLiteral::float(150.0).as_sql(), "150.0");
        assert_eq!(SqlLiteral::float(f64::NAN), SqlLiteral::null());
        assert_eq!(SqlLiteral::integer(12).as_f64(), Some(12.0));
    }

    #[test]
    fn test_quoted_digits_stay_text() {
        let literal = SqlLiteral::text("42");
        assert_eq!(literal.to_value(), DatabaseValue::Text("42".to_string()));
        assert_eq!(literal.as_i64(), None);
    }

    #[test]
    fn test_blob_and_boolean() {
        let blob = SqlLiteral::from_value(&DatabaseValue::Blob(vec![0x0a, 0xff]));
        assert_eq!(blob.as_sql(), "X'0AFF'");
        assert_eq!(blob.to_value(), DatabaseValue::Blob(vec![0x0a, 0xff]));
        assert_eq!(SqlLiteral::from_value(&DatabaseValue::Boolean(true)).as_sql(), "1");
    }

    #[test]
    fn test_null() {
        assert!(SqlLiteral::null().is_null());
        assert_eq!(SqlLiteral::null().to_value(), DatabaseValue::Null);
    }
}

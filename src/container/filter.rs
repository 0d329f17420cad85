use std::cmp::Ordering;

use crate::database::{DatabaseValue, SqlLiteral};

/// Predicate narrowing the rows a container exposes.
///
/// Columns are addressed by storage name. Comparisons follow SQL: a NULL
/// operand or values of unrelated types never match.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Equal(String, DatabaseValue),
    NotEqual(String, DatabaseValue),
    Less(String, DatabaseValue),
    LessOrEqual(String, DatabaseValue),
    Greater(String, DatabaseValue),
    GreaterOrEqual(String, DatabaseValue),
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn equal(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::Equal(column.into(), value.into())
    }

    pub fn not_equal(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::NotEqual(column.into(), value.into())
    }

    pub fn less(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::Less(column.into(), value.into())
    }

    pub fn less_or_equal(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::LessOrEqual(column.into(), value.into())
    }

    pub fn greater(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::Greater(column.into(), value.into())
    }

    pub fn greater_or_equal(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Filter::GreaterOrEqual(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Every column name the filter refers to.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Equal(c, _)
            | Filter::NotEqual(c, _)
            | Filter::Less(c, _)
            | Filter::LessOrEqual(c, _)
            | Filter::Greater(c, _)
            | Filter::GreaterOrEqual(c, _)
            | Filter::IsNull(c) => out.push(c),
            Filter::And(filters) | Filter::Or(filters) => {
                for filter in filters {
                    filter.collect_columns(out);
                }
            }
            Filter::Not(filter) => filter.collect_columns(out),
        }
    }

    /// Evaluate against a row, `lookup` yielding the current value of a column.
    pub fn matches<'a, F>(&self, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<&'a SqlLiteral>,
    {
        match self {
            Filter::Equal(c, v) => compare(lookup(c.as_str()), v) == Some(Ordering::Equal),
            Filter::NotEqual(c, v) => {
                matches!(compare(lookup(c.as_str()), v), Some(Ordering::Less | Ordering::Greater))
            }
            Filter::Less(c, v) => compare(lookup(c.as_str()), v) == Some(Ordering::Less),
            Filter::LessOrEqual(c, v) => {
                matches!(compare(lookup(c.as_str()), v), Some(Ordering::Less | Ordering::Equal))
            }
            Filter::Greater(c, v) => compare(lookup(c.as_str()), v) == Some(Ordering::Greater),
            Filter::GreaterOrEqual(c, v) => {
                matches!(compare(lookup(c.as_str()), v), Some(Ordering::Greater | Ordering::Equal))
            }
            Filter::IsNull(c) => lookup(c.as_str()).map_or(true, SqlLiteral::is_null),
            Filter::And(filters) => filters.iter().all(|f| f.matches(lookup)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(lookup)),
            Filter::Not(filter) => !filter.matches(lookup),
        }
    }
}

fn compare(stored: Option<&SqlLiteral>, operand: &DatabaseValue) -> Option<Ordering> {
    let stored = stored?.to_value();
    compare_values(&stored, operand)
}

/// Order two values of compatible types; `None` when either is NULL or the
/// types are unrelated.
pub fn compare_values(a: &DatabaseValue, b: &DatabaseValue) -> Option<Ordering> {
    use DatabaseValue::*;
    match (numeric(a), numeric(b)) {
        (Some(Integer(x)), Some(Integer(y))) => return Some(x.cmp(&y)),
        (Some(x), Some(y)) => return as_f64(&x)?.partial_cmp(&as_f64(&y)?),
        _ => {}
    }
    match (a, b) {
        (Text(x), Text(y)) => Some(x.cmp(y)),
        (Blob(x), Blob(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn numeric(value: &DatabaseValue) -> Option<DatabaseValue> {
    match value {
        DatabaseValue::Boolean(b) => Some(DatabaseValue::Integer(i64::from(*b))),
        DatabaseValue::Integer(_) | DatabaseValue::Float(_) => Some(value.clone()),
        _ => None,
    }
}

fn as_f64(value: &DatabaseValue) -> Option<f64> {
    match value {
        DatabaseValue::Integer(i) => Some(*i as f64),
        DatabaseValue::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in<'a>(
        values: &'a HashMap<&'static str, SqlLiteral>,
    ) -> impl Fn(&str) -> Option<&'a SqlLiteral> + 'a {
        move |column: &str| values.get(column)
    }

    fn flight() -> HashMap<&'static str, SqlLiteral> {
        let mut values = HashMap::new();
        values.insert("c_username", SqlLiteral::text("pilot"));
        values.insert("c_flight_type", SqlLiteral::integer(2));
        values.insert("c_date", SqlLiteral::text("2012-05-14"));
        values.insert("c_onblock_time", SqlLiteral::float(1.5));
        values
    }

    #[test]
    fn test_comparisons() {
        let values = flight();
        let lookup = lookup_in(&values);

        assert!(Filter::equal("c_username", "pilot").matches(&lookup));
        assert!(!Filter::equal("c_username", "other").matches(&lookup));
        assert!(Filter::not_equal("c_username", "other").matches(&lookup));
        assert!(Filter::less_or_equal("c_flight_type", 2).matches(&lookup));
        assert!(Filter::greater("c_flight_type", 1.5).matches(&lookup));
        assert!(Filter::greater_or_equal("c_date", "2012-01-01").matches(&lookup));
        assert!(Filter::less("c_onblock_time", 2).matches(&lookup));
    }

    #[test]
    fn test_null_and_mismatched_types_never_match() {
        let values = flight();
        let lookup = lookup_in(&values);

        assert!(Filter::is_null("c_notes").matches(&lookup));
        assert!(!Filter::is_null("c_username").matches(&lookup));
        assert!(!Filter::equal("c_notes", "x").matches(&lookup));
        assert!(!Filter::not_equal("c_notes", "x").matches(&lookup));
        assert!(!Filter::equal("c_flight_type", "2").matches(&lookup));
        assert!(!Filter::equal("c_username", DatabaseValue::Null).matches(&lookup));
    }

    #[test]
    fn test_combinators() {
        let values = flight();
        let lookup = lookup_in(&values);

        let range = Filter::and([
            Filter::greater_or_equal("c_date", "2012-05-01"),
            Filter::less_or_equal("c_date", "2012-05-31"),
        ]);
        assert!(range.matches(&lookup));
        assert!(Filter::or([Filter::equal("c_flight_type", 9), range.clone()]).matches(&lookup));
        assert!(!Filter::negate(range.clone()).matches(&lookup));
        assert!(Filter::and([]).matches(&lookup));
        assert!(!Filter::or([]).matches(&lookup));
        assert_eq!(range.columns(), ["c_date", "c_date"]);
    }

    #[test]
    fn test_compare_values() {
        use DatabaseValue::*;
        assert_eq!(compare_values(&Integer(2), &Float(2.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&Boolean(true), &Integer(1)), Some(Ordering::Equal));
        assert_eq!(compare_values(&Text("a".into()), &Text("b".into())), Some(Ordering::Less));
        assert_eq!(compare_values(&Null, &Null), None);
        assert_eq!(compare_values(&Text("1".into()), &Integer(1)), None);
    }
}

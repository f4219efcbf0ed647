//! Ordered column sets shared by the results and history tables.

use crate::error::RelayError;

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Ordered, non-empty list of column names.
///
/// The order is the catalog's ordinal order of the results table and is
/// carried verbatim into both sides of the relay statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSet(Vec<String>);

impl ColumnSet {
    pub fn new(names: Vec<String>) -> Result<Self, RelayError> {
        if names.is_empty() {
            return Err(RelayError::EmptyColumnSet);
        }
        Ok(Self(names))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    /// Names of this set that `other` does not carry, in this set's order.
    pub fn missing_from<'a>(&'a self, other: &[String]) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|c| !other.contains(c))
            .map(String::as_str)
            .collect()
    }

    /// Comma-separated, backtick-quoted column list for SQL.
    pub fn to_sql_list(&self) -> String {
        self.0
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> ColumnSet {
        ColumnSet::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_empty_column_set_is_rejected() {
        let err = ColumnSet::new(vec![]).unwrap_err();
        assert!(matches!(err, RelayError::EmptyColumnSet));
    }

    #[test]
    fn test_sql_list_keeps_order() {
        let set = cols(&["ts", "run_id", "checksum"]);
        assert_eq!(set.to_sql_list(), "`ts`, `run_id`, `checksum`");
    }

    #[test]
    fn test_quote_identifier_escapes_backticks() {
        assert_eq!(quote_identifier("odd`name"), "`odd``name`");
        assert_eq!(quote_identifier("plain"), "`plain`");
    }

    #[test]
    fn test_missing_from() {
        let set = cols(&["run_id", "chunk_id", "ts"]);
        let other = vec!["ts".to_string(), "run_id".to_string()];
        assert_eq!(set.missing_from(&other), vec!["chunk_id"]);
        assert!(set.contains("ts"));
        assert!(!set.contains("nope"));
    }
}

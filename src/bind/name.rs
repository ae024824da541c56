use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// A parsed request-parameter key.
///
/// Distinguishes the literal submitted form (`items[3].name`) from the
/// "stripped" canonical form with indexing removed (`items.name`), which is
/// what validation metadata and property definitions are keyed by.
///
/// Ordering is lexicographic over the literal name, which places a plain
/// name before any of its indexed or nested extensions — required so that
/// required-field checks on indexed collections see whether *any* row of
/// the collection was submitted before judging individual rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterName {
    name: String,
    stripped: String,
    indexed: bool,
}

impl ParameterName {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        let mut stripped = String::with_capacity(name.len());
        let mut in_index = false;
        for c in name.chars() {
            match c {
                '[' if !in_index => in_index = true,
                ']' if in_index => in_index = false,
                _ if !in_index => stripped.push(c),
                _ => {}
            }
        }
        let indexed = stripped.len() != name.len();
        ParameterName {
            name,
            stripped,
            indexed,
        }
    }

    /// The exact name as submitted.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical name with index brackets removed.
    #[must_use]
    pub fn stripped(&self) -> &str {
        &self.stripped
    }

    /// True if the submitted name carried index brackets.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// For indexed names, the prefix up to and including the first closing
    /// bracket (`items[3]` for `items[3].name`) — the key that groups one
    /// "row" of an indexed collection.
    #[must_use]
    pub fn row_key(&self) -> Option<&str> {
        if !self.indexed {
            return None;
        }
        self.name.find(']').map(|pos| &self.name[..=pos])
    }
}

impl Ord for ParameterName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl PartialOrd for ParameterName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for ParameterName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripping_removes_index_brackets() {
        let name = ParameterName::new("items[3].name");
        assert_eq!(name.name(), "items[3].name");
        assert_eq!(name.stripped(), "items.name");
        assert!(name.is_indexed());
        assert_eq!(name.row_key(), Some("items[3]"));
    }

    #[test]
    fn plain_names_are_unchanged() {
        let name = ParameterName::new("email");
        assert_eq!(name.stripped(), "email");
        assert!(!name.is_indexed());
        assert_eq!(name.row_key(), None);
    }

    #[test]
    fn simple_names_sort_before_their_extensions() {
        let mut names = vec![
            ParameterName::new("items[0].name"),
            ParameterName::new("items"),
        ];
        names.sort();
        assert_eq!(names[0].name(), "items");
    }
}

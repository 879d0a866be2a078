//! Identifiers exempt from replacement.

use std::collections::HashSet;

/// Read-only set of logins that must never be deactivated, deleted or
/// recreated. Matching ignores case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct SafeList {
    entries: HashSet<String>,
}

impl SafeList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| normalize(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains(&normalize(id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_is_case_insensitive() {
        let list = SafeList::new(["Admin@Example.com ", "", "ops@example.com"]);
        assert_eq!(list.len(), 2);
        assert!(list.contains("admin@example.com"));
        assert!(list.contains("  OPS@example.com"));
        assert!(!list.contains("user@example.com"));
    }

    #[test]
    fn test_empty_list() {
        let list = SafeList::default();
        assert!(list.is_empty());
        assert!(!list.contains(""));
    }
}

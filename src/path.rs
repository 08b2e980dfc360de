//! Path splitting.
//!
//! Paths are slash-delimited and root-anchored. They are never persisted;
//! components are derived per call.

/// Splits a path into its components. The root is excluded; the leaf comes
/// last. Empty components (repeated or trailing slashes) are dropped.
pub fn split(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// The last component of a path, or `None` for the root.
pub fn leaf_name(path: &str) -> Option<&str> {
    split(path).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_root() {
        assert!(split("/").is_empty());
    }

    #[test]
    fn test_split_nested() {
        assert_eq!(split("/a/b/c.txt"), vec!["a", "b", "c.txt"]);
    }

    #[test]
    fn test_split_drops_repeated_slashes() {
        assert_eq!(split("//a///b/"), vec!["a", "b"]);
    }

    #[test]
    fn test_leaf_name() {
        assert_eq!(leaf_name("/a/b.txt"), Some("b.txt"));
        assert_eq!(leaf_name("/top"), Some("top"));
        assert_eq!(leaf_name("/"), None);
    }
}

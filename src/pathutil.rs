//! Path utilities treated as primitives by the specification
//!
//! Paths in a [`crate::tree::Tree`] are always normalised: forward-slash
//! separated, relative to the replica root, with no leading or trailing
//! slash. These helpers are intentionally string-based rather than going
//! through `std::path::Path`, since replica paths are not necessarily valid
//! paths on the host platform (the remote side may be an object-store key).

/// Return the parent of `path`, or `None` if `path` is already at the root
/// (no `/` separator).
#[must_use]
pub fn dirname(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Return the final path component.
#[must_use]
pub fn basename(path: &str) -> &str {
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

/// Join a replica root URI with a normalised relative path.
#[must_use]
pub fn join_uri(root: &str, path: &str) -> String {
    if path.is_empty() {
        root.to_string()
    } else if root.ends_with('/') {
        format!("{root}{path}")
    } else {
        format!("{root}/{path}")
    }
}

/// Split a basename into `(stem, extension-with-dot)`, matching the
/// convention used for the conflict-suffix naming rule: the suffix goes
/// before the extension, if any.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::{basename, dirname, join_uri, split_extension};

    #[test]
    fn dirname_nested() {
        assert_eq!(dirname("a/b/c.txt"), Some("a/b"));
    }

    #[test]
    fn dirname_at_root() {
        assert_eq!(dirname("c.txt"), None);
    }

    #[test]
    fn basename_nested() {
        assert_eq!(basename("a/b/c.txt"), "c.txt");
    }

    #[test]
    fn join_uri_no_trailing_slash() {
        assert_eq!(join_uri("s3://bucket", "a/b.txt"), "s3://bucket/a/b.txt");
    }

    #[test]
    fn join_uri_trailing_slash() {
        assert_eq!(join_uri("s3://bucket/", "a/b.txt"), "s3://bucket/a/b.txt");
    }

    #[test]
    fn split_extension_simple() {
        assert_eq!(split_extension("a.txt"), ("a", ".txt"));
    }

    #[test]
    fn split_extension_none() {
        assert_eq!(split_extension("README"), ("README", ""));
    }

    #[test]
    fn split_extension_dotfile() {
        assert_eq!(split_extension(".gitignore"), (".gitignore", ""));
    }
}

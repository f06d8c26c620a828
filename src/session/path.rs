//! Lexical path resolution for emulated `cd`.
//!
//! Nothing here touches the remote host. The results are only a proposal;
//! the host's answer to `cd <target> && pwd` is what gets recorded.

use std::fmt;

/// Where a `cd` target should be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    /// A normalized absolute path.
    Absolute(String),
    /// A home-relative target (`~` or `~/rest`) for the remote shell to
    /// expand. Holds the part after `~/`, empty for plain `~`.
    Home(String),
}

impl fmt::Display for CdTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(path) => f.write_str(path),
            Self::Home(rest) if rest.is_empty() => f.write_str("~"),
            Self::Home(rest) => write!(f, "~/{}", rest),
        }
    }
}

/// Resolve a `cd` argument against the current directory.
///
/// Relative targets are appended to `current` and the result is
/// normalized. Home-relative targets are kept as-is since only the host
/// knows the home directory.
pub fn resolve_target(current: &str, target: &str) -> CdTarget {
    if target == "~" {
        return CdTarget::Home(String::new());
    }
    if let Some(rest) = target.strip_prefix("~/") {
        return CdTarget::Home(normalize_relative(rest));
    }

    let joined = if target.starts_with('/') {
        target.to_string()
    } else if current == "/" {
        format!("/{}", target)
    } else {
        format!("{}/{}", current, target)
    };

    CdTarget::Absolute(normalize(&joined))
}

/// Collapse `.`, `..` and repeated separators in an absolute path.
///
/// `..` at the root stays at the root. A trailing separator is dropped.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("/{}", parts.join("/"))
}

/// Normalize a relative path, keeping leading `..` segments that cannot be
/// collapsed.
fn normalize_relative(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    parts.join("/")
}

//! Client-side navigation set and history.
//!
//! Pages declare which sibling paths share their live session via an
//! embedded metadata blob:
//!
//! ```json
//! {"sibling_paths": ["/users", "/users/:id"], "enable_pjax": false}
//! ```
//!
//! A navigation to a declared path becomes a lightweight `relocate` over
//! the existing transport instead of a full page load. Patterns are plain
//! path literals where a `:name` segment matches exactly one path segment.
//! With `enable_pjax` every same-origin path relocates.
//!
//! The history is the headless analog of the browser session history: a
//! stack of visited paths that [`back`](History::back) unwinds.

// ============================================================================
// Imports
// ============================================================================

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

// ============================================================================
// NavigationMeta
// ============================================================================

/// The raw navigation blob embedded in a page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigationMeta {
    /// Declared sibling path patterns.
    pub sibling_paths: Vec<String>,

    /// Whether every same-origin path relocates.
    pub enable_pjax: bool,
}

impl NavigationMeta {
    /// Parses the metadata blob from its JSON text.
    ///
    /// Malformed JSON yields the empty set rather than an error; a page
    /// without usable metadata simply navigates with full loads.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(error = %e, "Malformed navigation metadata. Using empty set");
                Self::default()
            }
        }
    }
}

// ============================================================================
// PathPattern
// ============================================================================

/// One compiled sibling-path pattern.
#[derive(Debug, Clone)]
struct PathPattern {
    /// The pattern as declared, for logging.
    raw: String,
    /// Anchored matcher with `:name` segments as single-segment wildcards.
    regex: Regex,
}

impl PathPattern {
    /// Compiles a declared pattern. `None` for patterns that do not form
    /// a valid matcher.
    fn compile(pattern: &str) -> Option<Self> {
        let mut source = String::from("^");
        for (i, segment) in pattern.split('/').enumerate() {
            if i > 0 {
                source.push('/');
            }
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    debug!(pattern, "Empty parameter segment in navigation pattern");
                    return None;
                }
                source.push_str("[^/]+");
            } else {
                source.push_str(&regex::escape(segment));
            }
        }
        source.push('$');

        match Regex::new(&source) {
            Ok(regex) => Some(Self {
                raw: pattern.to_string(),
                regex,
            }),
            Err(e) => {
                debug!(pattern, error = %e, "Unusable navigation pattern");
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

// ============================================================================
// NavigationSet
// ============================================================================

/// The compiled set of paths that relocate instead of full-loading.
#[derive(Debug, Clone, Default)]
pub struct NavigationSet {
    patterns: Vec<PathPattern>,
    pjax: bool,
}

impl NavigationSet {
    /// Compiles a navigation set from page metadata, skipping unusable
    /// patterns.
    #[must_use]
    pub fn from_meta(meta: &NavigationMeta) -> Self {
        let patterns = meta
            .sibling_paths
            .iter()
            .filter_map(|pattern| PathPattern::compile(pattern))
            .collect();
        Self {
            patterns,
            pjax: meta.enable_pjax,
        }
    }

    /// Returns `true` when a navigation to `path` should relocate over
    /// the live transport.
    ///
    /// Query strings do not participate in matching.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.pjax {
            return true;
        }
        let bare = path.split(['?', '#']).next().unwrap_or(path);
        let bare = normalize(bare);
        self.patterns.iter().any(|p| p.matches(bare))
    }

    /// Returns the declared patterns that compiled.
    #[must_use]
    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.raw.as_str()).collect()
    }
}

/// Strips a single trailing slash; the root path stays `/`.
fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

// ============================================================================
// History
// ============================================================================

/// Headless session history: a stack of visited paths.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    /// Records a visit. Re-visiting the current path is a no-op.
    pub fn record(&mut self, path: &str) {
        if self.entries.last().is_some_and(|current| current == path) {
            return;
        }
        self.entries.push(path.to_string());
    }

    /// Unwinds one entry and returns the path to return to.
    ///
    /// `None` when there is nothing earlier to return to.
    pub fn back(&mut self) -> Option<String> {
        if self.entries.len() < 2 {
            return None;
        }
        self.entries.pop();
        self.entries.last().cloned()
    }

    /// The path currently on top of the stack.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str], pjax: bool) -> NavigationSet {
        NavigationSet::from_meta(&NavigationMeta {
            sibling_paths: patterns.iter().map(ToString::to_string).collect(),
            enable_pjax: pjax,
        })
    }

    #[test]
    fn test_meta_parse() {
        let meta =
            NavigationMeta::parse(r#"{"sibling_paths":["/a","/b/:id"],"enable_pjax":true}"#);
        assert_eq!(meta.sibling_paths, vec!["/a", "/b/:id"]);
        assert!(meta.enable_pjax);
    }

    #[test]
    fn test_meta_parse_malformed_is_empty() {
        let meta = NavigationMeta::parse("not json");
        assert!(meta.sibling_paths.is_empty());
        assert!(!meta.enable_pjax);
    }

    #[test]
    fn test_literal_pattern() {
        let set = set(&["/users"], false);
        assert!(set.matches("/users"));
        assert!(set.matches("/users/"));
        assert!(!set.matches("/users/42"));
        assert!(!set.matches("/admin"));
    }

    #[test]
    fn test_param_segment_matches_exactly_one() {
        let set = set(&["/users/:id"], false);
        assert!(set.matches("/users/42"));
        assert!(set.matches("/users/alice"));
        assert!(!set.matches("/users"));
        assert!(!set.matches("/users/42/edit"));
    }

    #[test]
    fn test_multiple_params() {
        let set = set(&["/projects/:project/tasks/:task"], false);
        assert!(set.matches("/projects/p1/tasks/t9"));
        assert!(!set.matches("/projects/p1/tasks"));
    }

    #[test]
    fn test_query_string_and_fragment_ignored() {
        let set = set(&["/search"], false);
        assert!(set.matches("/search?q=rust"));
        assert!(set.matches("/search#results"));
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        // a dot in the declared path must not act as a wildcard
        let set = set(&["/files/v1.2"], false);
        assert!(set.matches("/files/v1.2"));
        assert!(!set.matches("/files/v1x2"));
    }

    #[test]
    fn test_pjax_matches_everything() {
        let set = set(&[], true);
        assert!(set.matches("/anything/at/all"));
    }

    #[test]
    fn test_unusable_pattern_is_skipped() {
        let set = set(&["/ok", "/bad/:"], false);
        assert_eq!(set.patterns(), vec!["/ok"]);
        assert!(set.matches("/ok"));
    }

    #[test]
    fn test_history_record_and_back() {
        let mut history = History::default();
        history.record("/");
        history.record("/users");
        history.record("/users/42");

        assert_eq!(history.current(), Some("/users/42"));
        assert_eq!(history.back().as_deref(), Some("/users"));
        assert_eq!(history.back().as_deref(), Some("/"));
        assert_eq!(history.back(), None);
        assert_eq!(history.current(), Some("/"));
    }

    #[test]
    fn test_history_dedupes_current() {
        let mut history = History::default();
        history.record("/a");
        history.record("/a");
        history.record("/b");
        assert_eq!(history.len(), 2);
    }
}

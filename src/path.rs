//! Path references into a decision request.
//!
//! A path is written as `${segment.segment}` inside a condition. The whole
//! string must be wrapped; anything else is a literal.

use std::fmt;

use crate::error::ConditionError;

const OPEN: &str = "${";
const CLOSE: &str = "}";

/// A dot-separated location inside the request tree, e.g. `resource.ownerId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a bare dotted path such as `subject.sub`.
    ///
    /// Every segment must be non-empty.
    pub fn parse(dotted: &str) -> Result<Self, ConditionError> {
        let segments: Vec<String> = dotted.split('.').map(str::to_owned).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConditionError::Malformed(format!(
                "invalid path `{dotted}`"
            )));
        }
        Ok(Path { segments })
    }

    /// Recognize the `${...}` marker.
    ///
    /// Returns `None` for a plain literal, `Some(Err)` for a wrapped string
    /// whose contents are not a valid path.
    pub fn from_marker(raw: &str) -> Option<Result<Self, ConditionError>> {
        let inner = raw.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
        Some(Path::parse(inner))
    }

    /// The individual field names, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(String::as_str)
    }

    /// Length of the dotted form in bytes.
    pub(crate) fn len(&self) -> usize {
        self.segments.iter().map(String::len).sum::<usize>() + self.segments.len() - 1
    }

    /// Render back to the `${...}` marker form.
    pub fn to_marker(&self) -> String {
        format!("{OPEN}{self}{CLOSE}")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

//! Logical name to store key mapping.

use crate::model::UNIT_SUFFIX;

/// Maps a dotted logical name (`com.acme.Widget`) to the key its compiled
/// payload is stored under (`com/acme/Widget.class`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFormat {
    replacement: Option<char>,
}

impl KeyFormat {
    pub fn new(replacement: Option<char>) -> Self {
        Self { replacement }
    }

    pub fn replacement(&self) -> Option<char> {
        self.replacement
    }

    pub fn format(&self, logical_name: &str) -> String {
        format_key(logical_name, self.replacement)
    }
}

/// Separators already present in the name survive the rewrite untouched,
/// so nested names such as `pkg/Outer.Inner` keep their embedded path.
pub fn format_key(logical_name: &str, replacement: Option<char>) -> String {
    let separator = replacement.map_or_else(|| "/".to_string(), String::from);
    let mut key = logical_name
        .split('/')
        .map(|segment| segment.replace('.', &separator))
        .collect::<Vec<_>>()
        .join("/");
    key.push_str(UNIT_SUFFIX);
    key
}

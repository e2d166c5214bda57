// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One labelled sentence from the corpus. Immutable once loaded;
// the Example Store owns every instance for the whole run.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use std::fmt;

/// Binary sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Negative,
    Positive,
}

impl Label {
    /// Both labels in report order.
    pub const ALL: [Label; 2] = [Label::Negative, Label::Positive];

    /// Map a raw integer to a label. Only 0 and 1 are valid.
    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(Label::Negative),
            1 => Some(Label::Positive),
            _ => None,
        }
    }

    pub fn as_int(self) -> i64 {
        match self {
            Label::Negative => 0,
            Label::Positive => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_int())
    }
}

/// A labelled text example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub text:  String,
    pub label: Label,
}

impl Example {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self { text: text.into(), label }
    }
}

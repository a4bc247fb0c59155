//! Operation code to [`OperationKind`] mapping.
use crate::types::OperationKind;

/// Journal codes and symbolic names, matched against the normalized code.
const OPERATION_CODES: &[(&str, OperationKind)] = &[
    ("PT", OperationKind::Insert),
    ("RR", OperationKind::Insert),
    ("PX", OperationKind::Insert),
    ("UP", OperationKind::Update),
    ("FI", OperationKind::Update),
    ("FP", OperationKind::Update),
    ("UR", OperationKind::Upsert),
    ("DL", OperationKind::Delete),
    ("DR", OperationKind::Delete),
    ("INSERT", OperationKind::Insert),
    ("UPDATE", OperationKind::Update),
    ("UPSERT", OperationKind::Upsert),
    ("DELETE", OperationKind::Delete),
];

/// Trims and upper-cases a raw header code.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Maps a normalized code; unknown codes yield `None`.
///
/// Matching is case-sensitive, so callers pass the output of
/// [`normalize_code`].
///
/// ```rust
/// use classify::{map_entry_type, OperationKind};
///
/// assert_eq!(map_entry_type("DL"), Some(OperationKind::Delete));
/// assert_eq!(map_entry_type("dl"), None);
/// assert_eq!(map_entry_type("ZZ"), None);
/// ```
pub fn map_entry_type(code: &str) -> Option<OperationKind> {
    OPERATION_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, kind)| *kind)
}

//! Line reference data.

use serde::{Deserialize, Serialize};

use super::Mode;

/// A named service line (e.g. `"victoria"` on the tube).
///
/// Lines are reference data: they are collected from segment input during
/// assembly and are never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    pub name: String,
    pub mode: Option<Mode>,
}

impl Line {
    pub fn new(id: impl Into<String>, mode: Option<Mode>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            mode,
        }
    }
}

/// Whether a line name denotes a bus route rather than a rail service.
///
/// Bus routes are numbered (`"25"`, `"390"`), night routes carry an `N`
/// prefix (`"N29"`), and school or express routes put a letter before the
/// number (`"X26"`, `"C10"`). Rail line names are words.
///
/// ```
/// use transit_graph::domain::is_bus_route;
///
/// assert!(is_bus_route("25"));
/// assert!(is_bus_route("N29"));
/// assert!(!is_bus_route("victoria"));
/// assert!(!is_bus_route("elizabeth"));
/// ```
pub fn is_bus_route(line: &str) -> bool {
    let line = line.trim();
    let mut chars = line.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => line.chars().all(|c| c.is_ascii_alphanumeric()),
        Some(c) if c.is_ascii_alphabetic() => {
            let rest = chars.as_str();
            !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

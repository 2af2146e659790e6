//! Name-collision override table.
//!
//! Generic normalization rules either conflate some distinct stations
//! (both Edgware Road stations become "edgware road") or fail to merge
//! differently spelled names of one interchange ("London Paddington" and
//! "Paddington"). Each such case is an entry here, never a new rule.

/// Version of [`OverrideTable::london`]. Bump whenever an entry is added,
/// removed, or changes its canonical form, since persisted keys change too.
pub const OVERRIDE_TABLE_VERSION: u32 = 3;

/// `(pattern, canonical)` pairs, checked in order; the first match wins.
///
/// Patterns are written in the partially cleaned form the normalizer
/// matches against: lowercase, `&` spelled `and`, hyphens as spaces,
/// possessive `'s` folded to `s`, parenthetical qualifiers still present.
const LONDON_OVERRIDES: &[(&str, &str)] = &[
    // Two Edgware Road stations, 150 m apart, on different lines
    ("edgware road (circle", "edgware road circle"),
    ("edgware road (district", "edgware road circle"),
    ("edgware road (h and c", "edgware road circle"),
    ("edgware road (bakerloo", "edgware road bakerloo"),
    // Two Hammersmith stations on opposite sides of the road
    ("hammersmith (h and c", "hammersmith circle"),
    ("hammersmith (circle", "hammersmith circle"),
    ("hammersmith (dist", "hammersmith district piccadilly"),
    ("hammersmith (picc", "hammersmith district piccadilly"),
    // The H&C platforms at Paddington belong to the main complex
    ("paddington (h and c", "paddington"),
    ("london paddington", "paddington"),
    // Heathrow: generic terminal stripping would merge all three stations
    ("heathrow terminals", "heathrow terminals 123"),
    ("heathrow terminal 4", "heathrow terminal 4"),
    ("heathrow terminal 5", "heathrow terminal 5"),
    // "station" is part of the name, not a mode suffix
    ("battersea power", "battersea power station"),
    // Rail termini carry a "London" prefix in national rail data
    ("kings cross", "kings cross st pancras"),
    ("st pancras", "kings cross st pancras"),
    ("waterloo east", "waterloo east"),
    ("london waterloo", "waterloo"),
    ("london euston", "euston"),
    ("london victoria", "victoria"),
    ("london liverpool street", "liverpool street"),
    ("london marylebone", "marylebone"),
    ("london charing cross", "charing cross"),
    ("london cannon street", "cannon street"),
    ("london fenchurch street", "fenchurch street"),
    ("london blackfriars", "blackfriars"),
];

/// One override entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Phrase matched on word boundaries against the partially cleaned name.
    pub pattern: String,
    /// Key produced when the pattern matches.
    pub canonical: String,
}

/// An ordered, versioned set of name-collision overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverrideTable {
    version: u32,
    entries: Vec<Override>,
}

impl OverrideTable {
    /// An empty table (generic rules only).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table for London network data.
    pub fn london() -> Self {
        Self {
            version: OVERRIDE_TABLE_VERSION,
            entries: LONDON_OVERRIDES
                .iter()
                .map(|(pattern, canonical)| Override {
                    pattern: (*pattern).to_string(),
                    canonical: (*canonical).to_string(),
                })
                .collect(),
        }
    }

    /// Append an entry. It is checked after every existing entry.
    pub fn with_entry(mut self, pattern: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.entries.push(Override {
            pattern: pattern.into(),
            canonical: canonical.into(),
        });
        self
    }

    /// Set the version reported by this table.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[Override] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the canonical form for a partially cleaned name.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| contains_phrase(name, &entry.pattern))
            .map(|entry| entry.canonical.as_str())
    }
}

/// Whether `needle` occurs in `haystack` starting and ending on word
/// boundaries (string edges or non-alphanumeric neighbours).
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

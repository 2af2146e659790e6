//! Station name normalization.
//!
//! Source records name the same station in many ways: "Baker Street",
//! "Baker Street Underground Station", "Baker Street (Bakerloo)". This
//! module reduces any such label to a [`CanonicalKey`] used for matching.
//! Keys are never displayed.
//!
//! The pipeline, in order:
//!
//! 1. lower-case;
//! 2. fold spelling variants (`'s` → `s`, `st.` → `st`, `&` → `and`,
//!    hyphens → spaces);
//! 3. strip trailing mode suffixes ("underground station", "dlr", ...);
//! 4. consult the [`OverrideTable`] on the partially cleaned name, with
//!    parenthetical qualifiers still visible. A match decides the key and
//!    skips steps 5-8;
//! 5. strip parenthetical qualifiers, then mode suffixes again;
//! 6. remove stand-alone modal words ("rail", "tube", "elizabeth line", ...);
//! 7. strip terminal qualifiers and digit clusters ("terminals 1 2", "123");
//! 8. drop remaining non-alphanumeric characters and collapse whitespace.

mod overrides;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

pub use overrides::{OVERRIDE_TABLE_VERSION, Override, OverrideTable};

/// Trailing suffixes that only say which mode serves a station. Longer
/// suffixes come first so "dlr station" is not cut down to "dlr".
const MODE_SUFFIXES: &[&str] = &[
    "elizabeth line station",
    "underground station",
    "overground station",
    "railway station",
    "rail station",
    "dlr station",
    "tram station",
    "tram stop",
    "station",
    "elizabeth line",
    "underground",
    "overground",
    "rail",
    "tube",
    "dlr",
];

/// Words removed wherever they stand alone.
const MODAL_WORDS: &[&str] = &["rail", "underground", "tube", "overground", "dlr"];

static DEFAULT_NORMALIZER: LazyLock<NameNormalizer> = LazyLock::new(NameNormalizer::default);

/// Normalize a station label with the built-in London override table.
///
/// ```
/// use transit_graph::normalize::normalize;
///
/// assert_eq!(
///     normalize("Baker Street Underground Station"),
///     normalize("Baker Street"),
/// );
/// assert_ne!(
///     normalize("Edgware Road (Circle Line) Underground Station"),
///     normalize("Edgware Road (Bakerloo) Underground Station"),
/// );
/// ```
pub fn normalize(raw_name: &str) -> CanonicalKey {
    DEFAULT_NORMALIZER.normalize(raw_name)
}

/// A normalized station name, used only for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Wrap a string that is already in normalized form.
    pub fn from_normalized(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name consisted of nothing but qualifiers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw names that normalize to the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    pub key: CanonicalKey,
    /// Distinct raw names, in first-seen order.
    pub names: Vec<String>,
}

/// Station name normalizer: the generic rules plus an override table.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    overrides: OverrideTable,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::new(OverrideTable::london())
    }
}

impl NameNormalizer {
    pub fn new(overrides: OverrideTable) -> Self {
        Self { overrides }
    }

    pub fn overrides(&self) -> &OverrideTable {
        &self.overrides
    }

    /// Reduce a raw station label to its matching key.
    pub fn normalize(&self, raw_name: &str) -> CanonicalKey {
        let name = fold_variants(&raw_name.to_lowercase());
        let name = strip_mode_suffixes(&name);

        if let Some(canonical) = self.overrides.lookup(&name) {
            return CanonicalKey(finish(canonical));
        }

        let name = strip_parentheticals(&name);
        let name = strip_mode_suffixes(&name);
        let name = remove_modal_words(&name);
        let name = strip_terminal_qualifiers(&name);
        CanonicalKey(finish(&name))
    }

    /// Group `names` by key and return every key shared by more than one
    /// distinct raw name, ordered by key.
    pub fn collisions<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<KeyCollision> {
        let mut groups: BTreeMap<CanonicalKey, Vec<String>> = BTreeMap::new();
        for name in names {
            let members = groups.entry(self.normalize(name)).or_default();
            if !members.iter().any(|m| m == name) {
                members.push(name.to_string());
            }
        }

        groups
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(key, names)| KeyCollision { key, names })
            .collect()
    }
}

/// Step 2: possessives, `st.`, ampersands, hyphens.
fn fold_variants(name: &str) -> String {
    let name = name
        .replace(['\u{2019}', '\u{2018}'], "'")
        .replace("'s", "s")
        .replace("st.", "st ")
        .replace('&', " and ")
        .replace(['-', '\u{2013}', '\u{2014}'], " ");
    collapse_whitespace(&name)
}

/// Step 3: repeatedly strip a trailing mode suffix. A name made only of a
/// suffix ("Station") is left alone.
fn strip_mode_suffixes(name: &str) -> String {
    let mut name = name.trim();
    loop {
        let stripped = MODE_SUFFIXES.iter().find_map(|suffix| {
            let rest = name.strip_suffix(suffix)?;
            if rest.is_empty() || !rest.ends_with(' ') {
                return None;
            }
            Some(rest.trim_end())
        });
        match stripped {
            Some(rest) => name = rest,
            None => return name.to_string(),
        }
    }
}

/// Step 5: drop everything inside parentheses, including nested and
/// unclosed groups.
fn strip_parentheticals(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(' ');
            }
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

/// Step 6: remove modal words as whole words.
fn remove_modal_words(name: &str) -> String {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let mut kept = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "elizabeth" && tokens.get(i + 1) == Some(&"line") {
            i += 2;
            continue;
        }
        if !MODAL_WORDS.contains(&tokens[i]) {
            kept.push(tokens[i]);
        }
        i += 1;
    }

    if kept.is_empty() {
        return tokens.join(" ");
    }
    kept.join(" ")
}

/// Step 7: remove "terminal 5", "terminals 2 and 3" and bare digit clusters.
fn strip_terminal_qualifiers(name: &str) -> String {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let number_at = |i: usize| tokens.get(i).is_some_and(|t| is_number(t));

    let mut kept = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if matches!(token, "terminal" | "terminals") && number_at(i + 1) {
            i += 1;
            while number_at(i) || (tokens[i..].first() == Some(&"and") && number_at(i + 1)) {
                i += 1;
            }
            continue;
        }
        if !is_number(token) {
            kept.push(token);
        }
        i += 1;
    }

    if kept.is_empty() {
        return tokens.join(" ");
    }
    kept.join(" ")
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Step 8: keep letters, digits and single spaces.
fn finish(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    collapse_whitespace(&cleaned)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

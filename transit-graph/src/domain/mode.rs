//! Transport mode type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A transport mode serving a station or line.
///
/// Known modes parse from their lowercase wire names (`"tube"`,
/// `"elizabeth-line"`, ...). Anything else is kept verbatim in
/// [`Mode::Other`] so that unfamiliar source data survives a round trip.
///
/// # Examples
///
/// ```
/// use transit_graph::domain::Mode;
///
/// assert_eq!(Mode::parse("Tube"), Mode::Tube);
/// assert_eq!(Mode::parse("elizabeth-line"), Mode::ElizabethLine);
/// assert_eq!(Mode::parse("funicular"), Mode::Other("funicular".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Tube,
    Dlr,
    Overground,
    ElizabethLine,
    NationalRail,
    Tram,
    CableCar,
    RiverBus,
    Bus,
    Other(String),
}

impl Mode {
    /// Parse a mode name. Matching is case-insensitive and treats `_`, `-`
    /// and spaces as equivalent separators.
    pub fn parse(s: &str) -> Self {
        let folded: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '_' | ' ' => '-',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match folded.as_str() {
            "tube" | "underground" => Mode::Tube,
            "dlr" => Mode::Dlr,
            "overground" | "london-overground" => Mode::Overground,
            "elizabeth-line" | "elizabeth" | "tflrail" => Mode::ElizabethLine,
            "national-rail" | "rail" => Mode::NationalRail,
            "tram" => Mode::Tram,
            "cable-car" => Mode::CableCar,
            "river-bus" => Mode::RiverBus,
            "bus" => Mode::Bus,
            _ => Mode::Other(folded),
        }
    }

    /// Returns the wire name of this mode.
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Tube => "tube",
            Mode::Dlr => "dlr",
            Mode::Overground => "overground",
            Mode::ElizabethLine => "elizabeth-line",
            Mode::NationalRail => "national-rail",
            Mode::Tram => "tram",
            Mode::CableCar => "cable-car",
            Mode::RiverBus => "river-bus",
            Mode::Bus => "bus",
            Mode::Other(s) => s,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        Mode::parse(&s)
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

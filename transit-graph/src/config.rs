//! Configuration for the reconciliation pipeline.

use crate::domain::Mode;

/// How duplicate keys inside a single weight source are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The first entry in file order wins; later duplicates are counted.
    #[default]
    FirstWins,
    /// The smallest weight wins; duplicates are still counted.
    Minimum,
}

/// Tunables for resolution, assembly and reconciliation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Decimal places kept when rounding coordinates for the fallback
    /// identity key. Four places is roughly 11 m.
    pub coordinate_precision: u32,

    /// Distinct stations closer than this (metres) form one interchange
    /// complex and get transfer edges between them.
    pub complex_radius_m: f64,

    /// Fixed weight of an interchange transfer (minutes).
    pub transfer_minutes: f64,

    /// Policy for repeated keys within one weight source.
    pub duplicate_policy: DuplicatePolicy,

    /// Modes dropped from every station's mode set.
    pub excluded_modes: Vec<Mode>,
}

impl PipelineConfig {
    /// Create a configuration with the given parameters.
    pub fn new(
        coordinate_precision: u32,
        complex_radius_m: f64,
        transfer_minutes: f64,
        duplicate_policy: DuplicatePolicy,
    ) -> Self {
        Self {
            coordinate_precision,
            complex_radius_m,
            transfer_minutes,
            duplicate_policy,
            ..Self::default()
        }
    }

    pub fn with_coordinate_precision(mut self, places: u32) -> Self {
        self.coordinate_precision = places;
        self
    }

    pub fn with_complex_radius(mut self, metres: f64) -> Self {
        self.complex_radius_m = metres;
        self
    }

    pub fn with_transfer_minutes(mut self, minutes: f64) -> Self {
        self.transfer_minutes = minutes;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Whether `mode` should be dropped from station mode sets.
    pub fn is_excluded(&self, mode: &Mode) -> bool {
        self.excluded_modes.contains(mode)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            coordinate_precision: 4,
            complex_radius_m: 150.0,
            transfer_minutes: 5.0,
            duplicate_policy: DuplicatePolicy::FirstWins,
            excluded_modes: vec![Mode::Bus],
        }
    }
}

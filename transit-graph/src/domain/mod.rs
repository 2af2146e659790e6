//! Domain types for the transit graph.
//!
//! Raw records describe what the source data says; canonical types
//! describe the reconciled network. Validation happens at construction
//! (e.g. [`Coordinates::new`]) so later stages can trust the values.

mod edge;
mod line;
mod mode;
mod record;
mod station;

pub use edge::{Edge, EdgeKey, TRANSFER_LINE};
pub use line::{Line, is_bus_route};
pub use mode::Mode;
pub use record::{GroupingClaim, RawSegment, RawStationRecord};
pub use station::{Coordinates, Station, StationIdx};

//! Runshape router - snaps GPS waypoint sequences onto the road network.
//!
//! Two backends are provided: a self-hosted OSRM server routed segment by
//! segment, and the Mapbox directions API routed in overlapping chunks.

pub mod directions;
pub mod osrm;
pub mod snapper;

pub use directions::{ChunkedSettings, DirectionsRouter, DEFAULT_MAPBOX_URL};
pub use osrm::{OsrmRouter, PointToPointSettings, DEFAULT_OSRM_URL};
pub use snapper::{RoadSnap, RoadSnapper};

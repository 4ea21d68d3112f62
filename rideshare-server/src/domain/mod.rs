//! Domain types for the rideshare route matcher.
//!
//! This module contains the core domain model types that represent
//! validated route data. All types enforce their invariants at construction
//! time, so code that receives these types can trust their validity.

mod chain;
mod error;
mod leg;
mod node;
mod route;
mod stop;
mod time;

pub use chain::{LegKey, MAX_LEGS, RouteChain};
pub use error::DomainError;
pub use leg::RouteLeg;
pub use node::{Coordinate, InvalidCoordinate, Node, NodeId};
pub use route::{DriverRoute, DriverRouteBuilder, DriverRouteId, RouteStatus};
pub use stop::{DriverRouteStop, StopStatus};
pub use time::{MAX_OFFSET_MINUTES, RouteTime, TimeError, TimeWindow, check_offset};

//! Narrow-phase collision core.
//!
//! - [`contact`]: contact records and the pairs that accumulate them
//! - [`location`]: shape-local coordinates of penetration points
//! - [`calculator`]: the calculator trait and the kind-pair registry
//! - [`calculators`]: built-in calculators
//! - [`pool`]: reusable temporary shapes

pub mod calculator;
pub mod calculators;
pub mod contact;
pub mod location;
pub mod pool;

pub use calculator::{ContactCalculator, ContactCalculatorRegistry, PosedInterval, PosedShape};
pub use contact::{CollisionPair, Contact, DetectionType};
pub use location::{IndexedLocalCoordinate, Location};
pub use pool::ShapePool;

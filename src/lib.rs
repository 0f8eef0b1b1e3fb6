//! Rein collision core
//!
//! Narrow-phase contact calculation, continuous collision sub-stepping and contact resolution
//! for rigid and deformable bodies stored in a hecs ECS.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **math** - Distances, barycentric coordinates, triangle contact, swept root solvers
//! 2. **shapes** - Collision shapes, AABB trees, octrees
//! 3. **collision** - Contacts, locations, calculator registry and built-in calculators
//! 4. **ecs** - Collider, pose interval and body components
//! 5. **physics** - Detection passes, CCD loop, MLCP build/solve/push, step orchestration
//!    (rayon-parallel detection with feature = "parallel")

pub mod collision;
pub mod ecs;
pub mod error;
pub mod math;
pub mod physics;
pub mod shapes;

// Re-export commonly used types
pub use collision::{
    CollisionPair, Contact, ContactCalculator, ContactCalculatorRegistry, DetectionType, Location,
    PosedInterval, PosedShape, ShapePool,
};

pub use ecs::prelude::*;

pub use error::{CollisionError, CollisionResult, PhysicsError, PhysicsResult, SolveError};

pub use math::Aabb;

pub use physics::ccd_loop::{CcdCollisionLoop, CcdLoopConfig, CcdLoopReport, CcdTermination};
pub use physics::solver::{GaussSeidelConfig, GaussSeidelSolver, MlcpSolver};
pub use physics::{PhysicsConfig, PhysicsWorld, StepReport};

pub use shapes::{MeshShape, OctreeShape, SegmentMeshShape, Shape, ShapeKind};

// Re-export glam for convenience
pub use glam;

//! ECS components (collision shapes, poses, body state).

pub mod collision;
pub mod physics;

pub use collision::*;
pub use physics::*;

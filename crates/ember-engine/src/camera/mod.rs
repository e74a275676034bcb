//! Camera state and controllers.

mod controller;
mod view;

pub use controller::{FpsCameraController, MovementInput};
pub use view::{Camera, OrthoBounds, PITCH_LIMIT, ProjectionMode, wrap_degrees};

//! Frame timing.
//!
//! One `FrameClock` per frame loop; call `tick()` once per frame and pass the
//! resulting `dt` to the scene's update phases.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};

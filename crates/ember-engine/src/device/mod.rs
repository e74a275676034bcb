//! GPU device management.
//!
//! This module is responsible for:
//! - selecting an adapter and creating the wgpu Device/Queue
//! - the descriptor table and its bump allocator
//! - fence bookkeeping and frame pacing
//! - scoped CPU to GPU uploads

mod descriptor;
mod fence;
mod gpu;
mod settings;
pub mod upload;

pub use descriptor::{DescriptorAllocator, DescriptorHandle};
pub use fence::{FenceTimeline, FramePacer};
pub use gpu::GpuContext;
pub use settings::{AdapterPreference, CapabilityLevel, GpuSettings};

//! Rendering on top of the device and shader layers.
//!
//! - `constants`: per-frame uniform rings
//! - `geometry`: vertex formats and the kind to mesh registry
//! - `mesh` / `skybox`: renderers that record one draw each
//! - `material` / `texture`: what the mesh fragment stage samples
//! - `frame`: the paced frame loop driving a scene into offscreen targets
//!
//! Conventions: left-handed view space, counter-clockwise front faces,
//! depth cleared to 1.0 with `Less` for meshes.

mod constants;
mod frame;
mod geometry;
pub mod layouts;
mod material;
mod mesh;
mod skybox;
mod texture;

pub use constants::{
    CameraConstants, ConstantBufferSet, ConstantRing, ObjectConstants, RingLayout, RingSlot,
    SkyboxConstants,
};
pub use frame::{FrameRenderer, FrameStats, FrameTargets};
pub use geometry::{
    GeometryDescriptor, GeometryRegistry, MeshShading, PositionVertex, RenderableKind, Vertex,
};
pub use material::{
    DEFAULT_MATERIAL, Material, MaterialConstants, MaterialManager, MaterialProperties, TextureRole,
};
pub use mesh::{MeshRenderer, ensure_default_pipeline};
pub use skybox::{SKYBOX_PIPELINE, Skybox};
pub use texture::{AssetLoader, ImageData, ImageFileLoader, Texture};

//! Entity-component scene.
//!
//! A [`Scene`] owns [`GameObject`]s; each carries a [`Transform`] and boxed
//! [`Component`]s. A [`RenderComponent`] connects an object to the render
//! layer by kind.

mod component;
mod game_object;
mod render_component;
mod transform;
mod world;

pub use component::{AsAny, Component};
pub use game_object::{GameObject, GameObjectId};
pub use render_component::RenderComponent;
pub use transform::Transform;
pub use world::Scene;

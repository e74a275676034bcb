use std::any::Any;

use super::transform::Transform;

/// Downcasting support for boxed components.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to a game object.
///
/// Hooks receive the owner's transform. Disabled components are skipped by
/// every phase but still get `on_destroy`.
pub trait Component: AsAny {
    /// Runs once, before the owner's first update.
    fn start(&mut self, _transform: &mut Transform) {}

    fn update(&mut self, _transform: &mut Transform, _dt: f32) {}

    fn late_update(&mut self, _transform: &mut Transform, _dt: f32) {}

    fn on_destroy(&mut self) {}

    fn is_enabled(&self) -> bool {
        true
    }
}

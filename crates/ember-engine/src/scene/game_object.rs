use std::fmt;

use crate::camera::Camera;

use super::component::Component;
use super::render_component::RenderComponent;
use super::transform::Transform;

/// Stable identity of a game object within its scene. Never reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GameObjectId(pub(crate) u64);

impl fmt::Display for GameObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named transform plus the components that act on it.
pub struct GameObject {
    id: GameObjectId,
    name: String,
    active: bool,
    started: bool,
    destroyed: bool,
    pub transform: Transform,
    components: Vec<Box<dyn Component>>,
}

impl GameObject {
    pub(crate) fn new(id: GameObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            started: false,
            destroyed: false,
            transform: Transform::IDENTITY,
            components: Vec::new(),
        }
    }

    pub fn id(&self) -> GameObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Inactive objects are skipped by every scene phase.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    // ── components ────────────────────────────────────────────────────────

    /// Attaches `component`. Returns `self` so attachments can be chained;
    /// reach the component again through [`GameObject::get_component_mut`].
    pub fn add_component<C: Component>(&mut self, component: C) -> &mut Self {
        self.components.push(Box::new(component));
        self
    }

    /// First component of type `C`.
    pub fn get_component<C: Component>(&self) -> Option<&C> {
        self.components
            .iter()
            .find_map(|c| (**c).as_any().downcast_ref::<C>())
    }

    pub fn get_component_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .iter_mut()
            .find_map(|c| (**c).as_any_mut().downcast_mut::<C>())
    }

    /// Every component of type `C`, in attachment order.
    pub fn components_mut<C: Component>(&mut self) -> impl Iterator<Item = &mut C> {
        self.components
            .iter_mut()
            .filter_map(|c| (**c).as_any_mut().downcast_mut::<C>())
    }

    pub fn has_component<C: Component>(&self) -> bool {
        self.get_component::<C>().is_some()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Runs `start` on every enabled component. Only the first call has an effect.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for component in self.components.iter_mut().filter(|c| c.is_enabled()) {
            component.start(&mut self.transform);
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.start();
        for component in self.components.iter_mut().filter(|c| c.is_enabled()) {
            component.update(&mut self.transform, dt);
        }
    }

    pub fn late_update(&mut self, dt: f32) {
        for component in self.components.iter_mut().filter(|c| c.is_enabled()) {
            component.late_update(&mut self.transform, dt);
        }
    }

    /// First render component that is both enabled and visible.
    pub(crate) fn drawable_render_component(&mut self) -> Option<&mut RenderComponent> {
        self.components
            .iter_mut()
            .filter_map(|c| (**c).as_any_mut().downcast_mut::<RenderComponent>())
            .find(|r| r.is_enabled() && r.is_visible())
    }

    /// Draws through [`GameObject::drawable_render_component`].
    pub(crate) fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &crate::device::GpuContext,
        camera: &Camera,
        frame_index: u32,
    ) {
        let transform = self.transform;
        if let Some(render) = self.drawable_render_component() {
            render.render(pass, ctx, camera, &transform, frame_index);
        }
    }

    /// Runs `on_destroy` on every component once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.active = false;
        for component in &mut self.components {
            component.on_destroy();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("components", &self.components.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderableKind;

    struct Marker;

    impl Component for Marker {}

    #[test]
    fn add_component_chains() {
        let mut object = GameObject::new(GameObjectId(0), "chained");
        object
            .add_component(Marker)
            .add_component(RenderComponent::new(RenderableKind::Cube));
        assert_eq!(object.component_count(), 2);
        assert!(object.has_component::<Marker>());
        assert!(object.has_component::<RenderComponent>());
    }

    #[test]
    fn disabled_render_component_does_not_hide_later_one() {
        let mut object = GameObject::new(GameObjectId(0), "two renderers");
        let mut hidden = RenderComponent::new(RenderableKind::Triangle);
        hidden.set_enabled(false);
        let mut invisible = RenderComponent::new(RenderableKind::Plane);
        invisible.set_visible(false);
        object
            .add_component(hidden)
            .add_component(invisible)
            .add_component(RenderComponent::new(RenderableKind::Cube));

        let drawn = object.drawable_render_component().map(|r| r.kind());
        assert_eq!(drawn, Some(RenderableKind::Cube));
        assert_eq!(object.components_mut::<RenderComponent>().count(), 3);
    }

    #[test]
    fn no_drawable_component_when_all_disabled() {
        let mut object = GameObject::new(GameObjectId(0), "off");
        let mut render = RenderComponent::new(RenderableKind::Cube);
        render.set_enabled(false);
        object.add_component(render);
        assert!(object.drawable_render_component().is_none());
    }
}

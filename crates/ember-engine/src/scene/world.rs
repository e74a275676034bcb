use std::fmt;

use crate::camera::Camera;
use crate::device::GpuContext;
use crate::error::Result;
use crate::render::{MaterialManager, MeshRenderer};
use crate::shader::ShaderCache;

use super::game_object::{GameObject, GameObjectId};
use super::render_component::RenderComponent;

/// Owns game objects and runs their per-frame phases.
///
/// Phase order per frame is `start` (once per object, before its first
/// update), `update`, `late_update`, `render`. Every phase visits active
/// objects only, in creation order.
///
/// Destroying an object detaches its mesh renderers; their GPU resources go
/// back to the context on the next [`Scene::release_retired`].
#[derive(Default)]
pub struct Scene {
    objects: Vec<GameObject>,
    next_id: u64,
    pending_destroy: Vec<GameObjectId>,
    retired: Vec<MeshRenderer>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new active object and returns it.
    pub fn create_game_object(&mut self, name: impl Into<String>) -> &mut GameObject {
        let id = GameObjectId(self.next_id);
        self.next_id += 1;
        let object = GameObject::new(id, name);
        log::debug!("created game object `{}` {id}", object.name());
        self.objects.push(object);
        let last = self.objects.len() - 1;
        &mut self.objects[last]
    }

    pub fn get(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn get_mut(&mut self, id: GameObjectId) -> Option<&mut GameObject> {
        self.objects.iter_mut().find(|o| o.id() == id)
    }

    /// First object named `name`. Names are not unique.
    pub fn find_game_object(&self, name: &str) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.name() == name)
    }

    pub fn find_game_object_mut(&mut self, name: &str) -> Option<&mut GameObject> {
        self.objects.iter_mut().find(|o| o.name() == name)
    }

    /// All objects in creation order, active or not.
    pub fn game_objects(&self) -> &[GameObject] {
        &self.objects
    }

    pub fn game_objects_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // ── destruction ───────────────────────────────────────────────────────

    /// Deactivates, finalizes and removes the object immediately.
    ///
    /// Must not be called while the scene is iterating; use
    /// [`Scene::queue_destroy`] from inside a phase.
    pub fn destroy_game_object(&mut self, id: GameObjectId) -> bool {
        let Some(index) = self.objects.iter().position(|o| o.id() == id) else {
            log::warn!("destroy: game object {id} not found in scene");
            return false;
        };
        let object = &mut self.objects[index];
        object.set_active(false);
        self.retired.extend(
            object
                .components_mut::<RenderComponent>()
                .filter_map(RenderComponent::take_renderer),
        );
        object.destroy();
        let object = self.objects.remove(index);
        log::info!("game object `{}` {id} destroyed", object.name());
        true
    }

    /// Destroys the object after the next `late_update`.
    pub fn queue_destroy(&mut self, id: GameObjectId) {
        if !self.pending_destroy.contains(&id) {
            self.pending_destroy.push(id);
        }
    }

    /// Destroys every queued object. Returns how many were removed.
    pub fn flush_destroyed(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_destroy);
        pending
            .into_iter()
            .filter(|&id| self.destroy_game_object(id))
            .count()
    }

    /// Renderers detached by destruction and not yet released.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Returns the descriptor slots and buffers of destroyed objects'
    /// renderers to `ctx`.
    pub fn release_retired(&mut self, ctx: &mut GpuContext) -> usize {
        let count = self.retired.len();
        for mut renderer in self.retired.drain(..) {
            renderer.release(ctx);
        }
        if count > 0 {
            log::debug!("released {count} retired renderer(s)");
        }
        count
    }

    // ── phases ────────────────────────────────────────────────────────────

    pub fn start(&mut self) {
        for object in self.objects.iter_mut().filter(|o| o.is_active()) {
            object.start();
        }
    }

    pub fn update(&mut self, dt: f32) {
        for object in self.objects.iter_mut().filter(|o| o.is_active()) {
            object.update(dt);
        }
    }

    /// Runs late update, then flushes queued destruction.
    pub fn late_update(&mut self, dt: f32) {
        for object in self.objects.iter_mut().filter(|o| o.is_active()) {
            object.late_update(dt);
        }
        self.flush_destroyed();
    }

    /// Records draws for every active object with a visible render component.
    pub fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &GpuContext,
        camera: &Camera,
        frame_index: u32,
    ) {
        for object in self.objects.iter_mut().filter(|o| o.is_active()) {
            object.render(pass, ctx, camera, frame_index);
        }
    }

    /// Initializes every render component and points it at `materials`'
    /// default material. Stops at the first failure.
    pub fn initialize_render_components(
        &mut self,
        ctx: &mut GpuContext,
        shaders: &mut ShaderCache,
        materials: Option<&MaterialManager>,
    ) -> Result<()> {
        for object in &mut self.objects {
            if let Some(render) = object.get_component_mut::<RenderComponent>() {
                if let Some(materials) = materials {
                    render.set_material_manager(materials);
                }
                render.initialize(ctx, shaders)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("objects", &self.objects)
            .field("pending_destroy", &self.pending_destroy)
            .field("retired", &self.retired.len())
            .finish()
    }
}

use std::sync::Arc;

use crate::camera::Camera;
use crate::device::GpuContext;
use crate::error::{Error, Result};
use crate::render::{GeometryRegistry, Material, MaterialManager, MeshRenderer, RenderableKind};
use crate::shader::ShaderCache;

use super::component::Component;
use super::transform::Transform;

/// Draws its game object with the renderer matching a [`RenderableKind`].
///
/// Owns at most one live [`MeshRenderer`]. Switching kind after
/// initialization releases the old renderer before building the new one; if
/// the build fails the component stays invalid until a later switch succeeds.
pub struct RenderComponent {
    kind: RenderableKind,
    registry: Arc<GeometryRegistry>,
    material: Option<Arc<Material>>,
    fallback_material: Option<Arc<Material>>,
    visible: bool,
    enabled: bool,
    renderer: Option<MeshRenderer>,
    initialized: bool,
    warned_no_material: bool,
}

impl RenderComponent {
    /// Uses the built-in geometry for `kind`.
    pub fn new(kind: RenderableKind) -> Self {
        Self::with_registry(kind, Arc::new(GeometryRegistry::builtin()))
    }

    pub fn with_registry(kind: RenderableKind, registry: Arc<GeometryRegistry>) -> Self {
        Self {
            kind,
            registry,
            material: None,
            fallback_material: None,
            visible: true,
            enabled: true,
            renderer: None,
            initialized: false,
            warned_no_material: false,
        }
    }

    /// Builds the renderer for the current kind. Calling it again is a no-op.
    pub fn initialize(&mut self, ctx: &mut GpuContext, shaders: &mut ShaderCache) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.rebuild(ctx, shaders)?;
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn kind(&self) -> RenderableKind {
        self.kind
    }

    /// Changes the drawn geometry.
    ///
    /// Before initialization only the tag changes. Afterwards the old renderer
    /// is released first, then the new one is built; a build failure is
    /// returned and leaves the component without a renderer.
    pub fn set_renderable_kind(
        &mut self,
        kind: RenderableKind,
        ctx: &mut GpuContext,
        shaders: &mut ShaderCache,
    ) -> Result<()> {
        if self.kind == kind {
            return Ok(());
        }
        self.kind = kind;
        if !self.initialized {
            return Ok(());
        }
        self.rebuild(ctx, shaders)
    }

    fn rebuild(&mut self, ctx: &mut GpuContext, shaders: &mut ShaderCache) -> Result<()> {
        self.release(ctx);

        let geometry = self
            .registry
            .get(self.kind)
            .ok_or_else(|| Error::config(format!("no geometry registered for {:?}", self.kind)))?;
        let renderer = MeshRenderer::new(ctx, shaders, geometry).inspect_err(|err| {
            log::error!("RenderComponent: building {:?} renderer failed: {err}", self.kind);
        })?;
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Releases the current renderer, if any.
    pub fn release(&mut self, ctx: &mut GpuContext) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release(ctx);
        }
    }

    /// Detaches the renderer without releasing it.
    pub(crate) fn take_renderer(&mut self) -> Option<MeshRenderer> {
        self.renderer.take()
    }

    pub fn is_valid(&self) -> bool {
        self.initialized && self.renderer.as_ref().is_some_and(MeshRenderer::is_valid)
    }

    pub fn renderer(&self) -> Option<&MeshRenderer> {
        self.renderer.as_ref()
    }

    // ── material ──────────────────────────────────────────────────────────

    pub fn set_material(&mut self, material: Option<Arc<Material>>) {
        self.material = material;
    }

    pub fn material(&self) -> Option<&Arc<Material>> {
        self.material.as_ref()
    }

    /// Uses `manager`'s default material whenever none is assigned.
    pub fn set_material_manager(&mut self, manager: &MaterialManager) {
        self.fallback_material = Some(manager.default_material());
    }

    /// The assigned material, else the fallback.
    pub fn effective_material(&self) -> Option<&Arc<Material>> {
        self.material.as_ref().or(self.fallback_material.as_ref())
    }

    // ── flags ─────────────────────────────────────────────────────────────

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Mirrors `transform` into the renderer and records its draw.
    pub fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &GpuContext,
        camera: &Camera,
        transform: &Transform,
        frame_index: u32,
    ) {
        if !self.visible || !self.is_valid() {
            return;
        }
        let Some(material) = self.material.as_ref().or(self.fallback_material.as_ref()) else {
            if !self.warned_no_material {
                log::warn!(
                    "RenderComponent ({:?}): no material and no material manager, skipping draw",
                    self.kind
                );
                self.warned_no_material = true;
            }
            return;
        };
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.mirror(transform);
            renderer.render(pass, ctx, camera, material, frame_index);
        }
    }
}

impl Component for RenderComponent {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn on_destroy(&mut self) {
        self.renderer = None;
    }
}

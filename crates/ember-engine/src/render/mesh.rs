use std::borrow::Cow;
use std::sync::Arc;

use glam::Mat4;

use crate::camera::Camera;
use crate::device::upload::create_buffer_init;
use crate::device::{DescriptorHandle, GpuContext};
use crate::error::{Error, Result};
use crate::scene::Transform;
use crate::shader::{DefaultPipeline, PipelineState, PipelineStateDesc, ShaderCache, ShaderDesc};

use super::constants::{CameraConstants, ConstantBufferSet, ObjectConstants};
use super::geometry::{GeometryDescriptor, MeshShading, Vertex};
use super::layouts::{frame_layout, material_layout, texture_2d_layout};
use super::material::{Material, TextureRole};

/// Builds (or returns) one of the cache's default mesh pipelines.
pub fn ensure_default_pipeline(
    ctx: &GpuContext,
    shaders: &mut ShaderCache,
    which: DefaultPipeline,
) -> Result<Arc<PipelineState>> {
    ensure_mesh_pipeline(
        ctx,
        shaders,
        &MeshShading::for_default(which),
        wgpu::PrimitiveTopology::TriangleList,
        Some(wgpu::Face::Back),
    )
}

/// Returns the pipeline named by `shading`, creating it on first use.
///
/// The name is the pipeline's identity: geometries sharing a name share the
/// topology and culling of whichever created it first.
fn ensure_mesh_pipeline(
    ctx: &GpuContext,
    shaders: &mut ShaderCache,
    shading: &MeshShading,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
) -> Result<Arc<PipelineState>> {
    if let Some(pipeline) = shaders.get_pipeline_state(&shading.pipeline_name) {
        return Ok(pipeline);
    }

    let path: &str = &shading.source_path;
    let vs = shaders.load_shader(&ShaderDesc::vertex(path).with_macros(shading.macros.iter().cloned()))?;
    let fs = shaders.load_shader(&ShaderDesc::fragment(path).with_macros(shading.macros.iter().cloned()))?;

    let mut desc = PipelineStateDesc::new(vs, fs, ctx.color_format(), ctx.depth_format());
    desc.bind_group_layouts = vec![
        frame_layout(ctx, shaders),
        material_layout(ctx, shaders),
        texture_2d_layout(ctx, shaders),
    ];
    desc.vertex_layouts = vec![Vertex::layout()];
    desc.topology = topology;
    desc.cull_mode = cull_mode;
    shaders.create_pipeline_state(ctx, &shading.pipeline_name, desc)
}

/// Draws one static mesh with per-frame camera and object constants.
///
/// Construction uploads the geometry once and allocates a descriptor slot
/// for the constant bind group. Any failure aborts construction. After
/// [`MeshRenderer::release`] the renderer is invalid and draws nothing.
pub struct MeshRenderer {
    label: Cow<'static, str>,
    pipeline: Arc<PipelineState>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    draw_count: u32,
    constants: ConstantBufferSet,
    frame_descriptor: DescriptorHandle,
    released: bool,

    transform: Transform,
    world: Mat4,

    warned_invalid: bool,
    warned_frame_index: bool,
    warned_texture: bool,
}

impl MeshRenderer {
    pub fn new(
        ctx: &mut GpuContext,
        shaders: &mut ShaderCache,
        geometry: &GeometryDescriptor,
    ) -> Result<Self> {
        geometry.validate()?;
        let pipeline = ensure_mesh_pipeline(
            ctx,
            shaders,
            &geometry.shading,
            geometry.topology,
            geometry.cull_mode,
        )?;

        let vertex_buffer = create_buffer_init(
            ctx.device(),
            &format!("{} vertices", geometry.label),
            bytemuck::cast_slice(&geometry.vertices[..]),
            wgpu::BufferUsages::VERTEX,
        )?;
        let index_buffer = match &geometry.indices {
            Some(indices) => Some(create_buffer_init(
                ctx.device(),
                &format!("{} indices", geometry.label),
                bytemuck::cast_slice(&indices[..]),
                wgpu::BufferUsages::INDEX,
            )?),
            None => None,
        };

        let frames = ctx.frames_in_flight();
        let mut constants = ConstantBufferSet::new();
        constants.initialize(ctx, frames)?;

        let layout = pipeline
            .bind_group_layout(0)
            .ok_or_else(|| Error::resource(&*geometry.label, "pipeline has no group 0 layout"))?;
        let (Some(camera), Some(object)) = (constants.camera().binding(), constants.object().binding())
        else {
            return Err(Error::resource(&*geometry.label, "constant rings not initialized"));
        };
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&*geometry.label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(camera),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(object),
                },
            ],
        });
        let frame_descriptor = ctx.allocate_descriptor()?;
        ctx.write_descriptor(frame_descriptor, bind_group);

        log::info!(
            "mesh renderer `{}` ready ({} {}, pipeline `{}`)",
            geometry.label,
            geometry.draw_count(),
            if index_buffer.is_some() { "indices" } else { "vertices" },
            pipeline.name()
        );

        Ok(Self {
            label: geometry.label.clone(),
            pipeline,
            vertex_buffer,
            index_buffer,
            draw_count: geometry.draw_count(),
            constants,
            frame_descriptor,
            released: false,
            transform: Transform::IDENTITY,
            world: Mat4::IDENTITY,
            warned_invalid: false,
            warned_frame_index: false,
            warned_texture: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_valid(&self) -> bool {
        !self.released && self.constants.is_valid()
    }

    pub fn pipeline(&self) -> &Arc<PipelineState> {
        &self.pipeline
    }

    pub fn frame_descriptor(&self) -> DescriptorHandle {
        self.frame_descriptor
    }

    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    // ── transform ─────────────────────────────────────────────────────────

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Copies `transform`; the world matrix is rebuilt only when it changed.
    pub fn mirror(&mut self, transform: &Transform) {
        if self.transform != *transform {
            self.set_transform(*transform);
        }
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.world = transform.world_matrix();
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Writes this frame's constants and records one draw.
    ///
    /// Problems are logged once and the draw is skipped.
    pub fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &GpuContext,
        camera: &Camera,
        material: &Material,
        frame_index: u32,
    ) {
        if !self.is_valid() {
            if !self.warned_invalid {
                log::warn!("MeshRenderer `{}`: invalid, skipping draw", self.label);
                self.warned_invalid = true;
            }
            return;
        }

        let (Some(camera_slot), Some(object_slot)) = (
            self.constants.camera_address(frame_index),
            self.constants.object_address(frame_index),
        ) else {
            if !self.warned_frame_index {
                log::warn!(
                    "MeshRenderer `{}`: frame index {frame_index} outside the ring, skipping draw",
                    self.label
                );
                self.warned_frame_index = true;
            }
            return;
        };

        let Some(frame_group) = ctx.descriptor(self.frame_descriptor) else {
            return;
        };
        let texture_group = material
            .texture(TextureRole::Albedo)
            .and_then(|texture| ctx.descriptor(texture.descriptor()));
        let Some(texture_group) = texture_group else {
            if !self.warned_texture {
                log::warn!(
                    "MeshRenderer `{}`: material `{}` has no albedo texture bound, skipping draw",
                    self.label,
                    material.name()
                );
                self.warned_texture = true;
            }
            return;
        };

        let camera_constants = CameraConstants::from_camera(camera);
        let view_projection = Mat4::from_cols_array_2d(&camera_constants.view_projection);
        let object_constants = ObjectConstants::new(self.world, view_projection);
        let queue = ctx.queue();
        if self
            .constants
            .update_camera(queue, frame_index, &camera_constants)
            .and_then(|()| self.constants.update_object(queue, frame_index, &object_constants))
            .is_err()
        {
            return;
        }

        pass.set_pipeline(self.pipeline.pipeline());
        pass.set_bind_group(0, frame_group, &[camera_slot.offset, object_slot.offset]);
        pass.set_bind_group(1, material.bind_group(), &[]);
        pass.set_bind_group(2, texture_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(indices) => {
                pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..self.draw_count, 0, 0..1);
            }
            None => pass.draw(0..self.draw_count, 0..1),
        }
    }

    /// Frees GPU buffers and retires the descriptor slot. Idempotent.
    pub fn release(&mut self, ctx: &mut GpuContext) {
        if self.released {
            return;
        }
        ctx.retire_descriptor(self.frame_descriptor);
        self.vertex_buffer.destroy();
        if let Some(indices) = &self.index_buffer {
            indices.destroy();
        }
        self.released = true;
        log::debug!("released mesh renderer `{}`", self.label);
    }
}

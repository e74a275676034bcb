use std::path::PathBuf;
use std::sync::Arc;

use crate::camera::Camera;
use crate::device::upload::create_buffer_init;
use crate::device::{DescriptorHandle, GpuContext};
use crate::error::{Error, Result};
use crate::shader::{DepthState, PipelineState, PipelineStateDesc, SKYBOX_PATH, ShaderCache, ShaderDesc};

use super::constants::{ConstantRing, SkyboxConstants};
use super::geometry::{PositionVertex, SKYBOX_INDICES, SKYBOX_VERTICES};
use super::layouts::{skybox_frame_layout, texture_cube_layout};
use super::texture::{AssetLoader, ImageData, Texture};

pub const SKYBOX_PIPELINE: &str = "ember/skybox";

/// Cubemap drawn behind everything else.
///
/// The view matrix loses its translation before upload and the vertex shader
/// pins depth to the far plane, so the box never moves relative to the
/// camera and never occludes scene geometry.
pub struct Skybox {
    pipeline: Arc<PipelineState>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    constants: ConstantRing<SkyboxConstants>,
    frame_descriptor: DescriptorHandle,
    cubemap: Texture,
    shut_down: bool,
    warned: bool,
}

impl Skybox {
    /// Decodes six faces through `loader` and builds the skybox.
    pub fn load(
        ctx: &mut GpuContext,
        shaders: &mut ShaderCache,
        loader: &dyn AssetLoader,
        faces: &[PathBuf; 6],
    ) -> Result<Self> {
        let cube = loader.load_cubemap(faces)?;
        Self::new(ctx, shaders, &cube)
    }

    pub fn new(ctx: &mut GpuContext, shaders: &mut ShaderCache, cube: &ImageData) -> Result<Self> {
        if !cube.is_cube() {
            return Err(Error::config(format!(
                "skybox needs a 6-layer cubemap, got {} layer(s)",
                cube.layers
            )));
        }
        cube.validate("skybox cubemap")?;

        let pipeline = ensure_skybox_pipeline(ctx, shaders)?;
        let vertex_buffer = create_buffer_init(
            ctx.device(),
            "skybox vertices",
            bytemuck::cast_slice(&SKYBOX_VERTICES[..]),
            wgpu::BufferUsages::VERTEX,
        )?;
        let index_buffer = create_buffer_init(
            ctx.device(),
            "skybox indices",
            bytemuck::cast_slice(&SKYBOX_INDICES[..]),
            wgpu::BufferUsages::INDEX,
        )?;

        let frames = ctx.frames_in_flight();
        let mut constants = ConstantRing::new("skybox constants");
        constants.initialize(ctx, frames)?;

        let layout = skybox_frame_layout(ctx, shaders);
        let binding = constants
            .binding()
            .ok_or_else(|| Error::resource("skybox", "constant ring not initialized"))?;
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox constants"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(binding),
            }],
        });

        // the upload owns a slot of its own; hand it back if ours fails
        let cube_layout = texture_cube_layout(ctx, shaders);
        let cubemap = Texture::upload(ctx, "skybox cubemap", cube, &cube_layout)?;
        let frame_descriptor = match ctx.allocate_descriptor() {
            Ok(handle) => handle,
            Err(err) => {
                cubemap.release(ctx);
                return Err(err);
            }
        };
        ctx.write_descriptor(frame_descriptor, bind_group);

        log::info!("skybox ready ({}x{} faces)", cube.width, cube.height);
        Ok(Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: SKYBOX_INDICES.len() as u32,
            constants,
            frame_descriptor,
            cubemap,
            shut_down: false,
            warned: false,
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.shut_down && self.constants.is_valid()
    }

    pub fn cubemap(&self) -> &Texture {
        &self.cubemap
    }

    /// Records the skybox draw. Call before the scene so it lands first.
    pub fn render(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        ctx: &GpuContext,
        camera: &Camera,
        frame_index: u32,
    ) {
        let groups = (
            ctx.descriptor(self.frame_descriptor),
            ctx.descriptor(self.cubemap.descriptor()),
        );
        let (true, Some(slot), (Some(frame_group), Some(cube_group))) =
            (self.is_valid(), self.constants.gpu_address(frame_index), groups)
        else {
            if !self.warned {
                log::warn!("Skybox: not drawable (shut down or frame index {frame_index} out of range)");
                self.warned = true;
            }
            return;
        };

        let constants = SkyboxConstants::from_camera(camera);
        if self.constants.update_data(ctx.queue(), frame_index, &constants).is_err() {
            return;
        }

        pass.set_pipeline(self.pipeline.pipeline());
        pass.set_bind_group(0, frame_group, &[slot.offset]);
        pass.set_bind_group(1, cube_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Releases GPU resources. Further renders are skipped.
    pub fn shutdown(&mut self, ctx: &mut GpuContext) {
        if self.shut_down {
            return;
        }
        ctx.retire_descriptor(self.frame_descriptor);
        self.cubemap.release(ctx);
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.shut_down = true;
        log::debug!("skybox shut down");
    }
}

fn ensure_skybox_pipeline(ctx: &GpuContext, shaders: &mut ShaderCache) -> Result<Arc<PipelineState>> {
    if let Some(pipeline) = shaders.get_pipeline_state(SKYBOX_PIPELINE) {
        return Ok(pipeline);
    }
    let vs = shaders.load_shader(&ShaderDesc::vertex(SKYBOX_PATH))?;
    let fs = shaders.load_shader(&ShaderDesc::fragment(SKYBOX_PATH))?;

    let mut desc = PipelineStateDesc::new(vs, fs, ctx.color_format(), ctx.depth_format());
    desc.bind_group_layouts = vec![skybox_frame_layout(ctx, shaders), texture_cube_layout(ctx, shaders)];
    desc.vertex_layouts = vec![PositionVertex::layout()];
    // seen from inside
    desc.cull_mode = None;
    desc.depth = Some(DepthState {
        format: ctx.depth_format(),
        write_enabled: false,
        compare: wgpu::CompareFunction::LessEqual,
    });
    shaders.create_pipeline_state(ctx, SKYBOX_PIPELINE, desc)
}

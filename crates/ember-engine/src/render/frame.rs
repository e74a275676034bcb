use crate::camera::Camera;
use crate::device::{FramePacer, GpuContext};
use crate::error::{Error, Result};
use crate::scene::Scene;

use super::skybox::Skybox;

/// Offscreen color and depth attachments.
pub struct FrameTargets {
    width: u32,
    height: u32,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    _depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl FrameTargets {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self> {
        let max = ctx.device().limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Error::config(format!(
                "frame size {width}x{height} outside 1..={max}"
            )));
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("frame color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.color_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("frame depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ctx.depth_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Ok(Self {
            width,
            height,
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            _depth: depth,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color(&self) -> &wgpu::Texture {
        &self.color
    }
}

/// What one call to [`FrameRenderer::render`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_number: u64,
    /// Ring slot the frame wrote its constants into.
    pub frame_index: u32,
    /// Fence value waited on before recording; 0 when no wait was needed.
    pub waited_for: u64,
    /// Fence value that marks this frame's completion.
    pub fence: u64,
}

/// Drives one frame: pace, record skybox and scene into one pass, submit.
///
/// Before recording into ring slot `k` it waits for the fence of the last
/// frame that used `k`, so at most `frames_in_flight` frames overlap.
/// Renderers the scene retired since the last frame are released after
/// that wait.
pub struct FrameRenderer {
    targets: FrameTargets,
    pacer: FramePacer,
    clear_color: wgpu::Color,
}

impl FrameRenderer {
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            targets: FrameTargets::new(ctx, width, height)?,
            pacer: FramePacer::new(ctx.frames_in_flight()),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.15,
                a: 1.0,
            },
        })
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Recreates the targets. Waits for in-flight frames first.
    pub fn resize(&mut self, ctx: &mut GpuContext, width: u32, height: u32) -> Result<()> {
        if self.targets.size() == (width, height) {
            return Ok(());
        }
        ctx.wait_for_gpu()?;
        self.targets = FrameTargets::new(ctx, width, height)?;
        log::debug!("frame targets resized to {width}x{height}");
        Ok(())
    }

    pub fn targets(&self) -> &FrameTargets {
        &self.targets
    }

    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    pub fn render(
        &mut self,
        ctx: &mut GpuContext,
        scene: &mut Scene,
        camera: &Camera,
        skybox: Option<&mut Skybox>,
    ) -> Result<FrameStats> {
        let (frame_index, wait) = self.pacer.begin();
        ctx.wait_for_fence(wait)?;
        scene.release_retired(ctx);

        let mut encoder = ctx.create_encoder("frame");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(skybox) = skybox {
                skybox.render(&mut pass, ctx, camera, frame_index);
            }
            scene.render(&mut pass, ctx, camera, frame_index);
        }

        let fence = ctx.submit([encoder.finish()]);
        let frame_number = self.pacer.frame_number();
        self.pacer.end(fence);

        Ok(FrameStats {
            frame_number,
            frame_index,
            waited_for: wait,
            fence,
        })
    }
}

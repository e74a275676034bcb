use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::camera::Camera;
use crate::device::GpuContext;
use crate::device::upload::align_to;
use crate::error::{Error, Result};

// ── constant blocks ──────────────────────────────────────────────────────

/// Per-frame camera block (`CameraConstants` in WGSL).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct CameraConstants {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl CameraConstants {
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
            position: camera.position().extend(1.0).to_array(),
        }
    }
}

/// Per-object block (`ObjectConstants` in WGSL).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub world_view_projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl ObjectConstants {
    pub fn new(world: Mat4, view_projection: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            world_view_projection: (view_projection * world).to_cols_array_2d(),
            position: world.w_axis.to_array(),
        }
    }
}

/// Skybox camera block: rotation-only view plus projection.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SkyboxConstants {
    pub view_no_translation: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl SkyboxConstants {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_no_translation: camera.view_rotation_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix().to_cols_array_2d(),
        }
    }
}

// ── ring layout ──────────────────────────────────────────────────────────

/// Placement of `frame_count` copies of one element in a single buffer.
///
/// Each copy starts on a multiple of the device's uniform offset alignment so
/// it can be bound with a dynamic offset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RingLayout {
    element_size: u64,
    stride: u64,
    frame_count: u32,
}

impl RingLayout {
    /// `alignment` must be a power of two.
    pub fn new(element_size: u64, alignment: u64, frame_count: u32) -> Self {
        let alignment = alignment.max(1);
        Self {
            element_size,
            stride: align_to(element_size.max(1), alignment),
            frame_count,
        }
    }

    #[inline]
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    #[inline]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Bytes needed for all copies.
    #[inline]
    pub fn total_size(&self) -> u64 {
        self.stride * self.frame_count as u64
    }

    /// Start of the copy for `frame_index`.
    pub fn offset(&self, frame_index: u32) -> Option<u64> {
        (frame_index < self.frame_count).then(|| self.stride * frame_index as u64)
    }

    /// Byte range of the copy for `frame_index`.
    pub fn region(&self, frame_index: u32) -> Option<Range<u64>> {
        self.offset(frame_index)
            .map(|start| start..start + self.element_size)
    }
}

// ── ring ─────────────────────────────────────────────────────────────────

/// Bind location of one frame's copy: the dynamic offset into the ring buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RingSlot {
    pub offset: u32,
    pub size: u64,
}

/// Per-frame copies of a uniform block `T`.
///
/// One buffer holds `frame_count` aligned copies; frame `i` writes and binds
/// copy `i`. The caller must not write a copy the GPU may still be reading;
/// a `FramePacer` wait before recording provides that.
pub struct ConstantRing<T: Pod> {
    label: &'static str,
    layout: Option<RingLayout>,
    buffer: Option<wgpu::Buffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> ConstantRing<T> {
    /// An empty ring; [`ConstantRing::is_valid`] stays false until
    /// [`ConstantRing::initialize`] succeeds.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            layout: None,
            buffer: None,
            _marker: PhantomData,
        }
    }

    pub fn initialize(&mut self, ctx: &GpuContext, frame_count: u32) -> Result<()> {
        let element_size = std::mem::size_of::<T>() as u64;
        if frame_count == 0 {
            return Err(Error::config(format!("{}: frame_count must be at least 1", self.label)));
        }
        if element_size == 0 || element_size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(Error::config(format!(
                "{}: element size {element_size} is not a multiple of {}",
                self.label,
                wgpu::COPY_BUFFER_ALIGNMENT
            )));
        }

        let limits = ctx.device().limits();
        let layout = RingLayout::new(
            element_size,
            limits.min_uniform_buffer_offset_alignment as u64,
            frame_count,
        );
        if element_size > limits.max_uniform_buffer_binding_size as u64 {
            return Err(Error::resource(
                self.label,
                format!(
                    "element of {element_size} bytes exceeds max_uniform_buffer_binding_size ({})",
                    limits.max_uniform_buffer_binding_size
                ),
            ));
        }

        let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: layout.total_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "{}: {} x {} bytes (stride {})",
            self.label,
            frame_count,
            element_size,
            layout.stride()
        );
        self.layout = Some(layout);
        self.buffer = Some(buffer);
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn layout(&self) -> Option<RingLayout> {
        self.layout
    }

    pub fn frame_count(&self) -> u32 {
        self.layout.map_or(0, |l| l.frame_count())
    }

    /// Copies `data` into the copy for `frame_index`.
    pub fn update_data(&self, queue: &wgpu::Queue, frame_index: u32, data: &T) -> Result<()> {
        let (Some(layout), Some(buffer)) = (self.layout, self.buffer.as_ref()) else {
            return Err(Error::config(format!("{}: ring not initialized", self.label)));
        };
        let offset = layout.offset(frame_index).ok_or_else(|| {
            Error::config(format!(
                "{}: frame index {frame_index} out of range (0..{})",
                self.label,
                layout.frame_count()
            ))
        })?;
        queue.write_buffer(buffer, offset, bytemuck::bytes_of(data));
        Ok(())
    }

    /// Where the draw for `frame_index` reads its copy.
    pub fn gpu_address(&self, frame_index: u32) -> Option<RingSlot> {
        let layout = self.layout?;
        let offset = layout.offset(frame_index)?;
        Some(RingSlot {
            offset: u32::try_from(offset).ok()?,
            size: layout.element_size(),
        })
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Binding of one element at offset 0, for use with dynamic offsets.
    pub fn binding(&self) -> Option<wgpu::BufferBinding<'_>> {
        let buffer = self.buffer.as_ref()?;
        Some(wgpu::BufferBinding {
            buffer,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        })
    }
}

/// Camera and object rings for one renderer.
pub struct ConstantBufferSet {
    camera: ConstantRing<CameraConstants>,
    object: ConstantRing<ObjectConstants>,
}

impl Default for ConstantBufferSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantBufferSet {
    pub fn new() -> Self {
        Self {
            camera: ConstantRing::new("camera constants"),
            object: ConstantRing::new("object constants"),
        }
    }

    /// Initializes both rings; the first failure is returned unchanged.
    pub fn initialize(&mut self, ctx: &GpuContext, frame_count: u32) -> Result<()> {
        self.camera.initialize(ctx, frame_count)?;
        self.object.initialize(ctx, frame_count)?;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.camera.is_valid() && self.object.is_valid()
    }

    pub fn update_camera(&self, queue: &wgpu::Queue, frame_index: u32, data: &CameraConstants) -> Result<()> {
        self.camera.update_data(queue, frame_index, data)
    }

    pub fn update_object(&self, queue: &wgpu::Queue, frame_index: u32, data: &ObjectConstants) -> Result<()> {
        self.object.update_data(queue, frame_index, data)
    }

    pub fn camera_address(&self, frame_index: u32) -> Option<RingSlot> {
        self.camera.gpu_address(frame_index)
    }

    pub fn object_address(&self, frame_index: u32) -> Option<RingSlot> {
        self.object.gpu_address(frame_index)
    }

    pub fn camera(&self) -> &ConstantRing<CameraConstants> {
        &self.camera
    }

    pub fn object(&self) -> &ConstantRing<ObjectConstants> {
        &self.object
    }
}

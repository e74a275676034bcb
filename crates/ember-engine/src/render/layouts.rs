//! Named bind group layouts shared by the built-in pipelines.
//!
//! Layouts live in the [`ShaderCache`] so every renderer that asks for the
//! same name binds against the same object.

use std::num::NonZeroU64;
use std::sync::Arc;

use crate::device::GpuContext;
use crate::shader::ShaderCache;

use super::constants::{CameraConstants, ObjectConstants, SkyboxConstants};
use super::material::MaterialConstants;

pub const FRAME_LAYOUT: &str = "ember/frame";
pub const MATERIAL_LAYOUT: &str = "ember/material";
pub const TEXTURE_2D_LAYOUT: &str = "ember/texture_2d";
pub const SKYBOX_FRAME_LAYOUT: &str = "ember/skybox_frame";
pub const TEXTURE_CUBE_LAYOUT: &str = "ember/texture_cube";

fn uniform_entry<T>(binding: u32, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

fn texture_entries(dimension: wgpu::TextureViewDimension) -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: dimension,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

/// Group 0 of mesh pipelines: camera and object rings, both dynamic.
pub fn frame_layout(ctx: &GpuContext, shaders: &mut ShaderCache) -> Arc<wgpu::BindGroupLayout> {
    shaders.bind_group_layout(
        ctx,
        FRAME_LAYOUT,
        &[
            uniform_entry::<CameraConstants>(0, true),
            uniform_entry::<ObjectConstants>(1, true),
        ],
    )
}

/// Group 1 of mesh pipelines.
pub fn material_layout(ctx: &GpuContext, shaders: &mut ShaderCache) -> Arc<wgpu::BindGroupLayout> {
    shaders.bind_group_layout(
        ctx,
        MATERIAL_LAYOUT,
        &[uniform_entry::<MaterialConstants>(0, false)],
    )
}

/// Group 2 of mesh pipelines.
pub fn texture_2d_layout(ctx: &GpuContext, shaders: &mut ShaderCache) -> Arc<wgpu::BindGroupLayout> {
    shaders.bind_group_layout(
        ctx,
        TEXTURE_2D_LAYOUT,
        &texture_entries(wgpu::TextureViewDimension::D2),
    )
}

pub fn skybox_frame_layout(ctx: &GpuContext, shaders: &mut ShaderCache) -> Arc<wgpu::BindGroupLayout> {
    shaders.bind_group_layout(
        ctx,
        SKYBOX_FRAME_LAYOUT,
        &[uniform_entry::<SkyboxConstants>(0, true)],
    )
}

pub fn texture_cube_layout(ctx: &GpuContext, shaders: &mut ShaderCache) -> Arc<wgpu::BindGroupLayout> {
    shaders.bind_group_layout(
        ctx,
        TEXTURE_CUBE_LAYOUT,
        &texture_entries(wgpu::TextureViewDimension::Cube),
    )
}

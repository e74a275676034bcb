//! Minimal material system: a uniform block plus role-keyed textures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytemuck::{Pod, Zeroable};
use glam::Vec4;

use crate::device::GpuContext;
use crate::device::upload::create_buffer_init;
use crate::error::{Error, Result};
use crate::shader::ShaderCache;

use super::layouts::{material_layout, texture_2d_layout};
use super::texture::{ImageData, Texture};

pub const DEFAULT_MATERIAL: &str = "default";

/// Material uniform block (`MaterialConstants` in WGSL).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub albedo: [f32; 4],
    /// x: metallic, y: roughness
    pub params: [f32; 4],
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialProperties {
    pub albedo: Vec4,
    pub metallic: f32,
    pub roughness: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            albedo: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
        }
    }
}

impl MaterialProperties {
    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn constants(&self) -> MaterialConstants {
        MaterialConstants {
            albedo: self.albedo.to_array(),
            params: [self.metallic, self.roughness, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureRole {
    Albedo,
}

/// Constants and textures bound at groups 1 and 2 of mesh pipelines.
pub struct Material {
    name: String,
    properties: Mutex<MaterialProperties>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    textures: HashMap<TextureRole, Arc<Texture>>,
}

impl Material {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> MaterialProperties {
        *self.properties.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rewrites the uniform block. Visible to draws submitted afterwards.
    pub fn update_properties(&self, queue: &wgpu::Queue, properties: MaterialProperties) {
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&properties.constants()));
        *self.properties.lock().unwrap_or_else(PoisonError::into_inner) = properties;
    }

    /// Group 1 bind group.
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn texture(&self, role: TextureRole) -> Option<&Arc<Texture>> {
        self.textures.get(&role)
    }
}

/// Owns named materials and the defaults substituted when none is assigned.
pub struct MaterialManager {
    materials: HashMap<String, Arc<Material>>,
    default_material: Arc<Material>,
    default_texture: Arc<Texture>,
}

impl MaterialManager {
    /// Uploads a 1x1 white albedo texture and builds the white default material.
    pub fn new(ctx: &mut GpuContext, shaders: &mut ShaderCache) -> Result<Self> {
        let texture_layout = texture_2d_layout(ctx, shaders);
        let default_texture = Arc::new(Texture::upload(
            ctx,
            "default albedo",
            &ImageData::solid([255, 255, 255, 255]),
            &texture_layout,
        )?);
        let default_material = Arc::new(build_material(
            ctx,
            shaders,
            DEFAULT_MATERIAL,
            MaterialProperties::default(),
            HashMap::from([(TextureRole::Albedo, Arc::clone(&default_texture))]),
        )?);

        let mut materials = HashMap::new();
        materials.insert(DEFAULT_MATERIAL.to_owned(), Arc::clone(&default_material));
        Ok(Self {
            materials,
            default_material,
            default_texture,
        })
    }

    /// Creates and registers a material. Missing albedo falls back to the
    /// default white texture.
    pub fn create_material(
        &mut self,
        ctx: &GpuContext,
        shaders: &mut ShaderCache,
        name: &str,
        properties: MaterialProperties,
        albedo: Option<Arc<Texture>>,
    ) -> Result<Arc<Material>> {
        if self.materials.contains_key(name) {
            return Err(Error::config(format!("material `{name}` already exists")));
        }
        let albedo = albedo.unwrap_or_else(|| Arc::clone(&self.default_texture));
        if albedo.is_cube() {
            return Err(Error::config(format!(
                "material `{name}`: albedo `{}` is a cubemap",
                albedo.label()
            )));
        }
        let material = Arc::new(build_material(
            ctx,
            shaders,
            name,
            properties,
            HashMap::from([(TextureRole::Albedo, albedo)]),
        )?);
        self.materials.insert(name.to_owned(), Arc::clone(&material));
        Ok(material)
    }

    pub fn material(&self, name: &str) -> Option<Arc<Material>> {
        self.materials.get(name).cloned()
    }

    pub fn default_material(&self) -> Arc<Material> {
        Arc::clone(&self.default_material)
    }

    pub fn default_texture(&self) -> Arc<Texture> {
        Arc::clone(&self.default_texture)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

fn build_material(
    ctx: &GpuContext,
    shaders: &mut ShaderCache,
    name: &str,
    properties: MaterialProperties,
    textures: HashMap<TextureRole, Arc<Texture>>,
) -> Result<Material> {
    let uniform = create_buffer_init(
        ctx.device(),
        &format!("material `{name}`"),
        bytemuck::bytes_of(&properties.constants()),
        wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    )?;
    let layout = material_layout(ctx, shaders);
    let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(name),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }],
    });
    log::debug!("created material `{name}`");
    Ok(Material {
        name: name.to_owned(),
        properties: Mutex::new(properties),
        uniform,
        bind_group,
        textures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_pack_params() {
        let props = MaterialProperties {
            albedo: Vec4::new(0.1, 0.2, 0.3, 1.0),
            metallic: 0.7,
            roughness: 0.25,
        };
        let c = props.constants();
        assert_eq!(c.albedo, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(c.params, [0.7, 0.25, 0.0, 0.0]);
        assert_eq!(std::mem::size_of::<MaterialConstants>(), 32);
    }

    #[test]
    fn default_is_opaque_white() {
        let props = MaterialProperties::default();
        assert_eq!(props.albedo, Vec4::ONE);
        assert_eq!(props.metallic, 0.0);
    }
}

use std::path::{Path, PathBuf};

use crate::device::upload::{create_buffer_init, padded_bytes_per_row};
use crate::device::{DescriptorHandle, GpuContext};
use crate::error::{Error, Result};

/// Decoded RGBA8 pixels, one or six layers.
///
/// Layers are stored back to back; a cubemap's layers follow wgpu's face
/// order (+X, -X, +Y, -Y, +Z, -Z).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub const BYTES_PER_PIXEL: u32 = 4;

    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layers: 1,
            pixels,
        }
    }

    /// One-pixel-per-layer image filled with `rgba`.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new(1, 1, rgba.to_vec())
    }

    /// One-pixel cubemap with every face set to `rgba`.
    pub fn solid_cube(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            layers: 6,
            pixels: rgba.repeat(6),
        }
    }

    pub fn is_cube(&self) -> bool {
        self.layers == 6
    }

    fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL as usize
    }

    /// Checks dimensions and pixel count.
    pub fn validate(&self, what: &str) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::resource(what, "image has a zero dimension"));
        }
        if self.layers != 1 && self.layers != 6 {
            return Err(Error::resource(
                what,
                format!("expected 1 or 6 layers, got {}", self.layers),
            ));
        }
        let expected = self.layer_size() * self.layers as usize;
        if self.pixels.len() != expected {
            return Err(Error::resource(
                what,
                format!("expected {expected} bytes of pixels, got {}", self.pixels.len()),
            ));
        }
        Ok(())
    }

    /// Copies rows into a buffer whose row pitch meets the copy alignment.
    fn padded_pixels(&self) -> (Vec<u8>, u32) {
        let row = self.width * Self::BYTES_PER_PIXEL;
        let padded = padded_bytes_per_row(row);
        if padded == row {
            return (self.pixels.clone(), padded);
        }
        let rows = (self.height * self.layers) as usize;
        let mut out = vec![0u8; padded as usize * rows];
        for (src, dst) in self
            .pixels
            .chunks_exact(row as usize)
            .zip(out.chunks_exact_mut(padded as usize))
        {
            dst[..row as usize].copy_from_slice(src);
        }
        (out, padded)
    }
}

// ── asset loader boundary ────────────────────────────────────────────────

/// Decodes image files into [`ImageData`].
pub trait AssetLoader {
    fn load_texture(&self, path: &Path) -> Result<ImageData>;

    /// Loads six equally sized faces into one cubemap image, in
    /// +X, -X, +Y, -Y, +Z, -Z order.
    fn load_cubemap(&self, faces: &[PathBuf; 6]) -> Result<ImageData> {
        let mut cube: Option<ImageData> = None;
        for path in faces {
            let face = self.load_texture(path)?;
            match cube.as_mut() {
                None => cube = Some(face),
                Some(cube) => {
                    if (face.width, face.height) != (cube.width, cube.height) {
                        return Err(Error::AssetDecode {
                            path: path.display().to_string(),
                            reason: format!(
                                "face is {}x{}, expected {}x{}",
                                face.width, face.height, cube.width, cube.height
                            ),
                        });
                    }
                    cube.pixels.extend_from_slice(&face.pixels);
                    cube.layers += 1;
                }
            }
        }
        cube.ok_or_else(|| Error::config("cubemap needs six faces"))
    }
}

/// Reads PNG and JPEG files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileLoader;

impl AssetLoader for ImageFileLoader {
    fn load_texture(&self, path: &Path) -> Result<ImageData> {
        let img = image::open(path).map_err(|e| Error::AssetDecode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("decoded {} ({width}x{height})", path.display());
        Ok(ImageData::new(width, height, rgba.into_raw()))
    }
}

// ── GPU texture ──────────────────────────────────────────────────────────

/// A sampled texture whose bind group lives in the context's descriptor table.
pub struct Texture {
    label: String,
    width: u32,
    height: u32,
    dimension: wgpu::TextureViewDimension,
    _texture: wgpu::Texture,
    _view: wgpu::TextureView,
    _sampler: wgpu::Sampler,
    descriptor: DescriptorHandle,
}

impl Texture {
    /// Uploads `image` with a one-shot copy and waits for it to land.
    ///
    /// `layout` must describe a texture at binding 0 and a filtering sampler
    /// at binding 1, with a view dimension matching the image's layer count.
    pub fn upload(
        ctx: &mut GpuContext,
        label: &str,
        image: &ImageData,
        layout: &wgpu::BindGroupLayout,
    ) -> Result<Self> {
        image.validate(label)?;

        let max = ctx.device().limits().max_texture_dimension_2d;
        if image.width > max || image.height > max {
            return Err(Error::resource(
                label,
                format!("{}x{} exceeds max_texture_dimension_2d ({max})", image.width, image.height),
            ));
        }

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: image.layers,
        };
        let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let (pixels, bytes_per_row) = image.padded_pixels();
        let staging = create_buffer_init(
            ctx.device(),
            &format!("{label} staging"),
            &pixels,
            wgpu::BufferUsages::COPY_SRC,
        )?;

        let mut encoder = ctx.create_encoder("texture upload");
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(image.height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            size,
        );
        ctx.submit([encoder.finish()]);
        ctx.wait_for_gpu()?;

        let dimension = if image.is_cube() {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(dimension),
            ..Default::default()
        });
        let sampler = ctx.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        let descriptor = ctx.allocate_descriptor()?;
        ctx.write_descriptor(descriptor, bind_group);

        log::info!(
            "uploaded texture `{label}` ({}x{}x{})",
            image.width,
            image.height,
            image.layers
        );
        Ok(Self {
            label: label.to_owned(),
            width: image.width,
            height: image.height,
            dimension,
            _texture: texture,
            _view: view,
            _sampler: sampler,
            descriptor,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_cube(&self) -> bool {
        self.dimension == wgpu::TextureViewDimension::Cube
    }

    /// Slot holding the texture + sampler bind group.
    pub fn descriptor(&self) -> DescriptorHandle {
        self.descriptor
    }

    /// Drops the bind group from the descriptor table.
    pub fn release(&self, ctx: &mut GpuContext) {
        ctx.retire_descriptor(self.descriptor);
    }
}

//! CPU to GPU copy helpers.
//!
//! Buffers are created mapped, filled, and unmapped before they are handed
//! back. The unmap happens in a drop guard so it runs on every exit path.

use crate::error::{Error, Result};

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub fn align_to(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Row pitch for a texture copy, padded to wgpu's row alignment.
#[inline]
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    align_to(unpadded as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as u32
}

struct UnmapOnDrop<'a>(&'a wgpu::Buffer);

impl Drop for UnmapOnDrop<'_> {
    fn drop(&mut self) {
        self.0.unmap();
    }
}

/// Runs `write` against the mapped contents of a buffer created with
/// `mapped_at_creation: true`, then unmaps it.
///
/// The buffer is unmapped even if `write` returns an error.
pub fn map_and_write<F>(buffer: &wgpu::Buffer, write: F) -> Result<()>
where
    F: FnOnce(&mut [u8]) -> Result<()>,
{
    let _unmap = UnmapOnDrop(buffer);
    let mut view = buffer.slice(..).get_mapped_range_mut();
    write(&mut view[..])
}

/// Creates a buffer holding `contents`, padded to the copy alignment.
pub fn create_buffer_init(
    device: &wgpu::Device,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> Result<wgpu::Buffer> {
    if contents.is_empty() {
        return Err(Error::resource(label, "buffer contents are empty"));
    }

    let size = align_to(contents.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT);
    let max = device.limits().max_buffer_size;
    if size > max {
        return Err(Error::resource(
            label,
            format!("{size} bytes exceeds max_buffer_size ({max})"),
        ));
    }

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage,
        mapped_at_creation: true,
    });

    map_and_write(&buffer, |bytes| {
        bytes[..contents.len()].copy_from_slice(contents);
        Ok(())
    })?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn rows_pad_to_256() {
        // 1x1 RGBA8
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        // 100px RGBA8 = 400 bytes
        assert_eq!(padded_bytes_per_row(400), 512);
    }
}

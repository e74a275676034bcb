use crate::error::{Error, Result};

/// Slot in the context's descriptor table.
///
/// The handle is both the CPU write location (see
/// [`GpuContext::write_descriptor`](super::GpuContext::write_descriptor)) and
/// the GPU read location bound at draw time.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DescriptorHandle {
    index: u32,
}

impl DescriptorHandle {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Bump allocator over a fixed-capacity descriptor table.
///
/// Indices are handed out in increasing order and never reused for the
/// lifetime of the allocator. Running past capacity is a configuration error.
#[derive(Debug, Clone)]
pub struct DescriptorAllocator {
    capacity: u32,
    next: u32,
}

impl DescriptorAllocator {
    pub fn new(capacity: u32) -> Self {
        Self { capacity, next: 0 }
    }

    pub fn allocate(&mut self) -> Result<DescriptorHandle> {
        if self.next >= self.capacity {
            return Err(Error::config(format!(
                "descriptor table exhausted ({} slots); raise GpuSettings::descriptor_capacity",
                self.capacity
            )));
        }
        let handle = DescriptorHandle { index: self.next };
        self.next += 1;
        Ok(handle)
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.next
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn remaining(&self) -> u32 {
        self.capacity - self.next
    }
}

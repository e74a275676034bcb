use crate::error::{Error, Result};

use super::descriptor::{DescriptorAllocator, DescriptorHandle};
use super::fence::FenceTimeline;
use super::settings::{CapabilityLevel, GpuSettings};

/// Owns the wgpu device, its queue, the descriptor table and the fence.
///
/// This is the low-level rendering context every renderer borrows:
/// - selects an adapter from a ranked candidate list
/// - creates and stores Instance/Adapter/Device/Queue
/// - hands out descriptor table slots (bump allocated, never reused)
/// - tracks submissions with a monotonic fence
///
/// The context is headless; presentation is left to the embedding application.
/// It is not internally synchronized and expects single-threaded access.
pub struct GpuContext {
    /// Kept alive for the lifetime of the adapter and device.
    _instance: wgpu::Instance,

    /// Selected adapter.
    adapter: wgpu::Adapter,

    /// Cached adapter description (name, vendor, backend).
    adapter_info: wgpu::AdapterInfo,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Settings the context was created with.
    settings: GpuSettings,

    /// Slot allocator for `descriptor_table`.
    descriptors: DescriptorAllocator,

    /// GPU-visible binding groups indexed by `DescriptorHandle`.
    ///
    /// Retired slots hold `None`; their index is never handed out again.
    descriptor_table: Vec<Option<wgpu::BindGroup>>,

    /// Fence values paired with queue submission indices.
    fence: FenceTimeline<wgpu::SubmissionIndex>,
}

impl GpuContext {
    /// Creates a context.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; see
    /// [`GpuContext::initialize`] for the blocking form.
    pub async fn new(settings: &GpuSettings) -> Result<Self> {
        settings.validate()?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: settings.backends,
            flags: settings.instance_flags(),
            ..Default::default()
        });

        let adapter = select_adapter(&instance, settings).await?;
        let adapter_info = adapter.get_info();
        log::info!(
            "selected adapter: {} ({:?}, {:?}, vendor {:#06x})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend,
            adapter_info.vendor,
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ember-engine device"),
                required_features: settings.required_features,
                required_limits: settings.min_capability.required_limits(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|err| Error::Device(format!("failed to create device/queue: {err}")))?;

        log::info!(
            "gpu context ready: {} descriptor slots, {} frame(s) in flight",
            settings.descriptor_capacity,
            settings.frames_in_flight
        );

        Ok(Self {
            _instance: instance,
            adapter,
            adapter_info,
            device,
            queue,
            settings: settings.clone(),
            descriptors: DescriptorAllocator::new(settings.descriptor_capacity),
            descriptor_table: Vec::new(),
            fence: FenceTimeline::new(),
        })
    }

    /// Blocking variant of [`GpuContext::new`].
    pub fn initialize(settings: &GpuSettings) -> Result<Self> {
        pollster::block_on(Self::new(settings))
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn settings(&self) -> &GpuSettings {
        &self.settings
    }

    pub fn capability_level(&self) -> CapabilityLevel {
        self.settings.min_capability
    }

    /// Frames the CPU may record ahead of the GPU.
    pub fn frames_in_flight(&self) -> u32 {
        self.settings.frames_in_flight
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.settings.color_format
    }

    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.settings.depth_format
    }

    // ── descriptor table ──────────────────────────────────────────────────

    /// Reserves the next unused descriptor slot.
    ///
    /// Fails with a configuration error once the table is full.
    pub fn allocate_descriptor(&mut self) -> Result<DescriptorHandle> {
        let handle = self.descriptors.allocate()?;
        self.descriptor_table.push(None);
        Ok(handle)
    }

    /// Stores `bind_group` in `handle`'s slot, replacing what was there.
    pub fn write_descriptor(&mut self, handle: DescriptorHandle, bind_group: wgpu::BindGroup) {
        match self.descriptor_table.get_mut(handle.index() as usize) {
            Some(slot) => *slot = Some(bind_group),
            None => log::warn!("write to unallocated descriptor slot {}", handle.index()),
        }
    }

    /// The bind group stored in `handle`'s slot, if any.
    pub fn descriptor(&self, handle: DescriptorHandle) -> Option<&wgpu::BindGroup> {
        self.descriptor_table
            .get(handle.index() as usize)
            .and_then(Option::as_ref)
    }

    /// Drops the bind group in `handle`'s slot. The index stays consumed.
    pub fn retire_descriptor(&mut self, handle: DescriptorHandle) {
        if let Some(slot) = self.descriptor_table.get_mut(handle.index() as usize) {
            *slot = None;
        }
    }

    /// Slots handed out over the context lifetime.
    pub fn descriptors_allocated(&self) -> u32 {
        self.descriptors.allocated()
    }

    pub fn descriptor_capacity(&self) -> u32 {
        self.descriptors.capacity()
    }

    // ── submission & fence ────────────────────────────────────────────────

    pub fn create_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    /// Submits `command_buffers` and returns the fence value that marks
    /// their completion.
    pub fn submit<I>(&mut self, command_buffers: I) -> u64
    where
        I: IntoIterator<Item = wgpu::CommandBuffer>,
    {
        let index = self.queue.submit(command_buffers);
        self.fence.signal(index)
    }

    /// Signals the fence after all work submitted so far.
    pub fn signal(&mut self) -> u64 {
        self.submit(std::iter::empty::<wgpu::CommandBuffer>())
    }

    /// Highest fence value known to be complete.
    pub fn completed_fence_value(&self) -> u64 {
        self.fence.completed()
    }

    pub fn last_signaled_fence_value(&self) -> u64 {
        self.fence.last_signaled()
    }

    /// Blocks until the fence reaches `value`.
    ///
    /// Waiting on a value that was never signaled would never return and is
    /// rejected as a configuration error.
    pub fn wait_for_fence(&mut self, value: u64) -> Result<()> {
        if self.fence.is_complete(value) {
            return Ok(());
        }
        if value > self.fence.last_signaled() {
            return Err(Error::config(format!(
                "fence value {value} was never signaled (last {})",
                self.fence.last_signaled()
            )));
        }

        if let Some(index) = self.fence.token_through(value).cloned() {
            self.device
                .poll(wgpu::PollType::Wait {
                    submission_index: Some(index),
                    timeout: None,
                })
                .map_err(|err| Error::Device(format!("waiting for fence {value} failed: {err}")))?;
        }

        self.fence.mark_completed(value);
        Ok(())
    }

    /// Blocks until every submission so far has completed.
    ///
    /// Used for one-shot uploads and shutdown; never call it per frame.
    pub fn wait_for_gpu(&mut self) -> Result<()> {
        let value = self.signal();
        self.wait_for_fence(value)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        if let Err(err) = self.wait_for_gpu() {
            log::warn!("gpu did not drain cleanly on shutdown: {err}");
        }
    }
}

async fn select_adapter(instance: &wgpu::Instance, settings: &GpuSettings) -> Result<wgpu::Adapter> {
    for (power_preference, force_fallback_adapter) in settings.adapter_preference.candidates() {
        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(err) => {
                log::debug!(
                    "no adapter for {power_preference:?} (fallback: {force_fallback_adapter}): {err}"
                );
                continue;
            }
        };

        let compliant = adapter.get_downlevel_capabilities().is_webgpu_compliant();
        if settings.min_capability.is_met_by(&adapter.limits(), compliant) {
            return Ok(adapter);
        }

        let info = adapter.get_info();
        log::warn!(
            "skipping adapter {} ({:?}): below `{}` capability level",
            info.name,
            info.backend,
            settings.min_capability
        );
    }

    Err(Error::Device(format!(
        "no adapter meets the `{}` capability level",
        settings.min_capability
    )))
}

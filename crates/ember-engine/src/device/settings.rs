use std::fmt;

use crate::error::{Error, Result};

/// Minimum feature set an adapter must offer to be selected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CapabilityLevel {
    /// WebGL2-class hardware.
    WebGl2,
    /// Downlevel limits (GLES 3.1 / D3D11-class hardware).
    Downlevel,
    /// Full WebGPU limits and a WebGPU-compliant downlevel profile.
    Full,
}

impl CapabilityLevel {
    /// Limits requested from the device at this level.
    pub fn required_limits(self) -> wgpu::Limits {
        match self {
            Self::WebGl2 => wgpu::Limits::downlevel_webgl2_defaults(),
            Self::Downlevel => wgpu::Limits::downlevel_defaults(),
            Self::Full => wgpu::Limits::default(),
        }
    }

    /// Whether an adapter reporting `limits` satisfies this level.
    ///
    /// `webgpu_compliant` is only consulted for [`CapabilityLevel::Full`].
    pub fn is_met_by(self, limits: &wgpu::Limits, webgpu_compliant: bool) -> bool {
        if !self.required_limits().check_limits(limits) {
            return false;
        }
        self != Self::Full || webgpu_compliant
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WebGl2 => "webgl2",
            Self::Downlevel => "downlevel",
            Self::Full => "full",
        };
        f.write_str(name)
    }
}

/// Which physical adapter to try first.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdapterPreference {
    HighPerformance,
    PowerSaving,
}

impl AdapterPreference {
    /// Ranked list of `(power preference, force fallback)` requests.
    ///
    /// The preferred class comes first, then the other class, then the
    /// software fallback adapter.
    pub fn candidates(self) -> [(wgpu::PowerPreference, bool); 3] {
        let (first, second) = match self {
            Self::HighPerformance => (
                wgpu::PowerPreference::HighPerformance,
                wgpu::PowerPreference::LowPower,
            ),
            Self::PowerSaving => (
                wgpu::PowerPreference::LowPower,
                wgpu::PowerPreference::HighPerformance,
            ),
        };
        [(first, false), (second, false), (wgpu::PowerPreference::None, true)]
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high-performance" | "high" | "discrete" => Some(Self::HighPerformance),
            "power-saving" | "low-power" | "integrated" => Some(Self::PowerSaving),
            _ => None,
        }
    }
}

/// Device creation parameters.
///
/// Every field has a usable default; most applications only touch
/// `adapter_preference` or the debug toggles.
#[derive(Debug, Clone)]
pub struct GpuSettings {
    /// Enable backend debug layers and labels.
    ///
    /// Defaults to on in debug builds.
    pub enable_debug_layer: bool,

    /// Enable backend validation (slow; catches API misuse).
    pub enable_gpu_validation: bool,

    /// Adapters below this level are skipped during selection.
    pub min_capability: CapabilityLevel,

    pub adapter_preference: AdapterPreference,

    /// Backends the instance may use.
    pub backends: wgpu::Backends,

    /// Number of slots in the descriptor table.
    ///
    /// Slots are never reclaimed, so size this for the whole context lifetime.
    pub descriptor_capacity: u32,

    /// Frames the CPU may record ahead of the GPU. Sizes every constant ring.
    pub frames_in_flight: u32,

    /// Color target format used by engine pipelines.
    pub color_format: wgpu::TextureFormat,

    /// Depth target format used by engine pipelines.
    pub depth_format: wgpu::TextureFormat,

    /// Required wgpu features. Keep empty for portability.
    pub required_features: wgpu::Features,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            enable_debug_layer: cfg!(debug_assertions),
            enable_gpu_validation: false,
            min_capability: CapabilityLevel::Downlevel,
            adapter_preference: AdapterPreference::HighPerformance,
            backends: wgpu::Backends::all(),
            descriptor_capacity: 1024,
            frames_in_flight: 2,
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            depth_format: wgpu::TextureFormat::Depth32Float,
            required_features: wgpu::Features::empty(),
        }
    }
}

impl GpuSettings {
    /// Applies `EMBER_*` environment overrides on top of `self`.
    ///
    /// Recognized variables: `EMBER_GPU_DEBUG`, `EMBER_GPU_VALIDATION`
    /// (`0`/`1`/`true`/`false`), `EMBER_ADAPTER` (`high-performance` or
    /// `power-saving`) and `EMBER_FRAMES_IN_FLIGHT`. Unparsable values are
    /// logged and ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("EMBER_GPU_DEBUG") {
            match parse_flag(&v) {
                Some(flag) => self.enable_debug_layer = flag,
                None => log::warn!("ignoring EMBER_GPU_DEBUG={v:?}"),
            }
        }
        if let Some(v) = lookup("EMBER_GPU_VALIDATION") {
            match parse_flag(&v) {
                Some(flag) => self.enable_gpu_validation = flag,
                None => log::warn!("ignoring EMBER_GPU_VALIDATION={v:?}"),
            }
        }
        if let Some(v) = lookup("EMBER_ADAPTER") {
            match AdapterPreference::parse(&v) {
                Some(pref) => self.adapter_preference = pref,
                None => log::warn!("ignoring EMBER_ADAPTER={v:?}"),
            }
        }
        if let Some(v) = lookup("EMBER_FRAMES_IN_FLIGHT") {
            match v.trim().parse::<u32>() {
                Ok(n) => self.frames_in_flight = n,
                Err(_) => log::warn!("ignoring EMBER_FRAMES_IN_FLIGHT={v:?}"),
            }
        }
        self
    }

    /// Rejects settings no context could be created with.
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_capacity == 0 {
            return Err(Error::config("descriptor_capacity must be at least 1"));
        }
        if self.frames_in_flight == 0 {
            return Err(Error::config("frames_in_flight must be at least 1"));
        }
        if !self.depth_format.has_depth_aspect() {
            return Err(Error::config(format!(
                "depth_format {:?} has no depth aspect",
                self.depth_format
            )));
        }
        if self.color_format.has_depth_aspect() || self.color_format.has_stencil_aspect() {
            return Err(Error::config(format!(
                "color_format {:?} is a depth/stencil format",
                self.color_format
            )));
        }
        Ok(())
    }

    pub(crate) fn instance_flags(&self) -> wgpu::InstanceFlags {
        let mut flags = wgpu::InstanceFlags::empty();
        if self.enable_debug_layer {
            flags |= wgpu::InstanceFlags::DEBUG;
        }
        if self.enable_gpu_validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
        }
        flags
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

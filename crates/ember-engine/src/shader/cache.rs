use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::device::GpuContext;
use crate::error::{Error, Result};

use super::builtin;
use super::pipeline::{PipelineState, PipelineStateDesc};
use super::program::{Shader, ShaderDesc, ShaderKey, ShaderStage};
use super::source::{
    FileSystemSources, LayeredSources, Overlay, ShaderSourceProvider, preprocess,
};

/// Pipelines every cache can provide once
/// [`ShaderCache::create_default_pipelines`] has run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DefaultPipeline {
    /// Albedo texture times material color.
    Unlit,
    /// Unlit, additionally modulated by the vertex color.
    VertexColor,
}

impl DefaultPipeline {
    pub const ALL: [Self; 2] = [Self::Unlit, Self::VertexColor];

    pub fn name(self) -> &'static str {
        match self {
            Self::Unlit => "default/unlit",
            Self::VertexColor => "default/vertex_color",
        }
    }
}

/// Compiled shader and pipeline cache.
///
/// - shaders are keyed by `(path, entry point, stage, macros)` and never
///   recompiled while cached
/// - pipelines are keyed by a caller-chosen name; equal descriptions under
///   different names are not merged
/// - bind group layouts are shared by name
///
/// The first request for a path reads and compiles it. Call [`ShaderCache::warm`]
/// before the frame loop to keep that latency out of frames.
pub struct ShaderCache {
    sources: Box<dyn ShaderSourceProvider>,
    shaders: HashMap<ShaderKey, Arc<Shader>>,
    modules: HashMap<ShaderKey, wgpu::ShaderModule>,
    pipelines: HashMap<String, Arc<PipelineState>>,
    layouts: HashMap<String, Arc<wgpu::BindGroupLayout>>,
    compilations: u64,
}

impl ShaderCache {
    pub fn new(sources: impl ShaderSourceProvider + 'static) -> Self {
        Self {
            sources: Box::new(sources),
            shaders: HashMap::new(),
            modules: HashMap::new(),
            pipelines: HashMap::new(),
            layouts: HashMap::new(),
            compilations: 0,
        }
    }

    /// Cache over the engine's built-in shaders only.
    pub fn with_builtin_sources() -> Self {
        Self::new(builtin::builtin_sources())
    }

    /// Built-in shaders first, then files below `dir`.
    pub fn with_shader_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(
            LayeredSources::new()
                .with(builtin::builtin_sources())
                .with(FileSystemSources::new(dir)),
        )
    }

    // ── shaders ───────────────────────────────────────────────────────────

    /// Returns the cached shader for `desc`, compiling it on first request.
    pub fn load_shader(&mut self, desc: &ShaderDesc) -> Result<Arc<Shader>> {
        let key = desc.key();
        if let Some(shader) = self.shaders.get(&key) {
            log::debug!("shader cache hit: {}:{}", key.path(), key.entry_point());
            return Ok(Arc::clone(shader));
        }

        let shader = Arc::new(compile_key(self.sources.as_ref(), key.clone())?);
        self.compilations += 1;
        log::info!(
            "compiled shader {}:{} ({})",
            key.path(),
            key.entry_point(),
            key.stage()
        );
        self.shaders.insert(key, Arc::clone(&shader));
        Ok(shader)
    }

    /// Compiles WGSL handed in directly.
    ///
    /// The shader is cached under the path `inline:<name>`; includes inside
    /// `source` resolve against the cache's regular sources.
    pub fn compile_from_string(
        &mut self,
        name: &str,
        source: &str,
        entry_point: &str,
        stage: ShaderStage,
    ) -> Result<Arc<Shader>> {
        let path = format!("inline:{name}");
        let key = ShaderDesc::new(path.as_str(), stage)
            .with_entry_point(entry_point)
            .key();
        if let Some(shader) = self.shaders.get(&key) {
            return Ok(Arc::clone(shader));
        }

        let overlay = Overlay {
            path: &path,
            source,
            base: self.sources.as_ref(),
        };
        let shader = Arc::new(compile_key(&overlay, key.clone())?);
        self.compilations += 1;
        self.shaders.insert(key, Arc::clone(&shader));
        Ok(shader)
    }

    /// Compiles every description up front. Stops at the first failure.
    pub fn warm(&mut self, descs: &[ShaderDesc]) -> Result<()> {
        for desc in descs {
            self.load_shader(desc)?;
        }
        Ok(())
    }

    pub fn get_shader(&self, key: &ShaderKey) -> Option<Arc<Shader>> {
        self.shaders.get(key).cloned()
    }

    pub fn has_shader(&self, key: &ShaderKey) -> bool {
        self.shaders.contains_key(key)
    }

    /// Evicts a shader. Pipelines already linked against it stay valid.
    pub fn remove_shader(&mut self, key: &ShaderKey) -> bool {
        self.modules.remove(key);
        self.shaders.remove(key).is_some()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Total compilations performed, cache misses only.
    pub fn compilation_count(&self) -> u64 {
        self.compilations
    }

    // ── bind group layouts ────────────────────────────────────────────────

    /// Returns the layout registered as `name`, creating it from `entries`
    /// on first use.
    pub fn bind_group_layout(
        &mut self,
        ctx: &GpuContext,
        name: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Arc<wgpu::BindGroupLayout> {
        if let Some(layout) = self.layouts.get(name) {
            return Arc::clone(layout);
        }
        let layout = Arc::new(ctx.device().create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries,
            },
        ));
        self.layouts.insert(name.to_owned(), Arc::clone(&layout));
        layout
    }

    // ── pipelines ─────────────────────────────────────────────────────────

    /// Links `desc` into a pipeline cached as `name`.
    ///
    /// A name can only be used once; call [`ShaderCache::remove_pipeline_state`]
    /// before re-creating it.
    pub fn create_pipeline_state(
        &mut self,
        ctx: &GpuContext,
        name: &str,
        desc: PipelineStateDesc,
    ) -> Result<Arc<PipelineState>> {
        if self.pipelines.contains_key(name) {
            return Err(Error::config(format!("pipeline `{name}` already exists")));
        }
        validate_desc(ctx, name, &desc)?;

        self.ensure_module(ctx, &desc.vertex);
        if let Some(fragment) = &desc.fragment {
            self.ensure_module(ctx, fragment);
        }

        let vs_module = self
            .modules
            .get(desc.vertex.key())
            .ok_or_else(|| Error::resource(format!("pipeline `{name}`"), "vertex module missing"))?;
        let fs_module = match &desc.fragment {
            Some(fragment) => Some(self.modules.get(fragment.key()).ok_or_else(|| {
                Error::resource(format!("pipeline `{name}`"), "fragment module missing")
            })?),
            None => None,
        };

        let device = ctx.device();
        let group_refs: Vec<&wgpu::BindGroupLayout> =
            desc.bind_group_layouts.iter().map(Arc::as_ref).collect();
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &group_refs,
            immediate_size: 0,
        });

        let buffers: Vec<wgpu::VertexBufferLayout<'_>> =
            desc.vertex_layouts.iter().map(|l| l.as_wgpu()).collect();

        let targets = [desc.color_format.map(|format| wgpu::ColorTargetState {
            format,
            blend: desc.blend,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let fragment = match (&desc.fragment, fs_module) {
            (Some(shader), Some(module)) => Some(wgpu::FragmentState {
                module,
                entry_point: Some(shader.entry_point()),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            _ => None,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(name),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: vs_module,
                entry_point: Some(desc.vertex.entry_point()),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            primitive: desc.primitive(),
            depth_stencil: desc.depth_stencil(),
            multisample: wgpu::MultisampleState::default(),
            fragment,
            multiview_mask: None,
            cache: None,
        });

        let state = Arc::new(PipelineState::new(
            name.to_owned(),
            pipeline,
            desc.bind_group_layouts.clone(),
            desc.depth,
        ));
        log::info!("created pipeline `{name}`");
        self.pipelines.insert(name.to_owned(), Arc::clone(&state));
        Ok(state)
    }

    pub fn get_pipeline_state(&self, name: &str) -> Option<Arc<PipelineState>> {
        self.pipelines.get(name).cloned()
    }

    pub fn has_pipeline_state(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Frees the name for re-creation. Holders of the old `Arc` keep it alive.
    pub fn remove_pipeline_state(&mut self, name: &str) -> bool {
        self.pipelines.remove(name).is_some()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Builds the [`DefaultPipeline`]s that do not exist yet.
    pub fn create_default_pipelines(&mut self, ctx: &GpuContext) -> Result<()> {
        for which in DefaultPipeline::ALL {
            crate::render::ensure_default_pipeline(ctx, self, which)?;
        }
        Ok(())
    }

    pub fn default_pipeline(&self, which: DefaultPipeline) -> Option<Arc<PipelineState>> {
        self.get_pipeline_state(which.name())
    }

    fn ensure_module(&mut self, ctx: &GpuContext, shader: &Shader) {
        if self.modules.contains_key(shader.key()) {
            return;
        }
        let module = ctx
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.path()),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader.source().to_owned())),
            });
        self.modules.insert(shader.key().clone(), module);
    }
}

fn compile_key(sources: &dyn ShaderSourceProvider, key: ShaderKey) -> Result<Shader> {
    let defines: &BTreeMap<String, String> = key.defines();
    let source = preprocess(sources, key.path(), defines).map_err(|err| Error::ShaderCompilation {
        path: key.path().to_owned(),
        entry_point: key.entry_point().to_owned(),
        diagnostic: err.to_string(),
    })?;
    Shader::compile(key, source)
}

fn validate_desc(ctx: &GpuContext, name: &str, desc: &PipelineStateDesc) -> Result<()> {
    if desc.vertex.stage() != ShaderStage::Vertex {
        return Err(Error::config(format!(
            "pipeline `{name}`: `{}` is not a vertex shader",
            desc.vertex.path()
        )));
    }
    if let Some(fragment) = &desc.fragment {
        if fragment.stage() != ShaderStage::Fragment {
            return Err(Error::config(format!(
                "pipeline `{name}`: `{}` is not a fragment shader",
                fragment.path()
            )));
        }
        if desc.color_format.is_none() {
            return Err(Error::config(format!(
                "pipeline `{name}`: fragment stage without a color format"
            )));
        }
    }
    let max_groups = ctx.device().limits().max_bind_groups as usize;
    if desc.bind_group_layouts.len() > max_groups {
        return Err(Error::config(format!(
            "pipeline `{name}`: {} bind groups exceeds device limit {max_groups}",
            desc.bind_group_layouts.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::source::EmbeddedSources;

    // ── caching ───────────────────────────────────────────────────────────

    #[test]
    fn same_desc_returns_same_instance() {
        let mut cache = ShaderCache::with_builtin_sources();
        let desc = ShaderDesc::vertex(builtin::MESH_PATH);
        let a = cache.load_shader(&desc).unwrap();
        let b = cache.load_shader(&desc).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.shader_count(), 1);
        assert_eq!(cache.compilation_count(), 1);
    }

    #[test]
    fn changed_macro_is_distinct_entry() {
        let mut cache = ShaderCache::with_builtin_sources();
        let plain = cache.load_shader(&ShaderDesc::fragment(builtin::MESH_PATH)).unwrap();
        let colored = cache
            .load_shader(&ShaderDesc::fragment(builtin::MESH_PATH).with_macro(builtin::VERTEX_COLOR_MACRO, "1"))
            .unwrap();
        assert!(!Arc::ptr_eq(&plain, &colored));
        assert_eq!(cache.shader_count(), 2);
        assert!(colored.source().contains("color.rgb * input.color"));
        assert!(!plain.source().contains("color.rgb * input.color"));
    }

    #[test]
    fn changed_stage_is_distinct_entry() {
        let mut cache = ShaderCache::with_builtin_sources();
        let vs = cache.load_shader(&ShaderDesc::vertex(builtin::MESH_PATH)).unwrap();
        let fs = cache.load_shader(&ShaderDesc::fragment(builtin::MESH_PATH)).unwrap();
        assert!(!Arc::ptr_eq(&vs, &fs));
    }

    #[test]
    fn removal_forces_recompile() {
        let mut cache = ShaderCache::with_builtin_sources();
        let desc = ShaderDesc::vertex(builtin::SKYBOX_PATH);
        let a = cache.load_shader(&desc).unwrap();
        assert!(cache.remove_shader(a.key()));
        assert!(!cache.has_shader(a.key()));
        let b = cache.load_shader(&desc).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.compilation_count(), 2);
    }

    // ── builtins ──────────────────────────────────────────────────────────

    #[test]
    fn builtin_shaders_compile() {
        let mut cache = ShaderCache::with_builtin_sources();
        cache
            .warm(&[
                ShaderDesc::vertex(builtin::MESH_PATH),
                ShaderDesc::fragment(builtin::MESH_PATH),
                ShaderDesc::fragment(builtin::MESH_PATH).with_macro(builtin::VERTEX_COLOR_MACRO, "1"),
                ShaderDesc::vertex(builtin::SKYBOX_PATH),
                ShaderDesc::fragment(builtin::SKYBOX_PATH),
            ])
            .unwrap();
        assert_eq!(cache.shader_count(), 5);
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn missing_file_is_compilation_error() {
        let mut cache = ShaderCache::new(EmbeddedSources::new());
        let err = cache.load_shader(&ShaderDesc::vertex("nowhere.wgsl")).unwrap_err();
        match err {
            Error::ShaderCompilation { path, diagnostic, .. } => {
                assert_eq!(path, "nowhere.wgsl");
                assert!(diagnostic.contains("nowhere.wgsl"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.shader_count(), 0);
    }

    #[test]
    fn inline_shader_can_include_builtins() {
        let mut cache = ShaderCache::with_builtin_sources();
        let src = "#include \"/ember/common.wgsl\"\n\
                   @group(0) @binding(0) var<uniform> cam: CameraConstants;\n\
                   @vertex fn main() -> @builtin(position) vec4<f32> { return cam.position; }\n";
        let a = cache
            .compile_from_string("probe", src, "main", ShaderStage::Vertex)
            .unwrap();
        assert_eq!(a.path(), "inline:probe");
        let b = cache
            .compile_from_string("probe", src, "main", ShaderStage::Vertex)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn default_pipeline_names_are_distinct() {
        assert_ne!(DefaultPipeline::Unlit.name(), DefaultPipeline::VertexColor.name());
    }
}

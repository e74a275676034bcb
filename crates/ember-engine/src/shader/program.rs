use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Pipeline stage a shader entry point runs in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Conventional entry point name for this stage in engine shaders.
    pub fn default_entry_point(self) -> &'static str {
        match self {
            Self::Vertex => "vs_main",
            Self::Fragment => "fs_main",
            Self::Compute => "cs_main",
        }
    }

    fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
            Self::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A `NAME=value` preprocessor definition.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ShaderMacro {
    pub name: String,
    pub value: String,
}

impl ShaderMacro {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A macro that only exists to be tested with `#ifdef`.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, "1")
    }
}

/// Request for a compiled shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDesc {
    pub path: String,
    pub entry_point: String,
    pub stage: ShaderStage,
    pub macros: Vec<ShaderMacro>,
}

impl ShaderDesc {
    /// Uses the stage's conventional entry point.
    pub fn new(path: impl Into<String>, stage: ShaderStage) -> Self {
        Self {
            path: path.into(),
            entry_point: stage.default_entry_point().to_owned(),
            stage,
            macros: Vec::new(),
        }
    }

    pub fn vertex(path: impl Into<String>) -> Self {
        Self::new(path, ShaderStage::Vertex)
    }

    pub fn fragment(path: impl Into<String>) -> Self {
        Self::new(path, ShaderStage::Fragment)
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    pub fn with_macro(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.macros.push(ShaderMacro::new(name, value));
        self
    }

    pub fn with_macros(mut self, macros: impl IntoIterator<Item = ShaderMacro>) -> Self {
        self.macros.extend(macros);
        self
    }

    /// Cache identity of this request.
    ///
    /// Macro order does not matter; a repeated name keeps its last value.
    pub fn key(&self) -> ShaderKey {
        let defines: BTreeMap<String, String> = self
            .macros
            .iter()
            .map(|m| (m.name.clone(), m.value.clone()))
            .collect();
        ShaderKey {
            path: self.path.clone(),
            entry_point: self.entry_point.clone(),
            stage: self.stage,
            defines,
        }
    }
}

/// Cache identity: path, entry point, stage and the normalized macro set.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ShaderKey {
    path: String,
    entry_point: String,
    stage: ShaderStage,
    defines: BTreeMap<String, String>,
}

impl ShaderKey {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }
}

/// A preprocessed and validated shader.
///
/// Immutable once built. The cache hands out `Arc<Shader>`; two requests with
/// the same key get the same instance.
#[derive(Debug)]
pub struct Shader {
    key: ShaderKey,
    source: String,
    module: naga::Module,
}

impl Shader {
    /// Parses and validates `source`, then checks the entry point exists for
    /// the key's stage.
    pub(crate) fn compile(key: ShaderKey, source: String) -> Result<Self> {
        let fail = |diagnostic: String| Error::ShaderCompilation {
            path: key.path.clone(),
            entry_point: key.entry_point.clone(),
            diagnostic,
        };

        let module = naga::front::wgsl::parse_str(&source)
            .map_err(|err| fail(err.emit_to_string(&source)))?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| fail(format!("validation error: {err}")))?;

        let entry = module
            .entry_points
            .iter()
            .find(|ep| ep.name == key.entry_point)
            .ok_or_else(|| fail(format!("entry point `{}` not found", key.entry_point)))?;

        if entry.stage != key.stage.to_naga() {
            return Err(fail(format!(
                "entry point `{}` is a {:?} entry point, expected {}",
                key.entry_point, entry.stage, key.stage
            )));
        }

        Ok(Self { key, source, module })
    }

    pub fn key(&self) -> &ShaderKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn entry_point(&self) -> &str {
        &self.key.entry_point
    }

    pub fn stage(&self) -> ShaderStage {
        self.key.stage
    }

    /// Preprocessed WGSL handed to the device.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Validated IR, for reflection.
    pub fn module(&self) -> &naga::Module {
        &self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIVIAL: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i) - 1.0;
    return vec4<f32>(x, 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

    // ── keys ──────────────────────────────────────────────────────────────

    #[test]
    fn macro_order_does_not_change_key() {
        let a = ShaderDesc::vertex("x.wgsl").with_macro("A", "1").with_macro("B", "2");
        let b = ShaderDesc::vertex("x.wgsl").with_macro("B", "2").with_macro("A", "1");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn each_field_changes_key() {
        let base = ShaderDesc::vertex("x.wgsl").with_macro("A", "1");
        let k = base.key();
        assert_ne!(k, ShaderDesc { path: "y.wgsl".into(), ..base.clone() }.key());
        assert_ne!(k, base.clone().with_entry_point("other").key());
        assert_ne!(k, ShaderDesc { stage: ShaderStage::Fragment, ..base.clone() }.key());
        assert_ne!(k, base.clone().with_macro("A", "2").key());
    }

    #[test]
    fn default_entry_points_follow_stage() {
        assert_eq!(ShaderDesc::vertex("a").entry_point, "vs_main");
        assert_eq!(ShaderDesc::fragment("a").entry_point, "fs_main");
    }

    // ── compilation ───────────────────────────────────────────────────────

    #[test]
    fn compiles_valid_entry_point() {
        let key = ShaderDesc::vertex("t.wgsl").key();
        let shader = Shader::compile(key, TRIVIAL.to_owned()).unwrap();
        assert_eq!(shader.stage(), ShaderStage::Vertex);
        assert_eq!(shader.module().entry_points.len(), 2);
    }

    #[test]
    fn missing_entry_point_is_compilation_error() {
        let key = ShaderDesc::vertex("t.wgsl").with_entry_point("nope").key();
        let err = Shader::compile(key, TRIVIAL.to_owned()).unwrap_err();
        match err {
            Error::ShaderCompilation { entry_point, diagnostic, .. } => {
                assert_eq!(entry_point, "nope");
                assert!(diagnostic.contains("not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stage_mismatch_is_rejected() {
        let key = ShaderDesc::fragment("t.wgsl").with_entry_point("vs_main").key();
        assert!(matches!(
            Shader::compile(key, TRIVIAL.to_owned()),
            Err(Error::ShaderCompilation { .. })
        ));
    }

    #[test]
    fn syntax_error_carries_diagnostic() {
        let key = ShaderDesc::vertex("bad.wgsl").key();
        let err = Shader::compile(key, "fn vs_main( {".to_owned()).unwrap_err();
        let Error::ShaderCompilation { path, diagnostic, .. } = err else {
            panic!("expected compilation error");
        };
        assert_eq!(path, "bad.wgsl");
        assert!(!diagnostic.is_empty());
    }
}

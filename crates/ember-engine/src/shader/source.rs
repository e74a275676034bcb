//! Shader source lookup and preprocessing.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Supplies shader source text by path.
///
/// Paths use `/` separators regardless of platform. Include directives are
/// resolved relative to the including file before they reach the provider.
pub trait ShaderSourceProvider {
    fn read(&self, path: &str) -> io::Result<String>;
}

impl<P: ShaderSourceProvider + ?Sized> ShaderSourceProvider for Box<P> {
    fn read(&self, path: &str) -> io::Result<String> {
        (**self).read(path)
    }
}

/// In-memory sources, used for the shaders compiled into the engine.
#[derive(Debug, Default, Clone)]
pub struct EmbeddedSources {
    files: HashMap<String, Cow<'static, str>>,
}

impl EmbeddedSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<Cow<'static, str>>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn with(mut self, path: impl Into<String>, source: impl Into<Cow<'static, str>>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl ShaderSourceProvider for EmbeddedSources {
    fn read(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .map(|s| s.to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no embedded shader `{path}`")))
    }
}

/// Reads sources from disk below `base_dir`.
#[derive(Debug, Clone)]
pub struct FileSystemSources {
    base_dir: PathBuf,
}

impl FileSystemSources {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &std::path::Path {
        &self.base_dir
    }
}

impl ShaderSourceProvider for FileSystemSources {
    fn read(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.base_dir.join(path))
    }
}

/// Tries each provider in order; the first one that has the file wins.
#[derive(Default)]
pub struct LayeredSources {
    layers: Vec<Box<dyn ShaderSourceProvider>>,
}

impl LayeredSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl ShaderSourceProvider + 'static) -> Self {
        self.layers.push(Box::new(provider));
        self
    }
}

impl ShaderSourceProvider for LayeredSources {
    fn read(&self, path: &str) -> io::Result<String> {
        for layer in &self.layers {
            match layer.read(path) {
                Ok(source) => return Ok(source),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, format!("shader `{path}` not found")))
    }
}

/// A single in-memory file layered over another provider.
pub(crate) struct Overlay<'a> {
    pub path: &'a str,
    pub source: &'a str,
    pub base: &'a dyn ShaderSourceProvider,
}

impl ShaderSourceProvider for Overlay<'_> {
    fn read(&self, path: &str) -> io::Result<String> {
        if path == self.path {
            Ok(self.source.to_owned())
        } else {
            self.base.read(path)
        }
    }
}

// ── preprocessing ────────────────────────────────────────────────────────

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("cannot read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Syntax {
        path: String,
        line: usize,
        message: String,
    },

    #[error("include depth exceeds {MAX_INCLUDE_DEPTH} at `{0}`")]
    TooDeep(String),
}

/// Resolves `target` relative to the directory of `including`.
///
/// A leading `/` makes `target` relative to the provider root. `.` and `..`
/// segments are folded; `..` never climbs above the root.
pub fn resolve_include(including: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        match including.rfind('/') {
            Some(i) => including[..i].split('/').filter(|p| !p.is_empty()).collect(),
            None => Vec::new(),
        }
    };

    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    parts.join("/")
}

/// Expands includes and conditionals in `path` and substitutes macros.
///
/// Supported directives: `#include "file"` (each file at most once),
/// `#define NAME [value]`, `#undef NAME`, `#ifdef`, `#ifndef`, `#else`,
/// `#endif`. Defined names with a non-empty value are replaced wherever they
/// appear as a whole identifier outside `//` comments.
pub fn preprocess(
    sources: &dyn ShaderSourceProvider,
    path: &str,
    defines: &BTreeMap<String, String>,
) -> Result<String, PreprocessError> {
    let mut pp = Preprocessor {
        sources,
        defines: defines.clone(),
        included: HashSet::from([path.to_owned()]),
        depth: 0,
    };
    let mut out = String::new();
    pp.expand(path, &mut out)?;
    Ok(out)
}

struct Preprocessor<'a> {
    sources: &'a dyn ShaderSourceProvider,
    defines: BTreeMap<String, String>,
    included: HashSet<String>,
    depth: usize,
}

struct Branch {
    active: bool,
    parent_active: bool,
    seen_else: bool,
}

impl Preprocessor<'_> {
    fn expand(&mut self, path: &str, out: &mut String) -> Result<(), PreprocessError> {
        if self.depth > MAX_INCLUDE_DEPTH {
            return Err(PreprocessError::TooDeep(path.to_owned()));
        }

        let text = self.sources.read(path).map_err(|source| PreprocessError::Read {
            path: path.to_owned(),
            source,
        })?;

        let syntax = |line: usize, message: &str| PreprocessError::Syntax {
            path: path.to_owned(),
            line: line + 1,
            message: message.to_owned(),
        };

        let mut branches: Vec<Branch> = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let active = branches.last().is_none_or(|b| b.active);

            let Some(directive_line) = line.trim_start().strip_prefix('#') else {
                if active {
                    self.substitute_into(line, out);
                    out.push('\n');
                }
                continue;
            };

            let directive_line = directive_line.trim();
            let (directive, arg) = match directive_line.split_once(char::is_whitespace) {
                Some((d, a)) => (d, a.trim()),
                None => (directive_line, ""),
            };

            match directive {
                "ifdef" | "ifndef" => {
                    if arg.is_empty() {
                        return Err(syntax(line_no, "missing macro name"));
                    }
                    let defined = self.defines.contains_key(arg);
                    let take = if directive == "ifdef" { defined } else { !defined };
                    branches.push(Branch {
                        active: active && take,
                        parent_active: active,
                        seen_else: false,
                    });
                }
                "else" => {
                    let branch = branches
                        .last_mut()
                        .ok_or_else(|| syntax(line_no, "#else without #ifdef"))?;
                    if branch.seen_else {
                        return Err(syntax(line_no, "duplicate #else"));
                    }
                    branch.seen_else = true;
                    branch.active = branch.parent_active && !branch.active;
                }
                "endif" => {
                    branches
                        .pop()
                        .ok_or_else(|| syntax(line_no, "#endif without #ifdef"))?;
                }
                _ if !active => {}
                "include" => {
                    let target = arg
                        .strip_prefix('"')
                        .and_then(|a| a.strip_suffix('"'))
                        .ok_or_else(|| syntax(line_no, "expected #include \"file\""))?;
                    let resolved = resolve_include(path, target);
                    if self.included.insert(resolved.clone()) {
                        self.depth += 1;
                        self.expand(&resolved, out)?;
                        self.depth -= 1;
                    }
                }
                "define" => {
                    let (name, value) = match arg.split_once(char::is_whitespace) {
                        Some((n, v)) => (n, v.trim()),
                        None => (arg, ""),
                    };
                    if !is_identifier(name) {
                        return Err(syntax(line_no, "invalid macro name"));
                    }
                    self.defines.insert(name.to_owned(), value.to_owned());
                }
                "undef" => {
                    self.defines.remove(arg);
                }
                other => {
                    return Err(syntax(line_no, &format!("unknown directive #{other}")));
                }
            }
        }

        if !branches.is_empty() {
            return Err(syntax(text.lines().count().saturating_sub(1), "unterminated #ifdef"));
        }
        Ok(())
    }

    fn substitute_into(&self, line: &str, out: &mut String) {
        let (code, comment) = match line.find("//") {
            Some(i) => line.split_at(i),
            None => (line, ""),
        };

        let mut token = String::new();
        for ch in code.chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                token.push(ch);
                continue;
            }
            self.flush_token(&mut token, out);
            out.push(ch);
        }
        self.flush_token(&mut token, out);
        out.push_str(comment);
    }

    fn flush_token(&self, token: &mut String, out: &mut String) {
        if token.is_empty() {
            return;
        }
        match self.defines.get(token.as_str()) {
            Some(value) if !value.is_empty() && is_identifier(token) => out.push_str(value),
            _ => out.push_str(token),
        }
        token.clear();
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn lines(s: &str) -> Vec<&str> {
        s.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    }

    // ── include resolution ────────────────────────────────────────────────

    #[test]
    fn include_is_relative_to_including_file() {
        assert_eq!(resolve_include("ember/mesh.wgsl", "common.wgsl"), "ember/common.wgsl");
        assert_eq!(resolve_include("a/b/c.wgsl", "../d.wgsl"), "a/d.wgsl");
        assert_eq!(resolve_include("top.wgsl", "./x/y.wgsl"), "x/y.wgsl");
    }

    #[test]
    fn rooted_include_ignores_base() {
        assert_eq!(resolve_include("a/b.wgsl", "/lib/c.wgsl"), "lib/c.wgsl");
    }

    #[test]
    fn dotdot_stops_at_root() {
        assert_eq!(resolve_include("a.wgsl", "../../b.wgsl"), "b.wgsl");
    }

    // ── conditionals ──────────────────────────────────────────────────────

    #[test]
    fn ifdef_else_selects_branch() {
        let src = EmbeddedSources::new().with("s.wgsl", "#ifdef FOO\nfoo\n#else\nbar\n#endif\n");
        let on = preprocess(&src, "s.wgsl", &defs(&[("FOO", "1")])).unwrap();
        let off = preprocess(&src, "s.wgsl", &defs(&[])).unwrap();
        assert_eq!(lines(&on), vec!["foo"]);
        assert_eq!(lines(&off), vec!["bar"]);
    }

    #[test]
    fn nested_inactive_branch_stays_inactive_through_else() {
        let src = EmbeddedSources::new().with(
            "s.wgsl",
            "#ifdef OUTER\n#ifdef INNER\na\n#else\nb\n#endif\n#endif\nc\n",
        );
        let out = preprocess(&src, "s.wgsl", &defs(&[])).unwrap();
        assert_eq!(lines(&out), vec!["c"]);
    }

    #[test]
    fn ifndef_and_inline_define() {
        let src = EmbeddedSources::new().with("s.wgsl", "#define X\n#ifndef X\nno\n#endif\nyes\n");
        let out = preprocess(&src, "s.wgsl", &defs(&[])).unwrap();
        assert_eq!(lines(&out), vec!["yes"]);
    }

    #[test]
    fn unterminated_ifdef_is_error() {
        let src = EmbeddedSources::new().with("s.wgsl", "#ifdef A\nx\n");
        let err = preprocess(&src, "s.wgsl", &defs(&[])).unwrap_err();
        assert!(matches!(err, PreprocessError::Syntax { .. }));
    }

    #[test]
    fn stray_endif_is_error() {
        let src = EmbeddedSources::new().with("s.wgsl", "#endif\n");
        assert!(preprocess(&src, "s.wgsl", &defs(&[])).is_err());
    }

    // ── includes ──────────────────────────────────────────────────────────

    #[test]
    fn include_is_expanded_once() {
        let src = EmbeddedSources::new()
            .with("lib/main.wgsl", "#include \"util.wgsl\"\n#include \"util.wgsl\"\nmain\n")
            .with("lib/util.wgsl", "util\n");
        let out = preprocess(&src, "lib/main.wgsl", &defs(&[])).unwrap();
        assert_eq!(lines(&out), vec!["util", "main"]);
    }

    #[test]
    fn include_inside_inactive_branch_is_not_read() {
        let src = EmbeddedSources::new().with("m.wgsl", "#ifdef NOPE\n#include \"missing.wgsl\"\n#endif\nok\n");
        let out = preprocess(&src, "m.wgsl", &defs(&[])).unwrap();
        assert_eq!(lines(&out), vec!["ok"]);
    }

    #[test]
    fn missing_include_reports_path() {
        let src = EmbeddedSources::new().with("m.wgsl", "#include \"gone.wgsl\"\n");
        let err = preprocess(&src, "m.wgsl", &defs(&[])).unwrap_err();
        assert!(err.to_string().contains("gone.wgsl"));
    }

    #[test]
    fn layered_sources_fall_through() {
        let layered = LayeredSources::new()
            .with(EmbeddedSources::new().with("a.wgsl", "first"))
            .with(EmbeddedSources::new().with("a.wgsl", "second").with("b.wgsl", "b"));
        assert_eq!(layered.read("a.wgsl").unwrap(), "first");
        assert_eq!(layered.read("b.wgsl").unwrap(), "b");
        assert_eq!(layered.read("c.wgsl").unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    // ── substitution ──────────────────────────────────────────────────────

    #[test]
    fn substitutes_whole_identifiers_only() {
        let src = EmbeddedSources::new().with("s.wgsl", "let a = SCALE * SCALE_X; // SCALE\n");
        let out = preprocess(&src, "s.wgsl", &defs(&[("SCALE", "2.0")])).unwrap();
        assert_eq!(out.trim(), "let a = 2.0 * SCALE_X; // SCALE");
    }

    #[test]
    fn empty_define_is_not_substituted() {
        let src = EmbeddedSources::new().with("s.wgsl", "FLAG\n");
        let out = preprocess(&src, "s.wgsl", &defs(&[("FLAG", "")])).unwrap();
        assert_eq!(out.trim(), "FLAG");
    }
}

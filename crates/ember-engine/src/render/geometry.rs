use std::borrow::Cow;
use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};
use crate::shader::{DefaultPipeline, MESH_PATH, ShaderMacro, VERTEX_COLOR_MACRO, VertexLayout};

/// Engine vertex: position, color, texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // color
        2 => Float32x2  // uv
    ];

    pub const fn new(position: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, color, uv }
    }

    pub fn layout() -> VertexLayout {
        VertexLayout::per_vertex(std::mem::size_of::<Self>() as u64, &Self::ATTRS)
    }
}

/// Position-only vertex used by the skybox cube.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 3],
}

impl PositionVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    pub fn layout() -> VertexLayout {
        VertexLayout::per_vertex(std::mem::size_of::<Self>() as u64, &Self::ATTRS)
    }
}

/// Which built-in mesh a render component draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum RenderableKind {
    Triangle,
    #[default]
    Cube,
    Plane,
}

impl RenderableKind {
    pub const ALL: [Self; 3] = [Self::Triangle, Self::Cube, Self::Plane];
}

/// Shader setup for a mesh: which pipeline name to share and how to build it.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshShading {
    /// Cache name of the pipeline. Meshes with the same name share a pipeline.
    pub pipeline_name: Cow<'static, str>,
    /// Source containing `vs_main` and `fs_main`.
    pub source_path: Cow<'static, str>,
    pub macros: Vec<ShaderMacro>,
}

impl MeshShading {
    pub fn for_default(which: DefaultPipeline) -> Self {
        let macros = match which {
            DefaultPipeline::Unlit => Vec::new(),
            DefaultPipeline::VertexColor => vec![ShaderMacro::flag(VERTEX_COLOR_MACRO)],
        };
        Self {
            pipeline_name: Cow::Borrowed(which.name()),
            source_path: Cow::Borrowed(MESH_PATH),
            macros,
        }
    }

    pub fn unlit() -> Self {
        Self::for_default(DefaultPipeline::Unlit)
    }

    pub fn vertex_color() -> Self {
        Self::for_default(DefaultPipeline::VertexColor)
    }
}

/// Static mesh data plus how to draw it.
#[derive(Debug, Clone)]
pub struct GeometryDescriptor {
    pub label: Cow<'static, str>,
    pub vertices: Cow<'static, [Vertex]>,
    /// `None` draws the vertices in order.
    pub indices: Option<Cow<'static, [u16]>>,
    pub topology: wgpu::PrimitiveTopology,
    pub cull_mode: Option<wgpu::Face>,
    pub shading: MeshShading,
}

impl GeometryDescriptor {
    /// Vertices or indices consumed by one draw.
    pub fn draw_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertices.len() as u32,
        }
    }

    /// Rejects empty meshes and out-of-range indices.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() {
            return Err(Error::config(format!("geometry `{}` has no vertices", self.label)));
        }
        if let Some(indices) = &self.indices {
            if indices.is_empty() {
                return Err(Error::config(format!("geometry `{}` has an empty index list", self.label)));
            }
            let count = self.vertices.len();
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
                return Err(Error::config(format!(
                    "geometry `{}` index {bad} out of range ({count} vertices)",
                    self.label
                )));
            }
        }
        Ok(())
    }

    /// Double-sided unit triangle in the XY plane; both windings, no indices.
    pub fn triangle() -> Self {
        Self {
            label: Cow::Borrowed("triangle"),
            vertices: Cow::Borrowed(&TRIANGLE_VERTICES),
            indices: None,
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            shading: MeshShading::vertex_color(),
        }
    }

    /// Unit cube centered on the origin, one color per face.
    pub fn cube() -> Self {
        Self {
            label: Cow::Borrowed("cube"),
            vertices: Cow::Borrowed(&CUBE_VERTICES),
            indices: Some(Cow::Borrowed(&CUBE_INDICES)),
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            shading: MeshShading::vertex_color(),
        }
    }

    /// Unit quad in the XZ plane facing +Y.
    pub fn plane() -> Self {
        Self {
            label: Cow::Borrowed("plane"),
            vertices: Cow::Borrowed(&PLANE_VERTICES),
            indices: Some(Cow::Borrowed(&PLANE_INDICES)),
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            shading: MeshShading::unlit(),
        }
    }
}

/// Maps each [`RenderableKind`] to the geometry drawn for it.
#[derive(Debug, Clone, Default)]
pub struct GeometryRegistry {
    entries: HashMap<RenderableKind, GeometryDescriptor>,
}

impl GeometryRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Triangle, cube and plane.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(RenderableKind::Triangle, GeometryDescriptor::triangle());
        registry.register(RenderableKind::Cube, GeometryDescriptor::cube());
        registry.register(RenderableKind::Plane, GeometryDescriptor::plane());
        registry
    }

    /// Sets the geometry for `kind`, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: RenderableKind,
        descriptor: GeometryDescriptor,
    ) -> Option<GeometryDescriptor> {
        self.entries.insert(kind, descriptor)
    }

    pub fn get(&self, kind: RenderableKind) -> Option<&GeometryDescriptor> {
        self.entries.get(&kind)
    }

    pub fn contains(&self, kind: RenderableKind) -> bool {
        self.entries.contains_key(&kind)
    }
}

// ── built-in mesh data ───────────────────────────────────────────────────

const RED: [f32; 3] = [1.0, 0.0, 0.0];
const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
const YELLOW: [f32; 3] = [1.0, 1.0, 0.0];
const MAGENTA: [f32; 3] = [1.0, 0.0, 1.0];
const CYAN: [f32; 3] = [0.0, 1.0, 1.0];
const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

static TRIANGLE_VERTICES: [Vertex; 6] = [
    Vertex::new([-0.5, -0.5, 0.0], BLUE, [0.0, 1.0]),
    Vertex::new([0.5, -0.5, 0.0], GREEN, [1.0, 1.0]),
    Vertex::new([0.0, 0.5, 0.0], RED, [0.5, 0.0]),
    // back side
    Vertex::new([-0.5, -0.5, 0.0], BLUE, [0.0, 1.0]),
    Vertex::new([0.0, 0.5, 0.0], RED, [0.5, 0.0]),
    Vertex::new([0.5, -0.5, 0.0], GREEN, [1.0, 1.0]),
];

static CUBE_VERTICES: [Vertex; 24] = [
    // +Z
    Vertex::new([-0.5, -0.5, 0.5], RED, [0.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.5], RED, [1.0, 0.0]),
    Vertex::new([0.5, 0.5, 0.5], RED, [1.0, 1.0]),
    Vertex::new([-0.5, 0.5, 0.5], RED, [0.0, 1.0]),
    // -Z
    Vertex::new([-0.5, -0.5, -0.5], GREEN, [0.0, 0.0]),
    Vertex::new([0.5, -0.5, -0.5], GREEN, [1.0, 0.0]),
    Vertex::new([0.5, 0.5, -0.5], GREEN, [1.0, 1.0]),
    Vertex::new([-0.5, 0.5, -0.5], GREEN, [0.0, 1.0]),
    // -X
    Vertex::new([-0.5, -0.5, -0.5], BLUE, [0.0, 0.0]),
    Vertex::new([-0.5, -0.5, 0.5], BLUE, [1.0, 0.0]),
    Vertex::new([-0.5, 0.5, 0.5], BLUE, [1.0, 1.0]),
    Vertex::new([-0.5, 0.5, -0.5], BLUE, [0.0, 1.0]),
    // +X
    Vertex::new([0.5, -0.5, 0.5], YELLOW, [0.0, 0.0]),
    Vertex::new([0.5, -0.5, -0.5], YELLOW, [1.0, 0.0]),
    Vertex::new([0.5, 0.5, -0.5], YELLOW, [1.0, 1.0]),
    Vertex::new([0.5, 0.5, 0.5], YELLOW, [0.0, 1.0]),
    // +Y
    Vertex::new([-0.5, 0.5, 0.5], MAGENTA, [0.0, 0.0]),
    Vertex::new([0.5, 0.5, 0.5], MAGENTA, [1.0, 0.0]),
    Vertex::new([0.5, 0.5, -0.5], MAGENTA, [1.0, 1.0]),
    Vertex::new([-0.5, 0.5, -0.5], MAGENTA, [0.0, 1.0]),
    // -Y
    Vertex::new([-0.5, -0.5, -0.5], CYAN, [0.0, 0.0]),
    Vertex::new([0.5, -0.5, -0.5], CYAN, [1.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.5], CYAN, [1.0, 1.0]),
    Vertex::new([-0.5, -0.5, 0.5], CYAN, [0.0, 1.0]),
];

#[rustfmt::skip]
static CUBE_INDICES: [u16; 36] = [
    0, 2, 1,    0, 3, 2,
    4, 5, 6,    4, 6, 7,
    8, 10, 9,   8, 11, 10,
    12, 14, 13, 12, 15, 14,
    16, 18, 17, 16, 19, 18,
    20, 22, 21, 20, 23, 22,
];

static PLANE_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, 0.0, -0.5], WHITE, [0.0, 1.0]),
    Vertex::new([0.5, 0.0, -0.5], WHITE, [1.0, 1.0]),
    Vertex::new([0.5, 0.0, 0.5], WHITE, [1.0, 0.0]),
    Vertex::new([-0.5, 0.0, 0.5], WHITE, [0.0, 0.0]),
];

static PLANE_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Corners of the skybox cube.
pub(crate) static SKYBOX_VERTICES: [PositionVertex; 8] = [
    PositionVertex { position: [-1.0, -1.0, 1.0] },
    PositionVertex { position: [1.0, -1.0, 1.0] },
    PositionVertex { position: [1.0, 1.0, 1.0] },
    PositionVertex { position: [-1.0, 1.0, 1.0] },
    PositionVertex { position: [-1.0, -1.0, -1.0] },
    PositionVertex { position: [1.0, -1.0, -1.0] },
    PositionVertex { position: [1.0, 1.0, -1.0] },
    PositionVertex { position: [-1.0, 1.0, -1.0] },
];

#[rustfmt::skip]
pub(crate) static SKYBOX_INDICES: [u16; 36] = [
    0, 1, 2, 0, 2, 3, // front
    1, 5, 6, 1, 6, 2, // right
    5, 4, 7, 5, 7, 6, // back
    4, 0, 3, 4, 3, 7, // left
    4, 5, 1, 4, 1, 0, // top
    3, 2, 6, 3, 6, 7, // bottom
];

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn inward_normal(d: &GeometryDescriptor, tri: &[u16]) -> Vec3 {
        let p = |i: u16| Vec3::from(d.vertices[i as usize].position);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
    }

    // ── registry ──────────────────────────────────────────────────────────

    #[test]
    fn builtin_registry_covers_every_kind() {
        let reg = GeometryRegistry::builtin();
        for kind in RenderableKind::ALL {
            let d = reg.get(kind).expect("missing kind");
            d.validate().unwrap();
        }
    }

    #[test]
    fn register_replaces_entry() {
        let mut reg = GeometryRegistry::builtin();
        let old = reg.register(RenderableKind::Cube, GeometryDescriptor::plane());
        assert_eq!(old.map(|d| d.label), Some(Cow::Borrowed("cube")));
        assert_eq!(reg.get(RenderableKind::Cube).map(|d| d.draw_count()), Some(6));
    }

    #[test]
    fn default_kind_is_cube() {
        assert_eq!(RenderableKind::default(), RenderableKind::Cube);
    }

    // ── mesh data ─────────────────────────────────────────────────────────

    #[test]
    fn draw_counts() {
        assert_eq!(GeometryDescriptor::triangle().draw_count(), 6);
        assert_eq!(GeometryDescriptor::cube().draw_count(), 36);
        assert_eq!(GeometryDescriptor::plane().draw_count(), 6);
    }

    #[test]
    fn cube_faces_share_one_winding() {
        // every triangle's (b - a) x (c - a) points toward the center
        let cube = GeometryDescriptor::cube();
        let indices = cube.indices.as_deref().unwrap();
        for tri in indices.chunks(3) {
            let n = inward_normal(&cube, tri);
            let centroid = tri
                .iter()
                .map(|&i| Vec3::from(cube.vertices[i as usize].position))
                .sum::<Vec3>()
                / 3.0;
            assert!(n.dot(-centroid) > 0.0, "triangle {tri:?} winds the other way");
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = GeometryDescriptor::plane();
        let indices = plane.indices.as_deref().unwrap();
        for tri in indices.chunks(3) {
            // same convention as the cube: inward (here: downward) cross product
            assert!(inward_normal(&plane, tri).y < 0.0);
        }
    }

    #[test]
    fn out_of_range_index_rejected() {
        let mut d = GeometryDescriptor::plane();
        d.indices = Some(Cow::Owned(vec![0, 1, 9]));
        assert!(matches!(d.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn skybox_indices_in_range() {
        assert!(SKYBOX_INDICES.iter().all(|&i| (i as usize) < SKYBOX_VERTICES.len()));
    }

    #[test]
    fn vertex_stride_matches_layout() {
        assert_eq!(Vertex::layout().stride, 32);
        assert_eq!(PositionVertex::layout().stride, 12);
    }
}

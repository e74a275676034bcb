use std::sync::Arc;

use super::program::Shader;

/// Owned description of one vertex buffer slot.
#[derive(Debug, Clone)]
pub struct VertexLayout {
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexLayout {
    pub fn per_vertex(stride: u64, attributes: &[wgpu::VertexAttribute]) -> Self {
        Self {
            stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attributes.to_vec(),
        }
    }

    pub fn as_wgpu(&self) -> wgpu::VertexBufferLayout<'_> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride,
            step_mode: self.step_mode,
            attributes: &self.attributes,
        }
    }
}

/// Depth test and write configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DepthState {
    pub format: wgpu::TextureFormat,
    pub write_enabled: bool,
    pub compare: wgpu::CompareFunction,
}

impl DepthState {
    /// Test with `Less` and write.
    pub fn opaque(format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            write_enabled: true,
            compare: wgpu::CompareFunction::Less,
        }
    }

    fn to_wgpu(self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: self.format,
            depth_write_enabled: self.write_enabled,
            depth_compare: self.compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

/// Everything needed to link a render pipeline.
#[derive(Clone)]
pub struct PipelineStateDesc {
    pub vertex: Arc<Shader>,
    pub fragment: Option<Arc<Shader>>,
    /// One layout per bind group index, in order.
    pub bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>>,
    pub vertex_layouts: Vec<VertexLayout>,
    pub topology: wgpu::PrimitiveTopology,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub blend: Option<wgpu::BlendState>,
    /// Required when `fragment` is set.
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth: Option<DepthState>,
}

impl PipelineStateDesc {
    /// Opaque triangle-list defaults: back-face culling, counter-clockwise
    /// front faces, depth test `Less` with writes.
    pub fn new(
        vertex: Arc<Shader>,
        fragment: Arc<Shader>,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            vertex,
            fragment: Some(fragment),
            bind_group_layouts: Vec::new(),
            vertex_layouts: Vec::new(),
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            blend: None,
            color_format: Some(color_format),
            depth: Some(DepthState::opaque(depth_format)),
        }
    }

    pub(crate) fn primitive(&self) -> wgpu::PrimitiveState {
        wgpu::PrimitiveState {
            topology: self.topology,
            strip_index_format: None,
            front_face: self.front_face,
            cull_mode: self.cull_mode,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        }
    }

    pub(crate) fn depth_stencil(&self) -> Option<wgpu::DepthStencilState> {
        self.depth.map(DepthState::to_wgpu)
    }
}

/// A linked render pipeline and the layouts it was built against.
pub struct PipelineState {
    name: String,
    pipeline: wgpu::RenderPipeline,
    bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>>,
    depth: Option<DepthState>,
}

impl PipelineState {
    pub(crate) fn new(
        name: String,
        pipeline: wgpu::RenderPipeline,
        bind_group_layouts: Vec<Arc<wgpu::BindGroupLayout>>,
        depth: Option<DepthState>,
    ) -> Self {
        Self {
            name,
            pipeline,
            bind_group_layouts,
            depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// Layout for bind group `index`.
    pub fn bind_group_layout(&self, index: usize) -> Option<&wgpu::BindGroupLayout> {
        self.bind_group_layouts.get(index).map(Arc::as_ref)
    }

    pub fn depth(&self) -> Option<DepthState> {
        self.depth
    }
}

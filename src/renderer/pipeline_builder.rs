// src/renderer/pipeline_builder.rs

/// What a program pipeline writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineOutput {
    /// One opaque colour attachment plus a depth buffer.
    Color {
        format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    },
    /// Depth buffer only; the shader has no fragment stage.
    DepthOnly { depth_format: wgpu::TextureFormat },
}

impl PipelineOutput {
    fn depth_format(self) -> wgpu::TextureFormat {
        match self {
            Self::Color { depth_format, .. } | Self::DepthOnly { depth_format } => depth_format,
        }
    }
}

/// Fluent builder for the pipeline behind one device program. Shaders use
/// the `vs_main`/`fs_main` entry points and depth testing is always `Less`
/// with writes enabled.
pub struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    label: Option<&'a str>,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    output: PipelineOutput,
    cull_back_faces: bool,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
        output: PipelineOutput,
    ) -> Self {
        Self {
            device,
            layout,
            shader,
            label: None,
            vertex_buffers: Vec::new(),
            output,
            cull_back_faces: true,
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub fn with_culling(mut self, cull_back_faces: bool) -> Self {
        self.cull_back_faces = cull_back_faces;
        self
    }

    pub fn build(self) -> wgpu::RenderPipeline {
        let targets: Vec<Option<wgpu::ColorTargetState>> = match self.output {
            PipelineOutput::Color { format, .. } => vec![Some(format.into())],
            PipelineOutput::DepthOnly { .. } => Vec::new(),
        };
        let fragment = match self.output {
            PipelineOutput::Color { .. } => Some(wgpu::FragmentState {
                module: self.shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            PipelineOutput::DepthOnly { .. } => None,
        };

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: Some("vs_main"),
                    buffers: &self.vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment,
                primitive: wgpu::PrimitiveState {
                    cull_mode: self.cull_back_faces.then_some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: self.output.depth_format(),
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
    }
}

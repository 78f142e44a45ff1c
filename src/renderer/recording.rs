// renderer/recording.rs
//
// A `RenderDevice` that validates calls against the uniform layouts it was
// given and keeps the resulting command stream. Used by the tests and for
// headless frame inspection.

use std::collections::{HashMap, HashSet};

use crate::error::DeviceError;
use crate::renderer::device::{
    ClearFlags, DepthTargetId, GeometryId, ProgramDescriptor, ProgramId, Releaser,
    RenderDevice, ResourceId, TextureId, TextureSource, Viewport,
};
use crate::renderer::uniforms::{UniformLayout, UniformLocation, UniformValue};
use crate::renderer::vertex::Vertex;

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    BeginFrame,
    EndFrame,
    UseProgram(ProgramId),
    SetUniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    BindTarget(Option<DepthTargetId>),
    Viewport(Viewport),
    Clear(ClearFlags),
    BindTexture {
        unit: u32,
        source: TextureSource,
    },
    DrawIndexed {
        program: Option<ProgramId>,
        geometry: GeometryId,
        index_count: u32,
        byte_offset: u64,
    },
}

/// A draw as observed by the device, with the program that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordedDraw {
    pub program: Option<ProgramId>,
    pub geometry: GeometryId,
    pub index_count: u32,
    pub byte_offset: u64,
}

struct RecordedProgram {
    label: &'static str,
    layout: UniformLayout,
}

pub struct RecordingDevice {
    size: (u32, u32),
    next_id: u32,
    programs: HashMap<ProgramId, RecordedProgram>,
    geometries: HashMap<GeometryId, u32>,
    textures: HashSet<TextureId>,
    depth_targets: HashMap<DepthTargetId, (u32, u32)>,
    current_program: Option<ProgramId>,
    commands: Vec<DeviceCommand>,
    failing_programs: HashSet<String>,
    fail_depth_targets: bool,
    hidden_uniforms: HashSet<String>,
    releaser: Releaser,
    released: Vec<ResourceId>,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_id: 1,
            programs: HashMap::new(),
            geometries: HashMap::new(),
            textures: HashSet::new(),
            depth_targets: HashMap::new(),
            current_program: None,
            commands: Vec::new(),
            failing_programs: HashSet::new(),
            fail_depth_targets: false,
            hidden_uniforms: HashSet::new(),
            releaser: Releaser::default(),
            released: Vec::new(),
        }
    }

    pub fn set_drawable_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Makes `create_program` fail for the program with this label.
    pub fn fail_program(&mut self, label: &str) {
        self.failing_programs.insert(label.to_string());
    }

    pub fn fail_depth_targets(&mut self) {
        self.fail_depth_targets = true;
    }

    /// Makes `uniform_location` return `None` for this name in every program.
    pub fn hide_uniform(&mut self, name: &str) {
        self.hidden_uniforms.insert(name.to_string());
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> Vec<RecordedDraw> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::DrawIndexed {
                    program,
                    geometry,
                    index_count,
                    byte_offset,
                } => Some(RecordedDraw {
                    program: *program,
                    geometry: *geometry,
                    index_count: *index_count,
                    byte_offset: *byte_offset,
                }),
                _ => None,
            })
            .collect()
    }

    /// Every value written to `name`, in order.
    pub fn uniform_writes(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::SetUniform {
                    name: written,
                    value,
                    ..
                } if written == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniform_writes(name).last().copied()
    }

    pub fn program_label(&self, program: ProgramId) -> Option<&'static str> {
        self.programs.get(&program).map(|p| p.label)
    }

    pub fn program_by_label(&self, label: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .find(|(_, program)| program.label == label)
            .map(|(id, _)| *id)
    }

    pub fn depth_target_size(&self, target: DepthTargetId) -> Option<(u32, u32)> {
        self.depth_targets.get(&target).copied()
    }

    pub fn live_resource_count(&self) -> usize {
        self.programs.len() + self.geometries.len() + self.textures.len() + self.depth_targets.len()
    }

    pub fn released(&self) -> &[ResourceId] {
        &self.released
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: DeviceCommand) {
        self.commands.push(command);
    }
}

impl RenderDevice for RecordingDevice {
    fn begin_frame(&mut self) {
        self.collect_garbage();
        self.record(DeviceCommand::BeginFrame);
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        self.record(DeviceCommand::EndFrame);
        Ok(())
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_program(&mut self, desc: ProgramDescriptor) -> Result<ProgramId, DeviceError> {
        if self.failing_programs.contains(desc.label) {
            return Err(DeviceError::Program {
                label: desc.label.to_string(),
                message: "compilation disabled for this program".to_string(),
            });
        }
        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            RecordedProgram {
                label: desc.label,
                layout: desc.layout,
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        if self.hidden_uniforms.contains(name) {
            return None;
        }
        self.programs.get(&program)?.layout.locate(name)
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
        self.record(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue) {
        let Some(location) = location else {
            return;
        };
        let Some(program) = self.current_program else {
            log::warn!("set_uniform without a current program");
            return;
        };
        let Some(slot) = self
            .programs
            .get(&program)
            .and_then(|p| p.layout.slot(location))
        else {
            log::warn!("uniform location {} is not valid for the current program", location.index());
            return;
        };
        let name = slot.name.clone();
        self.record(DeviceCommand::SetUniform {
            program,
            name,
            value,
        });
    }

    fn create_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<GeometryId, DeviceError> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(DeviceError::EmptyGeometry);
        }
        let id = GeometryId(self.allocate_id());
        self.geometries.insert(id, indices.len() as u32);
        Ok(id)
    }

    fn draw_indexed(&mut self, geometry: GeometryId, index_count: u32, byte_offset: u64) {
        if let Some(total) = self.geometries.get(&geometry) {
            debug_assert!(byte_offset / 4 + u64::from(index_count) <= u64::from(*total));
        }
        let program = self.current_program;
        self.record(DeviceCommand::DrawIndexed {
            program,
            geometry,
            index_count,
            byte_offset,
        });
    }

    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureId, DeviceError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DeviceError::TextureData {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        let id = TextureId(self.allocate_id());
        self.textures.insert(id);
        Ok(id)
    }

    fn create_depth_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<DepthTargetId, DeviceError> {
        if self.fail_depth_targets || width == 0 || height == 0 {
            return Err(DeviceError::DepthTarget {
                width,
                height,
                message: "allocation refused".to_string(),
            });
        }
        let id = DepthTargetId(self.allocate_id());
        self.depth_targets.insert(id, (width, height));
        Ok(id)
    }

    fn bind_target(&mut self, target: Option<DepthTargetId>) {
        self.record(DeviceCommand::BindTarget(target));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(DeviceCommand::Viewport(viewport));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.record(DeviceCommand::Clear(flags));
    }

    fn bind_texture(&mut self, unit: u32, source: TextureSource) {
        self.record(DeviceCommand::BindTexture { unit, source });
    }

    fn releaser(&self) -> Releaser {
        self.releaser.clone()
    }

    fn collect_garbage(&mut self) {
        for id in self.releaser.drain() {
            match id {
                ResourceId::Program(id) => {
                    self.programs.remove(&id);
                }
                ResourceId::Geometry(id) => {
                    self.geometries.remove(&id);
                }
                ResourceId::Texture(id) => {
                    self.textures.remove(&id);
                }
                ResourceId::DepthTarget(id) => {
                    self.depth_targets.remove(&id);
                }
            }
            self.released.push(id);
        }
    }
}

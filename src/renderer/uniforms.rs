// renderer/uniforms.rs
//
// Named uniform contract shared by the host and the WGSL programs. A layout is
// built once per program; it resolves names like `dirLights[1].Intensity` to a
// typed slot and emits the matching WGSL declarations so both sides agree on
// every offset.

use std::collections::HashMap;
use std::fmt::Write as _;

use glam::{Mat4, Vec3};

use crate::renderer::device::{ProgramId, RenderDevice};

/// Host-side type of a uniform slot. `Bool` is stored as `u32` on the GPU and
/// `Sampler` occupies no bytes; its slot number selects a texture binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    Bool,
    Vec3,
    Mat4,
    Sampler,
}

impl UniformType {
    fn align(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Bool => 4,
            Self::Vec3 | Self::Mat4 => 16,
            Self::Sampler => 1,
        }
    }

    fn size(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Bool => 4,
            Self::Vec3 => 12,
            Self::Mat4 => 64,
            Self::Sampler => 0,
        }
    }

    fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Int => "i32",
            Self::Bool => "u32",
            Self::Vec3 => "vec3<f32>",
            Self::Mat4 => "mat4x4<f32>",
            Self::Sampler => "",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    /// Writes the value into `dst` if it is compatible with `ty`. Sampler
    /// slots take an `Int` texture unit but have no bytes to write.
    pub(crate) fn write_into(&self, ty: UniformType, dst: &mut [u8]) -> bool {
        match (ty, self) {
            (UniformType::Float, Self::Float(v)) => copy_bytes(dst, bytemuck::bytes_of(v)),
            (UniformType::Int, Self::Int(v)) => copy_bytes(dst, bytemuck::bytes_of(v)),
            (UniformType::Bool, Self::Bool(v)) => {
                let raw = u32::from(*v);
                copy_bytes(dst, bytemuck::bytes_of(&raw))
            }
            (UniformType::Vec3, Self::Vec3(v)) => {
                copy_bytes(dst, bytemuck::cast_slice(&v.to_array()))
            }
            (UniformType::Mat4, Self::Mat4(m)) => {
                copy_bytes(dst, bytemuck::cast_slice(&m.to_cols_array()))
            }
            _ => false,
        }
    }

    pub fn as_texture_unit(&self) -> Option<u32> {
        match self {
            Self::Int(unit) if *unit >= 0 => Some(*unit as u32),
            _ => None,
        }
    }
}

fn copy_bytes(dst: &mut [u8], src: &[u8]) -> bool {
    match dst.get_mut(..src.len()) {
        Some(slot) => {
            slot.copy_from_slice(src);
            true
        }
        None => false,
    }
}

/// Opaque handle returned by [`RenderDevice::uniform_location`]. Only valid for
/// the program it was resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformSlot {
    pub name: String,
    pub ty: UniformType,
    /// Byte offset inside the uniform block, or the sampler slot for samplers.
    pub offset: u32,
}

/// A WGSL struct used as an element of the uniform block.
#[derive(Debug)]
pub struct StructDef {
    pub name: &'static str,
    pub fields: &'static [(&'static str, UniformType)],
}

impl StructDef {
    fn field_offsets(&self) -> (Vec<u32>, u32, u32) {
        let mut offsets = Vec::with_capacity(self.fields.len());
        let mut cursor = 0u32;
        let mut align = 4u32;
        for (_, ty) in self.fields {
            cursor = round_up(cursor, ty.align());
            offsets.push(cursor);
            cursor += ty.size();
            align = align.max(ty.align());
        }
        // Uniform address space: struct members are 16-byte aligned.
        let align = round_up(align, 16);
        (offsets, round_up(cursor, align), align)
    }
}

#[derive(Clone, Debug)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    lookup: HashMap<String, u32>,
    size: u32,
    sampler_count: u32,
    wgsl: String,
}

impl UniformLayout {
    pub fn builder() -> UniformLayoutBuilder {
        UniformLayoutBuilder::default()
    }

    pub fn locate(&self, name: &str) -> Option<UniformLocation> {
        self.lookup.get(name).copied().map(UniformLocation)
    }

    pub fn slot(&self, location: UniformLocation) -> Option<&UniformSlot> {
        self.slots.get(location.index())
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Size of the uniform block in bytes, padded to 16.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sampler_count(&self) -> u32 {
        self.sampler_count
    }

    /// WGSL struct declarations plus the `u` binding at group 0.
    pub fn wgsl(&self) -> &str {
        &self.wgsl
    }
}

#[derive(Default)]
pub struct UniformLayoutBuilder {
    slots: Vec<UniformSlot>,
    members: Vec<(String, String)>,
    structs: Vec<&'static StructDef>,
    cursor: u32,
    sampler_count: u32,
}

impl UniformLayoutBuilder {
    pub fn field(mut self, name: &str, ty: UniformType) -> Self {
        if ty == UniformType::Sampler {
            return self.sampler(name);
        }
        let offset = round_up(self.cursor, ty.align());
        self.push_slot(name.to_string(), ty, offset);
        self.members.push((name.to_string(), ty.wgsl().to_string()));
        self.cursor = offset + ty.size();
        self
    }

    pub fn structure(mut self, name: &str, def: &'static StructDef) -> Self {
        let (offsets, size, align) = def.field_offsets();
        let base = round_up(self.cursor, align);
        for ((field, ty), offset) in def.fields.iter().zip(offsets) {
            self.push_slot(format!("{name}.{field}"), *ty, base + offset);
        }
        self.register_struct(def);
        self.members.push((name.to_string(), def.name.to_string()));
        self.cursor = base + size;
        self
    }

    pub fn struct_array(mut self, name: &str, def: &'static StructDef, count: usize) -> Self {
        let (offsets, size, align) = def.field_offsets();
        let base = round_up(self.cursor, align);
        for index in 0..count as u32 {
            let element = base + index * size;
            for ((field, ty), offset) in def.fields.iter().zip(offsets.iter()) {
                self.push_slot(format!("{name}[{index}].{field}"), *ty, element + offset);
            }
        }
        self.register_struct(def);
        self.members
            .push((name.to_string(), format!("array<{}, {count}>", def.name)));
        self.cursor = base + size * count as u32;
        self
    }

    /// Boolean array. Uniform arrays need a 16 byte stride, so each flag sits
    /// in the `x` lane of a `vec4<u32>`.
    pub fn flag_array(mut self, name: &str, count: usize) -> Self {
        let base = round_up(self.cursor, 16);
        for index in 0..count as u32 {
            self.push_slot(format!("{name}[{index}]"), UniformType::Bool, base + index * 16);
        }
        self.members
            .push((name.to_string(), format!("array<vec4<u32>, {count}>")));
        self.cursor = base + 16 * count as u32;
        self
    }

    pub fn sampler(mut self, name: &str) -> Self {
        let slot = self.sampler_count;
        self.push_slot(name.to_string(), UniformType::Sampler, slot);
        self.sampler_count += 1;
        self
    }

    pub fn build(self) -> UniformLayout {
        let size = round_up(self.cursor.max(16), 16);
        let mut wgsl = String::new();
        for def in &self.structs {
            let _ = writeln!(wgsl, "struct {} {{", def.name);
            for (field, ty) in def.fields {
                let _ = writeln!(wgsl, "    {field}: {},", ty.wgsl());
            }
            let _ = writeln!(wgsl, "}}\n");
        }
        let _ = writeln!(wgsl, "struct Uniforms {{");
        if self.members.is_empty() {
            let _ = writeln!(wgsl, "    _unused: vec4<f32>,");
        }
        for (name, ty) in &self.members {
            let _ = writeln!(wgsl, "    {name}: {ty},");
        }
        let _ = writeln!(wgsl, "}}\n");
        let _ = writeln!(wgsl, "@group(0) @binding(0) var<uniform> u: Uniforms;\n");

        let lookup = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (slot.name.clone(), index as u32))
            .collect();

        UniformLayout {
            slots: self.slots,
            lookup,
            size,
            sampler_count: self.sampler_count,
            wgsl,
        }
    }

    fn push_slot(&mut self, name: String, ty: UniformType, offset: u32) {
        self.slots.push(UniformSlot { name, ty, offset });
    }

    fn register_struct(&mut self, def: &'static StructDef) {
        if !self.structs.iter().any(|known| known.name == def.name) {
            self.structs.push(def);
        }
    }
}

fn round_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

/// Resolves uniform names for one program and remembers which ones are
/// missing so they can be reported once at initialization.
pub struct UniformResolver<'a, D: RenderDevice> {
    device: &'a D,
    program: ProgramId,
    missing: Vec<String>,
}

impl<'a, D: RenderDevice> UniformResolver<'a, D> {
    pub fn new(device: &'a D, program: ProgramId) -> Self {
        Self {
            device,
            program,
            missing: Vec::new(),
        }
    }

    pub fn get(&mut self, name: &str) -> Option<UniformLocation> {
        let location = self.device.uniform_location(self.program, name);
        if location.is_none() {
            self.missing.push(name.to_string());
        }
        location
    }

    pub fn finish(self) -> Vec<String> {
        self.missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static MATERIAL: StructDef = StructDef {
        name: "Material",
        fields: &[
            ("DiffuseColor", UniformType::Vec3),
            ("SpecularColor", UniformType::Vec3),
            ("Shininess", UniformType::Float),
        ],
    };

    fn offset_of(layout: &UniformLayout, name: &str) -> u32 {
        let location = layout.locate(name).expect(name);
        layout.slot(location).unwrap().offset
    }

    #[test]
    fn fields_follow_wgsl_uniform_alignment() {
        let layout = UniformLayout::builder()
            .field("shadowBias", UniformType::Float)
            .field("viewPos", UniformType::Vec3)
            .field("enabled", UniformType::Bool)
            .field("MVP", UniformType::Mat4)
            .build();

        assert_eq!(offset_of(&layout, "shadowBias"), 0);
        assert_eq!(offset_of(&layout, "viewPos"), 16);
        // A scalar packs into the tail of the vec3.
        assert_eq!(offset_of(&layout, "enabled"), 28);
        assert_eq!(offset_of(&layout, "MVP"), 32);
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn struct_members_and_arrays_use_sixteen_byte_strides() {
        let layout = UniformLayout::builder()
            .field("count", UniformType::Int)
            .struct_array("materials", &MATERIAL, 2)
            .flag_array("used", 2)
            .structure("material", &MATERIAL)
            .build();

        assert_eq!(offset_of(&layout, "materials[0].DiffuseColor"), 16);
        assert_eq!(offset_of(&layout, "materials[0].Shininess"), 44);
        assert_eq!(offset_of(&layout, "materials[1].DiffuseColor"), 48);
        assert_eq!(offset_of(&layout, "used[0]"), 80);
        assert_eq!(offset_of(&layout, "used[1]"), 96);
        assert_eq!(offset_of(&layout, "material.SpecularColor"), 128);
        assert_eq!(layout.size(), 144);
    }

    #[test]
    fn samplers_take_slots_not_bytes() {
        let layout = UniformLayout::builder()
            .field("M", UniformType::Mat4)
            .sampler("diffuseTexture")
            .sampler("shadowMap")
            .build();

        assert_eq!(offset_of(&layout, "diffuseTexture"), 0);
        assert_eq!(offset_of(&layout, "shadowMap"), 1);
        assert_eq!(layout.sampler_count(), 2);
        assert_eq!(layout.size(), 64);
        assert!(!layout.wgsl().contains("shadowMap"));
    }

    #[test]
    fn generated_wgsl_declares_each_struct_once() {
        let layout = UniformLayout::builder()
            .struct_array("materials", &MATERIAL, 3)
            .structure("material", &MATERIAL)
            .build();
        let wgsl = layout.wgsl();

        assert_eq!(wgsl.matches("struct Material {").count(), 1);
        assert!(wgsl.contains("materials: array<Material, 3>,"));
        assert!(wgsl.contains("var<uniform> u: Uniforms;"));
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        let layout = UniformLayout::builder()
            .field("MVP", UniformType::Mat4)
            .build();
        assert!(layout.locate("mvp").is_none());
        assert!(layout.locate("MVP").is_some());
    }

    #[test]
    fn values_only_write_into_matching_slots() {
        let mut block = [0u8; 16];
        assert!(UniformValue::Bool(true).write_into(UniformType::Bool, &mut block));
        assert_eq!(&block[..4], &1u32.to_ne_bytes());
        assert!(!UniformValue::Float(1.0).write_into(UniformType::Vec3, &mut block));
        assert!(!UniformValue::Mat4(Mat4::IDENTITY).write_into(UniformType::Mat4, &mut block));
    }
}

// renderer/programs.rs
//
// Uniform contracts and WGSL sources of the three programs the scene
// renderer uses. Each source is the generated uniform block followed by the
// hand-written stages, so a name used on the host always exists in WGSL.

use crate::renderer::device::{ProgramDescriptor, ProgramTarget};
use crate::renderer::lights::{
    DIRECTIONAL_LIGHT_STRUCT, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
    POINT_LIGHT_STRUCT, SPOT_LIGHT_STRUCT,
};
use crate::renderer::material::MATERIAL_STRUCT;
use crate::renderer::uniforms::{UniformLayout, UniformLayoutBuilder, UniformType};

pub const MESH_PROGRAM: &str = "mesh";
pub const GROUND_PROGRAM: &str = "ground";
pub const DEPTH_PROGRAM: &str = "shadow-depth";

const LIGHTING_WGSL: &str = include_str!("../shader/lighting.wgsl");
const MESH_WGSL: &str = include_str!("../shader/mesh.wgsl");
const GROUND_WGSL: &str = include_str!("../shader/ground.wgsl");
const DEPTH_WGSL: &str = include_str!("../shader/depth.wgsl");

fn with_lighting(builder: UniformLayoutBuilder) -> UniformLayoutBuilder {
    builder
        .field("lightSpaceMatrix", UniformType::Mat4)
        .field("viewPos", UniformType::Vec3)
        .field("AmbientLightIntensity", UniformType::Vec3)
        .field("shadowBias", UniformType::Float)
        .field("shadowsEnabled", UniformType::Bool)
        .field("numDirLights", UniformType::Int)
        .field("numSpotLights", UniformType::Int)
        .struct_array("dirLights", &DIRECTIONAL_LIGHT_STRUCT, MAX_DIRECTIONAL_LIGHTS)
        .struct_array("pointLights", &POINT_LIGHT_STRUCT, MAX_POINT_LIGHTS)
        .struct_array("spotLights", &SPOT_LIGHT_STRUCT, MAX_SPOT_LIGHTS)
        .flag_array("useDirectionalLight", MAX_DIRECTIONAL_LIGHTS)
        .flag_array("useSpotLight", MAX_SPOT_LIGHTS)
}

fn light_capacity_constants() -> String {
    format!(
        "const MAX_DIRECTIONAL_LIGHTS: i32 = {MAX_DIRECTIONAL_LIGHTS};\n\
         const MAX_POINT_LIGHTS: i32 = {MAX_POINT_LIGHTS};\n\
         const MAX_SPOT_LIGHTS: i32 = {MAX_SPOT_LIGHTS};\n\n"
    )
}

pub fn mesh_layout() -> UniformLayout {
    let builder = UniformLayout::builder()
        .field("MVP", UniformType::Mat4)
        .field("V", UniformType::Mat4)
        .field("M", UniformType::Mat4);
    with_lighting(builder)
        .field("useDiffuseTexture", UniformType::Bool)
        .structure("material", &MATERIAL_STRUCT)
        .sampler("diffuseTexture")
        .sampler("shadowMap")
        .build()
}

pub fn ground_layout() -> UniformLayout {
    let builder = UniformLayout::builder()
        .field("model", UniformType::Mat4)
        .field("view", UniformType::Mat4)
        .field("projection", UniformType::Mat4);
    with_lighting(builder)
        .field("groundColor", UniformType::Vec3)
        .sampler("diffuseTexture")
        .sampler("shadowMap")
        .build()
}

pub fn depth_layout() -> UniformLayout {
    UniformLayout::builder()
        .field("lightSpaceModel", UniformType::Mat4)
        .build()
}

fn lit_program(
    label: &'static str,
    layout: UniformLayout,
    stages: &str,
    cull: bool,
) -> ProgramDescriptor {
    let source = format!(
        "{}{}{LIGHTING_WGSL}\n{stages}",
        layout.wgsl(),
        light_capacity_constants()
    );
    ProgramDescriptor {
        label,
        layout,
        source,
        target: ProgramTarget::Surface,
        cull_back_faces: cull,
    }
}

pub fn mesh_program() -> ProgramDescriptor {
    lit_program(MESH_PROGRAM, mesh_layout(), MESH_WGSL, true)
}

pub fn ground_program() -> ProgramDescriptor {
    lit_program(GROUND_PROGRAM, ground_layout(), GROUND_WGSL, false)
}

pub fn depth_program() -> ProgramDescriptor {
    let layout = depth_layout();
    let source = format!("{}{DEPTH_WGSL}", layout.wgsl());
    ProgramDescriptor {
        label: DEPTH_PROGRAM,
        layout,
        source,
        target: ProgramTarget::DepthOnly,
        cull_back_faces: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_structs_have_expected_strides() {
        let layout = mesh_layout();
        let offset = |name: &str| layout.slot(layout.locate(name).unwrap()).unwrap().offset;

        assert_eq!(offset("dirLights[1].Direction") - offset("dirLights[0].Direction"), 64);
        assert_eq!(offset("pointLights[1].Position") - offset("pointLights[0].Position"), 80);
        assert_eq!(offset("spotLights[1].Position") - offset("spotLights[0].Position"), 96);
        assert_eq!(offset("spotLights[0].OuterCutOff") - offset("spotLights[0].Position"), 92);
        assert_eq!(offset("useSpotLight[3]") - offset("useSpotLight[0]"), 48);
    }

    #[test]
    fn every_program_source_embeds_its_uniform_block() {
        for desc in [mesh_program(), ground_program(), depth_program()] {
            assert!(desc.source.starts_with(desc.layout.wgsl()), "{}", desc.label);
            assert!(desc.source.contains("fn vs_main"), "{}", desc.label);
        }
        assert!(mesh_program().source.contains("const MAX_POINT_LIGHTS: i32 = 16;"));
    }

    #[test]
    fn lit_programs_share_the_light_contract() {
        let mesh = mesh_layout();
        let ground = ground_layout();
        for name in ["numDirLights", "spotLights[7].CutOff", "useDirectionalLight[3]", "shadowMap"] {
            assert!(mesh.locate(name).is_some(), "{name}");
            assert!(ground.locate(name).is_some(), "{name}");
        }
        assert!(ground.locate("MVP").is_none());
        assert!(depth_layout().locate("lightSpaceModel").is_some());
    }
}

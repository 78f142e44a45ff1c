// renderer/material.rs (Phong material table entries)

use glam::Vec3;

use crate::renderer::device::{RenderDevice, TextureId};
use crate::renderer::uniforms::{StructDef, UniformLocation, UniformResolver, UniformType};

/// Texture unit the diffuse map is bound to.
pub const DIFFUSE_TEXTURE_UNIT: u32 = 0;

pub static MATERIAL_STRUCT: StructDef = StructDef {
    name: "Material",
    fields: &[
        ("DiffuseColor", UniformType::Vec3),
        ("SpecularColor", UniformType::Vec3),
        ("Shininess", UniformType::Float),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialEntry {
    pub diffuse_color: Vec3,
    pub diffuse_texture: Option<TextureId>,
    pub specular_color: Vec3,
    /// Carried from the source material; only the specular colour is shaded.
    pub specular_texture: Option<TextureId>,
    pub shininess: f32,
}

impl Default for MaterialEntry {
    fn default() -> Self {
        Self {
            diffuse_color: Vec3::ONE,
            diffuse_texture: None,
            specular_color: Vec3::splat(0.5),
            specular_texture: None,
            shininess: 32.0,
        }
    }
}

impl MaterialEntry {
    pub fn new(diffuse_color: Vec3) -> Self {
        Self {
            diffuse_color,
            ..Self::default()
        }
    }

    pub fn textured(texture: TextureId) -> Self {
        Self {
            diffuse_texture: Some(texture),
            ..Self::default()
        }
    }

    pub fn with_specular(mut self, color: Vec3, shininess: f32) -> Self {
        self.specular_color = color;
        self.shininess = shininess;
        self
    }

    /// Colour uploaded as `material.DiffuseColor`. An all-zero diffuse without
    /// a texture becomes white.
    pub fn effective_diffuse_color(&self) -> Vec3 {
        if self.diffuse_texture.is_none() && self.diffuse_color == Vec3::ZERO {
            Vec3::ONE
        } else {
            self.diffuse_color
        }
    }
}

/// Material uniform locations of the mesh program.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaterialUniforms {
    pub diffuse_color: Option<UniformLocation>,
    pub specular_color: Option<UniformLocation>,
    pub shininess: Option<UniformLocation>,
    pub use_diffuse_texture: Option<UniformLocation>,
}

impl MaterialUniforms {
    pub fn resolve<D: RenderDevice>(resolver: &mut UniformResolver<'_, D>) -> Self {
        Self {
            diffuse_color: resolver.get("material.DiffuseColor"),
            specular_color: resolver.get("material.SpecularColor"),
            shininess: resolver.get("material.Shininess"),
            use_diffuse_texture: resolver.get("useDiffuseTexture"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_untextured_diffuse_falls_back_to_white() {
        assert_eq!(MaterialEntry::new(Vec3::ZERO).effective_diffuse_color(), Vec3::ONE);
        let red = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(MaterialEntry::new(red).effective_diffuse_color(), red);
    }

    #[test]
    fn textured_entries_keep_their_colour() {
        let mut entry = MaterialEntry::textured(TextureId(7));
        entry.diffuse_color = Vec3::ZERO;
        assert_eq!(entry.effective_diffuse_color(), Vec3::ZERO);
    }
}

use glam::Vec3;

use crate::renderer::device::{GeometryId, RenderDevice, TextureId, TextureSource};
use crate::renderer::material::{MaterialEntry, MaterialUniforms, DIFFUSE_TEXTURE_UNIT};
use crate::renderer::uniforms::UniformValue;

const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// A maximal span of consecutive triangles sharing one material id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialRun {
    pub material_id: u32,
    pub first_triangle: u32,
    pub triangle_count: u32,
}

impl MaterialRun {
    pub fn index_count(&self) -> u32 {
        self.triangle_count * 3
    }

    pub fn byte_offset(&self) -> u64 {
        u64::from(self.first_triangle) * 3 * INDEX_SIZE
    }
}

fn material_run_length(face_materials: &[u32], start: usize) -> usize {
    let material = face_materials[start];
    let mut length = 1usize;
    while start + length < face_materials.len() && face_materials[start + length] == material {
        length += 1;
    }
    length
}

/// Splits per-triangle material ids into runs, in face order.
pub fn material_runs(face_materials: &[u32]) -> Vec<MaterialRun> {
    let mut runs = Vec::new();
    let mut start = 0usize;
    while start < face_materials.len() {
        let length = material_run_length(face_materials, start);
        runs.push(MaterialRun {
            material_id: face_materials[start],
            first_triangle: start as u32,
            triangle_count: length as u32,
        });
        start += length;
    }
    runs
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub draw_calls: u32,
    pub uniform_uploads: u32,
    pub texture_binds: u32,
}

/// What is currently bound for the mesh program. `None` means unknown, which
/// forces the first run to upload everything.
#[derive(Default)]
struct BoundMaterial {
    texture: Option<Option<TextureId>>,
    diffuse: Option<Vec3>,
    specular: Option<Vec3>,
    shininess: Option<f32>,
}

impl BoundMaterial {
    fn apply<D: RenderDevice>(
        &mut self,
        device: &mut D,
        entry: &MaterialEntry,
        uniforms: &MaterialUniforms,
        stats: &mut BatchStats,
    ) {
        if self.texture != Some(entry.diffuse_texture) {
            let source = entry
                .diffuse_texture
                .map_or(TextureSource::None, TextureSource::Texture);
            device.bind_texture(DIFFUSE_TEXTURE_UNIT, source);
            device.set_uniform(
                uniforms.use_diffuse_texture,
                UniformValue::Bool(entry.diffuse_texture.is_some()),
            );
            self.texture = Some(entry.diffuse_texture);
            stats.texture_binds += 1;
        }

        let diffuse = entry.effective_diffuse_color();
        if self.diffuse != Some(diffuse) {
            device.set_uniform(uniforms.diffuse_color, UniformValue::Vec3(diffuse));
            self.diffuse = Some(diffuse);
            stats.uniform_uploads += 1;
        }
        if self.specular != Some(entry.specular_color) {
            device.set_uniform(uniforms.specular_color, UniformValue::Vec3(entry.specular_color));
            self.specular = Some(entry.specular_color);
            stats.uniform_uploads += 1;
        }
        if self.shininess != Some(entry.shininess) {
            device.set_uniform(uniforms.shininess, UniformValue::Float(entry.shininess));
            self.shininess = Some(entry.shininess);
            stats.uniform_uploads += 1;
        }
    }
}

/// Issues one indexed draw per run, rebinding only material state that changed
/// since the previous run.
pub fn draw_material_runs<D: RenderDevice>(
    device: &mut D,
    geometry: GeometryId,
    runs: &[MaterialRun],
    materials: &[MaterialEntry],
    uniforms: &MaterialUniforms,
) -> BatchStats {
    let fallback = MaterialEntry::default();
    let mut bound = BoundMaterial::default();
    let mut stats = BatchStats::default();

    for run in runs {
        let entry = materials
            .get(run.material_id as usize)
            .unwrap_or(&fallback);
        bound.apply(device, entry, uniforms, &mut stats);
        device.draw_indexed(geometry, run.index_count(), run.byte_offset());
        stats.draw_calls += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_split_on_material_changes() {
        let runs = material_runs(&[0, 0, 1, 1, 1, 0]);
        assert_eq!(runs.len(), 3);
        let spans: Vec<_> = runs
            .iter()
            .map(|run| (run.byte_offset() / 4, run.index_count()))
            .collect();
        assert_eq!(spans, vec![(0, 6), (6, 9), (15, 3)]);
        assert_eq!(runs[2].material_id, 0);
    }

    #[test]
    fn uniform_material_is_one_run() {
        let runs = material_runs(&[2; 12]);
        assert_eq!(
            runs,
            vec![MaterialRun {
                material_id: 2,
                first_triangle: 0,
                triangle_count: 12
            }]
        );
    }

    #[test]
    fn no_faces_no_runs() {
        assert!(material_runs(&[]).is_empty());
    }
}

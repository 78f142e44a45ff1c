use glam::{Mat4, Vec3};

use crate::error::DeviceError;
use crate::renderer::batch::{draw_material_runs, material_runs, BatchStats, MaterialRun};
use crate::renderer::device::{GeometryId, GpuResource, RenderDevice, TextureId};
use crate::renderer::material::{MaterialEntry, MaterialUniforms};
use crate::renderer::uniforms::{UniformLocation, UniformValue};
use crate::renderer::vertex::Vertex;
use crate::scene::transform::ModelTransform;

/// CPU-side mesh as handed over by a loader.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// One material id per triangle.
    pub face_materials: Vec<u32>,
    pub materials: Vec<MaterialEntry>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangle_count() == 0
    }
}

struct MeshGpu {
    geometry: GpuResource<GeometryId>,
    index_count: u32,
    runs: Vec<MaterialRun>,
}

/// A mesh placed in the world. Owns its GPU geometry and the material runs
/// computed when the mesh was attached.
pub struct Model {
    gpu: Option<MeshGpu>,
    positions: Vec<Vec3>,
    materials: Vec<MaterialEntry>,
    transform: ModelTransform,
    lowest_point: Option<f32>,
    lowest_point_update_needed: bool,
}

impl Model {
    pub fn new<D: RenderDevice>(device: &mut D, mesh: MeshData) -> Result<Self, DeviceError> {
        let mut model = Self {
            gpu: None,
            positions: Vec::new(),
            materials: Vec::new(),
            transform: ModelTransform::default(),
            lowest_point: None,
            lowest_point_update_needed: true,
        };
        model.replace_mesh(device, mesh)?;
        Ok(model)
    }

    /// Swaps the mesh, keeping the transform. The previous geometry is
    /// released through the device.
    pub fn replace_mesh<D: RenderDevice>(
        &mut self,
        device: &mut D,
        mut mesh: MeshData,
    ) -> Result<(), DeviceError> {
        let triangles = mesh.triangle_count();
        if mesh.indices.len() % 3 != 0 {
            log::warn!(
                "Mesh index count {} is not a multiple of 3; dropping the trailing indices",
                mesh.indices.len()
            );
            mesh.indices.truncate(triangles * 3);
        }
        if mesh.face_materials.len() != triangles {
            log::warn!(
                "Mesh has {} face materials for {triangles} triangles; padding with material 0",
                mesh.face_materials.len()
            );
            mesh.face_materials.resize(triangles, 0);
        }
        if let Some(id) = mesh
            .face_materials
            .iter()
            .find(|&&id| id as usize >= mesh.materials.len())
        {
            log::warn!(
                "Material id {id} is outside the table of {} materials; using the default material",
                mesh.materials.len()
            );
        }

        self.gpu = if mesh.is_empty() {
            log::debug!("Attached empty mesh; nothing will be drawn");
            None
        } else {
            let geometry = device.create_geometry(&mesh.vertices, &mesh.indices)?;
            Some(MeshGpu {
                geometry: GpuResource::new(geometry, device.releaser()),
                index_count: mesh.indices.len() as u32,
                runs: material_runs(&mesh.face_materials),
            })
        };
        self.positions = mesh.vertices.iter().map(Vertex::position_vec).collect();
        self.materials = mesh.materials;
        self.invalidate_lowest_point();
        Ok(())
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    pub fn set_position(&mut self, position: Vec3) {
        if self.transform.position != position {
            self.transform.position = position;
            self.invalidate_lowest_point();
        }
    }

    pub fn set_rotation(&mut self, degrees: f32, axis: Vec3) {
        if self.transform.rotation_degrees != degrees || self.transform.rotation_axis != axis {
            self.transform.rotation_degrees = degrees;
            self.transform.rotation_axis = axis;
            self.invalidate_lowest_point();
        }
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        if self.transform.scale != scale {
            self.transform.scale = scale;
            self.invalidate_lowest_point();
        }
    }

    pub fn is_lowest_point_update_needed(&self) -> bool {
        self.lowest_point_update_needed
    }

    pub fn mark_lowest_point_fresh(&mut self) {
        self.lowest_point_update_needed = false;
    }

    /// Minimum world-space Y over all vertices, `None` for an empty mesh.
    pub fn lowest_point(&mut self) -> Option<f32> {
        if self.lowest_point.is_none() {
            let matrix = self.model_matrix();
            self.lowest_point = self
                .positions
                .iter()
                .map(|p| matrix.transform_point3(*p).y)
                .reduce(f32::min);
        }
        self.lowest_point
    }

    pub fn materials(&self) -> &[MaterialEntry] {
        &self.materials
    }

    pub fn material_runs(&self) -> &[MaterialRun] {
        match &self.gpu {
            Some(gpu) => &gpu.runs,
            None => &[],
        }
    }

    pub fn texture_id(&self, material: usize) -> Option<TextureId> {
        self.materials.get(material).and_then(|m| m.diffuse_texture)
    }

    pub fn material_diffuse_color(&self, material: usize) -> Vec3 {
        self.materials
            .get(material)
            .copied()
            .unwrap_or_default()
            .effective_diffuse_color()
    }

    /// Lit draw, batched by material run. The mesh program must be current.
    pub fn draw<D: RenderDevice>(
        &self,
        device: &mut D,
        uniforms: &MaterialUniforms,
    ) -> BatchStats {
        match &self.gpu {
            Some(gpu) => draw_material_runs(
                device,
                gpu.geometry.handle(),
                &gpu.runs,
                &self.materials,
                uniforms,
            ),
            None => BatchStats::default(),
        }
    }

    /// Depth-only draw of the whole mesh in a single call.
    pub fn draw_depth<D: RenderDevice>(
        &self,
        device: &mut D,
        light_space_model: Option<UniformLocation>,
        light_space: Mat4,
    ) -> u32 {
        let Some(gpu) = &self.gpu else {
            return 0;
        };
        device.set_uniform(
            light_space_model,
            UniformValue::Mat4(light_space * self.model_matrix()),
        );
        device.draw_indexed(gpu.geometry.handle(), gpu.index_count, 0);
        1
    }

    fn invalidate_lowest_point(&mut self) {
        self.lowest_point = None;
        self.lowest_point_update_needed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::recording::RecordingDevice;

    fn slab(bottom: f32) -> MeshData {
        let vertices = [
            [-1.0, bottom, -1.0],
            [1.0, bottom, -1.0],
            [1.0, bottom + 1.0, 1.0],
            [-1.0, bottom + 1.0, 1.0],
        ]
        .into_iter()
        .map(|p| Vertex::new(p, [0.0, 1.0, 0.0], [0.0, 0.0]))
        .collect();
        MeshData {
            vertices,
            indices: vec![0, 1, 2, 2, 3, 0],
            face_materials: vec![0, 0],
            materials: vec![MaterialEntry::default()],
        }
    }

    #[test]
    fn lowest_point_follows_the_transform() {
        let mut device = RecordingDevice::new(800, 600);
        let mut model = Model::new(&mut device, slab(-2.0)).unwrap();
        assert_eq!(model.lowest_point(), Some(-2.0));

        model.mark_lowest_point_fresh();
        model.set_position(Vec3::new(0.0, 1.5, 0.0));
        assert!(model.is_lowest_point_update_needed());
        assert_eq!(model.lowest_point(), Some(-0.5));
    }

    #[test]
    fn unchanged_setter_keeps_cache_fresh() {
        let mut device = RecordingDevice::new(800, 600);
        let mut model = Model::new(&mut device, slab(0.0)).unwrap();
        model.mark_lowest_point_fresh();
        model.set_scale(Vec3::ONE);
        model.set_rotation(0.0, Vec3::Y);
        assert!(!model.is_lowest_point_update_needed());
    }

    #[test]
    fn empty_mesh_has_no_lowest_point_and_draws_nothing() {
        let mut device = RecordingDevice::new(800, 600);
        let mut model = Model::new(&mut device, MeshData::default()).unwrap();
        assert_eq!(model.lowest_point(), None);
        let stats = model.draw(&mut device, &MaterialUniforms::default());
        assert_eq!(stats.draw_calls, 0);
        assert!(device.draws().is_empty());
    }

    #[test]
    fn short_face_material_list_is_padded() {
        let mut device = RecordingDevice::new(800, 600);
        let mut mesh = slab(0.0);
        mesh.face_materials = vec![0];
        let model = Model::new(&mut device, mesh).unwrap();
        assert_eq!(model.material_runs().len(), 1);
        assert_eq!(model.material_runs()[0].triangle_count, 2);
    }

    #[test]
    fn out_of_range_material_reads_as_white() {
        let mut device = RecordingDevice::new(800, 600);
        let mut mesh = slab(0.0);
        mesh.materials = vec![MaterialEntry::new(Vec3::ZERO)];
        let model = Model::new(&mut device, mesh).unwrap();
        assert_eq!(model.material_diffuse_color(0), Vec3::ONE);
        assert_eq!(model.material_diffuse_color(5), Vec3::ONE);
        assert_eq!(model.texture_id(5), None);
    }
}

use glam::Vec3;

use crate::renderer::device::RenderDevice;
use crate::renderer::uniforms::{
    StructDef, UniformLocation, UniformResolver, UniformType, UniformValue,
};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_POINT_LIGHTS: usize = 16;
pub const MAX_SPOT_LIGHTS: usize = 8;

/// Distance along the reversed direction at which a directional light is
/// placed when it casts the shadow.
pub const DIRECTIONAL_SHADOW_DISTANCE: f32 = 10.0;

pub static DIRECTIONAL_LIGHT_STRUCT: StructDef = StructDef {
    name: "DirLight",
    fields: &[
        ("Direction", UniformType::Vec3),
        ("Intensity", UniformType::Vec3),
        ("Ambient", UniformType::Vec3),
        ("Specular", UniformType::Vec3),
    ],
};

pub static POINT_LIGHT_STRUCT: StructDef = StructDef {
    name: "PointLight",
    fields: &[
        ("Position", UniformType::Vec3),
        ("Intensity", UniformType::Vec3),
        ("Ambient", UniformType::Vec3),
        ("Specular", UniformType::Vec3),
        ("Constant", UniformType::Float),
        ("Linear", UniformType::Float),
        ("Quadratic", UniformType::Float),
    ],
};

pub static SPOT_LIGHT_STRUCT: StructDef = StructDef {
    name: "SpotLight",
    fields: &[
        ("Position", UniformType::Vec3),
        ("Direction", UniformType::Vec3),
        ("Intensity", UniformType::Vec3),
        ("Ambient", UniformType::Vec3),
        ("Specular", UniformType::Vec3),
        ("Constant", UniformType::Float),
        ("Linear", UniformType::Float),
        ("Quadratic", UniformType::Float),
        ("CutOff", UniformType::Float),
        ("OuterCutOff", UniformType::Float),
    ],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub fn array_name(self) -> &'static str {
        match self {
            Self::Directional => "dirLights",
            Self::Point => "pointLights",
            Self::Spot => "spotLights",
        }
    }

    pub fn capacity(self) -> usize {
        match self {
            Self::Directional => MAX_DIRECTIONAL_LIGHTS,
            Self::Point => MAX_POINT_LIGHTS,
            Self::Spot => MAX_SPOT_LIGHTS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightColors {
    pub intensity: Vec3,
    pub ambient: Vec3,
    pub specular: Vec3,
}

impl LightColors {
    pub const OFF: Self = Self {
        intensity: Vec3::ZERO,
        ambient: Vec3::ZERO,
        specular: Vec3::ZERO,
    };
}

impl Default for LightColors {
    fn default() -> Self {
        Self {
            intensity: Vec3::ONE,
            ambient: Vec3::splat(0.2),
            specular: Vec3::ONE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    pub const OFF: Self = Self {
        constant: 0.0,
        linear: 0.0,
        quadratic: 0.0,
    };
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

fn normalized_direction(direction: Vec3) -> Vec3 {
    let normalized = direction.normalize_or_zero();
    if normalized == Vec3::ZERO {
        Vec3::NEG_Y
    } else {
        normalized
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    direction: Vec3,
    pub colors: LightColors,
}

impl DirectionalLight {
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: normalized_direction(direction),
            colors: LightColors::default(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = normalized_direction(direction);
    }

    fn upload<D: RenderDevice>(&self, device: &mut D, slot: &LightSlot) {
        device.set_uniform(slot.direction, UniformValue::Vec3(self.direction));
        slot.upload_colors(device, &self.colors);
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::NEG_Y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub colors: LightColors,
    pub attenuation: Attenuation,
}

impl PointLight {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            colors: LightColors::default(),
            attenuation: Attenuation::default(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    fn upload<D: RenderDevice>(&self, device: &mut D, slot: &LightSlot) {
        device.set_uniform(slot.position, UniformValue::Vec3(self.position));
        slot.upload_colors(device, &self.colors);
        slot.upload_attenuation(device, &self.attenuation);
    }
}

/// Cone limits are kept as cosines of the half angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    direction: Vec3,
    pub colors: LightColors,
    pub attenuation: Attenuation,
    cut_off: f32,
    outer_cut_off: f32,
}

impl SpotLight {
    pub const DEFAULT_CUT_OFF_DEGREES: f32 = 12.5;
    pub const DEFAULT_OUTER_CUT_OFF_DEGREES: f32 = 17.5;

    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction: normalized_direction(direction),
            colors: LightColors::default(),
            attenuation: Attenuation::default(),
            cut_off: Self::DEFAULT_CUT_OFF_DEGREES.to_radians().cos(),
            outer_cut_off: Self::DEFAULT_OUTER_CUT_OFF_DEGREES.to_radians().cos(),
        }
    }

    pub fn with_colors(mut self, colors: LightColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = normalized_direction(direction);
    }

    pub fn set_cut_off(&mut self, degrees: f32) {
        self.cut_off = degrees.to_radians().cos();
    }

    pub fn set_outer_cut_off(&mut self, degrees: f32) {
        self.outer_cut_off = degrees.to_radians().cos();
    }

    pub fn cut_off(&self) -> f32 {
        self.cut_off
    }

    pub fn outer_cut_off(&self) -> f32 {
        self.outer_cut_off
    }

    /// `(inner, outer)` with the outer cone never narrower than the inner.
    pub fn cone(&self) -> (f32, f32) {
        if self.outer_cut_off > self.cut_off {
            (self.outer_cut_off, self.cut_off)
        } else {
            (self.cut_off, self.outer_cut_off)
        }
    }

    fn upload<D: RenderDevice>(&self, device: &mut D, slot: &LightSlot) {
        let (inner, outer) = self.cone();
        device.set_uniform(slot.position, UniformValue::Vec3(self.position));
        device.set_uniform(slot.direction, UniformValue::Vec3(self.direction));
        slot.upload_colors(device, &self.colors);
        slot.upload_attenuation(device, &self.attenuation);
        device.set_uniform(slot.cut_off, UniformValue::Float(inner));
        device.set_uniform(slot.outer_cut_off, UniformValue::Float(outer));
    }
}

impl Default for SpotLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::NEG_Y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightSource {
    Directional(DirectionalLight),
    Point(PointLight),
    Spot(SpotLight),
}

impl LightSource {
    pub fn kind(&self) -> LightKind {
        match self {
            Self::Directional(_) => LightKind::Directional,
            Self::Point(_) => LightKind::Point,
            Self::Spot(_) => LightKind::Spot,
        }
    }

    pub fn colors(&self) -> &LightColors {
        match self {
            Self::Directional(light) => &light.colors,
            Self::Point(light) => &light.colors,
            Self::Spot(light) => &light.colors,
        }
    }
}

impl From<DirectionalLight> for LightSource {
    fn from(light: DirectionalLight) -> Self {
        Self::Directional(light)
    }
}

impl From<PointLight> for LightSource {
    fn from(light: PointLight) -> Self {
        Self::Point(light)
    }
}

impl From<SpotLight> for LightSource {
    fn from(light: SpotLight) -> Self {
        Self::Spot(light)
    }
}

/// Where the designated shadow caster sits and looks this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowCaster {
    pub kind: LightKind,
    pub position: Vec3,
    pub target: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct LightRegistry {
    directional: Vec<DirectionalLight>,
    point: Vec<PointLight>,
    spot: Vec<SpotLight>,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the light to its kind's sequence and returns its shader index.
    pub fn add(&mut self, light: impl Into<LightSource>) -> usize {
        let light = light.into();
        let kind = light.kind();
        let index = match light {
            LightSource::Directional(light) => push_indexed(&mut self.directional, light),
            LightSource::Point(light) => push_indexed(&mut self.point, light),
            LightSource::Spot(light) => push_indexed(&mut self.spot, light),
        };
        if index >= kind.capacity() {
            log::warn!(
                "{} light #{index} exceeds the shader capacity of {} and will not be uploaded",
                kind.array_name(),
                kind.capacity()
            );
        }
        index
    }

    pub fn add_directional(&mut self, light: DirectionalLight) -> usize {
        self.add(light)
    }

    pub fn add_point(&mut self, light: PointLight) -> usize {
        self.add(light)
    }

    pub fn add_spot(&mut self, light: SpotLight) -> usize {
        self.add(light)
    }

    pub fn clear(&mut self) {
        self.directional.clear();
        self.point.clear();
        self.spot.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.directional.is_empty() && self.point.is_empty() && self.spot.is_empty()
    }

    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot
    }

    pub fn directional_mut(&mut self, index: usize) -> Option<&mut DirectionalLight> {
        self.directional.get_mut(index)
    }

    pub fn point_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.point.get_mut(index)
    }

    pub fn spot_mut(&mut self, index: usize) -> Option<&mut SpotLight> {
        self.spot.get_mut(index)
    }

    /// First directional, else first spot, else first point.
    pub fn shadow_caster(&self) -> Option<ShadowCaster> {
        let caster = if let Some(light) = self.directional.first() {
            ShadowCaster {
                kind: LightKind::Directional,
                position: -light.direction() * DIRECTIONAL_SHADOW_DISTANCE,
                target: Vec3::ZERO,
            }
        } else if let Some(light) = self.spot.first() {
            ShadowCaster {
                kind: LightKind::Spot,
                position: light.position,
                target: light.position + light.direction(),
            }
        } else {
            let light = self.point.first()?;
            let target = if light.position == Vec3::ZERO {
                Vec3::NEG_Y
            } else {
                Vec3::ZERO
            };
            ShadowCaster {
                kind: LightKind::Point,
                position: light.position,
                target,
            }
        };
        Some(caster)
    }

    /// Uploads counts, enable flags and every light that fits the shader arrays.
    pub fn upload<D: RenderDevice>(&self, device: &mut D, uniforms: &LightUniforms) {
        let dir_count = self.directional.len().min(MAX_DIRECTIONAL_LIGHTS);
        let spot_count = self.spot.len().min(MAX_SPOT_LIGHTS);

        device.set_uniform(uniforms.num_dir_lights, UniformValue::Int(dir_count as i32));
        for (light, slot) in self.directional.iter().zip(&uniforms.directional) {
            light.upload(device, slot);
        }
        for (index, slot) in uniforms.directional.iter().enumerate() {
            device.set_uniform(slot.enabled, UniformValue::Bool(index < dir_count));
        }

        for (light, slot) in self.point.iter().zip(&uniforms.point) {
            light.upload(device, slot);
        }
        // Point lights have no enable flag; a zero attenuation marks the slot unused.
        for slot in uniforms.point.iter().skip(self.point.len()) {
            slot.upload_colors(device, &LightColors::OFF);
            slot.upload_attenuation(device, &Attenuation::OFF);
        }

        device.set_uniform(uniforms.num_spot_lights, UniformValue::Int(spot_count as i32));
        for (light, slot) in self.spot.iter().zip(&uniforms.spot) {
            light.upload(device, slot);
        }
        for (index, slot) in uniforms.spot.iter().enumerate() {
            device.set_uniform(slot.enabled, UniformValue::Bool(index < spot_count));
        }
    }
}

fn push_indexed<T>(items: &mut Vec<T>, item: T) -> usize {
    items.push(item);
    items.len() - 1
}

#[derive(Clone, Copy, Debug, Default)]
struct LightSlot {
    position: Option<UniformLocation>,
    direction: Option<UniformLocation>,
    intensity: Option<UniformLocation>,
    ambient: Option<UniformLocation>,
    specular: Option<UniformLocation>,
    constant: Option<UniformLocation>,
    linear: Option<UniformLocation>,
    quadratic: Option<UniformLocation>,
    cut_off: Option<UniformLocation>,
    outer_cut_off: Option<UniformLocation>,
    enabled: Option<UniformLocation>,
}

impl LightSlot {
    fn resolve<D: RenderDevice>(
        resolver: &mut UniformResolver<'_, D>,
        kind: LightKind,
        index: usize,
    ) -> Self {
        let array = kind.array_name();
        let mut field = |name: &str| resolver.get(&format!("{array}[{index}].{name}"));

        let mut slot = Self {
            intensity: field("Intensity"),
            ambient: field("Ambient"),
            specular: field("Specular"),
            ..Self::default()
        };
        if kind != LightKind::Directional {
            slot.position = field("Position");
            slot.constant = field("Constant");
            slot.linear = field("Linear");
            slot.quadratic = field("Quadratic");
        }
        if kind != LightKind::Point {
            slot.direction = field("Direction");
        }
        if kind == LightKind::Spot {
            slot.cut_off = field("CutOff");
            slot.outer_cut_off = field("OuterCutOff");
        }
        slot.enabled = match kind {
            LightKind::Directional => resolver.get(&format!("useDirectionalLight[{index}]")),
            LightKind::Spot => resolver.get(&format!("useSpotLight[{index}]")),
            LightKind::Point => None,
        };
        slot
    }

    fn upload_colors<D: RenderDevice>(&self, device: &mut D, colors: &LightColors) {
        device.set_uniform(self.intensity, UniformValue::Vec3(colors.intensity));
        device.set_uniform(self.ambient, UniformValue::Vec3(colors.ambient));
        device.set_uniform(self.specular, UniformValue::Vec3(colors.specular));
    }

    fn upload_attenuation<D: RenderDevice>(&self, device: &mut D, attenuation: &Attenuation) {
        device.set_uniform(self.constant, UniformValue::Float(attenuation.constant));
        device.set_uniform(self.linear, UniformValue::Float(attenuation.linear));
        device.set_uniform(self.quadratic, UniformValue::Float(attenuation.quadratic));
    }
}

/// Light uniform locations of one program, resolved once.
#[derive(Clone, Debug, Default)]
pub struct LightUniforms {
    num_dir_lights: Option<UniformLocation>,
    num_spot_lights: Option<UniformLocation>,
    directional: Vec<LightSlot>,
    point: Vec<LightSlot>,
    spot: Vec<LightSlot>,
}

impl LightUniforms {
    pub fn resolve<D: RenderDevice>(resolver: &mut UniformResolver<'_, D>) -> Self {
        Self {
            num_dir_lights: resolver.get("numDirLights"),
            num_spot_lights: resolver.get("numSpotLights"),
            directional: (0..MAX_DIRECTIONAL_LIGHTS)
                .map(|i| LightSlot::resolve(resolver, LightKind::Directional, i))
                .collect(),
            point: (0..MAX_POINT_LIGHTS)
                .map(|i| LightSlot::resolve(resolver, LightKind::Point, i))
                .collect(),
            spot: (0..MAX_SPOT_LIGHTS)
                .map(|i| LightSlot::resolve(resolver, LightKind::Spot, i))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn indices_follow_insertion_order_per_kind() {
        let mut lights = LightRegistry::new();
        assert_eq!(lights.add(DirectionalLight::new(Vec3::NEG_Y)), 0);
        assert_eq!(lights.add(PointLight::new(vec3(1.0, 2.0, 3.0))), 0);
        assert_eq!(lights.add(PointLight::new(vec3(4.0, 5.0, 6.0))), 1);
        assert_eq!(lights.add(DirectionalLight::new(Vec3::X)), 1);

        assert_eq!(lights.point_lights()[1].position, vec3(4.0, 5.0, 6.0));
        assert_eq!(lights.directional_lights().len(), 2);
        assert!(lights.spot_lights().is_empty());
    }

    #[test]
    fn cut_offs_are_stored_as_cosines() {
        let mut spot = SpotLight::default();
        spot.set_cut_off(12.5);
        spot.set_outer_cut_off(17.5);
        assert!((spot.cut_off() - 0.976_296).abs() < 1e-5);
        assert!((spot.outer_cut_off() - 0.953_717).abs() < 1e-5);
        assert!(spot.outer_cut_off() <= spot.cut_off());
    }

    #[test]
    fn inverted_cone_is_swapped_for_upload() {
        let mut spot = SpotLight::default();
        spot.set_cut_off(30.0);
        spot.set_outer_cut_off(10.0);
        let (inner, outer) = spot.cone();
        assert!(inner > outer);
        assert_eq!(inner, spot.outer_cut_off());
    }

    #[test]
    fn directional_directions_are_normalized() {
        let light = DirectionalLight::new(vec3(-1.0, -1.0, -1.0));
        assert!((light.direction().length() - 1.0).abs() < 1e-6);
        assert_eq!(DirectionalLight::new(Vec3::ZERO).direction(), Vec3::NEG_Y);
    }

    #[test]
    fn shadow_caster_prefers_directional_then_spot_then_point() {
        let mut lights = LightRegistry::new();
        assert!(lights.shadow_caster().is_none());

        lights.add(PointLight::new(vec3(4.0, 4.0, 4.0)));
        let caster = lights.shadow_caster().unwrap();
        assert_eq!(caster.kind, LightKind::Point);
        assert_eq!(caster.target, Vec3::ZERO);

        lights.add(SpotLight::new(vec3(0.0, 4.0, 0.0), Vec3::NEG_Y));
        let caster = lights.shadow_caster().unwrap();
        assert_eq!(caster.kind, LightKind::Spot);
        assert_eq!(caster.target, vec3(0.0, 3.0, 0.0));

        lights.add(DirectionalLight::new(Vec3::NEG_Y));
        let caster = lights.shadow_caster().unwrap();
        assert_eq!(caster.kind, LightKind::Directional);
        assert_eq!(caster.position, vec3(0.0, 10.0, 0.0));
    }
}

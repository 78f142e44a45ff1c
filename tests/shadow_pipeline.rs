use forward_viewer::renderer::lights::{LightKind, DIRECTIONAL_SHADOW_DISTANCE};
use forward_viewer::renderer::shadow_map::light_space_transform;
use glam::{Mat4, Vec3};

const EPSILON: f32 = 1e-5;

// Mirrors the lookup in lighting.wgsl.
fn project_shadow_cpu(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    if clip.w <= 0.0 {
        return Vec3::splat(-1.0);
    }
    let ndc = clip.truncate() / clip.w;
    Vec3::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z)
}

fn compute_ndc(matrix: Mat4, world_pos: Vec3) -> Vec3 {
    let clip = matrix * world_pos.extend(1.0);
    clip.truncate() / clip.w
}

fn directional(direction: Vec3) -> Mat4 {
    let direction = direction.normalize();
    light_space_transform(
        -direction * DIRECTIONAL_SHADOW_DISTANCE,
        Vec3::ZERO,
        LightKind::Directional,
    )
}

fn in_unit_range(value: f32) -> bool {
    (-EPSILON..=1.0 + EPSILON).contains(&value)
}

#[test]
fn directional_shadow_maps_scene_points_into_the_texture() {
    let light_space = directional(Vec3::new(0.4, -1.0, 0.2));

    let points = [
        Vec3::new(-1.5, 0.0, -1.0),
        Vec3::new(1.0, 1.0, 2.0),
        Vec3::new(2.0, -0.5, -1.5),
        Vec3::ZERO,
    ];

    for point in points {
        let ndc = compute_ndc(light_space, point);
        let projected = project_shadow_cpu(light_space, point);

        assert!(projected.abs_diff_eq(
            Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z),
            EPSILON
        ));
        assert!(in_unit_range(projected.x), "{point:?} -> {projected:?}");
        assert!(in_unit_range(projected.y), "{point:?} -> {projected:?}");
        assert!(in_unit_range(projected.z), "{point:?} -> {projected:?}");
    }
}

#[test]
fn points_nearer_the_light_have_smaller_depth() {
    let direction = Vec3::new(-1.0, -1.0, -1.0).normalize();
    let light_space = directional(direction);

    let near = project_shadow_cpu(light_space, -direction);
    let far = project_shadow_cpu(light_space, direction);
    assert!(near.z < far.z);
}

#[test]
fn shadow_texture_axis_is_flipped_from_clip_space() {
    // Straight down: the look-at up vector falls back to +Z.
    let light_space = directional(Vec3::NEG_Y);
    assert!(!light_space.is_nan());

    let top_world = Vec3::Z * 2.0;
    let bottom_world = -Vec3::Z * 2.0;

    let ndc_top = compute_ndc(light_space, top_world);
    let ndc_bottom = compute_ndc(light_space, bottom_world);
    assert!(ndc_top.y > ndc_bottom.y);

    let tex_top = project_shadow_cpu(light_space, top_world);
    let tex_bottom = project_shadow_cpu(light_space, bottom_world);
    assert!(tex_top.y < tex_bottom.y);
}

#[test]
fn spot_shadow_projection_rejects_points_behind_light() {
    let light_space = light_space_transform(
        Vec3::new(0.0, 4.0, 0.0),
        Vec3::new(0.0, 3.0, 0.0),
        LightKind::Spot,
    );

    let behind_light = Vec3::new(0.0, 8.0, 0.0);
    assert_eq!(
        project_shadow_cpu(light_space, behind_light),
        Vec3::splat(-1.0)
    );

    let projected = project_shadow_cpu(light_space, Vec3::ZERO);
    assert!(projected.abs_diff_eq(Vec3::new(0.5, 0.5, projected.z), EPSILON));
    assert!(in_unit_range(projected.z));
}

#[test]
fn perspective_casters_cover_a_ninety_degree_cone() {
    let light_space = light_space_transform(Vec3::splat(4.0), Vec3::ZERO, LightKind::Point);

    let centre = project_shadow_cpu(light_space, Vec3::ZERO);
    assert!(centre.abs_diff_eq(Vec3::new(0.5, 0.5, centre.z), EPSILON));

    // 45 degrees off axis lands on the texture border.
    let eye = Vec3::splat(4.0);
    let forward = (Vec3::ZERO - eye).normalize();
    let side = forward.cross(Vec3::Y).normalize();
    let edge = eye + (forward + side) * 3.0;
    let projected = project_shadow_cpu(light_space, edge);
    assert!((projected.x - 1.0).abs() < 1e-4 || projected.x.abs() < 1e-4);
}

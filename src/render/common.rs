use glam::{Mat4, Vec3};

use crate::scene::{PerspectiveCamera, SceneGraph};

/// Camera state consumed by the renderers' uniforms.
#[derive(Clone, Debug)]
pub struct CameraParams {
    pub view_proj: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        Self {
            view_proj: camera.view_projection(),
            position: camera.position,
        }
    }
}

/// Lighting state consumed by the renderers' uniforms. Colors are linear and
/// premultiplied by intensity.
#[derive(Clone, Debug)]
pub struct LightParams {
    pub ambient: Vec3,
    /// Unit vector pointing from the surface towards the light.
    pub direction: Vec3,
    pub directional: Vec3,
}

impl LightParams {
    pub fn from_scene(scene: &SceneGraph) -> Self {
        let ambient = scene
            .ambient_light()
            .map(|light| light.color.to_linear() * light.intensity)
            .unwrap_or(Vec3::ZERO);
        let (direction, directional) = scene
            .directional_light()
            .map(|light| {
                (
                    light.position.normalize_or_zero(),
                    light.color.to_linear() * light.intensity,
                )
            })
            .unwrap_or((Vec3::Y, Vec3::ZERO));
        Self {
            ambient,
            direction,
            directional,
        }
    }

    /// Lambert term for a surface normal, without the material color.
    pub fn shade(&self, normal: Vec3) -> Vec3 {
        self.ambient + self.directional * normal.dot(self.direction).max(0.0)
    }
}

/// Projects a world-space point to pixel coordinates in a `width`×`height`
/// viewport. `z` carries the normalized depth. Points behind the camera yield
/// `None`.
pub fn project_point(view_proj: Mat4, point: Vec3, width: f32, height: f32) -> Option<Vec3> {
    let clip = view_proj * point.extend(1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec3::new(
        (ndc.x + 1.0) * 0.5 * width,
        (1.0 - ndc.y) * 0.5 * height,
        ndc.z,
    ))
}

/// Converts linear light back to an sRGB CSS color string.
pub fn linear_to_css(linear: Vec3) -> String {
    let encode = |c: f32| {
        let c = c.clamp(0.0, 1.0);
        let srgb = if c <= 0.003_130_8 {
            c * 12.92
        } else {
            1.055 * c.powf(1.0 / 2.4) - 0.055
        };
        (srgb * 255.0).round() as u8
    };
    format!(
        "rgb({}, {}, {})",
        encode(linear.x),
        encode(linear.y),
        encode(linear.z)
    )
}

/// Device pixels backing a surface of `css` pixels. Ratios that are not
/// finite and positive count as 1, and each side is at least one pixel.
pub fn backing_size((width, height): (u32, u32), pixel_ratio: f64) -> (u32, u32) {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio
    } else {
        1.0
    };
    let scale = |side: u32| ((side as f64 * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{AmbientLight, Color, DirectionalLight, SceneNode};

    #[test]
    fn lights_are_read_from_scene() {
        let mut scene = SceneGraph::new();
        scene.add(SceneNode::AmbientLight(AmbientLight {
            color: Color::WHITE,
            intensity: 0.35,
        }));
        scene.add(SceneNode::DirectionalLight(DirectionalLight {
            color: Color::WHITE,
            intensity: 0.9,
            position: Vec3::new(5.0, 5.0, 5.0),
        }));
        let light = LightParams::from_scene(&scene);
        assert_eq!(light.ambient, Vec3::splat(0.35));
        assert!((light.direction.length() - 1.0).abs() < 1e-6);
        let lit = light.shade(light.direction);
        assert!((lit.x - 1.25).abs() < 1e-5);
        let unlit = light.shade(-light.direction);
        assert!((unlit.x - 0.35).abs() < 1e-6);
    }

    #[test]
    fn projection_maps_target_to_viewport_center() {
        let mut camera = PerspectiveCamera::new(75.0, 2.0, 0.1, 1000.0);
        camera.position = Vec3::new(3.0, 2.0, 4.0);
        camera.look_at(Vec3::ZERO);
        let screen = project_point(camera.view_projection(), Vec3::ZERO, 800.0, 400.0).unwrap();
        assert!((screen.x - 400.0).abs() < 1e-3);
        assert!((screen.y - 200.0).abs() < 1e-3);
        assert!(project_point(camera.view_projection(), Vec3::new(6.0, 4.0, 8.0), 800.0, 400.0)
            .is_none());
    }

    #[test]
    fn css_round_trips_srgb_colors() {
        let color = Color::from_hex(0x44aa88);
        assert_eq!(linear_to_css(color.to_linear()), "rgb(68, 170, 136)");
        assert_eq!(linear_to_css(Vec3::splat(2.0)), "rgb(255, 255, 255)");
    }

    #[test]
    fn backing_store_scales_with_pixel_ratio() {
        assert_eq!(backing_size((800, 600), 1.0), (800, 600));
        assert_eq!(backing_size((800, 600), 2.0), (1600, 1200));
        assert_eq!(backing_size((333, 101), 1.5), (500, 152));
        assert_eq!(backing_size((800, 600), 0.0), (800, 600));
        assert_eq!(backing_size((800, 600), f64::NAN), (800, 600));
        assert_eq!(backing_size((0, 0), 2.0), (1, 1));
    }

    #[test]
    fn empty_scene_is_dark() {
        let light = LightParams::from_scene(&SceneGraph::new());
        assert_eq!(light.shade(Vec3::Y), Vec3::ZERO);
    }
}

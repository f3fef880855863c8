use glam::{EulerRot, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// 8-bit sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::from_hex(0xffffff);

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub const fn to_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Normalized sRGB components.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    /// Components converted to linear light, as expected by sRGB render targets.
    pub fn to_linear(self) -> Vec3 {
        let convert = |c: f32| {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        let srgb = self.to_vec3();
        Vec3::new(convert(srgb.x), convert(srgb.y), convert(srgb.z))
    }

    pub fn to_css(self) -> String {
        format!("#{:06x}", self.to_hex())
    }
}

/// Position, Euler rotation (radians, XYZ order) and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rotation = Mat4::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_translation(self.position) * rotation * Mat4::from_scale(self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Lambert diffuse plus a faint specular highlight.
    Phong,
    /// Diffuse only.
    Standard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub kind: MaterialKind,
    pub color: Color,
    wireframe: bool,
    disposed: bool,
}

impl Material {
    pub fn new(kind: MaterialKind, color: Color, wireframe: bool) -> Self {
        Self {
            kind,
            color,
            wireframe,
            disposed: false,
        }
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub geometry: Geometry,
    pub material: Material,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self {
            name: name.into(),
            geometry,
            material,
            transform: Transform::default(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn dispose(&mut self) {
        self.geometry.dispose();
        self.material.dispose();
    }
}

/// Meshes sharing one parent transform, e.g. the parts of an articulated model.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub transform: Transform,
    pub children: Vec<Mesh>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    /// Light shines from this point towards the origin.
    pub position: Vec3,
}

/// Red/green/blue lines along the positive axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxesHelper {
    pub size: f32,
}

/// Square grid on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHelper {
    pub size: f32,
    pub divisions: u32,
    pub center_color: Color,
    pub line_color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub from: Vec3,
    pub to: Vec3,
    pub color: Color,
}

impl AxesHelper {
    pub fn lines(&self) -> Vec<LineSegment> {
        [
            (Vec3::X, Color::from_hex(0xff0000)),
            (Vec3::Y, Color::from_hex(0x00ff00)),
            (Vec3::Z, Color::from_hex(0x0000ff)),
        ]
        .into_iter()
        .map(|(axis, color)| LineSegment {
            from: Vec3::ZERO,
            to: axis * self.size,
            color,
        })
        .collect()
    }
}

impl GridHelper {
    pub fn lines(&self) -> Vec<LineSegment> {
        let divisions = self.divisions.max(1);
        let half = self.size / 2.0;
        let step = self.size / divisions as f32;
        let center = divisions / 2;
        let mut lines = Vec::with_capacity((divisions as usize + 1) * 2);
        for i in 0..=divisions {
            let k = -half + i as f32 * step;
            let color = if i == center {
                self.center_color
            } else {
                self.line_color
            };
            lines.push(LineSegment {
                from: Vec3::new(-half, 0.0, k),
                to: Vec3::new(half, 0.0, k),
                color,
            });
            lines.push(LineSegment {
                from: Vec3::new(k, 0.0, -half),
                to: Vec3::new(k, 0.0, half),
                color,
            });
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    AmbientLight(AmbientLight),
    DirectionalLight(DirectionalLight),
    Axes(AxesHelper),
    Grid(GridHelper),
    Mesh(Mesh),
    Group(Group),
}

/// Index of a node inside its [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Mesh reference with its resolved world matrix.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub geometry: &'a Geometry,
    pub material: &'a Material,
    pub world: Mat4,
}

/// Flat scene root holding lights, helpers and renderable objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    pub background: Option<Color>,
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Removes every node. The background is kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Like [`SceneGraph::clear`], but returns the mesh stored at `id`.
    pub fn take_mesh_and_clear(&mut self, id: NodeId) -> Option<Mesh> {
        let mut nodes = std::mem::take(&mut self.nodes);
        if id.0 >= nodes.len() {
            return None;
        }
        match nodes.swap_remove(id.0) {
            SceneNode::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh(&self, id: NodeId) -> Option<&Mesh> {
        match self.nodes.get(id.0) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match self.nodes.get_mut(id.0) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn group(&self, id: NodeId) -> Option<&Group> {
        match self.nodes.get(id.0) {
            Some(SceneNode::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Every mesh in the scene, group children included.
    pub fn meshes_mut(&mut self) -> impl Iterator<Item = &mut Mesh> + '_ {
        self.nodes.iter_mut().flat_map(|node| match node {
            SceneNode::Mesh(mesh) => std::slice::from_mut(mesh).iter_mut(),
            SceneNode::Group(group) => group.children.iter_mut(),
            _ => Default::default(),
        })
    }

    pub fn ambient_light(&self) -> Option<AmbientLight> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::AmbientLight(light) => Some(*light),
            _ => None,
        })
    }

    pub fn directional_light(&self) -> Option<DirectionalLight> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::DirectionalLight(light) => Some(*light),
            _ => None,
        })
    }

    /// Every mesh in the scene, group children included.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        for node in &self.nodes {
            match node {
                SceneNode::Mesh(mesh) => items.push(DrawItem {
                    geometry: &mesh.geometry,
                    material: &mesh.material,
                    world: mesh.transform.matrix(),
                }),
                SceneNode::Group(group) => {
                    let parent = group.transform.matrix();
                    items.extend(group.children.iter().map(|mesh| DrawItem {
                        geometry: &mesh.geometry,
                        material: &mesh.material,
                        world: parent * mesh.transform.matrix(),
                    }));
                }
                _ => {}
            }
        }
        items.retain(|item| !item.geometry.is_disposed());
        items
    }

    /// Line segments of every helper in the scene.
    pub fn helper_lines(&self) -> Vec<LineSegment> {
        self.nodes
            .iter()
            .flat_map(|node| match node {
                SceneNode::Axes(axes) => axes.lines(),
                SceneNode::Grid(grid) => grid.lines(),
                _ => Vec::new(),
            })
            .collect()
    }
}

/// Right handed perspective camera looking at `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Recomputes the cached projection after `fov`, `aspect` or clip planes changed.
    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect.max(f32::EPSILON),
            self.near,
            self.far,
        );
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}

use std::collections::BTreeSet;
use std::f32::consts::{PI, TAU};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Floats per interleaved vertex: `position.xyz` followed by `normal.xyz`.
pub const VERTEX_STRIDE: usize = 6;

static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a geometry instance, used by renderers to key GPU buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeometryId(u64);

impl GeometryId {
    fn next() -> Self {
        Self(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Primitive family a geometry was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Box,
    Sphere,
    Plane,
    Cone,
    Cylinder,
    Torus,
    Icosahedron,
    Dodecahedron,
    Custom,
}

/// Indexed triangle mesh with interleaved position/normal vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    id: GeometryId,
    primitive: Primitive,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    disposed: bool,
}

impl Geometry {
    pub fn new(primitive: Primitive, vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            id: GeometryId::next(),
            primitive,
            vertices,
            indices,
            disposed: false,
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: u32) -> Vec3 {
        let start = index as usize * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    pub fn normal(&self, index: u32) -> Vec3 {
        let start = index as usize * VERTEX_STRIDE + 3;
        Vec3::from_slice(&self.vertices[start..start + 3])
    }

    /// Unique undirected edges of every triangle, suitable for a line list.
    pub fn edges(&self) -> Vec<[u32; 2]> {
        let mut unique = BTreeSet::new();
        for triangle in self.indices.chunks_exact(3) {
            for (a, b) in [
                (triangle[0], triangle[1]),
                (triangle[1], triangle[2]),
                (triangle[2], triangle[0]),
            ] {
                if a != b {
                    unique.insert((a.min(b), a.max(b)));
                }
            }
        }
        unique.into_iter().map(|(a, b)| [a, b]).collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Releases the vertex data. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.vertices = Vec::new();
        self.indices = Vec::new();
        self.disposed = true;
    }
}

/// Axis aligned box centred at the origin, four vertices per face.
pub fn box_geometry(width: f32, height: f32, depth: f32) -> Geometry {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
    // (normal, u axis, v axis) chosen so that u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let half = Vec3::new(hx, hy, hz);
    let mut builder = MeshBuilder::default();
    for (normal, u, v) in faces {
        let base = builder.vertex_count();
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * half;
            builder.push_vertex(position, normal);
        }
        builder.push_triangle(base, base + 1, base + 2);
        builder.push_triangle(base, base + 2, base + 3);
    }
    builder.finish(Primitive::Box)
}

/// UV sphere. Seams are duplicated so every ring has `width_segments + 1` vertices.
pub fn sphere_geometry(radius: f32, width_segments: u32, height_segments: u32) -> Geometry {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut builder = MeshBuilder::default();
    let mut grid = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let mut row = Vec::with_capacity(width_segments as usize + 1);
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let position = Vec3::new(
                -radius * (u * TAU).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * TAU).sin() * (v * PI).sin(),
            );
            row.push(builder.push_vertex(position, position.normalize_or_zero()));
        }
        grid.push(row);
    }

    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                builder.push_triangle(a, b, d);
            }
            if iy != height_segments as usize - 1 {
                builder.push_triangle(b, c, d);
            }
        }
    }
    builder.finish(Primitive::Sphere)
}

/// Single quad in the XY plane facing +Z.
pub fn plane_geometry(width: f32, height: f32) -> Geometry {
    let (hx, hy) = (width / 2.0, height / 2.0);
    let mut builder = MeshBuilder::default();
    let top_left = builder.push_vertex(Vec3::new(-hx, hy, 0.0), Vec3::Z);
    let top_right = builder.push_vertex(Vec3::new(hx, hy, 0.0), Vec3::Z);
    let bottom_left = builder.push_vertex(Vec3::new(-hx, -hy, 0.0), Vec3::Z);
    let bottom_right = builder.push_vertex(Vec3::new(hx, -hy, 0.0), Vec3::Z);
    builder.push_triangle(top_left, bottom_left, top_right);
    builder.push_triangle(bottom_left, bottom_right, top_right);
    builder.finish(Primitive::Plane)
}

/// Capped cylinder along Y.
pub fn cylinder_geometry(radius: f32, height: f32, radial_segments: u32) -> Geometry {
    frustum(radius, radius, height, radial_segments).finish(Primitive::Cylinder)
}

/// Cone along Y with its apex at `+height / 2`.
pub fn cone_geometry(radius: f32, height: f32, radial_segments: u32) -> Geometry {
    frustum(0.0, radius, height, radial_segments).finish(Primitive::Cone)
}

fn frustum(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshBuilder {
    let segments = radial_segments.max(3);
    let half = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;
    let mut builder = MeshBuilder::default();

    let mut rings = Vec::with_capacity(2);
    for (y, radius) in [(half, radius_top), (-half, radius_bottom)] {
        let mut ring = Vec::with_capacity(segments as usize + 1);
        for x in 0..=segments {
            let theta = x as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            let normal = Vec3::new(sin, slope, cos).normalize();
            ring.push(builder.push_vertex(Vec3::new(radius * sin, y, radius * cos), normal));
        }
        rings.push(ring);
    }

    for x in 0..segments as usize {
        let a = rings[0][x];
        let b = rings[1][x];
        let c = rings[1][x + 1];
        let d = rings[0][x + 1];
        if radius_top > 0.0 {
            builder.push_triangle(a, b, d);
        }
        if radius_bottom > 0.0 {
            builder.push_triangle(b, c, d);
        }
    }

    if radius_top > 0.0 {
        push_cap(&mut builder, radius_top, half, segments, true);
    }
    if radius_bottom > 0.0 {
        push_cap(&mut builder, radius_bottom, -half, segments, false);
    }
    builder
}

fn push_cap(builder: &mut MeshBuilder, radius: f32, y: f32, segments: u32, top: bool) {
    let normal = if top { Vec3::Y } else { Vec3::NEG_Y };
    let center = builder.push_vertex(Vec3::new(0.0, y, 0.0), normal);
    let ring: Vec<u32> = (0..=segments)
        .map(|x| {
            let theta = x as f32 / segments as f32 * TAU;
            let (sin, cos) = theta.sin_cos();
            builder.push_vertex(Vec3::new(radius * sin, y, radius * cos), normal)
        })
        .collect();
    for pair in ring.windows(2) {
        if top {
            builder.push_triangle(center, pair[0], pair[1]);
        } else {
            builder.push_triangle(center, pair[1], pair[0]);
        }
    }
}

/// Torus in the XY plane.
pub fn torus_geometry(
    radius: f32,
    tube: f32,
    radial_segments: u32,
    tubular_segments: u32,
) -> Geometry {
    let radial_segments = radial_segments.max(3);
    let tubular_segments = tubular_segments.max(3);
    let mut builder = MeshBuilder::default();

    for j in 0..=radial_segments {
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * TAU;
            let v = j as f32 / radial_segments as f32 * TAU;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            builder.push_vertex(position, (position - center).normalize_or_zero());
        }
    }

    let row = tubular_segments + 1;
    for j in 1..=radial_segments {
        for i in 1..=tubular_segments {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            builder.push_triangle(a, b, d);
            builder.push_triangle(b, c, d);
        }
    }
    builder.finish(Primitive::Torus)
}

/// Flat shaded regular icosahedron inscribed in a sphere of `radius`.
pub fn icosahedron_geometry(radius: f32) -> Geometry {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let points = [
        [-1.0, t, 0.0],
        [1.0, t, 0.0],
        [-1.0, -t, 0.0],
        [1.0, -t, 0.0],
        [0.0, -1.0, t],
        [0.0, 1.0, t],
        [0.0, -1.0, -t],
        [0.0, 1.0, -t],
        [t, 0.0, -1.0],
        [t, 0.0, 1.0],
        [-t, 0.0, -1.0],
        [-t, 0.0, 1.0],
    ];
    let faces: [[u32; 3]; 20] = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    polyhedron(&points, &faces, radius).finish(Primitive::Icosahedron)
}

/// Flat shaded regular dodecahedron, each pentagon split into three triangles.
pub fn dodecahedron_geometry(radius: f32) -> Geometry {
    let t = (1.0 + 5f32.sqrt()) / 2.0;
    let r = 1.0 / t;
    let points = [
        [-1.0, -1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, -1.0],
        [1.0, 1.0, 1.0],
        [0.0, -r, -t],
        [0.0, -r, t],
        [0.0, r, -t],
        [0.0, r, t],
        [-r, -t, 0.0],
        [-r, t, 0.0],
        [r, -t, 0.0],
        [r, t, 0.0],
        [-t, 0.0, -r],
        [t, 0.0, -r],
        [-t, 0.0, r],
        [t, 0.0, r],
    ];
    let faces: [[u32; 3]; 36] = [
        [3, 11, 7],
        [3, 7, 15],
        [3, 15, 13],
        [7, 19, 17],
        [7, 17, 6],
        [7, 6, 15],
        [17, 4, 8],
        [17, 8, 10],
        [17, 10, 6],
        [8, 0, 16],
        [8, 16, 2],
        [8, 2, 10],
        [0, 12, 1],
        [0, 1, 18],
        [0, 18, 16],
        [6, 10, 2],
        [6, 2, 13],
        [6, 13, 15],
        [2, 16, 18],
        [2, 18, 3],
        [2, 3, 13],
        [18, 1, 9],
        [18, 9, 11],
        [18, 11, 3],
        [4, 14, 12],
        [4, 12, 0],
        [4, 0, 8],
        [11, 9, 5],
        [11, 5, 19],
        [11, 19, 7],
        [19, 5, 14],
        [19, 14, 4],
        [19, 4, 17],
        [1, 12, 14],
        [1, 14, 5],
        [1, 5, 9],
    ];
    polyhedron(&points, &faces, radius).finish(Primitive::Dodecahedron)
}

/// Projects the points onto a sphere and emits one flat shaded triangle per face,
/// wound so that every face points away from the origin.
fn polyhedron(points: &[[f32; 3]], faces: &[[u32; 3]], radius: f32) -> MeshBuilder {
    let projected: Vec<Vec3> = points
        .iter()
        .map(|point| Vec3::from_array(*point).normalize() * radius)
        .collect();
    let mut builder = MeshBuilder::default();
    for face in faces {
        let mut corners = face.map(|index| projected[index as usize]);
        let mut normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
        let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
        if normal.dot(centroid) < 0.0 {
            corners.swap(1, 2);
            normal = -normal;
        }
        let normal = normal.normalize_or_zero();
        let a = builder.push_vertex(corners[0], normal);
        let b = builder.push_vertex(corners[1], normal);
        let c = builder.push_vertex(corners[2], normal);
        builder.push_triangle(a, b, c);
    }
    builder
}

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn vertex_count(&self) -> u32 {
        (self.vertices.len() / VERTEX_STRIDE) as u32
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertex_count();
        self.vertices.extend_from_slice(&position.to_array());
        self.vertices.extend_from_slice(&normal.to_array());
        index
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn finish(self, primitive: Primitive) -> Geometry {
        Geometry::new(primitive, self.vertices, self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_faces_point_outward(geometry: &Geometry) {
        for triangle in geometry.indices().chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| geometry.position(i));
            let normal = (b - a).cross(c - a);
            if normal.length_squared() < 1e-10 {
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(
                normal.dot(centroid) > 0.0,
                "{:?} has an inward facing triangle",
                geometry.primitive()
            );
        }
    }

    #[test]
    fn box_has_six_quads() {
        let geometry = box_geometry(1.5, 1.5, 1.5);
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.triangle_count(), 12);
        for index in 0..geometry.vertex_count() as u32 {
            let position = geometry.position(index);
            assert!((position.abs().max_element() - 0.75).abs() < 1e-6);
        }
        assert_faces_point_outward(&geometry);
    }

    #[test]
    fn convex_primitives_wind_outward() {
        assert_faces_point_outward(&sphere_geometry(1.0, 32, 16));
        assert_faces_point_outward(&cylinder_geometry(1.0, 2.0, 32));
        assert_faces_point_outward(&cone_geometry(1.0, 2.0, 32));
        assert_faces_point_outward(&icosahedron_geometry(1.0));
        assert_faces_point_outward(&dodecahedron_geometry(1.0));
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let geometry = sphere_geometry(2.0, 12, 8);
        assert_eq!(geometry.vertex_count(), 13 * 9);
        for index in 0..geometry.vertex_count() as u32 {
            assert!((geometry.position(index).length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn platonic_solids_have_expected_face_counts() {
        let ico = icosahedron_geometry(1.0);
        assert_eq!(ico.triangle_count(), 20);
        let dodeca = dodecahedron_geometry(1.0);
        assert_eq!(dodeca.triangle_count(), 36);
        for index in 0..dodeca.vertex_count() as u32 {
            assert!((dodeca.position(index).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn cone_skips_degenerate_apex_triangles() {
        let geometry = cone_geometry(1.0, 2.0, 8);
        // 8 side triangles plus 8 bottom cap triangles
        assert_eq!(geometry.triangle_count(), 16);
    }

    #[test]
    fn edges_are_unique_and_ordered() {
        let plane = plane_geometry(2.0, 2.0);
        let edges = plane.edges();
        assert_eq!(edges.len(), 5);
        assert!(edges.iter().all(|[a, b]| a < b));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut geometry = torus_geometry(0.8, 0.3, 16, 48);
        assert!(geometry.vertex_count() > 0);
        geometry.dispose();
        geometry.dispose();
        assert!(geometry.is_disposed());
        assert_eq!(geometry.vertex_count(), 0);
        assert!(geometry.edges().is_empty());
    }

    #[test]
    fn each_instance_gets_a_fresh_id() {
        let first = box_geometry(1.0, 1.0, 1.0);
        let second = box_geometry(1.0, 1.0, 1.0);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.vertices(), second.vertices());
    }
}

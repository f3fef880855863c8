//! Closed set of shapes the viewer can display.

use crate::geometry::{
    box_geometry, cone_geometry, cylinder_geometry, dodecahedron_geometry, icosahedron_geometry,
    plane_geometry, sphere_geometry, torus_geometry, Geometry,
};
use crate::scene::Color;

/// Immutable description of one selectable shape.
#[derive(Debug, Clone, Copy)]
pub struct ShapeDescriptor {
    pub key: &'static str,
    pub name: &'static str,
    pub color: Color,
    pub factory: fn() -> Geometry,
}

impl ShapeDescriptor {
    /// Builds a new, independent geometry instance.
    pub fn geometry(&self) -> Geometry {
        (self.factory)()
    }
}

impl PartialEq for ShapeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.name == other.name && self.color == other.color
    }
}

pub const DEFAULT_SHAPE_KEY: &str = "box";

pub static CATALOG: [ShapeDescriptor; 8] = [
    ShapeDescriptor {
        key: "box",
        name: "Cube",
        color: Color::from_hex(0x44aa88),
        factory: || box_geometry(1.5, 1.5, 1.5),
    },
    ShapeDescriptor {
        key: "sphere",
        name: "Sphere",
        color: Color::from_hex(0xe07a5f),
        factory: || sphere_geometry(1.0, 32, 16),
    },
    ShapeDescriptor {
        key: "plane",
        name: "Plane",
        color: Color::from_hex(0xf2cc8f),
        factory: || plane_geometry(2.0, 2.0),
    },
    ShapeDescriptor {
        key: "cone",
        name: "Cone",
        color: Color::from_hex(0x81b29a),
        factory: || cone_geometry(1.0, 2.0, 32),
    },
    ShapeDescriptor {
        key: "cylinder",
        name: "Cylinder",
        color: Color::from_hex(0x3d85c6),
        factory: || cylinder_geometry(1.0, 2.0, 32),
    },
    ShapeDescriptor {
        key: "torus",
        name: "Torus",
        color: Color::from_hex(0xc77dff),
        factory: || torus_geometry(0.8, 0.3, 16, 48),
    },
    ShapeDescriptor {
        key: "icosahedron",
        name: "Icosahedron",
        color: Color::from_hex(0xffb703),
        factory: || icosahedron_geometry(1.0),
    },
    ShapeDescriptor {
        key: "dodecahedron",
        name: "Dodecahedron",
        color: Color::from_hex(0xef476f),
        factory: || dodecahedron_geometry(1.0),
    },
];

/// Looks up a shape by key, falling back to the first entry for unknown keys.
pub fn find(key: &str) -> &'static ShapeDescriptor {
    CATALOG
        .iter()
        .find(|descriptor| descriptor.key == key)
        .unwrap_or(&CATALOG[0])
}

/// Position of `key` in the catalog, if present.
pub fn position(key: &str) -> Option<usize> {
    CATALOG.iter().position(|descriptor| descriptor.key == key)
}

/// Descriptor `offset` steps away from `key`, wrapping around the catalog.
pub fn cycle(key: &str, offset: isize) -> &'static ShapeDescriptor {
    let len = CATALOG.len() as isize;
    let current = position(key).unwrap_or(0) as isize;
    &CATALOG[(current + offset).rem_euclid(len) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    #[test]
    fn every_key_builds_its_primitive() {
        let expected = [
            ("box", Primitive::Box),
            ("sphere", Primitive::Sphere),
            ("plane", Primitive::Plane),
            ("cone", Primitive::Cone),
            ("cylinder", Primitive::Cylinder),
            ("torus", Primitive::Torus),
            ("icosahedron", Primitive::Icosahedron),
            ("dodecahedron", Primitive::Dodecahedron),
        ];
        assert_eq!(CATALOG.len(), expected.len());
        for (key, primitive) in expected {
            let descriptor = find(key);
            assert_eq!(descriptor.key, key);
            assert_eq!(descriptor.geometry().primitive(), primitive);
        }
    }

    #[test]
    fn unknown_key_falls_back_to_box() {
        assert_eq!(find("nonexistent"), find("box"));
        assert_eq!(find("").key, DEFAULT_SHAPE_KEY);
    }

    #[test]
    fn keys_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|b| b.key != a.key));
        }
    }

    #[test]
    fn factories_return_independent_instances() {
        let descriptor = find("torus");
        let mut first = descriptor.geometry();
        let second = descriptor.geometry();
        assert_eq!(first.vertices(), second.vertices());
        first.dispose();
        assert!(!second.is_disposed());
    }

    #[test]
    fn cycle_wraps_in_both_directions() {
        assert_eq!(cycle("box", -1).key, "dodecahedron");
        assert_eq!(cycle("dodecahedron", 1).key, "box");
        assert_eq!(cycle("sphere", 2).key, "cone");
    }
}

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;

use crate::geometry::{Geometry, Primitive, VERTEX_STRIDE};

/// Parses Wavefront OBJ text into a [`Geometry`].
///
/// Only `v`, `vn` and `f` records are read. Polygons are fan triangulated and
/// vertices without a normal get a smoothed one computed from the faces.
pub fn load_obj_from_str(data: &str) -> Result<Geometry> {
    let mut parser = ObjParser::default();
    for (line_no, line) in data.lines().enumerate() {
        parser
            .line(line)
            .with_context(|| format!("line {}", line_no + 1))?;
    }
    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: usize,
    normal: Option<usize>,
}

#[derive(Default)]
struct ObjParser {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    lookup: HashMap<Corner, u32>,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    missing_normals: bool,
}

impl ObjParser {
    fn line(&mut self, line: &str) -> Result<()> {
        let line = line.split('#').next().unwrap_or_default().trim();
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("v") => self.positions.push(parse_vec3(fields).context("invalid vertex")?),
            Some("vn") => self.normals.push(parse_vec3(fields).context("invalid normal")?),
            Some("f") => self.face(fields).context("invalid face")?,
            _ => {}
        }
        Ok(())
    }

    fn face<'a>(&mut self, fields: impl Iterator<Item = &'a str>) -> Result<()> {
        let corners = fields
            .map(|field| self.corner(field))
            .collect::<Result<Vec<_>>>()?;
        if corners.len() < 3 {
            bail!("faces must reference at least 3 vertices");
        }
        for pair in corners[1..].windows(2) {
            self.indices.extend_from_slice(&[corners[0], pair[0], pair[1]]);
        }
        Ok(())
    }

    fn corner(&mut self, field: &str) -> Result<u32> {
        let mut parts = field.split('/');
        let position = parts
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i64>()?;
        let position = resolve_index(position, self.positions.len())
            .ok_or_else(|| anyhow!("vertex index {position} out of range"))?;
        let _texcoord = parts.next();
        let normal = parts
            .next()
            .filter(|part| !part.is_empty())
            .and_then(|part| part.parse::<i64>().ok())
            .and_then(|index| resolve_index(index, self.normals.len()));

        let corner = Corner { position, normal };
        if let Some(index) = self.lookup.get(&corner) {
            return Ok(*index);
        }
        let index = (self.vertices.len() / VERTEX_STRIDE) as u32;
        let normal = match normal {
            Some(normal) => self.normals[normal],
            None => {
                self.missing_normals = true;
                Vec3::ZERO
            }
        };
        self.vertices
            .extend_from_slice(&self.positions[position].to_array());
        self.vertices.extend_from_slice(&normal.to_array());
        self.lookup.insert(corner, index);
        Ok(index)
    }

    fn finish(mut self) -> Result<Geometry> {
        if self.positions.is_empty() {
            bail!("OBJ data does not define any vertices");
        }
        if self.indices.is_empty() {
            bail!("OBJ data does not define any faces");
        }
        if self.missing_normals {
            smooth_normals(&mut self.vertices, &self.indices);
        }
        Ok(Geometry::new(Primitive::Custom, self.vertices, self.indices))
    }
}

fn parse_vec3<'a>(mut fields: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(fields
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

/// OBJ indices are one based; negative values count back from the end.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    match index {
        0 => None,
        i if i > 0 => usize::try_from(i - 1).ok().filter(|i| *i < len),
        i => len.checked_sub(usize::try_from(-i).ok()?),
    }
}

fn smooth_normals(vertices: &mut [f32], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len() / VERTEX_STRIDE];
    let position = |vertices: &[f32], i: usize| {
        Vec3::from_slice(&vertices[i * VERTEX_STRIDE..i * VERTEX_STRIDE + 3])
    };
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let normal =
            (position(vertices, b) - position(vertices, a)).cross(position(vertices, c) - position(vertices, a));
        let normal = normal.normalize_or_zero();
        accum[a] += normal;
        accum[b] += normal;
        accum[c] += normal;
    }
    for (i, normal) in accum.into_iter().enumerate() {
        let existing = Vec3::from_slice(&vertices[i * VERTEX_STRIDE + 3..i * VERTEX_STRIDE + 6]);
        if existing == Vec3::ZERO {
            let normal = normal.normalize_or_zero();
            vertices[i * VERTEX_STRIDE + 3..i * VERTEX_STRIDE + 6]
                .copy_from_slice(&normal.to_array());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quad_into_two_triangles() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let geometry = load_obj_from_str(obj).unwrap();
        assert_eq!(geometry.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(geometry.primitive(), Primitive::Custom);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3 # comment\n";
        let geometry = load_obj_from_str(obj).unwrap();
        for index in 0..3 {
            assert!((geometry.normal(index) - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn honours_explicit_and_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf -3//1 -2//1 -1//1\n";
        let geometry = load_obj_from_str(obj).unwrap();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.normal(0), Vec3::NEG_Z);
    }

    #[test]
    fn rejects_out_of_range_faces() {
        let obj = "v 0 0 0\nv 1 0 0\nf 1 2 7\n";
        let err = load_obj_from_str(obj).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(load_obj_from_str("# nothing here\n").is_err());
    }
}

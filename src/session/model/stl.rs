//! STL geometry loader (binary and ASCII).

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;

use super::{GeometryLoader, Mesh};
use crate::util::{Error, Result};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parses STL files into flat-shaded triangle lists.
///
/// Stored facet normals are ignored; normals are recomputed from winding.
#[derive(Debug, Clone, Copy, Default)]
pub struct StlLoader;

impl GeometryLoader for StlLoader {
    fn parse(&self, bytes: &[u8]) -> Result<Mesh> {
        let positions = match binary_facet_count(bytes) {
            Some(count) if is_exact_binary(bytes, count) || !looks_ascii(bytes) => parse_binary(bytes, count)?,
            _ if looks_ascii(bytes) => parse_ascii(bytes)?,
            _ => return Err(Error::geometry("not an STL file")),
        };
        if positions.is_empty() {
            return Err(Error::geometry("STL contains no triangles"));
        }
        Ok(with_flat_normals(positions))
    }
}

fn binary_facet_count(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < HEADER_LEN + 4 {
        return None;
    }
    let mut cur = Cursor::new(&bytes[HEADER_LEN..]);
    cur.read_u32::<LittleEndian>().ok().map(|n| n as usize)
}

fn is_exact_binary(bytes: &[u8], count: usize) -> bool {
    count
        .checked_mul(FACET_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN + 4))
        .is_some_and(|n| n == bytes.len())
}

fn looks_ascii(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    text.trim_start().starts_with("solid") && (text.contains("facet") || bytes.len() < 512)
}

fn parse_binary(bytes: &[u8], count: usize) -> Result<Vec<Vec3>> {
    let needed = count
        .checked_mul(FACET_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN + 4))
        .ok_or_else(|| Error::geometry("facet count overflow"))?;
    if bytes.len() < needed {
        return Err(Error::geometry(format!(
            "truncated binary STL: {count} facets need {needed} bytes, got {}",
            bytes.len()
        )));
    }

    let mut cur = Cursor::new(&bytes[HEADER_LEN + 4..needed]);
    let mut positions = Vec::with_capacity(count * 3);
    for _ in 0..count {
        // Stored normal, recomputed below.
        read_vec3(&mut cur)?;
        for _ in 0..3 {
            positions.push(read_vec3(&mut cur)?);
        }
        cur.read_u16::<LittleEndian>()?;
    }
    Ok(positions)
}

fn read_vec3(cur: &mut Cursor<&[u8]>) -> Result<Vec3> {
    Ok(Vec3::new(
        cur.read_f32::<LittleEndian>()?,
        cur.read_f32::<LittleEndian>()?,
        cur.read_f32::<LittleEndian>()?,
    ))
}

fn parse_ascii(bytes: &[u8]) -> Result<Vec<Vec3>> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::geometry(format!("ASCII STL is not UTF-8: {e}")))?;
    let mut tokens = text.split_ascii_whitespace();
    let mut positions = Vec::new();

    while let Some(tok) = tokens.next() {
        if !tok.eq_ignore_ascii_case("vertex") {
            continue;
        }
        let mut coord = || -> Result<f32> {
            let t = tokens.next().ok_or_else(|| Error::geometry("vertex is missing coordinates"))?;
            t.parse().map_err(|_| Error::geometry(format!("bad vertex coordinate `{t}`")))
        };
        let (x, y, z) = (coord()?, coord()?, coord()?);
        positions.push(Vec3::new(x, y, z));
    }

    if positions.len() % 3 != 0 {
        return Err(Error::geometry(format!("{} vertices do not form whole triangles", positions.len())));
    }
    Ok(positions)
}

fn with_flat_normals(positions: Vec<Vec3>) -> Mesh {
    let mut normals = Vec::with_capacity(positions.len());
    for tri in positions.chunks_exact(3) {
        let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]).normalize_or_zero();
        normals.extend([n; 3]);
    }
    Mesh { positions, normals }
}

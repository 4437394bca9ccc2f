use std::io::Write;

use super::PlyError;
use crate::mesh::Mesh;

fn color_to_u8(c: f32) -> u8 {
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Write the PLY header describing `mesh`.
fn write_header<W: Write>(writer: &mut W, mesh: &Mesh, format: &str) -> Result<(), PlyError> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format {format} 1.0")?;
    writeln!(writer, "comment panomesh")?;
    writeln!(writer, "element vertex {}", mesh.num_vertices())?;
    for axis in ["x", "y", "z"] {
        writeln!(writer, "property double {axis}")?;
    }
    if mesh.vertex_normals.is_some() {
        for axis in ["nx", "ny", "nz"] {
            writeln!(writer, "property double {axis}")?;
        }
    }
    if mesh.vertex_colors.is_some() {
        for channel in ["red", "green", "blue"] {
            writeln!(writer, "property uchar {channel}")?;
        }
    }
    writeln!(writer, "element face {}", mesh.num_triangles())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;
    Ok(())
}

/// Write a mesh as binary little endian PLY.
///
/// Vertices are written as doubles, followed by `nx ny nz` when normals are present and
/// `red green blue` as uchar when colors are present. Faces are `uchar` counted `int` lists.
pub fn write_ply_binary<W: Write>(writer: &mut W, mesh: &Mesh) -> Result<(), PlyError> {
    write_header(writer, mesh, "binary_little_endian")?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        for c in v {
            writer.write_all(&c.to_le_bytes())?;
        }
        if let Some(n) = mesh.vertex_normals.as_ref().and_then(|n| n.get(i)) {
            for c in n {
                writer.write_all(&c.to_le_bytes())?;
            }
        }
        if let Some(rgb) = mesh.vertex_colors.as_ref().and_then(|c| c.get(i)) {
            writer.write_all(&rgb.map(color_to_u8))?;
        }
    }

    for tri in &mesh.triangles {
        writer.write_all(&[3u8])?;
        for &idx in tri {
            let idx = i32::try_from(idx).map_err(|_| PlyError::IndexOverflow(idx))?;
            writer.write_all(&idx.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Write a mesh as ASCII PLY with the same layout as [`write_ply_binary`].
pub fn write_ply_ascii<W: Write>(writer: &mut W, mesh: &Mesh) -> Result<(), PlyError> {
    write_header(writer, mesh, "ascii")?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        write!(writer, "{} {} {}", v[0], v[1], v[2])?;
        if let Some(n) = mesh.vertex_normals.as_ref().and_then(|n| n.get(i)) {
            write!(writer, " {} {} {}", n[0], n[1], n[2])?;
        }
        if let Some(rgb) = mesh.vertex_colors.as_ref().and_then(|c| c.get(i)) {
            let [r, g, b] = rgb.map(color_to_u8);
            write!(writer, " {r} {g} {b}")?;
        }
        writeln!(writer)?;
    }

    for tri in &mesh.triangles {
        writeln!(writer, "3 {} {} {}", tri[0], tri[1], tri[2])?;
    }
    Ok(())
}

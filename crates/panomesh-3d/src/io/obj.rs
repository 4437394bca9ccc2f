use std::io::Write;

use crate::mesh::Mesh;

/// Write a mesh as Wavefront OBJ.
///
/// Vertex colors are appended to the `v` lines as `v x y z r g b`, a widely supported
/// extension. Normals are written as `vn` lines and referenced from the faces. Indices are
/// 1-based.
pub fn write_obj<W: Write>(writer: &mut W, mesh: &Mesh) -> std::io::Result<()> {
    writeln!(writer, "# panomesh")?;
    writeln!(
        writer,
        "# {} vertices, {} triangles",
        mesh.num_vertices(),
        mesh.num_triangles()
    )?;

    for (i, v) in mesh.vertices.iter().enumerate() {
        match mesh.vertex_colors.as_ref().and_then(|c| c.get(i)) {
            Some([r, g, b]) => writeln!(writer, "v {} {} {} {r} {g} {b}", v[0], v[1], v[2])?,
            None => writeln!(writer, "v {} {} {}", v[0], v[1], v[2])?,
        }
    }

    let has_normals = match &mesh.vertex_normals {
        Some(normals) => {
            for n in normals {
                writeln!(writer, "vn {} {} {}", n[0], n[1], n[2])?;
            }
            true
        }
        None => false,
    };

    for tri in &mesh.triangles {
        let [a, b, c] = tri.map(|i| i + 1);
        if has_normals {
            writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
        } else {
            writeln!(writer, "f {a} {b} {c}")?;
        }
    }
    Ok(())
}

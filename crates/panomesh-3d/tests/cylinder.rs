use panomesh_3d::camera::CylindricalUnprojector;
use panomesh_3d::color::ColorTransfer;
use panomesh_3d::io::ply::read_ply_mesh;
use panomesh_3d::io::{write_mesh, ExportError};
use panomesh_3d::mesh::Mesh;
use panomesh_3d::normals::{NormalEstimator, NormalOrientation};
use panomesh_3d::ops::smooth_laplacian;
use panomesh_image::{ColorImage, DepthMap, ImageSize};

const SIZE: ImageSize = ImageSize {
    width: 32,
    height: 8,
};

// constant depth puts every pixel on one cylinder around the camera
fn cylinder_panorama() -> (ColorImage, DepthMap) {
    let colors = (0..SIZE.num_pixels())
        .flat_map(|i| [(i % SIZE.width * 8) as u8, (i / SIZE.width * 32) as u8, 0])
        .collect();
    (
        ColorImage::new(SIZE, colors).unwrap(),
        DepthMap::from_size_val(SIZE, 1.0),
    )
}

// two triangles per pixel quad, following the row-major point order
fn grid_triangles(width: usize, height: usize) -> Vec<[usize; 3]> {
    let mut triangles = Vec::new();
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let i = y * width + x;
            triangles.push([i, i + width, i + 1]);
            triangles.push([i + 1, i + width, i + width + 1]);
        }
    }
    triangles
}

fn unprojector() -> CylindricalUnprojector {
    CylindricalUnprojector {
        vertical_scale: 50.0,
        ..Default::default()
    }
}

#[test]
fn normals_face_the_camera() {
    let (color, depth) = cylinder_panorama();
    let mut cloud = unprojector().unproject(&color, &depth).unwrap();
    assert_eq!(cloud.len(), SIZE.num_pixels());

    let estimator = NormalEstimator {
        radius: 120.0,
        max_nn: 12,
        orientation: NormalOrientation::Consistent { k: 8 },
    };
    estimator.estimate(&mut cloud).unwrap();

    let normals = cloud.normals().unwrap();
    for (p, n) in cloud.points().iter().zip(normals) {
        let r = p[0].hypot(p[2]);
        let inward = [-p[0] / r, 0.0, -p[2] / r];
        let dot = n[0] * inward[0] + n[1] * inward[1] + n[2] * inward[2];
        assert!(dot > 0.9, "normal {n:?} at {p:?}");
    }
}

#[test]
fn colored_cylinder_mesh_to_files() -> Result<(), Box<dyn std::error::Error>> {
    let (color, depth) = cylinder_panorama();
    let cloud = unprojector().unproject(&color, &depth)?;

    let mut mesh = Mesh::new(
        cloud.points().to_vec(),
        grid_triangles(SIZE.width, SIZE.height),
    );
    ColorTransfer::new(&cloud)?.apply(&mut mesh);
    assert_eq!(mesh.vertex_colors.as_deref(), cloud.colors());

    smooth_laplacian(&mut mesh, 0, 1.0)?;
    assert_eq!(mesh.vertices.as_slice(), cloud.points());

    mesh.flip_winding();
    mesh.compute_vertex_normals();

    let dir = tempfile::tempdir()?;
    let ply = dir.path().join("cylinder.ply");
    write_mesh(&ply, &mesh)?;
    let read = read_ply_mesh(&ply)?;
    assert_eq!(read.triangles, mesh.triangles);
    assert_eq!(read.vertex_colors, mesh.vertex_colors);
    for (a, b) in read.vertices.iter().zip(&mesh.vertices) {
        for k in 0..3 {
            approx::assert_relative_eq!(a[k], b[k], max_relative = 1e-6);
        }
    }

    let obj = dir.path().join("cylinder.OBJ");
    write_mesh(&obj, &mesh)?;
    let text = std::fs::read_to_string(&obj)?;
    assert_eq!(
        text.lines().filter(|l| l.starts_with("v ")).count(),
        mesh.num_vertices()
    );
    assert_eq!(
        text.lines().filter(|l| l.starts_with("f ")).count(),
        mesh.num_triangles()
    );
    Ok(())
}

#[test]
fn failed_export_leaves_no_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mesh = Mesh::new(vec![[0.0; 3], [1.0, 0.0, 0.0]], vec![[0, 1, 2]]);

    let path = dir.path().join("broken.ply");
    let res = write_mesh(&path, &mesh);
    assert!(matches!(res, Err(ExportError::InvalidMesh(_))));
    assert!(!path.exists());

    let path = dir.path().join("mesh.stl");
    let res = write_mesh(&path, &Mesh::default());
    assert!(matches!(res, Err(ExportError::UnsupportedFormat(_))));

    let res = write_mesh(dir.path().join("missing/mesh.ply"), &Mesh::default());
    assert!(matches!(res, Err(ExportError::Io(_))));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

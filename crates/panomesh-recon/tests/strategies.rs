use panomesh_3d::normals::NormalEstimator;
use panomesh_3d::pointcloud::PointCloud;
use panomesh_recon::{
    PoissonParams, ReconstructionError, ReconstructionStrategy, Reconstructor,
};
use rand::Rng;

// points on the inside of a half cylinder in front of the camera, with a wavy radius
fn panorama_cloud(n: usize) -> PointCloud {
    let mut rng = rand::rng();
    let points = (0..n)
        .map(|_| {
            let az = rng.random_range(-1.5..1.5f64);
            let y = rng.random_range(-5.0..5.0f64);
            let r = 20.0 + 2.0 * (3.0 * az).sin() + rng.random_range(-0.1..0.1);
            [r * az.sin(), y, r * az.cos()]
        })
        .collect::<Vec<_>>();
    PointCloud::new(points, None, None).unwrap_or_default()
}

fn assert_indices_in_range(strategy: ReconstructionStrategy, cloud: &PointCloud) {
    let reconstruction = Reconstructor::new(strategy)
        .reconstruct(cloud)
        .unwrap_or_else(|e| panic!("{} failed: {e}", strategy.name()));
    let n = reconstruction.mesh.num_vertices();
    assert!(!reconstruction.mesh.triangles.is_empty());
    for tri in &reconstruction.mesh.triangles {
        assert!(tri.iter().all(|&i| i < n), "{tri:?} out of {n}");
    }
}

#[test]
fn all_strategies_produce_valid_indices() -> Result<(), Box<dyn std::error::Error>> {
    let mut cloud = panorama_cloud(3000);

    assert_indices_in_range(
        ReconstructionStrategy::RadialSliceDelaunay { num_slices: 20 },
        &cloud,
    );
    assert_indices_in_range(
        ReconstructionStrategy::GlobalDelaunay {
            simplify_voxel_size: Some(0.5),
        },
        &cloud,
    );

    NormalEstimator {
        radius: 2.0,
        ..Default::default()
    }
    .estimate(&mut cloud)?;
    assert_indices_in_range(
        ReconstructionStrategy::Poisson(PoissonParams {
            depth: 5,
            density_quantile: 0.1,
            ..Default::default()
        }),
        &cloud,
    );
    Ok(())
}

#[test]
fn single_slice_triangulates_three_points() -> Result<(), ReconstructionError> {
    let cloud = PointCloud::new(
        vec![[0.0, 0.0, 5.0], [0.0, 1.0, 6.0], [0.1, 2.0, 5.0]],
        None,
        None,
    )
    .unwrap_or_default();
    let reconstruction =
        Reconstructor::new(ReconstructionStrategy::RadialSliceDelaunay { num_slices: 1 })
            .reconstruct(&cloud)?;
    assert_eq!(reconstruction.mesh.num_triangles(), 1);
    assert_eq!(reconstruction.empty_regions, 0);
    Ok(())
}

#[test]
fn many_slices_leave_empty_slices() -> Result<(), ReconstructionError> {
    // two narrow azimuth columns
    let mut points = Vec::new();
    for az in [-0.5f64, 0.5] {
        for r in [5.0, 6.0, 7.0] {
            for y in [0.0, 1.0, 2.0] {
                points.push([r * az.sin(), y, r * az.cos()]);
            }
        }
    }
    let cloud = PointCloud::new(points, None, None).unwrap_or_default();

    let reconstruction =
        Reconstructor::new(ReconstructionStrategy::RadialSliceDelaunay { num_slices: 64 })
            .reconstruct(&cloud)?;
    assert_eq!(reconstruction.empty_regions, 62);
    assert_eq!(reconstruction.mesh.num_vertices(), 18);
    assert!(reconstruction.mesh.num_triangles() >= 16);
    Ok(())
}

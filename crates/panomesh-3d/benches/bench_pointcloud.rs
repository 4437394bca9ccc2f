use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use panomesh_3d::camera::CylindricalUnprojector;
use panomesh_3d::normals::{NormalEstimator, NormalOrientation};
use panomesh_3d::pointcloud::PointCloud;
use panomesh_3d::voxel_grid::VoxelGrid;
use panomesh_image::{ColorImage, DepthMap, ImageSize};

fn random_panorama(size: ImageSize) -> (ColorImage, DepthMap) {
    let mut rng = rand::rng();
    let colors = (0..size.num_pixels() * 3)
        .map(|_| rng.random::<u8>())
        .collect::<Vec<_>>();
    let depths = (0..size.num_pixels())
        .map(|_| rng.random_range(0.0..255.0f32))
        .collect::<Vec<_>>();
    (
        ColorImage::new(size, colors).unwrap(),
        DepthMap::new(size, depths).unwrap(),
    )
}

fn bench_unproject(c: &mut Criterion) {
    let mut group = c.benchmark_group("unproject");
    let unprojector = CylindricalUnprojector::default();

    for (width, height) in [(256, 128), (1024, 512), (2048, 1024)] {
        let size = ImageSize { width, height };
        let (color, depth) = random_panorama(size);
        group.bench_with_input(
            BenchmarkId::new("cylindrical", format!("{width}x{height}")),
            &(color, depth),
            |b, (color, depth)| b.iter(|| black_box(unprojector.unproject(color, depth))),
        );
    }
    group.finish();
}

fn bench_voxel_downsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("voxel_downsample");
    let (color, depth) = random_panorama(ImageSize {
        width: 512,
        height: 256,
    });
    let cloud = CylindricalUnprojector::default()
        .unproject(&color, &depth)
        .unwrap();

    for leaf_size in [2.0, 5.0, 10.0] {
        let grid = VoxelGrid::new(leaf_size).unwrap();
        group.bench_with_input(
            BenchmarkId::new("leaf_size", leaf_size),
            &cloud,
            |b, cloud| b.iter(|| black_box(grid.downsample(cloud))),
        );
    }
    group.finish();
}

fn bench_normals(c: &mut Criterion) {
    let mut group = c.benchmark_group("normals");
    group.sample_size(10);

    let mut rng = rand::rng();
    let points = (0..20_000)
        .map(|_| {
            [
                rng.random_range(-10.0..10.0),
                rng.random_range(-10.0..10.0),
                rng.random_range(-0.1..0.1),
            ]
        })
        .collect::<Vec<_>>();
    let cloud = PointCloud::new(points, None, None).unwrap();

    for orientation in [
        NormalOrientation::Unoriented,
        NormalOrientation::Consistent { k: 30 },
    ] {
        let estimator = NormalEstimator {
            orientation,
            ..Default::default()
        };
        group.bench_with_input(
            BenchmarkId::new("estimate", format!("{orientation:?}")),
            &cloud,
            |b, cloud| {
                b.iter(|| {
                    let mut cloud = cloud.clone();
                    estimator.estimate(&mut cloud).unwrap();
                    black_box(cloud)
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_unproject, bench_voxel_downsample, bench_normals);
criterion_main!(benches);

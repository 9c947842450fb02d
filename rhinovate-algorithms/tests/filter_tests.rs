//! Integration tests for the noise filter and mesh repair

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhinovate_algorithms::*;
use rhinovate_core::{Error, Point3f, PointCloud, TriangleMesh, Vector3f};

fn unit_ball(count: usize, rng: &mut StdRng) -> Vec<Point3f> {
    let mut points = Vec::with_capacity(count);
    while points.len() < count {
        let p = Point3f::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if p.coords.norm() <= 1.0 {
            points.push(p);
        }
    }
    points
}

fn scattered_shell(count: usize, inner: f32, outer: f32, rng: &mut StdRng) -> Vec<Point3f> {
    (0..count)
        .map(|_| {
            let dir = loop {
                let v = Vector3f::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                );
                if v.norm() > 0.1 && v.norm() <= 1.0 {
                    break v.normalize();
                }
            };
            Point3f::from(dir * rng.gen_range(inner..outer))
        })
        .collect()
}

#[cfg(feature = "clustering")]
#[test]
fn test_dense_cluster_survives_and_outliers_do_not() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut points = unit_ball(1000, &mut rng);
    points.extend(scattered_shell(50, 3.0, 10.0, &mut rng));
    let cloud = PointCloud::from_points(points);

    let config = FilterConfig {
        keep_largest_cluster: true,
        ..Default::default()
    };
    let (filtered, report) = filter_with_report(&cloud, &config).unwrap();

    assert_eq!(report.input, 1050);
    assert!(
        filtered.len() >= 950 && filtered.len() <= 1050,
        "kept {} points",
        filtered.len()
    );
    // Centering moves the ball by at most a few hundredths, outliers start at 3
    assert!(filtered.iter().all(|p| p.coords.norm() < 1.5));
}

#[test]
fn test_filtered_centroid_is_origin() {
    let mut rng = StdRng::seed_from_u64(99);
    let points: Vec<Point3f> = unit_ball(600, &mut rng)
        .into_iter()
        .map(|p| p + Vector3f::new(-12.0, 250.0, 3.0))
        .collect();
    let cloud = PointCloud::from_points(points);

    let filtered = filter(&cloud, &FilterConfig::default()).unwrap();
    let centroid = filtered.centroid().unwrap();
    assert!(centroid.coords.norm() < 1e-3, "centroid {:?}", centroid);
}

#[test]
fn test_planar_scan_filters() {
    // A wall: every point shares z
    let points: Vec<Point3f> = (0..1600)
        .map(|i| Point3f::new((i % 40) as f32 * 0.01, (i / 40) as f32 * 0.01, 0.0))
        .collect();
    let cloud = PointCloud::from_points(points);

    let filtered = filter(&cloud, &FilterConfig::default()).unwrap();
    assert!(filtered.len() > 1000, "kept {}", filtered.len());
    assert!(filtered.iter().all(|p| p.z == 0.0));
}

#[test]
fn test_duplicated_samples_filter() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut points = vec![Point3f::new(0.2, -0.1, 0.3); 300];
    points.extend(unit_ball(200, &mut rng));
    let cloud = PointCloud::from_points(points);

    let filtered = filter(&cloud, &FilterConfig::default()).unwrap();
    assert!(!filtered.is_empty());
    let centroid = filtered.centroid().unwrap();
    assert!(centroid.coords.norm() < 1e-3, "centroid {:?}", centroid);
}

#[test]
fn test_empty_input_is_an_error() {
    let result = filter(&PointCloud::new(), &FilterConfig::default());
    assert!(matches!(result, Err(Error::EmptyInput(_))));
}

#[test]
fn test_repair_indices_always_valid() {
    let mut rng = StdRng::seed_from_u64(17);
    let vertices = unit_ball(40, &mut rng);
    let faces: Vec<[usize; 3]> = (0..120)
        .map(|_| {
            [
                rng.gen_range(0..45),
                rng.gen_range(0..45),
                rng.gen_range(0..45),
            ]
        })
        .collect();
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let once = repair(&mesh).unwrap();
    assert!(once.indices_in_range());
    for f in &once.faces {
        assert!(f[0] != f[1] && f[1] != f[2] && f[0] != f[2]);
    }
    assert_eq!(repair(&once).unwrap(), once);
}

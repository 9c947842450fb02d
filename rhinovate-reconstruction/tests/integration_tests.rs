//! Integration tests for rhinovate-reconstruction
//!
//! These tests run filtered synthetic scans through reconstruction and repair
//! and check the shape and topology of the result.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhinovate_algorithms::{filter, repair, FilterConfig};
use rhinovate_core::{Point3f, PointCloud, Vector3f};
use rhinovate_reconstruction::*;

/// Points on a sphere with Gaussian radial noise
fn noisy_sphere(radius: f32, count: usize, noise: f32, seed: u64) -> PointCloud<Point3f> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gauss = move || {
        // Box-Muller
        let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
        let u2: f32 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
    };
    (0..count)
        .map(|_| {
            let dir = loop {
                let v = Vector3f::new(gauss(), gauss(), gauss());
                if v.norm() > 1e-3 {
                    break v.normalize();
                }
            };
            Point3f::from(dir * radius * (1.0 + noise * gauss()))
        })
        .collect()
}

#[test]
fn test_noisy_sphere_reconstructs_to_closed_manifold() {
    let cloud = noisy_sphere(1.0, 2000, 0.05, 1);
    let filtered = filter(&cloud, &FilterConfig::default()).unwrap();

    let mesh = reconstruct(&filtered, 64, 0.25, 0.1, 0.0).unwrap();
    let stats = MeshStats::compute(&mesh);
    assert!(stats.is_closed_manifold(), "{:?}", stats);
    assert_eq!(face_components(&mesh).iter().max(), Some(&0));

    let expected = 4.0 / 3.0 * std::f64::consts::PI;
    let error = (stats.signed_volume - expected).abs() / expected;
    assert!(stats.signed_volume > 0.0);
    assert!(error < 0.10, "volume {} vs {}", stats.signed_volume, expected);

    // Repair keeps the closed surface intact
    let repaired = repair(&mesh).unwrap();
    assert!(MeshStats::compute(&repaired).is_closed_manifold());
}

#[test]
fn test_open_patch_uses_density_surface() {
    // A curved, open cap: no enclosed cavity, so the density level is used
    let mut rng = StdRng::seed_from_u64(8);
    let points: Vec<Point3f> = (0..1500)
        .map(|_| {
            let x: f32 = rng.gen_range(-0.5..0.5);
            let y: f32 = rng.gen_range(-0.5..0.5);
            Point3f::new(x, y, 0.3 * (x * x + y * y))
        })
        .collect();
    let cloud = PointCloud::from_points(points);

    let mesh = reconstruct(&cloud, 48, 0.1, 0.1, 0.0).unwrap();
    let stats = MeshStats::compute(&mesh);
    // A thickened sheet around the patch, still closed
    assert!(stats.is_closed_manifold());
    let bounds = rhinovate_core::Aabb::from_points(&mesh.vertices).unwrap();
    assert!(bounds.extents().z < 0.5);
    assert!(bounds.extents().x > 0.9);
}

#[test]
fn test_adaptivity_reduces_triangle_count() {
    let cloud = noisy_sphere(1.0, 2000, 0.01, 4);
    let detailed = reconstruct(&cloud, 48, 0.25, 0.1, 0.0).unwrap();
    let coarse = reconstruct(&cloud, 48, 0.25, 0.1, 1.0).unwrap();
    assert!(coarse.face_count() < detailed.face_count());
    assert!(coarse.indices_in_range());
}

#[test]
fn test_adaptive_surfaces_stay_closed_manifolds() {
    let cloud = noisy_sphere(1.0, 2000, 0.05, 1);
    let filtered = filter(&cloud, &FilterConfig::default()).unwrap();
    let detailed = reconstruct(&filtered, 64, 0.25, 0.1, 0.0).unwrap();

    for adaptivity in [0.1, 0.5, 1.0] {
        let mesh = reconstruct(&filtered, 64, 0.25, 0.1, adaptivity).unwrap();
        let stats = MeshStats::compute(&mesh);
        assert!(stats.is_closed_manifold(), "adaptivity {}: {:?}", adaptivity, stats);
        assert!(stats.signed_volume > 0.0);
        assert!(mesh.face_count() <= detailed.face_count());

        let repaired = repair(&mesh).unwrap();
        let stats = MeshStats::compute(&repaired);
        assert!(stats.is_closed_manifold(), "repaired at {}: {:?}", adaptivity, stats);
    }
}

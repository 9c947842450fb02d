//! Integration tests for rhinovate-morph

use rhinovate_core::{Aabb, Point3f, TriangleMesh, Vector3f};
use rhinovate_morph::*;

/// Latitude-longitude sphere with poles on the z axis
fn uv_sphere(radius: f32, rings: usize, sectors: usize) -> TriangleMesh {
    let mut vertices = vec![Point3f::new(0.0, 0.0, radius)];
    for r in 1..rings {
        let theta = std::f32::consts::PI * r as f32 / rings as f32;
        for s in 0..sectors {
            let phi = std::f32::consts::TAU * s as f32 / sectors as f32;
            vertices.push(Point3f::new(
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos(),
            ));
        }
    }
    vertices.push(Point3f::new(0.0, 0.0, -radius));

    let south = vertices.len() - 1;
    let ring = |r: usize, s: usize| 1 + (r - 1) * sectors + s % sectors;
    let mut faces = Vec::new();
    for s in 0..sectors {
        faces.push([0, ring(1, s), ring(1, s + 1)]);
        faces.push([south, ring(rings - 1, s + 1), ring(rings - 1, s)]);
    }
    for r in 1..rings - 1 {
        for s in 0..sectors {
            faces.push([ring(r, s), ring(r + 1, s), ring(r + 1, s + 1)]);
            faces.push([ring(r, s), ring(r + 1, s + 1), ring(r, s + 1)]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

#[test]
fn test_identity_scale_is_a_no_op() {
    let mesh = uv_sphere(1.0, 16, 32);
    let config = MorphConfig {
        axis_scale: Vector3f::new(1.0, 1.0, 1.0),
        falloff_radius: 1.0,
        ..Default::default()
    };
    let deformed = deform(&mesh, &config).unwrap();
    assert_eq!(deformed.vertices, mesh.vertices);
    assert_eq!(deformed.faces, mesh.faces);
}

#[test]
fn test_central_scale_narrows_sphere() {
    let mesh = uv_sphere(1.0, 16, 32);
    let config = MorphConfig {
        falloff_radius: 1.0,
        ..Default::default()
    };
    let (deformed, report) = deform_with_report(&mesh, &config).unwrap();
    assert!(report.influenced_points > 0);

    let before = Aabb::from_points(&mesh.vertices).unwrap().extents();
    let after = Aabb::from_points(&deformed.vertices).unwrap().extents();
    assert!(after.x < before.x - 0.01, "x extent {} -> {}", before.x, after.x);
    assert!((after.y - before.y).abs() < 1e-5);
    assert!((after.z - before.z).abs() < 1e-5);
}

#[test]
fn test_vertices_beyond_falloff_are_bit_identical() {
    // A long bar along x: the band sits at x in {-1.375, 0, 1.375}
    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for s in 0..=100 {
        let x = -5.0 + 0.1 * s as f32;
        vertices.push(Point3f::new(x, -0.5, -0.5));
        vertices.push(Point3f::new(x, 0.5, 0.5));
    }
    for s in 0..100 {
        let a = 2 * s;
        faces.push([a, a + 2, a + 1]);
        faces.push([a + 1, a + 2, a + 3]);
    }
    let mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);

    let config = MorphConfig {
        axis_scale: Vector3f::new(0.5, 0.5, 0.5),
        falloff_radius: 0.5,
        falloff_curve: FalloffCurve::Linear,
        ..Default::default()
    };
    let deformed = deform(&mesh, &config).unwrap();

    let mut moved_inside = 0;
    for (before, after) in mesh.vertices.iter().zip(&deformed.vertices) {
        if before.x.abs() > 2.8 {
            assert_eq!(before, after);
        } else if before != after {
            moved_inside += 1;
        }
    }
    assert!(moved_inside > 0);
}

#[test]
fn test_primary_axis_selects_band() {
    let mesh = uv_sphere(1.0, 16, 32);
    let config = MorphConfig {
        axis_scale: Vector3f::new(1.0, 1.0, 0.5),
        primary_axis: Axis::Y,
        falloff_radius: 0.1,
        ..Default::default()
    };
    let deformed = deform(&mesh, &config).unwrap();
    // Squeezing z within the y band leaves the y extremes in place
    let before = Aabb::from_points(&mesh.vertices).unwrap();
    let after = Aabb::from_points(&deformed.vertices).unwrap();
    assert_eq!(before.max.y, after.max.y);
    assert!(after.extents().z < before.extents().z);
}

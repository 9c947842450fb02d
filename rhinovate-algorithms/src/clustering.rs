//! Density-based clustering (DBSCAN) for isolating the scanned subject

use crate::nearest_neighbor::KdTree;
use itertools::Itertools;
use rayon::prelude::*;
use rhinovate_core::{Error, NearestNeighborSearch, Point3f, PointCloud, Result};
use std::collections::VecDeque;
use tracing::debug;

/// Average distance from each point to its closest other point
pub fn average_nearest_neighbor_distance(tree: &KdTree, points: &[Point3f]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: f64 = points
        .par_iter()
        .map(|p| {
            tree.find_k_nearest(p, 2)
                .get(1)
                .map(|(_, d)| *d as f64)
                .unwrap_or(0.0)
        })
        .sum();
    (total / points.len() as f64) as f32
}

/// Label every point with its cluster id, `None` for noise
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within `eps`. Clusters grow from core points; non-core
/// points reachable from a core point join its cluster as border points.
/// Cluster ids are assigned in order of first discovery.
pub fn dbscan(points: &[Point3f], eps: f32, min_samples: usize) -> Result<Vec<Option<usize>>> {
    if eps <= 0.0 {
        return Err(Error::InvalidData("eps must be positive".to_string()));
    }
    if min_samples == 0 {
        return Err(Error::InvalidData(
            "min_samples must be greater than 0".to_string(),
        ));
    }

    let tree = KdTree::new(points);
    let neighborhoods: Vec<Vec<usize>> = points
        .par_iter()
        .map(|p| tree.radius_indices(p, eps))
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut cluster_count = 0;

    for seed in 0..points.len() {
        if visited[seed] || neighborhoods[seed].len() < min_samples {
            continue;
        }

        let cluster = cluster_count;
        cluster_count += 1;
        visited[seed] = true;
        labels[seed] = Some(cluster);

        let mut queue: VecDeque<usize> = neighborhoods[seed].iter().copied().collect();
        while let Some(idx) = queue.pop_front() {
            if labels[idx].is_none() {
                labels[idx] = Some(cluster);
            }
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            if neighborhoods[idx].len() >= min_samples {
                queue.extend(neighborhoods[idx].iter().copied().filter(|&n| !visited[n]));
            }
        }
    }

    debug!(clusters = cluster_count, eps, "dbscan");
    Ok(labels)
}

/// Keep only the points of the largest density cluster
///
/// The neighborhood radius is `eps_multiplier` times the average
/// nearest-neighbor spacing. Returns `None` when every point is noise.
/// Ties between equally sized clusters go to the one discovered first.
pub fn largest_cluster(
    cloud: &PointCloud<Point3f>,
    eps_multiplier: f32,
    min_samples: usize,
) -> Result<Option<PointCloud<Point3f>>> {
    if cloud.len() < 2 {
        return Ok(None);
    }

    let tree = KdTree::new(&cloud.points);
    let spacing = average_nearest_neighbor_distance(&tree, &cloud.points);
    if spacing <= 0.0 {
        // Every point coincides with another; the cloud is a single blob
        return Ok(Some(cloud.clone()));
    }
    let eps = eps_multiplier * spacing;

    let labels = dbscan(&cloud.points, eps, min_samples)?;
    let counts = labels.iter().flatten().copied().counts();
    let Some(best) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(&id, _)| id)
    else {
        return Ok(None);
    };

    debug!(
        clusters = counts.len(),
        kept = counts[&best],
        eps,
        "largest cluster selected"
    );

    Ok(Some(
        cloud
            .points
            .iter()
            .zip(labels.iter())
            .filter(|(_, label)| **label == Some(best))
            .map(|(p, _)| *p)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blob(center: Point3f, radius: f32, count: usize, rng: &mut StdRng) -> Vec<Point3f> {
        let mut points = Vec::with_capacity(count);
        while points.len() < count {
            let v = rhinovate_core::Vector3f::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.norm() <= 1.0 {
                points.push(center + v * radius);
            }
        }
        points
    }

    #[test]
    fn test_dbscan_two_blobs_and_noise() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut points = blob(Point3f::origin(), 0.5, 200, &mut rng);
        points.extend(blob(Point3f::new(5.0, 0.0, 0.0), 0.5, 80, &mut rng));
        points.push(Point3f::new(0.0, 20.0, 0.0));

        let labels = dbscan(&points, 0.3, 5).unwrap();
        assert_eq!(labels[200..280].iter().filter(|l| l.is_none()).count(), 0);
        assert!(labels[0].is_some());
        assert_ne!(labels[0], labels[200]);
        assert_eq!(labels[280], None);
    }

    #[test]
    fn test_largest_cluster_picks_bigger_blob() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut points = blob(Point3f::new(3.0, 3.0, 3.0), 0.4, 60, &mut rng);
        points.extend(blob(Point3f::origin(), 0.5, 300, &mut rng));
        let cloud = PointCloud::from_points(points);

        let cluster = largest_cluster(&cloud, 3.0, 5).unwrap().unwrap();
        assert!(cluster.len() >= 290 && cluster.len() <= 300);
        assert!(cluster.iter().all(|p| p.coords.norm() <= 0.5 + 1e-5));
    }

    #[test]
    fn test_all_noise_returns_none() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(10.0, 0.0, 0.0),
            Point3f::new(0.0, 10.0, 0.0),
        ]);
        assert!(largest_cluster(&cloud, 0.5, 2).unwrap().is_none());
    }

    #[test]
    fn test_invalid_parameters() {
        let points = vec![Point3f::origin()];
        assert!(dbscan(&points, 0.0, 3).is_err());
        assert!(dbscan(&points, 1.0, 0).is_err());
    }
}

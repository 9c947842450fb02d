//! Scan noise filtering
//!
//! Three passes, in order: statistical outlier removal, optional dominant
//! cluster extraction, and centering at the origin.

use crate::nearest_neighbor::KdTree;
use rayon::prelude::*;
use rhinovate_core::{Error, NearestNeighborSearch, Point3f, PointCloud, Result};
use tracing::{debug, info, warn};

/// Parameters for [`filter`]
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    /// When false only centering is applied
    pub enabled: bool,
    /// Neighbors used for the per-point mean distance
    pub k_neighbors: usize,
    /// Points above `mean + std_ratio * std` are dropped
    pub std_ratio: f32,
    pub keep_largest_cluster: bool,
    /// Cluster radius as a multiple of the average nearest-neighbor spacing
    pub cluster_eps_multiplier: f32,
    /// Neighbors (self included) that make a point a cluster core
    pub min_cluster_samples: usize,
    /// Clouds at or below this size skip clustering
    pub min_points_for_clustering: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            k_neighbors: 20,
            std_ratio: 2.0,
            keep_largest_cluster: true,
            cluster_eps_multiplier: 3.0,
            min_cluster_samples: 10,
            min_points_for_clustering: 100,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k_neighbors == 0 {
            return Err(Error::InvalidData(
                "k_neighbors must be greater than 0".to_string(),
            ));
        }
        if self.std_ratio <= 0.0 {
            return Err(Error::InvalidData("std_ratio must be positive".to_string()));
        }
        if self.cluster_eps_multiplier <= 0.0 {
            return Err(Error::InvalidData(
                "cluster_eps_multiplier must be positive".to_string(),
            ));
        }
        if self.min_cluster_samples == 0 {
            return Err(Error::InvalidData(
                "min_cluster_samples must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point counts after each filtering pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterReport {
    pub input: usize,
    pub after_outliers: usize,
    pub after_clustering: usize,
}

/// Filter a raw scan and center the survivors at the origin
///
/// # Arguments
/// * `cloud` - Raw scan points
/// * `config` - Filtering parameters
///
/// # Returns
/// * `Result<PointCloud<Point3f>>` - Filtered, centered points; `EmptyInput`
///   when `cloud` has no points
///
/// # Example
/// ```rust
/// use rhinovate_core::{PointCloud, Point3f};
/// use rhinovate_algorithms::{filter, FilterConfig};
///
/// fn main() -> rhinovate_core::Result<()> {
///     let cloud = PointCloud::from_points(vec![
///         Point3f::new(1.0, 1.0, 1.0),
///         Point3f::new(1.1, 1.0, 1.0),
///         Point3f::new(1.0, 1.1, 1.0),
///         Point3f::new(1.0, 1.0, 1.1),
///     ]);
///
///     let filtered = filter(&cloud, &FilterConfig::default())?;
///     println!("Filtered cloud has {} points", filtered.len());
///     Ok(())
/// }
/// ```
pub fn filter(cloud: &PointCloud<Point3f>, config: &FilterConfig) -> Result<PointCloud<Point3f>> {
    filter_with_report(cloud, config).map(|(filtered, _)| filtered)
}

/// Same as [`filter`], also returning per-pass point counts
pub fn filter_with_report(
    cloud: &PointCloud<Point3f>,
    config: &FilterConfig,
) -> Result<(PointCloud<Point3f>, FilterReport)> {
    if cloud.is_empty() {
        return Err(Error::EmptyInput("point set has no points".to_string()));
    }
    config.validate()?;

    let mut report = FilterReport {
        input: cloud.len(),
        after_outliers: cloud.len(),
        after_clustering: cloud.len(),
    };

    if !config.enabled {
        debug!("filtering disabled, centering only");
        return Ok((cloud.centered(), report));
    }

    let inliers = statistical_outlier_removal(cloud, config.k_neighbors, config.std_ratio)?;
    report.after_outliers = inliers.len();

    let kept = if config.keep_largest_cluster && inliers.len() > config.min_points_for_clustering {
        dominant_cluster(&inliers, config)?
    } else {
        inliers
    };
    report.after_clustering = kept.len();

    if kept.is_empty() {
        return Err(Error::EmptyInput(
            "no points survived noise filtering".to_string(),
        ));
    }

    info!(
        input = report.input,
        after_outliers = report.after_outliers,
        after_clustering = report.after_clustering,
        "noise filter complete"
    );
    Ok((kept.centered(), report))
}

#[cfg(feature = "clustering")]
fn dominant_cluster(cloud: &PointCloud<Point3f>, config: &FilterConfig) -> Result<PointCloud<Point3f>> {
    match crate::clustering::largest_cluster(
        cloud,
        config.cluster_eps_multiplier,
        config.min_cluster_samples,
    )? {
        Some(cluster) => Ok(cluster),
        None => {
            warn!(
                points = cloud.len(),
                "no dense cluster found, keeping all inliers"
            );
            Ok(cloud.clone())
        }
    }
}

#[cfg(not(feature = "clustering"))]
fn dominant_cluster(cloud: &PointCloud<Point3f>, _config: &FilterConfig) -> Result<PointCloud<Point3f>> {
    warn!("built without the `clustering` feature, skipping dominant cluster extraction");
    Ok(cloud.clone())
}

/// Mean distance from every point to its `k` nearest neighbors (self excluded)
///
/// `k` is clamped to `len - 1`; a single point yields `[0.0]`.
pub fn mean_neighbor_distances(tree: &KdTree, points: &[Point3f], k: usize) -> Vec<f32> {
    let k = k.min(points.len().saturating_sub(1));
    if k == 0 {
        return vec![0.0; points.len()];
    }
    points
        .par_iter()
        .map(|point| {
            let neighbors = tree.find_k_nearest(point, k + 1);
            // The closest hit is the point itself
            let distances = neighbors.iter().skip(1).map(|(_, d)| *d);
            distances.sum::<f32>() / k as f32
        })
        .collect()
}

/// Statistical outlier removal filter
///
/// For each point, computes the mean distance to its `k_neighbors` nearest
/// neighbors. Points whose mean distance exceeds the global mean by more than
/// `std_ratio` standard deviations are removed.
///
/// # Arguments
/// * `cloud` - Input point cloud
/// * `k_neighbors` - Number of nearest neighbors to consider for each point
/// * `std_ratio` - Standard deviation multiplier for outlier detection
///
/// # Returns
/// * `Result<PointCloud<Point3f>>` - Filtered point cloud with outliers removed,
///   input order preserved
pub fn statistical_outlier_removal(
    cloud: &PointCloud<Point3f>,
    k_neighbors: usize,
    std_ratio: f32,
) -> Result<PointCloud<Point3f>> {
    if cloud.is_empty() {
        return Ok(PointCloud::new());
    }

    if k_neighbors == 0 {
        return Err(Error::InvalidData(
            "k_neighbors must be greater than 0".to_string(),
        ));
    }

    if std_ratio <= 0.0 {
        return Err(Error::InvalidData("std_ratio must be positive".to_string()));
    }

    if cloud.len() < 2 {
        return Ok(cloud.clone());
    }

    let tree = KdTree::new(&cloud.points);
    let mean_distances = mean_neighbor_distances(&tree, &cloud.points, k_neighbors);

    let n = mean_distances.len() as f64;
    let global_mean = mean_distances.iter().map(|&d| d as f64).sum::<f64>() / n;
    let variance = mean_distances
        .iter()
        .map(|&d| (d as f64 - global_mean).powi(2))
        .sum::<f64>()
        / n;
    let threshold = (global_mean + std_ratio as f64 * variance.sqrt()) as f32;

    let filtered: PointCloud<Point3f> = cloud
        .points
        .iter()
        .zip(mean_distances.iter())
        .filter(|(_, &mean_dist)| mean_dist <= threshold)
        .map(|(point, _)| *point)
        .collect();

    debug!(
        removed = cloud.len() - filtered.len(),
        threshold,
        "statistical outlier removal"
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn jittered_grid(n: usize, spacing: f32, rng: &mut StdRng) -> Vec<Point3f> {
        let mut points = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    points.push(Point3f::new(
                        i as f32 * spacing + rng.gen_range(-0.01..0.01),
                        j as f32 * spacing + rng.gen_range(-0.01..0.01),
                        k as f32 * spacing + rng.gen_range(-0.01..0.01),
                    ));
                }
            }
        }
        points
    }

    #[test]
    fn test_filter_empty_input() {
        let result = filter(&PointCloud::new(), &FilterConfig::default());
        assert!(matches!(result, Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_filter_rejects_zero_k() {
        let cloud = PointCloud::from_points(vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)]);
        let config = FilterConfig {
            k_neighbors: 0,
            ..Default::default()
        };
        assert!(matches!(filter(&cloud, &config), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_statistical_outlier_removal_single_point() {
        let cloud = PointCloud::from_points(vec![Point3f::new(1.0, 2.0, 3.0)]);
        let result = statistical_outlier_removal(&cloud, 5, 1.0).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_statistical_outlier_removal_with_outliers() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut points = jittered_grid(6, 0.1, &mut rng);
        let inlier_count = points.len();
        points.push(Point3f::new(10.0, 10.0, 10.0));
        points.push(Point3f::new(-8.0, 5.0, 12.0));

        let cloud = PointCloud::from_points(points);
        let filtered = statistical_outlier_removal(&cloud, 8, 2.0).unwrap();

        assert!(filtered.len() >= inlier_count - inlier_count / 20);
        assert!(filtered.len() <= inlier_count);
        assert!(filtered.iter().all(|p| p.coords.norm() < 2.0));
    }

    #[test]
    fn test_statistical_outlier_removal_invalid_std_ratio() {
        let cloud = PointCloud::from_points(vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0)]);
        assert!(statistical_outlier_removal(&cloud, 1, 0.0).is_err());
        assert!(statistical_outlier_removal(&cloud, 1, -1.0).is_err());
    }

    #[test]
    fn test_filter_output_is_centered() {
        let mut rng = StdRng::seed_from_u64(11);
        let points: Vec<Point3f> = jittered_grid(5, 0.2, &mut rng)
            .into_iter()
            .map(|p| p + rhinovate_core::Vector3f::new(40.0, -3.0, 12.5))
            .collect();
        let cloud = PointCloud::from_points(points);

        let filtered = filter(&cloud, &FilterConfig::default()).unwrap();
        assert!(!filtered.is_empty());
        let c = filtered.centroid().unwrap();
        assert_relative_eq!(c.coords.norm(), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_disabled_filter_only_centers() {
        let cloud = PointCloud::from_points(vec![
            Point3f::new(1.0, 1.0, 1.0),
            Point3f::new(3.0, 1.0, 1.0),
            Point3f::new(100.0, 1.0, 1.0),
        ]);
        let config = FilterConfig {
            enabled: false,
            ..Default::default()
        };
        let (filtered, report) = filter_with_report(&cloud, &config).unwrap();
        assert_eq!(filtered.len(), 3);
        assert_eq!(report.after_clustering, 3);
        assert_relative_eq!(filtered[0].x, 1.0 - 104.0 / 3.0, epsilon = 1e-4);
    }
}

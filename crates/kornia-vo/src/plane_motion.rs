//! Robust estimation of the planar motion of ground points.

use glam::DVec2;
use kornia_lie::se2::SE2;
use kornia_lie::so2::SO2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::plane::CameraPlaneProjection;

/// Number of correspondences in a minimal sample.
pub const SAMPLE_SIZE: usize = 3;

/// A ground point seen in the key frame and observed again in the current image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePtPixel {
    /// 2D plane coordinate in the key frame.
    pub plane_key: DVec2,
    /// Undistorted normalized image coordinate in the current frame.
    pub normalized_curr: DVec2,
}

impl PlanePtPixel {
    /// Creates a correspondence.
    pub fn new(plane_key: DVec2, normalized_curr: DVec2) -> Self {
        Self {
            plane_key,
            normalized_curr,
        }
    }
}

/// Errors raised while fitting the ground plane motion.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlaneMotionError {
    /// Fewer correspondences than a minimal sample.
    #[error("Need at least {required} ground correspondences, got {actual}")]
    NotEnoughSamples {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },
    /// No model gathered enough support.
    #[error("No motion model with at least {required} inliers, best had {found}")]
    NoConsensus {
        /// Minimum number of inliers.
        required: usize,
        /// Inliers of the best model.
        found: usize,
    },
}

/// Output of a successful plane motion fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneMotionFit {
    /// Motion of the ground from the key frame to the current frame.
    pub key_to_curr: SE2,
    /// Indices of the input correspondences which support the model.
    pub inliers: Vec<usize>,
}

/// Robust estimator of the key frame to current frame ground motion.
pub trait PlaneMotionMatcher {
    /// Fits a planar rigid motion to the correspondences of one frame.
    fn fit(
        &mut self,
        samples: &[PlanePtPixel],
        projection: &CameraPlaneProjection,
    ) -> Result<PlaneMotionFit, PlaneMotionError>;
}

/// Parameters for RANSAC over ground correspondences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of RANSAC iterations.
    pub max_iterations: usize,
    /// Pixel error threshold to classify an observation as an inlier.
    pub inlier_threshold: f64,
    /// Minimum number of inliers required for acceptance.
    pub min_inliers: usize,
    /// Whether to refit on all inliers once the best sample is found.
    pub refine: bool,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            inlier_threshold: 1.5,
            min_inliers: SAMPLE_SIZE,
            refine: true,
            random_seed: Some(0),
        }
    }
}

/// Least squares rigid motion taking `src` onto `dst`.
///
/// Closed form of the 2D Kabsch problem. Returns `None` for mismatched
/// lengths, fewer than two points, or when all points coincide.
pub fn fit_se2(src: &[DVec2], dst: &[DVec2]) -> Option<SE2> {
    if src.len() != dst.len() || src.len() < 2 {
        return None;
    }
    let n = src.len() as f64;
    let mu_s = src.iter().copied().sum::<DVec2>() / n;
    let mu_d = dst.iter().copied().sum::<DVec2>() / n;

    let mut dot = 0.0;
    let mut cross = 0.0;
    for (s, d) in src.iter().zip(dst.iter()) {
        let (a, b) = (*s - mu_s, *d - mu_d);
        dot += a.x * b.x + a.y * b.y;
        cross += a.x * b.y - a.y * b.x;
    }
    if dot.abs() + cross.abs() < f64::EPSILON {
        return None;
    }

    let r = SO2::exp(cross.atan2(dot));
    Some(SE2::new(r, mu_d - r * mu_s))
}

/// Squared pixel distance between an observed ground point and its prediction.
///
/// Returns infinity when the predicted point is behind the camera.
pub fn plane_pixel_error_sq(
    key_to_curr: &SE2,
    sample: &PlanePtPixel,
    projection: &CameraPlaneProjection,
) -> f64 {
    let curr = *key_to_curr * sample.plane_key;
    let Some(predicted) = projection.plane_to_normal(curr) else {
        return f64::INFINITY;
    };
    let intrinsic = projection.intrinsic();
    let dx = (sample.normalized_curr.x - predicted.x) * intrinsic.fx;
    let dy = (sample.normalized_curr.y - predicted.y) * intrinsic.fy;
    dx * dx + dy * dy
}

/// RANSAC plane motion estimator.
///
/// Minimal samples of three correspondences are lifted onto the ground plane
/// in the current frame and aligned with [`fit_se2`]. Models are scored by the
/// reprojection error in pixels.
pub struct PlaneMotionRansac {
    params: RansacParams,
    rng: StdRng,
}

impl PlaneMotionRansac {
    /// Creates the estimator, seeding the sampler from `params.random_seed`.
    pub fn new(params: RansacParams) -> Self {
        let rng = match params.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => {
                let mut tr = rand::rng();
                StdRng::from_rng(&mut tr)
            }
        };
        Self { params, rng }
    }

    /// Estimator parameters.
    pub fn params(&self) -> &RansacParams {
        &self.params
    }

    fn classify(
        &self,
        model: &SE2,
        samples: &[PlanePtPixel],
        projection: &CameraPlaneProjection,
    ) -> (Vec<usize>, f64) {
        let threshold_sq = self.params.inlier_threshold * self.params.inlier_threshold;
        let mut inliers = Vec::new();
        let mut score = 0.0;
        for (i, sample) in samples.iter().enumerate() {
            let err = plane_pixel_error_sq(model, sample, projection);
            if err <= threshold_sq {
                inliers.push(i);
                score += err;
            }
        }
        (inliers, score)
    }
}

impl Default for PlaneMotionRansac {
    fn default() -> Self {
        Self::new(RansacParams::default())
    }
}

impl PlaneMotionMatcher for PlaneMotionRansac {
    fn fit(
        &mut self,
        samples: &[PlanePtPixel],
        projection: &CameraPlaneProjection,
    ) -> Result<PlaneMotionFit, PlaneMotionError> {
        let n = samples.len();
        if n < SAMPLE_SIZE {
            return Err(PlaneMotionError::NotEnoughSamples {
                required: SAMPLE_SIZE,
                actual: n,
            });
        }

        // ground position of every observation in the current frame
        let plane_curr = samples
            .iter()
            .map(|s| projection.normal_to_plane(s.normalized_curr))
            .collect::<Vec<_>>();

        let mut best_model = None;
        let mut best_inliers = Vec::new();
        let mut best_score = f64::INFINITY;

        let mut src = Vec::with_capacity(SAMPLE_SIZE);
        let mut dst = Vec::with_capacity(SAMPLE_SIZE);
        for _ in 0..self.params.max_iterations {
            src.clear();
            dst.clear();
            for idx in rand::seq::index::sample(&mut self.rng, n, SAMPLE_SIZE).iter() {
                if let Some(curr) = plane_curr[idx] {
                    src.push(samples[idx].plane_key);
                    dst.push(curr);
                }
            }
            if src.len() < SAMPLE_SIZE {
                continue;
            }
            let Some(model) = fit_se2(&src, &dst) else {
                continue;
            };

            let (inliers, score) = self.classify(&model, samples, projection);
            if inliers.len() > best_inliers.len()
                || (inliers.len() == best_inliers.len() && score < best_score)
            {
                best_model = Some(model);
                best_inliers = inliers;
                best_score = score;
            }

            if best_inliers.len() == n {
                break;
            }
        }

        let required = self.params.min_inliers.max(SAMPLE_SIZE);
        let mut model = match best_model {
            Some(m) if best_inliers.len() >= required => m,
            _ => {
                return Err(PlaneMotionError::NoConsensus {
                    required,
                    found: best_inliers.len(),
                })
            }
        };

        if self.params.refine {
            src.clear();
            dst.clear();
            for &i in &best_inliers {
                if let Some(curr) = plane_curr[i] {
                    src.push(samples[i].plane_key);
                    dst.push(curr);
                }
            }
            if let Some(refined) = fit_se2(&src, &dst) {
                let (inliers, _) = self.classify(&refined, samples, projection);
                if inliers.len() >= best_inliers.len() {
                    model = refined;
                    best_inliers = inliers;
                }
            }
        }

        log::debug!(
            "plane motion: {} of {} correspondences are inliers",
            best_inliers.len(),
            n
        );

        Ok(PlaneMotionFit {
            key_to_curr: model,
            inliers: best_inliers,
        })
    }
}

//! A point tracker that observes a synthetic world.
//!
//! The "image" fed to [`SyntheticTracker`] is the true pose of the camera on
//! the ground plane. Landmarks are projected through the same camera model the
//! odometry uses, so the odometry can be exercised end to end without video.

use std::collections::BTreeMap;

use glam::{DVec2, DVec3};
use kornia_lie::se2::SE2;
use kornia_lie::se3::SE3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::CameraIntrinsic;
use crate::plane::{plane_to_3d, CameraPlaneProjection};
use crate::tracker::{PointTrack, PointTracker, TrackId};

/// Minimum depth, in the camera frame, of a visible landmark.
const MIN_DEPTH: f64 = 1e-3;

/// Something the synthetic camera can see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Landmark {
    /// A point on the ground, in world plane coordinates.
    Ground(DVec2),
    /// A point infinitely far away.
    Far {
        /// Unit horizontal direction in the world plane frame.
        direction: DVec2,
        /// Height above the horizon per unit of horizontal distance.
        elevation: f64,
    },
}

impl Landmark {
    /// Ground points on a regular grid covering `[min, max]`.
    pub fn ground_grid(min: DVec2, max: DVec2, step: f64) -> Vec<Landmark> {
        let nx = ((max.x - min.x) / step).floor() as usize;
        let ny = ((max.y - min.y) / step).floor() as usize;
        let mut landmarks = Vec::with_capacity((nx + 1) * (ny + 1));
        for i in 0..=nx {
            for j in 0..=ny {
                landmarks.push(Landmark::Ground(
                    min + DVec2::new(i as f64 * step, j as f64 * step),
                ));
            }
        }
        landmarks
    }

    /// Far points evenly spread over every heading.
    pub fn far_ring(count: usize, elevation: f64) -> Vec<Landmark> {
        (0..count)
            .map(|k| {
                let angle = 2.0 * std::f64::consts::PI * k as f64 / count as f64;
                Landmark::Far {
                    direction: DVec2::new(angle.cos(), angle.sin()),
                    elevation,
                }
            })
            .collect()
    }
}

/// Simulated tracker with perfect data association.
pub struct SyntheticTracker {
    projection: CameraPlaneProjection,
    image_size: (u32, u32),
    landmarks: Vec<Landmark>,
    pose: SE2,
    tracks: BTreeMap<TrackId, (usize, DVec2)>,
    new_ids: Vec<TrackId>,
    next_id: TrackId,
    noise: Option<(f64, StdRng)>,
}

impl SyntheticTracker {
    /// Creates a tracker for a camera with the given calibration and image size.
    pub fn new(
        intrinsic: CameraIntrinsic,
        plane_to_camera: SE3,
        image_size: (u32, u32),
        landmarks: Vec<Landmark>,
    ) -> Self {
        Self {
            projection: CameraPlaneProjection::new(intrinsic, plane_to_camera),
            image_size,
            landmarks,
            pose: SE2::IDENTITY,
            tracks: BTreeMap::new(),
            new_ids: Vec::new(),
            next_id: 0,
            noise: None,
        }
    }

    /// Adds uniform noise in `[-amplitude, amplitude]` pixels to every observation.
    pub fn with_pixel_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = Some((amplitude, StdRng::seed_from_u64(seed)));
        self
    }

    /// Current true camera pose.
    pub fn pose(&self) -> &SE2 {
        &self.pose
    }

    /// Landmark followed by a track.
    pub fn landmark_of(&self, id: TrackId) -> Option<&Landmark> {
        self.tracks.get(&id).map(|(index, _)| &self.landmarks[*index])
    }

    /// Number of live tracks.
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Noise free pixel of a landmark seen from `pose`, if inside the image.
    pub fn observe(&self, landmark: &Landmark, pose: &SE2) -> Option<DVec2> {
        let plane_to_camera = self.projection.plane_to_camera();
        let camera = match landmark {
            Landmark::Ground(world) => {
                let local = pose.inverse() * *world;
                *plane_to_camera * plane_to_3d(local)
            }
            Landmark::Far {
                direction,
                elevation,
            } => {
                let local = pose.r.inverse() * *direction;
                // plane frame y points down
                plane_to_camera.r * DVec3::new(-local.y, -elevation, local.x)
            }
        };
        if camera.z <= MIN_DEPTH {
            return None;
        }

        let pixel = self
            .projection
            .normal_to_pixel(DVec2::new(camera.x / camera.z, camera.y / camera.z));
        let (width, height) = (self.image_size.0 as f64, self.image_size.1 as f64);
        if pixel.x < 0.0 || pixel.y < 0.0 || pixel.x >= width || pixel.y >= height {
            return None;
        }
        Some(pixel)
    }

    fn noisy(&mut self, pixel: DVec2) -> DVec2 {
        match &mut self.noise {
            Some((amplitude, rng)) if *amplitude > 0.0 => {
                let a = *amplitude;
                pixel + DVec2::new(rng.random_range(-a..=a), rng.random_range(-a..=a))
            }
            _ => pixel,
        }
    }

    fn tracks_vec(&self) -> Vec<PointTrack> {
        self.tracks
            .iter()
            .map(|(id, (_, pixel))| PointTrack::new(*id, *pixel))
            .collect()
    }
}

impl PointTracker for SyntheticTracker {
    type Image = SE2;

    fn process(&mut self, pose: &SE2) {
        self.pose = *pose;
        self.new_ids.clear();

        let ids = self.tracks.keys().copied().collect::<Vec<_>>();
        for id in ids {
            let index = self.tracks[&id].0;
            match self.observe(&self.landmarks[index], pose) {
                Some(pixel) => {
                    let pixel = self.noisy(pixel);
                    self.tracks.insert(id, (index, pixel));
                }
                None => {
                    self.tracks.remove(&id);
                }
            }
        }
    }

    fn spawn_tracks(&mut self) {
        self.new_ids.clear();

        let mut tracked = vec![false; self.landmarks.len()];
        for (index, _) in self.tracks.values() {
            tracked[*index] = true;
        }

        for index in 0..self.landmarks.len() {
            if tracked[index] {
                continue;
            }
            let Some(pixel) = self.observe(&self.landmarks[index], &self.pose) else {
                continue;
            };
            let pixel = self.noisy(pixel);
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.insert(id, (index, pixel));
            self.new_ids.push(id);
        }
        log::debug!("synthetic tracker spawned {} tracks", self.new_ids.len());
    }

    fn new_tracks(&self) -> Vec<PointTrack> {
        self.new_ids
            .iter()
            .filter_map(|id| self.tracks.get(id).map(|(_, pixel)| PointTrack::new(*id, *pixel)))
            .collect()
    }

    fn active_tracks(&self) -> Vec<PointTrack> {
        self.tracks_vec()
    }

    fn all_tracks(&self) -> Vec<PointTrack> {
        self.tracks_vec()
    }

    fn drop_track(&mut self, id: TrackId) -> bool {
        self.tracks.remove(&id).is_some()
    }

    fn reset(&mut self) {
        self.pose = SE2::IDENTITY;
        self.tracks.clear();
        self.new_ids.clear();
        self.next_id = 0;
    }
}

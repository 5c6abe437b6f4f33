//! Monocular visual odometry for a camera moving over a flat ground plane.
//!
//! Tracks are split into two groups. Points on the ground give the full planar
//! motion, translation and yaw, through [`PlaneMotionMatcher`]. Points above
//! the horizon are treated as infinitely far away and only give yaw, which is
//! estimated with [`estimate_far_rotation`]. Both yaw estimates are fused with
//! weights proportional to their inlier counts.
//!
//! Motion is estimated against a key frame. When too few ground inliers
//! remain the current frame becomes the new key frame: every track is moved
//! into it and new tracks are spawned.

use std::collections::HashSet;

use glam::{DMat3, DVec2, DVec3};
use kornia_lie::se2::SE2;
use kornia_lie::se3::SE3;

use crate::camera::CameraIntrinsic;
use crate::config::VoParams;
use crate::error::VoError;
use crate::far::{angle_of_rotation, estimate_far_rotation};
use crate::plane::{ground_direction, CameraPlaneProjection};
use crate::plane_motion::{PlaneMotionMatcher, PlanePtPixel};
use crate::track::{TrackTable, VoTrack};
use crate::tracker::{PointTrack, PointTracker, TrackId};

/// Summary of the last processed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Ground tracks used for the plane motion.
    pub on_plane: usize,
    /// Far tracks used for the rotation.
    pub far: usize,
    /// Ground tracks which agreed with the plane motion.
    pub close_inliers: usize,
    /// Far tracks which agreed with the rotation.
    pub far_inliers: usize,
    /// Tracks dropped for not being inliers.
    pub dropped: usize,
    /// Tracks spawned in this frame.
    pub spawned: usize,
    /// True if this frame became the key frame.
    pub new_key_frame: bool,
}

/// Yaw of the fused motion from the key frame to the current frame.
///
/// Each source contributes its unit heading vector weighted by its inlier
/// count. Without far inliers the ground estimate is returned unchanged.
pub fn fuse_yaw(close: &SE2, close_inliers: usize, far_angle: f64, far_inliers: usize) -> f64 {
    let (c, s) = (close.r.cos(), close.r.sin());
    if far_inliers == 0 {
        return s.atan2(c);
    }

    let close_weight = close_inliers as f64;
    let far_weight = far_inliers as f64;
    let x = c * close_weight + far_angle.cos() * far_weight;
    let y = s * close_weight + far_angle.sin() * far_weight;
    y.atan2(x)
}

/// Lifts a planar pose of the camera's plane frame into a 3D transform.
fn lift_to_3d(plane_to_world: &SE2) -> SE3 {
    let (c, s) = (plane_to_world.r.cos(), plane_to_world.r.sin());
    SE3::new(
        DMat3::from_cols(DVec3::new(c, 0.0, s), DVec3::Y, DVec3::new(-s, 0.0, c)),
        DVec3::new(-plane_to_world.t.y, 0.0, plane_to_world.t.x),
    )
}

/// Visual odometry from ground points and points at infinity.
///
/// The odometry owns its tracker and its plane motion estimator. Each track
/// spawned through the odometry gets a [`VoTrack`] annotation describing
/// where it lies in the key frame.
pub struct MonoPlaneInfinity<T: PointTracker, M: PlaneMotionMatcher> {
    params: VoParams,
    projection: CameraPlaneProjection,
    threshold_far_angle_error: f64,

    tracker: T,
    plane_motion: M,
    tracks: TrackTable,

    // per frame working storage
    plane_samples: Vec<PlanePtPixel>,
    tracks_on_plane: Vec<TrackId>,
    tracks_far: Vec<TrackId>,
    far_angles: Vec<f64>,
    far_scratch: Vec<f64>,

    far_angle: f64,
    far_inlier_count: usize,
    close_key_to_curr: SE2,
    close_inlier_count: usize,

    key_to_world: SE2,
    curr_to_key: SE2,

    tick: u64,
    first: bool,
    stats: FrameStats,
}

impl<T: PointTracker, M: PlaneMotionMatcher> MonoPlaneInfinity<T, M> {
    /// Creates the odometry.
    ///
    /// # Arguments
    ///
    /// * `params` - Thresholds controlling spawning, retirement and inliers.
    /// * `intrinsic` - Camera intrinsics, including lens distortion.
    /// * `plane_to_camera` - Transform from the ground plane frame to the camera.
    /// * `tracker` - Point tracker fed with every image.
    /// * `plane_motion` - Robust estimator of the ground motion.
    pub fn new(
        params: VoParams,
        intrinsic: CameraIntrinsic,
        plane_to_camera: SE3,
        tracker: T,
        plane_motion: M,
    ) -> Self {
        let threshold_far_angle_error = params.far_angle_error(intrinsic.fx);
        Self {
            params,
            projection: CameraPlaneProjection::new(intrinsic, plane_to_camera),
            threshold_far_angle_error,
            tracker,
            plane_motion,
            tracks: TrackTable::new(),
            plane_samples: Vec::new(),
            tracks_on_plane: Vec::new(),
            tracks_far: Vec::new(),
            far_angles: Vec::new(),
            far_scratch: Vec::new(),
            far_angle: 0.0,
            far_inlier_count: 0,
            close_key_to_curr: SE2::IDENTITY,
            close_inlier_count: 0,
            key_to_world: SE2::IDENTITY,
            curr_to_key: SE2::IDENTITY,
            tick: 0,
            first: true,
            stats: FrameStats::default(),
        }
    }

    /// Replaces the camera intrinsics and the far angle tolerance derived from them.
    pub fn set_intrinsic(&mut self, intrinsic: CameraIntrinsic) {
        self.threshold_far_angle_error = self.params.far_angle_error(intrinsic.fx);
        self.projection.set_intrinsic(intrinsic);
    }

    /// Replaces the transform from the ground plane to the camera.
    pub fn set_extrinsic(&mut self, plane_to_camera: SE3) {
        self.projection.set_plane_to_camera(plane_to_camera);
    }

    /// Forgets the trajectory and every track. The next frame starts over at the origin.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.tracks.clear();
        self.plane_samples.clear();
        self.tracks_on_plane.clear();
        self.tracks_far.clear();
        self.far_angles.clear();
        self.far_angle = 0.0;
        self.far_inlier_count = 0;
        self.close_key_to_curr = SE2::IDENTITY;
        self.close_inlier_count = 0;
        self.key_to_world = SE2::IDENTITY;
        self.curr_to_key = SE2::IDENTITY;
        self.tick = 0;
        self.first = true;
        self.stats = FrameStats::default();
    }

    /// Estimates the motion of the camera from a new image.
    ///
    /// The first frame after creation or [`reset`](Self::reset) only spawns
    /// tracks and leaves the pose at the origin. On error the pose is not
    /// updated and the odometry should be reset.
    pub fn process(&mut self, image: &T::Image) -> Result<(), VoError> {
        self.tracker.process(image);
        self.tick += 1;
        self.stats = FrameStats::default();

        if self.first {
            self.add_new_tracks();
            self.first = false;
            self.stats.new_key_frame = true;
            log::debug!("tick {}: initial key frame with {} tracks", self.tick, self.stats.spawned);
            return Ok(());
        }

        self.sort_tracks_for_estimation()?;
        self.estimate_far();
        if let Err(err) = self.estimate_close() {
            log::warn!("tick {}: {}", self.tick, err);
            return Err(err);
        }
        self.fuse_estimates();
        self.drop_unused_tracks();

        if self.params.needs_new_tracks(self.close_inlier_count) {
            self.change_curr_to_reference();
            self.add_new_tracks();
            self.stats.new_key_frame = true;
        }

        log::debug!("tick {}: {:?}", self.tick, self.stats);
        Ok(())
    }

    /// Number of frames processed since creation or the last reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Pose of the current camera plane frame in the world plane.
    pub fn curr_to_world_2d(&self) -> SE2 {
        self.key_to_world * self.curr_to_key
    }

    /// Transform from the 3D world frame to the current camera frame.
    ///
    /// The world frame is the plane frame of the first camera, with the ground
    /// at `y = 0` and `y` pointing down.
    pub fn world_to_curr_3d(&self) -> SE3 {
        let world_to_curr_plane = lift_to_3d(&self.curr_to_world_2d()).inverse();
        *self.projection.plane_to_camera() * world_to_curr_plane
    }

    /// Pose of the key frame in the world plane.
    pub fn key_to_world(&self) -> &SE2 {
        &self.key_to_world
    }

    /// Motion of the current frame relative to the key frame.
    pub fn curr_to_key(&self) -> &SE2 {
        &self.curr_to_key
    }

    /// Whether far tracks are checked for a pure rotation about the plane normal.
    pub fn is_strict_far(&self) -> bool {
        self.params.strict_far
    }

    /// Enables or disables the strict check on far tracks.
    pub fn set_strict_far(&mut self, strict_far: bool) {
        self.params.strict_far = strict_far;
    }

    /// Odometry parameters.
    pub fn params(&self) -> &VoParams {
        &self.params
    }

    /// Camera model.
    pub fn projection(&self) -> &CameraPlaneProjection {
        &self.projection
    }

    /// Angular tolerance of far inliers, in radians.
    pub fn threshold_far_angle_error(&self) -> f64 {
        self.threshold_far_angle_error
    }

    /// The point tracker.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Mutable access to the point tracker.
    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    /// The plane motion estimator.
    pub fn plane_motion(&self) -> &M {
        &self.plane_motion
    }

    /// Annotation of a track.
    pub fn track(&self, id: TrackId) -> Option<&VoTrack> {
        self.tracks.get(id)
    }

    /// True if the track was an inlier in the last processed frame.
    ///
    /// Tracks spawned in the last frame count as inliers.
    pub fn is_inlier(&self, id: TrackId) -> bool {
        self.tracks.get(id).is_some_and(|t| t.last_inlier == self.tick)
    }

    /// Statistics of the last processed frame.
    pub fn frame_stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Spawns tracks and annotates them in the current frame, which must be the key frame.
    fn add_new_tracks(&mut self) {
        self.tracker.spawn_tracks();

        let spawned = self.tracker.new_tracks();
        for track in &spawned {
            let annotation = self.annotate_new(track);
            if !self.tracks.annotate(track.id, annotation) {
                log::warn!("track {} was spawned twice, keeping its annotation", track.id);
            }
        }
        self.stats.spawned = spawned.len();
    }

    fn annotate_new(&self, track: &PointTrack) -> VoTrack {
        let n = self.projection.pixel_to_normal(track.pixel);

        if let Some(ground) = self.projection.normal_to_plane(n) {
            return VoTrack::on_plane(ground, self.tick);
        }

        let pointing = self.projection.pointing_in_plane(n);
        let norm_xz = (pointing.x * pointing.x + pointing.z * pointing.z).sqrt();
        if norm_xz == 0.0 {
            // straight up: no heading, never used for the rotation
            return VoTrack::at_infinity(DVec2::ZERO, 0.0, self.tick);
        }
        VoTrack::at_infinity(
            DVec2::new(pointing.z / norm_xz, -pointing.x / norm_xz),
            pointing.y / norm_xz,
            self.tick,
        )
    }

    /// Splits the active tracks into ground samples and far rotation angles.
    fn sort_tracks_for_estimation(&mut self) -> Result<(), VoError> {
        self.plane_samples.clear();
        self.tracks_on_plane.clear();
        self.tracks_far.clear();
        self.far_angles.clear();

        for track in self.tracker.active_tracks() {
            let annotation = *self
                .tracks
                .get(track.id)
                .ok_or(VoError::MissingAnnotation(track.id))?;

            let n = self.projection.pixel_to_normal(track.pixel);
            let pointing = self.projection.pointing_in_plane(n);

            if annotation.on_plane {
                if pointing.y > 0.0 {
                    self.plane_samples.push(PlanePtPixel::new(annotation.ground, n));
                    self.tracks_on_plane.push(track.id);
                }
                continue;
            }

            let accepted = if self.params.strict_far {
                self.is_rotation_from_axis_y(&track, &annotation, pointing)
            } else {
                pointing.y < 0.0
            };
            if !accepted {
                continue;
            }

            let Some(curr) = ground_direction(pointing).try_normalize() else {
                continue;
            };
            if annotation.ground == DVec2::ZERO {
                continue;
            }
            self.far_angles.push(angle_of_rotation(annotation.ground, curr));
            self.tracks_far.push(track.id);
        }

        self.stats.on_plane = self.tracks_on_plane.len();
        self.stats.far = self.tracks_far.len();
        Ok(())
    }

    /// Checks that a far track only rotated about the plane normal since spawning.
    ///
    /// The current heading is combined with the out of plane component seen
    /// at spawn time and projected back into the image.
    fn is_rotation_from_axis_y(
        &self,
        track: &PointTrack,
        annotation: &VoTrack,
        pointing: DVec3,
    ) -> bool {
        let norm_xz = (pointing.x * pointing.x + pointing.z * pointing.z).sqrt();
        if norm_xz == 0.0 {
            return false;
        }

        let adjusted = DVec3::new(
            pointing.x / norm_xz,
            annotation.pointing_y,
            pointing.z / norm_xz,
        );
        let camera = self.projection.rotate_to_camera(adjusted);
        if camera.z <= 0.0 {
            return false;
        }

        let predicted = self
            .projection
            .normal_to_pixel(DVec2::new(camera.x / camera.z, camera.y / camera.z));
        let threshold = self.params.threshold_pixel_error;
        predicted.distance_squared(track.pixel) < threshold * threshold
    }

    fn estimate_far(&mut self) {
        let estimate = estimate_far_rotation(
            &self.far_angles,
            self.threshold_far_angle_error,
            &mut self.far_scratch,
        );

        self.far_angle = estimate.angle;
        self.far_inlier_count = estimate.inlier_count();
        for &i in &estimate.inliers {
            if let Some(t) = self.tracks.get_mut(self.tracks_far[i]) {
                t.mark_inlier(self.tick);
            }
        }
        self.stats.far_inliers = self.far_inlier_count;
    }

    fn estimate_close(&mut self) -> Result<(), VoError> {
        let fit = self
            .plane_motion
            .fit(&self.plane_samples, &self.projection)?;

        self.close_key_to_curr = fit.key_to_curr;
        self.close_inlier_count = fit.inliers.len();
        for &i in &fit.inliers {
            let Some(&id) = self.tracks_on_plane.get(i) else {
                continue;
            };
            if let Some(t) = self.tracks.get_mut(id) {
                t.mark_inlier(self.tick);
            }
        }
        self.stats.close_inliers = self.close_inlier_count;
        Ok(())
    }

    fn fuse_estimates(&mut self) {
        let yaw = fuse_yaw(
            &self.close_key_to_curr,
            self.close_inlier_count,
            self.far_angle,
            self.far_inlier_count,
        );
        self.curr_to_key = self.close_key_to_curr.with_yaw(yaw).inverse();
    }

    /// Drops the tracks which have not been inliers recently, then forgets
    /// annotations of tracks the tracker no longer knows about.
    fn drop_unused_tracks(&mut self) {
        let mut dropped = 0;
        for id in self.tracks.stale(self.tick, self.params.threshold_retire) {
            if self.tracker.drop_track(id) {
                dropped += 1;
            }
            self.tracks.remove(id);
        }

        let alive = self
            .tracker
            .all_tracks()
            .into_iter()
            .map(|t| t.id)
            .collect::<HashSet<_>>();
        self.tracks.retain_alive(&alive);
        self.stats.dropped = dropped;
    }

    /// Makes the current frame the key frame.
    fn change_curr_to_reference(&mut self) {
        let key_to_curr = self.curr_to_key.inverse();

        for (_, t) in self.tracks.iter_mut() {
            if t.on_plane {
                t.ground = key_to_curr * t.ground;
            } else {
                t.ground = key_to_curr.rotate(t.ground);
            }
        }

        self.key_to_world = self.key_to_world * self.curr_to_key;
        self.curr_to_key = SE2::IDENTITY;
        log::debug!(
            "tick {}: new key frame at ({:.3}, {:.3}, {:.4})",
            self.tick,
            self.key_to_world.t.x,
            self.key_to_world.t.y,
            self.key_to_world.yaw()
        );
    }
}

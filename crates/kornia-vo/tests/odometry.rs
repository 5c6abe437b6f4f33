use approx::assert_relative_eq;
use glam::{DMat3, DVec2, DVec3};
use kornia_lie::se2::SE2;
use kornia_lie::se3::SE3;
use kornia_vo::plane::{plane_to_3d, CameraPlaneProjection};
use kornia_vo::plane_motion::{PlaneMotionError, PlaneMotionFit, PlanePtPixel};
use kornia_vo::synthetic::{Landmark, SyntheticTracker};
use kornia_vo::{
    CameraIntrinsic, MonoPlaneInfinity, PlaneMotionMatcher, PlaneMotionRansac, PointTrack,
    PointTracker, TrackId, VoError, VoParams,
};

fn intrinsic() -> CameraIntrinsic {
    CameraIntrinsic::new(500.0, 500.0, 320.0, 240.0)
}

fn plane_to_camera() -> SE3 {
    SE3::new(DMat3::IDENTITY, DVec3::new(0.0, 1.5, 0.0))
}

fn scene(with_far: bool) -> Vec<Landmark> {
    let mut landmarks = Landmark::ground_grid(DVec2::new(2.0, -10.0), DVec2::new(30.0, 10.0), 1.0);
    if with_far {
        landmarks.extend(Landmark::far_ring(72, 0.1));
    }
    landmarks
}

fn odometry<M: PlaneMotionMatcher>(
    params: VoParams,
    landmarks: Vec<Landmark>,
    plane_motion: M,
) -> MonoPlaneInfinity<SyntheticTracker, M> {
    let tracker = SyntheticTracker::new(intrinsic(), plane_to_camera(), (640, 480), landmarks);
    MonoPlaneInfinity::new(params, intrinsic(), plane_to_camera(), tracker, plane_motion)
}

/// Camera poses of a vehicle driving forward while turning left.
fn trajectory(frames: usize) -> Vec<SE2> {
    let step = SE2::from_yaw(0.02, DVec2::new(0.25, 0.0));
    let mut poses = vec![SE2::IDENTITY];
    for _ in 1..frames {
        let last = poses[poses.len() - 1];
        poses.push(last * step);
    }
    poses
}

fn assert_pose_eq(actual: &SE2, expected: &SE2, epsilon: f64) {
    assert_relative_eq!(actual.yaw(), expected.yaw(), epsilon = epsilon);
    assert_relative_eq!(actual.t.x, expected.t.x, epsilon = epsilon);
    assert_relative_eq!(actual.t.y, expected.t.y, epsilon = epsilon);
}

#[test]
fn test_new_key_frame_every_frame() -> Result<(), VoError> {
    let params = VoParams {
        threshold_add: 0,
        ..Default::default()
    };
    let mut vo = odometry(params, scene(true), PlaneMotionRansac::default());

    for (i, truth) in trajectory(12).iter().enumerate() {
        vo.process(truth)?;
        assert_eq!(vo.tick(), i as u64 + 1);
        assert!(vo.frame_stats().new_key_frame);
        assert_eq!(vo.curr_to_key(), &SE2::IDENTITY);
        assert_pose_eq(&vo.curr_to_world_2d(), truth, 1e-6);

        if i > 0 {
            let stats = vo.frame_stats();
            assert!(stats.on_plane > 100, "{stats:?}");
            assert_eq!(stats.close_inliers, stats.on_plane);
            assert!(stats.far_inliers > 5, "{stats:?}");
            assert_eq!(stats.dropped, 0);
        }
    }
    Ok(())
}

#[test]
fn test_key_frame_kept_while_enough_inliers() -> Result<(), VoError> {
    let params = VoParams {
        threshold_add: 10,
        ..Default::default()
    };
    let mut vo = odometry(params, scene(true), PlaneMotionRansac::default());

    for truth in trajectory(10) {
        vo.process(&truth)?;
        assert_eq!(vo.key_to_world(), &SE2::IDENTITY);
        assert_pose_eq(vo.curr_to_key(), &truth, 1e-6);
        assert_pose_eq(&vo.curr_to_world_2d(), &truth, 1e-6);
    }
    assert_eq!(vo.frame_stats().spawned, 0);
    Ok(())
}

#[test]
fn test_world_to_curr_3d_reprojects_ground_tracks() -> Result<(), VoError> {
    let params = VoParams {
        threshold_add: 0,
        ..Default::default()
    };
    let mut vo = odometry(params, scene(false), PlaneMotionRansac::default());
    for truth in trajectory(6) {
        vo.process(&truth)?;
    }

    let world_to_curr = vo.world_to_curr_3d();
    let tracker = vo.tracker();
    let mut checked = 0;
    for track in tracker.active_tracks() {
        let Some(Landmark::Ground(world)) = tracker.landmark_of(track.id) else {
            continue;
        };
        let camera = world_to_curr * plane_to_3d(*world);
        let observed = vo.projection().pixel_to_normal(track.pixel);
        assert_relative_eq!(camera.x / camera.z, observed.x, epsilon = 1e-6);
        assert_relative_eq!(camera.y / camera.z, observed.y, epsilon = 1e-6);
        checked += 1;
    }
    assert!(checked > 100);
    Ok(())
}

#[test]
fn test_strict_far_accepts_pure_rotation() -> Result<(), VoError> {
    let params = VoParams {
        threshold_add: 0,
        strict_far: true,
        ..Default::default()
    };
    let mut vo = odometry(params, scene(true), PlaneMotionRansac::default());
    assert!(vo.is_strict_far());

    for truth in trajectory(8) {
        vo.process(&truth)?;
        assert_pose_eq(&vo.curr_to_world_2d(), &truth, 1e-6);
    }
    let stats = vo.frame_stats();
    assert!(stats.far > 5);
    assert_eq!(stats.far_inliers, stats.far);
    Ok(())
}

#[test]
fn test_noisy_observations_stay_close() -> Result<(), VoError> {
    let tracker = SyntheticTracker::new(intrinsic(), plane_to_camera(), (640, 480), scene(true))
        .with_pixel_noise(0.3, 42);
    let mut vo = MonoPlaneInfinity::new(
        VoParams::default(),
        intrinsic(),
        plane_to_camera(),
        tracker,
        PlaneMotionRansac::default(),
    );

    let poses = trajectory(12);
    for truth in &poses {
        vo.process(truth)?;
    }
    let truth = poses[poses.len() - 1];
    let estimate = vo.curr_to_world_2d();
    assert!((estimate.yaw() - truth.yaw()).abs() < 0.01);
    assert!(estimate.t.distance(truth.t) < 0.1, "{estimate:?} vs {truth:?}");
    Ok(())
}

#[test]
fn test_no_ground_points_fails() -> Result<(), VoError> {
    let mut vo = odometry(
        VoParams::default(),
        Landmark::far_ring(72, 0.1),
        PlaneMotionRansac::default(),
    );
    let poses = trajectory(2);

    vo.process(&poses[0])?;
    assert!(vo.tracker().num_tracks() > 0);

    let before = vo.curr_to_world_2d();
    assert_eq!(
        vo.process(&poses[1]),
        Err(VoError::PlaneMotion(PlaneMotionError::NotEnoughSamples {
            required: 3,
            actual: 0
        }))
    );
    assert_eq!(vo.curr_to_world_2d(), before);
    Ok(())
}

#[test]
fn test_reset_restarts_at_origin() -> Result<(), VoError> {
    let mut vo = odometry(VoParams::default(), scene(true), PlaneMotionRansac::default());
    let poses = trajectory(5);
    for truth in &poses {
        vo.process(truth)?;
    }
    assert!(vo.curr_to_world_2d().t.length() > 0.5);

    vo.reset();
    assert_eq!(vo.tick(), 0);
    assert_eq!(vo.curr_to_world_2d(), SE2::IDENTITY);
    assert_eq!(vo.tracker().num_tracks(), 0);

    // the world frame is redefined by the first frame after a reset
    vo.process(&poses[4])?;
    assert_eq!(vo.tick(), 1);
    assert_eq!(vo.curr_to_world_2d(), SE2::IDENTITY);
    vo.process(&poses[4])?;
    assert_pose_eq(&vo.curr_to_world_2d(), &SE2::IDENTITY, 1e-9);
    Ok(())
}

/// Reports the first correspondence as an outlier on every frame.
struct RejectFirst(PlaneMotionRansac);

impl PlaneMotionMatcher for RejectFirst {
    fn fit(
        &mut self,
        samples: &[PlanePtPixel],
        projection: &CameraPlaneProjection,
    ) -> Result<PlaneMotionFit, PlaneMotionError> {
        let mut fit = self.0.fit(samples, projection)?;
        fit.inliers.retain(|&i| i != 0);
        Ok(fit)
    }
}

#[test]
fn test_outliers_are_retired() -> Result<(), VoError> {
    let params = VoParams {
        threshold_add: 5,
        threshold_retire: 2,
        ..Default::default()
    };
    let mut vo = odometry(params, scene(false), RejectFirst(PlaneMotionRansac::default()));
    let still = SE2::IDENTITY;

    vo.process(&still)?;
    let victim: TrackId = vo.tracker().active_tracks()[0].id;
    assert!(vo.is_inlier(victim));

    for tick in 2..=3 {
        vo.process(&still)?;
        assert_eq!(vo.tick(), tick);
        assert!(!vo.is_inlier(victim));
        assert!(vo.track(victim).is_some());
        assert_eq!(vo.frame_stats().dropped, 0);
    }

    vo.process(&still)?;
    assert_eq!(vo.frame_stats().dropped, 1);
    assert!(vo.track(victim).is_none());
    assert!(vo
        .tracker()
        .all_tracks()
        .iter()
        .all(|t| t.id != victim));
    Ok(())
}

/// Reports a track it never spawned.
struct RogueTracker;

impl PointTracker for RogueTracker {
    type Image = ();

    fn process(&mut self, _: &()) {}

    fn spawn_tracks(&mut self) {}

    fn new_tracks(&self) -> Vec<PointTrack> {
        Vec::new()
    }

    fn active_tracks(&self) -> Vec<PointTrack> {
        vec![PointTrack::new(7, DVec2::new(320.0, 400.0))]
    }

    fn all_tracks(&self) -> Vec<PointTrack> {
        self.active_tracks()
    }

    fn drop_track(&mut self, _: TrackId) -> bool {
        false
    }

    fn reset(&mut self) {}
}

#[test]
fn test_unannotated_track_is_an_error() -> Result<(), VoError> {
    let mut vo = MonoPlaneInfinity::new(
        VoParams::default(),
        intrinsic(),
        plane_to_camera(),
        RogueTracker,
        PlaneMotionRansac::default(),
    );
    vo.process(&())?;
    assert_eq!(vo.process(&()), Err(VoError::MissingAnnotation(7)));
    Ok(())
}

use argh::FromArgs;
use glam::{DMat3, DVec2, DVec3};
use serde::Deserialize;
use std::path::PathBuf;

use kornia_lie::se2::SE2;
use kornia_lie::se3::SE3;
use kornia_vo::synthetic::{Landmark, SyntheticTracker};
use kornia_vo::{CameraIntrinsic, MonoPlaneInfinity, PlaneMotionRansac, RansacParams, VoParams};

#[derive(FromArgs)]
/// Drive a simulated vehicle over a flat ground and report the odometry drift
struct Args {
    /// number of frames to simulate
    #[argh(option, short = 'n', default = "200")]
    num_frames: usize,

    /// forward motion per frame, in meters
    #[argh(option, default = "0.2")]
    step: f64,

    /// yaw rate per frame, in radians
    #[argh(option, default = "0.01")]
    yaw_step: f64,

    /// uniform pixel noise amplitude
    #[argh(option, default = "0.5")]
    noise: f64,

    /// seed of the pixel noise
    #[argh(option, default = "0")]
    seed: u64,

    /// optional JSON file with the odometry and RANSAC parameters
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    odometry: VoParams,
    ransac: RansacParams,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => serde_json::from_reader(std::fs::File::open(path)?)?,
        None => Config::default(),
    };
    log::info!("{config:?}");

    // camera 1.5m above the ground, pitched slightly down
    let intrinsic = CameraIntrinsic::new(500.0, 500.0, 320.0, 240.0);
    let plane_to_camera = SE3::from_axis_angle(DVec3::X, 0.05, DVec3::ZERO)
        * SE3::new(DMat3::IDENTITY, DVec3::new(0.0, 1.5, 0.0));

    // a field of ground points around the whole path plus a far horizon
    let mut landmarks =
        Landmark::ground_grid(DVec2::new(-60.0, -60.0), DVec2::new(60.0, 60.0), 1.0);
    landmarks.extend(Landmark::far_ring(360, 0.05));

    let tracker = SyntheticTracker::new(intrinsic, plane_to_camera, (640, 480), landmarks)
        .with_pixel_noise(args.noise, args.seed);
    let mut vo = MonoPlaneInfinity::new(
        config.odometry,
        intrinsic,
        plane_to_camera,
        tracker,
        PlaneMotionRansac::new(config.ransac),
    );

    let step = SE2::from_yaw(args.yaw_step, DVec2::new(args.step, 0.0));
    let mut truth = SE2::IDENTITY;
    let mut distance = 0.0;
    let mut key_frames = 0;

    for frame in 0..args.num_frames {
        if frame > 0 {
            truth = truth * step;
            distance += args.step;
        }

        if let Err(err) = vo.process(&truth) {
            log::error!("frame {frame}: {err}");
            return Err(err.into());
        }
        if vo.frame_stats().new_key_frame {
            key_frames += 1;
        }

        let estimate = vo.curr_to_world_2d();
        log::debug!(
            "frame {frame}: estimate ({:.3}, {:.3}, {:.4}) truth ({:.3}, {:.3}, {:.4})",
            estimate.t.x,
            estimate.t.y,
            estimate.yaw(),
            truth.t.x,
            truth.t.y,
            truth.yaw()
        );
    }

    let estimate = vo.curr_to_world_2d();
    let error = estimate.t.distance(truth.t);
    println!("frames: {}, key frames: {key_frames}", args.num_frames);
    println!(
        "final position error: {error:.4} m ({:.2}% of {distance:.1} m)",
        100.0 * error / distance.max(f64::EPSILON)
    );
    println!(
        "final yaw error: {:.5} rad",
        (estimate.r * truth.r.inverse()).log().abs()
    );

    Ok(())
}

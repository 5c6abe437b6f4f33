#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics with polynomial lens distortion.
pub mod camera;

/// Odometry parameters.
pub mod config;

/// Error types for the odometry.
pub mod error;

/// Rotation estimation from points at infinity.
pub mod far;

/// Plane plus infinity visual odometry.
pub mod odometry;

/// Projection between the image and the ground plane.
pub mod plane;

/// Robust estimation of the ground plane motion.
pub mod plane_motion;

/// Simulated tracker for tests, benchmarks and demos.
pub mod synthetic;

/// Per track motion state.
pub mod track;

/// Point tracker interface.
pub mod tracker;

pub use camera::{CameraIntrinsic, PolynomialDistortion};
pub use config::VoParams;
pub use error::VoError;
pub use odometry::{FrameStats, MonoPlaneInfinity};
pub use plane_motion::{PlaneMotionMatcher, PlaneMotionRansac, RansacParams};
pub use tracker::{PointTrack, PointTracker, TrackId};

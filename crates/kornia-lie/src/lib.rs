#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Kornia Lie Groups
//!
//! Double precision rotations and rigid body transformations used by the
//! odometry crates. Everything is `f64`: poses are chained over thousands of
//! frames and single precision drifts visibly.
//!
//! ## Supported Groups
//!
//! - **SO(2)**: 2D rotation group
//! - **SE(2)**: 2D rigid body transformations (rotation + translation)
//! - **SE(3)**: 3D rigid body transformations (rotation matrix + translation)
//!
//! ## Composition
//!
//! `a * b` applies `b` first and then `a`, so a chain reads right to left:
//!
//! ```rust
//! use glam::DVec2;
//! use kornia_lie::se2::SE2;
//!
//! let key_to_world = SE2::from_yaw(0.5, DVec2::new(1.0, 0.0));
//! let curr_to_key = SE2::from_yaw(0.1, DVec2::new(0.2, 0.0));
//! let curr_to_world = key_to_world * curr_to_key;
//! let origin = curr_to_world * DVec2::ZERO;
//! ```

/// Special Euclidean group SE(2) for 2D rigid transformations.
pub mod se2;

/// Special Euclidean group SE(3) for 3D rigid transformations.
pub mod se3;

/// Special Orthogonal group SO(2) for 2D rotations.
pub mod so2;

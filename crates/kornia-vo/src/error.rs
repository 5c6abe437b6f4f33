use crate::plane_motion::PlaneMotionError;
use crate::tracker::TrackId;

/// Errors that can occur while estimating the camera motion.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VoError {
    /// The motion of the ground plane could not be estimated for this frame.
    ///
    /// The odometry must be reset before processing more frames.
    #[error("Ground plane motion estimation failed: {0}")]
    PlaneMotion(#[from] PlaneMotionError),

    /// The tracker reported a track that was never spawned through the odometry.
    #[error("Track {0} has no motion annotation")]
    MissingAnnotation(TrackId),
}

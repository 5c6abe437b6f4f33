use glam::DVec2;

/// Stable identifier the tracker assigns to a track for its whole life.
pub type TrackId = usize;

/// A point feature observed in the most recent image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointTrack {
    /// Identifier, unique among the tracks the tracker has ever spawned.
    pub id: TrackId,
    /// Pixel coordinate in the most recent image.
    pub pixel: DVec2,
}

impl PointTrack {
    /// Creates a track observation.
    pub fn new(id: TrackId, pixel: DVec2) -> Self {
        Self { id, pixel }
    }
}

/// Sparse point feature tracker driven by the odometry.
///
/// Implementations detect features, follow them from image to image and hand
/// out observations. Tracks that could not be followed in the latest image are
/// not active but may still be reported by [`PointTracker::all_tracks`] until
/// dropped.
pub trait PointTracker {
    /// Image type consumed by the tracker.
    type Image: ?Sized;

    /// Updates every track with a new image.
    fn process(&mut self, image: &Self::Image);

    /// Detects new features in the most recent image.
    fn spawn_tracks(&mut self);

    /// Tracks created by the most recent call to [`PointTracker::spawn_tracks`].
    fn new_tracks(&self) -> Vec<PointTrack>;

    /// Tracks that were successfully updated by the most recent image.
    fn active_tracks(&self) -> Vec<PointTrack>;

    /// Every track the tracker currently holds, active or not.
    fn all_tracks(&self) -> Vec<PointTrack>;

    /// Discards a track. Returns false if the track was unknown.
    fn drop_track(&mut self, id: TrackId) -> bool;

    /// Drops every track and returns to the initial state.
    fn reset(&mut self);
}

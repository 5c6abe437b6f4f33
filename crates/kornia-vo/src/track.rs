use std::collections::{HashMap, HashSet};

use glam::DVec2;

use crate::tracker::TrackId;

/// Motion estimation state attached to a tracker track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoTrack {
    /// True for a point on the ground plane, false for a point at infinity.
    pub on_plane: bool,
    /// Plane coordinate of a ground point, or unit ground direction of a far
    /// point. Expressed in the current key frame.
    pub ground: DVec2,
    /// Out of plane component of a far point's pointing vector at spawn time,
    /// scaled so the horizontal components have unit length.
    pub pointing_y: f64,
    /// Tick in which the track was last an inlier.
    pub last_inlier: u64,
}

impl VoTrack {
    /// Annotation for a track lying on the ground plane.
    pub fn on_plane(ground: DVec2, tick: u64) -> Self {
        Self {
            on_plane: true,
            ground,
            pointing_y: 0.0,
            last_inlier: tick,
        }
    }

    /// Annotation for a track at infinity.
    pub fn at_infinity(direction: DVec2, pointing_y: f64, tick: u64) -> Self {
        Self {
            on_plane: false,
            ground: direction,
            pointing_y,
            last_inlier: tick,
        }
    }

    /// Records that the track was an inlier at `tick`.
    pub fn mark_inlier(&mut self, tick: u64) {
        self.last_inlier = self.last_inlier.max(tick);
    }

    /// True once the track has gone more than `threshold_retire` ticks without being an inlier.
    pub fn is_stale(&self, tick: u64, threshold_retire: u64) -> bool {
        tick.saturating_sub(self.last_inlier) > threshold_retire
    }
}

/// Side table of [`VoTrack`] annotations keyed by tracker id.
#[derive(Debug, Default, Clone)]
pub struct TrackTable {
    tracks: HashMap<TrackId, VoTrack>,
}

impl TrackTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the annotation of a freshly spawned track.
    ///
    /// Annotations are never replaced: if `id` is already annotated the
    /// existing entry is kept and false is returned.
    pub fn annotate(&mut self, id: TrackId, track: VoTrack) -> bool {
        if self.tracks.contains_key(&id) {
            return false;
        }
        self.tracks.insert(id, track);
        true
    }

    /// Annotation of a track.
    pub fn get(&self, id: TrackId) -> Option<&VoTrack> {
        self.tracks.get(&id)
    }

    /// Mutable annotation of a track.
    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut VoTrack> {
        self.tracks.get_mut(&id)
    }

    /// Removes the annotation of a dropped track.
    pub fn remove(&mut self, id: TrackId) -> Option<VoTrack> {
        self.tracks.remove(&id)
    }

    /// Keeps only the annotations whose ids are in `alive`.
    pub fn retain_alive(&mut self, alive: &HashSet<TrackId>) {
        self.tracks.retain(|id, _| alive.contains(id));
    }

    /// Ids of the tracks which are stale at `tick`, sorted.
    pub fn stale(&self, tick: u64, threshold_retire: u64) -> Vec<TrackId> {
        let mut ids = self
            .tracks
            .iter()
            .filter(|(_, t)| t.is_stale(tick, threshold_retire))
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Iterates over every annotation.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&TrackId, &mut VoTrack)> {
        self.tracks.iter_mut()
    }

    /// Number of annotated tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if no track is annotated.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Removes every annotation.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

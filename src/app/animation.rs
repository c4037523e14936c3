use crate::scene::EntityId;
use glam::DVec3;

pub const DEFAULT_DURATION_SECS: f64 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum AnimationError {
    #[error("animation only works in Preview mode with a selected object")]
    NotAvailable,
    #[error("please enter valid coordinates")]
    InvalidTarget,
    #[error("animation duration must be a positive number of seconds")]
    InvalidDuration,
}

pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Moves one entity from `start` to `target` over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAnimation {
    pub entity: EntityId,
    start: DVec3,
    target: DVec3,
    duration: f64,
    elapsed: f64,
}

impl PositionAnimation {
    /// `duration` of `None` uses the two second default.
    pub fn new(
        entity: EntityId,
        start: DVec3,
        target: DVec3,
        duration: Option<f64>,
    ) -> Result<Self, AnimationError> {
        if !target.is_finite() {
            return Err(AnimationError::InvalidTarget);
        }
        let duration = duration.unwrap_or(DEFAULT_DURATION_SECS);
        if !(duration.is_finite() && duration > 0.0) {
            return Err(AnimationError::InvalidDuration);
        }
        Ok(Self {
            entity,
            start,
            target,
            duration,
            elapsed: 0.0,
        })
    }

    pub fn target(&self) -> DVec3 {
        self.target
    }

    /// Advances by `dt` and returns the new position and whether the animation finished.
    /// The last step lands exactly on the target.
    pub fn step(&mut self, dt: f64) -> (DVec3, bool) {
        self.elapsed += dt.max(0.0);
        let progress = (self.elapsed / self.duration).min(1.0);
        if progress >= 1.0 {
            return (self.target, true);
        }
        let eased = ease_in_out_cubic(progress);
        (self.start.lerp(self.target, eased), false)
    }
}

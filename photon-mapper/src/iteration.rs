use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationState {
    Accumulating,
    ResetPending,
}

/// Optional cut-off after which no further iterations get issued until the
/// next reset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IterationLimits {
    pub duration: Option<Duration>,
    pub max_iterations: Option<u32>,
}

/// Keeps track of how many iterations have been accumulated since the last
/// reset.
///
/// Reset triggers are edge-triggered: any number of them raised before the
/// next [`Self::begin_frame()`] collapse into a single reset.
#[derive(Debug)]
pub struct IterationController {
    state: IterationState,
    frame_count: u32,
    started_at: Option<Instant>,
    always_reset: bool,
    limits: IterationLimits,
}

impl IterationController {
    pub fn new() -> Self {
        Self {
            state: IterationState::ResetPending,
            frame_count: 0,
            started_at: None,
            always_reset: false,
            limits: Default::default(),
        }
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn request_reset(&mut self) {
        self.state = IterationState::ResetPending;
    }

    pub fn set_always_reset(&mut self, always_reset: bool) {
        self.always_reset = always_reset;
    }

    pub fn set_limits(&mut self, limits: IterationLimits) {
        self.limits = limits;
    }

    /// Consumes pending reset triggers; returns whether the frame counter
    /// has been zeroed.
    pub fn begin_frame(&mut self, camera_moved: bool, now: Instant) -> bool {
        if camera_moved || self.always_reset {
            self.state = IterationState::ResetPending;
        }

        if self.state == IterationState::Accumulating {
            return false;
        }

        self.state = IterationState::Accumulating;
        self.frame_count = 0;
        self.started_at = Some(now);

        true
    }

    /// Marks one iteration as accumulated and returns the new frame count.
    pub fn complete_iteration(&mut self) -> u32 {
        self.frame_count += 1;
        self.frame_count
    }

    /// Whether the configured cut-off has been reached; checked at iteration
    /// boundaries only.
    pub fn is_finished(&self, now: Instant) -> bool {
        if let Some(max) = self.limits.max_iterations {
            if self.frame_count >= max {
                return true;
            }
        }

        if let (Some(duration), Some(started_at)) =
            (self.limits.duration, self.started_at)
        {
            if now.saturating_duration_since(started_at) >= duration {
                return true;
            }
        }

        false
    }
}

impl Default for IterationController {
    fn default() -> Self {
        Self::new()
    }
}

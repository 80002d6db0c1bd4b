use std::{num::NonZeroU32, time::Duration};

/// Default bound on host waits (fence waits and image acquisition).
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of a `FrameOrchestrator`.
#[derive(Clone, Debug)]
pub struct FrameConfig {
    /// Maximum time to wait for the fence of a frame slot. `None` waits forever.
    pub fence_timeout: Option<Duration>,
    /// Maximum time to wait for a presentable image. `None` waits forever.
    pub acquire_timeout: Option<Duration>,
    /// Number of frame slots. `None` allocates one slot per presentable image; otherwise the
    /// value is clamped to the image count.
    pub frames_in_flight: Option<NonZeroU32>,
    /// Check the layouts declared by passes against the tracked layout of each image.
    pub validate_states: bool,
    /// Wrap the commands of each pass in a debug label named after the pass.
    pub debug_labels: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            fence_timeout: Some(DEFAULT_WAIT_TIMEOUT),
            acquire_timeout: Some(DEFAULT_WAIT_TIMEOUT),
            frames_in_flight: None,
            validate_states: true,
            debug_labels: false,
        }
    }
}

impl FrameConfig {
    pub fn fence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fence_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn frames_in_flight(mut self, count: Option<NonZeroU32>) -> Self {
        self.frames_in_flight = count;
        self
    }

    pub fn validate_states(mut self, enabled: bool) -> Self {
        self.validate_states = enabled;
        self
    }

    pub fn debug_labels(mut self, enabled: bool) -> Self {
        self.debug_labels = enabled;
        self
    }

    /// Number of frame slots to allocate for a surface with `image_count` images.
    pub fn slot_count(&self, image_count: u32) -> u32 {
        match self.frames_in_flight {
            Some(n) => n.get().min(image_count),
            None => image_count,
        }
    }
}

//! Passes: ordered units of recorded work.
use crate::{ImageTransition, ResourceState};
use std::fmt;

/// Records the commands of a pass, given the command recorder of the frame and the index of the
/// acquired presentable image.
///
/// The callback must not keep the recorder or the index past the call, and must not
/// synchronize on its own: barriers around the pass are emitted by the orchestrator.
pub type RecordCallback<'a, R> = Box<dyn FnMut(&mut R, u32) + 'a>;

/// A unit of work executed every frame, in registration order.
///
/// A pass optionally declares a layout transition of the presentable image, which is emitted as a
/// barrier right before its commands are recorded. A pass without a record callback only emits its
/// barrier.
pub struct Pass<'a, R> {
    /// Name of this pass, for debugging purposes.
    name: String,
    /// Layout transition applied before recording. No barrier if `old_layout == new_layout`.
    transition: ImageTransition,
    record: Option<RecordCallback<'a, R>>,
}

impl<'a, R> Pass<'a, R> {
    /// Creates a pass with no transition and no commands.
    pub fn new(name: impl Into<String>) -> Pass<'a, R> {
        Pass {
            name: name.into(),
            transition: ImageTransition::NONE,
            record: None,
        }
    }

    /// Creates a pass that only transitions the presentable image.
    pub fn transition(name: impl Into<String>, transition: ImageTransition) -> Pass<'a, R> {
        Pass::new(name).with_transition(transition)
    }

    pub fn with_transition(mut self, transition: ImageTransition) -> Pass<'a, R> {
        self.transition = transition;
        self
    }

    /// Shorthand for `with_transition(ImageTransition::between(from, to))`.
    pub fn with_states(self, from: ResourceState, to: ResourceState) -> Pass<'a, R> {
        self.with_transition(ImageTransition::between(from, to))
    }

    pub fn with_record(mut self, record: impl FnMut(&mut R, u32) + 'a) -> Pass<'a, R> {
        self.record = Some(Box::new(record));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_transition(&self) -> &ImageTransition {
        &self.transition
    }

    pub fn has_record_callback(&self) -> bool {
        self.record.is_some()
    }

    /// Returns the transition to emit before this pass, if any.
    pub(crate) fn barrier_transition(&self) -> Option<ImageTransition> {
        if self.transition.is_noop() {
            None
        } else {
            Some(self.transition)
        }
    }

    pub(crate) fn record(&mut self, recorder: &mut R, image_index: u32) {
        if let Some(ref mut record) = self.record {
            record(recorder, image_index)
        }
    }
}

impl<'a, R> fmt::Debug for Pass<'a, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("transition", &self.transition)
            .field("has_record_callback", &self.record.is_some())
            .finish()
    }
}

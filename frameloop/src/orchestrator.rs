//! Acquire → record → submit → present.
use crate::{
    backend::{CommandRecorder, Device, PresentRequest, PresentStatus, Queue, SemaphoreWait, Submission, Surface},
    frame::FrameSlot,
    tracker::StateTracker,
    vk, Error, FrameConfig, ImageBarrier, Pass, Result,
};
use std::mem;
use tracing::{debug, info, trace_span, warn};

/// Outcome of `FrameOrchestrator::execute_frame`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameInfo {
    /// Value of the frame counter when the frame started.
    pub frame_number: u64,
    /// Frame slot used by the frame.
    pub frame_index: u32,
    /// Index of the presentable image that was rendered to.
    pub image_index: u32,
    /// The surface reported itself as suboptimal during acquisition or presentation.
    pub suboptimal: bool,
}

/// Drives the frame loop over a fixed list of passes.
///
/// The orchestrator borrows the device, surface, queues and command pool; it only owns the
/// resources of its frame slots (command recorders, semaphores and fences), which are released when
/// it is dropped. Dropping does not wait for the device: the caller must make sure the device is
/// idle first (see `wait_for_all_frames`).
pub struct FrameOrchestrator<'a, D: Device, S: Surface<D>, Q: Queue<D, S>> {
    device: &'a D,
    surface: &'a S,
    graphics_queue: &'a Q,
    present_queue: &'a Q,
    command_pool: &'a D::CommandPool,
    config: FrameConfig,
    /// Executed in this order every frame.
    passes: Vec<Pass<'a, D::CommandRecorder>>,
    /// Empty until `init`.
    slots: Vec<FrameSlot<D>>,
    tracker: StateTracker,
    frame_counter: u64,
}

impl<'a, D: Device, S: Surface<D>, Q: Queue<D, S>> FrameOrchestrator<'a, D, S, Q> {
    pub fn new(
        device: &'a D,
        surface: &'a S,
        graphics_queue: &'a Q,
        present_queue: &'a Q,
        command_pool: &'a D::CommandPool,
    ) -> FrameOrchestrator<'a, D, S, Q> {
        Self::with_config(
            device,
            surface,
            graphics_queue,
            present_queue,
            command_pool,
            FrameConfig::default(),
        )
    }

    pub fn with_config(
        device: &'a D,
        surface: &'a S,
        graphics_queue: &'a Q,
        present_queue: &'a Q,
        command_pool: &'a D::CommandPool,
        config: FrameConfig,
    ) -> FrameOrchestrator<'a, D, S, Q> {
        FrameOrchestrator {
            device,
            surface,
            graphics_queue,
            present_queue,
            command_pool,
            config,
            passes: vec![],
            slots: vec![],
            tracker: StateTracker::new(0),
            frame_counter: 0,
        }
    }

    /// Appends a pass. Passes are executed in the order they are added.
    pub fn add_pass(&mut self, pass: Pass<'a, D::CommandRecorder>) {
        debug!(name = pass.name(), index = self.passes.len(), "add_pass");
        self.passes.push(pass);
    }

    /// Allocates the frame slots: one command recorder, two semaphores and a signaled fence each.
    ///
    /// Must be called once, after the surface images exist. Fails with `Error::StateMismatch`,
    /// before allocating anything, if the layouts declared by the passes do not chain.
    pub fn init(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        let image_count = self.surface.image_count();
        if image_count == 0 {
            return Err(Error::NoSurfaceImages);
        }
        if self.config.validate_states {
            StateTracker::new(image_count).validate(&self.passes)?;
        }
        let slot_count = self.config.slot_count(image_count);
        self.slots = FrameSlot::allocate(self.device, self.command_pool, slot_count)?;
        self.tracker = StateTracker::new(image_count);
        info!(image_count, slot_count, passes = self.passes.len(), "frame orchestrator initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Acquires an image, records every pass into the command recorder of the current frame slot,
    /// submits it and presents the image.
    ///
    /// Returns once submission and presentation have been issued; the GPU work may still be
    /// running. Blocks while the frame slot is still in use by the GPU (frame pacing), or while
    /// no image can be acquired, each bounded by the timeouts in the `FrameConfig`.
    pub fn execute_frame(&mut self) -> Result<FrameInfo> {
        let frame_number = self.frame_counter;
        let frame_index = self.frame_index_for(frame_number).ok_or(Error::NotInitialized)?;
        let _span = trace_span!("execute_frame", frame_number, frame_index).entered();

        // A broken pass chain must fail before an image is acquired into the slot's semaphore.
        if self.config.validate_states {
            self.tracker.validate(&self.passes)?;
        }

        let slot = &mut self.slots[frame_index as usize];

        // frame pacing: the previous submission that used this slot must have retired
        {
            let _span = trace_span!("wait_for_fence").entered();
            self.device
                .wait_for_fence(&slot.in_flight_fence, self.config.fence_timeout)
                .map_err(|err| report("frame slot fence wait", frame_index, err))?;
        }

        let acquired = self
            .surface
            .acquire_next_image(self.config.acquire_timeout, &slot.image_available)
            .map_err(|err| report("image acquisition", frame_index, err))?;
        let image_index = acquired.index;
        let image = self.surface.images()[image_index as usize];

        let final_layout = if self.config.validate_states {
            debug_assert!(self.tracker.resolve(image_index, &self.passes).is_ok());
            Some(self.tracker.final_layout(image_index, &self.passes))
        } else {
            None
        };

        let recorder = &mut slot.command_recorder;
        recorder.reset()?;
        recorder.begin()?;
        for pass in self.passes.iter_mut() {
            let _span = trace_span!("pass", name = pass.name()).entered();
            if self.config.debug_labels {
                recorder.begin_debug_label(pass.name());
            }
            if let Some(transition) = pass.barrier_transition() {
                recorder.pipeline_barrier(&ImageBarrier::color(image, transition));
            }
            pass.record(recorder, image_index);
            if self.config.debug_labels {
                recorder.end_debug_label();
            }
        }
        recorder.end()?;

        // Reset right before submitting, recording may take a while.
        self.device.reset_fence(&slot.in_flight_fence)?;
        self.graphics_queue
            .submit(&Submission {
                command_recorder: &slot.command_recorder,
                wait: SemaphoreWait {
                    semaphore: &slot.image_available,
                    dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                },
                signal: &slot.work_complete,
                fence: &slot.in_flight_fence,
            })
            .map_err(|err| report("submission", frame_index, err))?;

        // the slot is in flight from here on
        if let Some(layout) = final_layout {
            self.tracker.commit(image_index, layout);
        }
        self.frame_counter += 1;

        let status = self
            .present_queue
            .present(&PresentRequest {
                wait: &slot.work_complete,
                surface: self.surface,
                image_index,
            })
            .map_err(|err| report("presentation", frame_index, err))?;

        Ok(FrameInfo {
            frame_number,
            frame_index,
            image_index,
            suboptimal: acquired.suboptimal || status == PresentStatus::Suboptimal,
        })
    }

    /// Blocks until the GPU work of every frame slot has completed.
    ///
    /// Not called internally; use before dropping the orchestrator if the device may still be busy.
    pub fn wait_for_all_frames(&self) -> Result<()> {
        for (i, slot) in self.slots.iter().enumerate() {
            self.device
                .wait_for_fence(&slot.in_flight_fence, self.config.fence_timeout)
                .map_err(|err| report("frame slot fence wait", i as u32, err))?;
        }
        Ok(())
    }

    /// Frame slot used by the frame with the given frame counter value, or `None` before `init`.
    pub fn frame_index_for(&self, frame_number: u64) -> Option<u32> {
        frame_number
            .checked_rem(self.slots.len() as u64)
            .map(|index| index as u32)
    }

    /// Number of frames started so far.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Resources of a frame slot, or `None` before `init`.
    pub fn slot(&self, frame_index: u32) -> Option<&FrameSlot<D>> {
        self.slots.get(frame_index as usize)
    }

    pub fn image_count(&self) -> u32 {
        self.surface.image_count()
    }

    pub fn image_view(&self, image_index: u32) -> Option<vk::ImageView> {
        self.surface.image_views().get(image_index as usize).copied()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.surface.extent()
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.passes.iter().map(|p| p.name())
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Tracked layout of a presentable image.
    pub fn image_layout(&self, image_index: u32) -> Option<vk::ImageLayout> {
        if image_index < self.surface.image_count() && self.is_initialized() {
            Some(self.tracker.layout(image_index))
        } else {
            None
        }
    }
}

impl<'a, D: Device, S: Surface<D>, Q: Queue<D, S>> Drop for FrameOrchestrator<'a, D, S, Q> {
    fn drop(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        debug!("releasing {} frame slots", self.slots.len());
        FrameSlot::release_all(self.device, self.command_pool, mem::take(&mut self.slots));
    }
}

fn report(operation: &str, frame_index: u32, err: Error) -> Error {
    match err {
        Error::Timeout => warn!(frame_index, "{} timed out", operation),
        Error::DeviceLost => warn!(frame_index, "device lost during {}", operation),
        ref other => debug!(frame_index, "{} failed: {}", operation, other),
    }
    err
}

//! Capabilities the frame orchestrator expects from the device, the presentable surface and the queues.
//!
//! The orchestrator never creates or destroys these objects: the application sets them up, hands
//! references to the orchestrator, and tears them down once the device is idle.
use crate::{vk, ImageBarrier, Result};
use std::time::Duration;

/// A device that can allocate command recorders and synchronization primitives.
pub trait Device {
    /// Pool that command recorders are allocated from.
    type CommandPool;
    type CommandRecorder: CommandRecorder;
    /// GPU-side binary semaphore.
    type Semaphore;
    /// Host-observable completion flag.
    type Fence;

    fn allocate_command_recorders(&self, pool: &Self::CommandPool, count: u32) -> Result<Vec<Self::CommandRecorder>>;
    fn free_command_recorders(&self, pool: &Self::CommandPool, recorders: Vec<Self::CommandRecorder>);

    fn create_semaphore(&self) -> Result<Self::Semaphore>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);

    /// Creates a fence, optionally in the signaled state.
    fn create_fence(&self, signaled: bool) -> Result<Self::Fence>;
    fn destroy_fence(&self, fence: Self::Fence);

    /// Blocks until the fence is signaled, or until `timeout` expires (`Error::Timeout`).
    /// `None` waits forever.
    fn wait_for_fence(&self, fence: &Self::Fence, timeout: Option<Duration>) -> Result<()>;
    fn reset_fence(&self, fence: &Self::Fence) -> Result<()>;
}

/// Records commands for one submission. Reset and re-recorded every time its frame slot comes up.
pub trait CommandRecorder {
    fn reset(&mut self) -> Result<()>;
    fn begin(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn pipeline_barrier(&mut self, barrier: &ImageBarrier);

    fn begin_debug_label(&mut self, _name: &str) {}
    fn end_debug_label(&mut self) {}
}

/// An acquired presentable image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AcquiredImage {
    /// Index of the image in the surface.
    pub index: u32,
    /// The surface still works but doesn't match the window exactly anymore.
    pub suboptimal: bool,
}

/// A rotating set of presentable images.
pub trait Surface<D: Device> {
    fn images(&self) -> &[vk::Image];

    fn image_count(&self) -> u32 {
        self.images().len() as u32
    }

    fn image_views(&self) -> &[vk::ImageView];

    fn extent(&self) -> vk::Extent2D;

    /// Requests the next image, signaling `signal` once it is ready to be rendered to.
    ///
    /// The returned index is not necessarily the next one in round-robin order.
    fn acquire_next_image(&self, timeout: Option<Duration>, signal: &D::Semaphore) -> Result<AcquiredImage>;
}

/// Semaphore wait operation of a submission.
pub struct SemaphoreWait<'a, D: Device> {
    pub semaphore: &'a D::Semaphore,
    /// Stages of the submission that must wait on the semaphore.
    pub dst_stage: vk::PipelineStageFlags,
}

/// A recorded unit of work and its dependencies.
pub struct Submission<'a, D: Device> {
    pub command_recorder: &'a D::CommandRecorder,
    pub wait: SemaphoreWait<'a, D>,
    /// Signaled when the work completes.
    pub signal: &'a D::Semaphore,
    /// Signaled when the work completes.
    pub fence: &'a D::Fence,
}

/// Request to present an image of a surface.
pub struct PresentRequest<'a, D: Device, S> {
    pub wait: &'a D::Semaphore,
    pub surface: &'a S,
    pub image_index: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
}

/// A queue accepting submissions and presentation requests.
pub trait Queue<D: Device, S: Surface<D>> {
    fn submit(&self, submission: &Submission<D>) -> Result<()>;
    fn present(&self, request: &PresentRequest<D, S>) -> Result<PresentStatus>;
}

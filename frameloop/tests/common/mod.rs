//! Mock device, surface and queue that log every operation and simulate the GPU timeline.
//!
//! Submitted work never completes on its own: a submission retires (and signals its fence) when the
//! host waits on that fence, oldest submission first, as a GPU executing in order would.
#![allow(dead_code)]

use frameloop::{
    vk::{self, Handle},
    AcquiredImage, CommandRecorder, Device, Error, ImageBarrier, PresentRequest, PresentStatus, Queue, Result,
    Submission, Surface,
};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    AllocateRecorders { count: u32 },
    FreeRecorders { ids: Vec<usize> },
    CreateSemaphore(usize),
    DestroySemaphore(usize),
    CreateFence { id: usize, signaled: bool },
    DestroyFence(usize),
    WaitFence(usize),
    FenceSignaled(usize),
    ResetFence(usize),
    Acquire { semaphore: usize, image_index: u32 },
    ResetRecorder(usize),
    Begin(usize),
    Barrier {
        recorder: usize,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    },
    Draw { recorder: usize, pass: &'static str, image_index: u32 },
    End(usize),
    BeginLabel { recorder: usize, name: String },
    EndLabel(usize),
    Submit {
        recorder: usize,
        wait: usize,
        wait_stage: vk::PipelineStageFlags,
        signal: usize,
        fence: usize,
    },
    Present { wait: usize, image_index: u32 },
}

#[derive(Default)]
pub struct MockState {
    pub events: Vec<Event>,
    /// Signaled state of each fence, indexed by fence id.
    pub fences: Vec<bool>,
    /// Fences of submissions that haven't retired yet, oldest first.
    pub pending: VecDeque<usize>,
    pub max_outstanding: usize,
    pub barriers: Vec<ImageBarrier>,
    next_semaphore: usize,
    next_recorder: usize,
    live_semaphores: usize,
    live_fences: usize,
    live_recorders: usize,
    /// The GPU makes no progress: waits on unsignaled fences time out.
    pub hung: bool,
    /// The GPU reports device loss on the next wait.
    pub lost: bool,
    /// Number of semaphores that can still be created, if limited.
    pub semaphore_budget: Option<usize>,
    pub present_status: Option<PresentStatus>,
    pub present_error: Option<vk::Result>,
    pub acquire_suboptimal: bool,
}

impl MockState {
    fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    fn retire_oldest(&mut self) -> Option<usize> {
        let fence = self.pending.pop_front()?;
        self.fences[fence] = true;
        self.log(Event::FenceSignaled(fence));
        Some(fence)
    }
}

pub type SharedState = Rc<RefCell<MockState>>;

////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct MockPool;

#[derive(Debug)]
pub struct MockSemaphore(pub usize);

#[derive(Debug)]
pub struct MockFence(pub usize);

pub struct MockRecorder {
    pub id: usize,
    state: SharedState,
    recording: bool,
}

impl MockRecorder {
    /// Stands in for the draw commands of a pass.
    pub fn draw(&mut self, pass: &'static str, image_index: u32) {
        assert!(self.recording, "draw outside of begin/end");
        self.state.borrow_mut().log(Event::Draw {
            recorder: self.id,
            pass,
            image_index,
        });
    }
}

impl CommandRecorder for MockRecorder {
    fn reset(&mut self) -> Result<()> {
        self.recording = false;
        self.state.borrow_mut().log(Event::ResetRecorder(self.id));
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        assert!(!self.recording, "begin on a recorder that is already recording");
        self.recording = true;
        self.state.borrow_mut().log(Event::Begin(self.id));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        assert!(self.recording, "end without begin");
        self.recording = false;
        self.state.borrow_mut().log(Event::End(self.id));
        Ok(())
    }

    fn pipeline_barrier(&mut self, barrier: &ImageBarrier) {
        assert!(self.recording, "barrier outside of begin/end");
        let mut state = self.state.borrow_mut();
        state.barriers.push(*barrier);
        state.log(Event::Barrier {
            recorder: self.id,
            image: barrier.image,
            old_layout: barrier.transition.old_layout,
            new_layout: barrier.transition.new_layout,
        });
    }

    fn begin_debug_label(&mut self, name: &str) {
        self.state.borrow_mut().log(Event::BeginLabel {
            recorder: self.id,
            name: name.to_string(),
        });
    }

    fn end_debug_label(&mut self) {
        self.state.borrow_mut().log(Event::EndLabel(self.id));
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct MockDevice {
    pub state: SharedState,
}

impl Device for MockDevice {
    type CommandPool = MockPool;
    type CommandRecorder = MockRecorder;
    type Semaphore = MockSemaphore;
    type Fence = MockFence;

    fn allocate_command_recorders(&self, _pool: &MockPool, count: u32) -> Result<Vec<MockRecorder>> {
        let mut state = self.state.borrow_mut();
        state.log(Event::AllocateRecorders { count });
        let first = state.next_recorder;
        state.next_recorder += count as usize;
        state.live_recorders += count as usize;
        Ok((first..first + count as usize)
            .map(|id| MockRecorder {
                id,
                state: self.state.clone(),
                recording: false,
            })
            .collect())
    }

    fn free_command_recorders(&self, _pool: &MockPool, recorders: Vec<MockRecorder>) {
        let mut state = self.state.borrow_mut();
        state.live_recorders -= recorders.len();
        state.log(Event::FreeRecorders {
            ids: recorders.iter().map(|r| r.id).collect(),
        });
    }

    fn create_semaphore(&self) -> Result<MockSemaphore> {
        let mut state = self.state.borrow_mut();
        if let Some(budget) = state.semaphore_budget {
            if budget == 0 {
                return Err(Error::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            state.semaphore_budget = Some(budget - 1);
        }
        let id = state.next_semaphore;
        state.next_semaphore += 1;
        state.live_semaphores += 1;
        state.log(Event::CreateSemaphore(id));
        Ok(MockSemaphore(id))
    }

    fn destroy_semaphore(&self, semaphore: MockSemaphore) {
        let mut state = self.state.borrow_mut();
        state.live_semaphores -= 1;
        state.log(Event::DestroySemaphore(semaphore.0));
    }

    fn create_fence(&self, signaled: bool) -> Result<MockFence> {
        let mut state = self.state.borrow_mut();
        let id = state.fences.len();
        state.fences.push(signaled);
        state.live_fences += 1;
        state.log(Event::CreateFence { id, signaled });
        Ok(MockFence(id))
    }

    fn destroy_fence(&self, fence: MockFence) {
        let mut state = self.state.borrow_mut();
        state.live_fences -= 1;
        state.log(Event::DestroyFence(fence.0));
    }

    fn wait_for_fence(&self, fence: &MockFence, _timeout: Option<Duration>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.log(Event::WaitFence(fence.0));
        if state.lost {
            return Err(Error::DeviceLost);
        }
        while !state.fences[fence.0] {
            if state.hung {
                return Err(Error::Timeout);
            }
            state
                .retire_oldest()
                .expect("waiting on a fence that was never submitted would block forever");
        }
        Ok(())
    }

    fn reset_fence(&self, fence: &MockFence) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.fences[fence.0] = false;
        state.log(Event::ResetFence(fence.0));
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct MockSurface {
    pub state: SharedState,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    /// Indices handed out by successive acquisitions, cycled. Round-robin if empty.
    pub acquire_order: Vec<u32>,
    acquisitions: Cell<usize>,
}

pub fn image_handle(index: u32) -> vk::Image {
    vk::Image::from_raw(0x1000 + index as u64)
}

impl Surface<MockDevice> for MockSurface {
    fn images(&self) -> &[vk::Image] {
        &self.images
    }

    fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: 800,
            height: 600,
        }
    }

    fn acquire_next_image(&self, _timeout: Option<Duration>, signal: &MockSemaphore) -> Result<AcquiredImage> {
        let mut state = self.state.borrow_mut();
        if state.hung {
            return Err(Error::Timeout);
        }
        let n = self.acquisitions.get();
        self.acquisitions.set(n + 1);
        let image_index = if self.acquire_order.is_empty() {
            (n % self.images.len()) as u32
        } else {
            self.acquire_order[n % self.acquire_order.len()]
        };
        state.log(Event::Acquire {
            semaphore: signal.0,
            image_index,
        });
        Ok(AcquiredImage {
            index: image_index,
            suboptimal: state.acquire_suboptimal,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct MockQueue {
    pub state: SharedState,
}

impl Queue<MockDevice, MockSurface> for MockQueue {
    fn submit(&self, submission: &Submission<MockDevice>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let fence = submission.fence.0;
        assert!(!state.fences[fence], "submitted with a signaled fence");
        assert!(!submission.command_recorder.recording, "submitted a recorder that is still recording");
        state.log(Event::Submit {
            recorder: submission.command_recorder.id,
            wait: submission.wait.semaphore.0,
            wait_stage: submission.wait.dst_stage,
            signal: submission.signal.0,
            fence,
        });
        state.pending.push_back(fence);
        state.max_outstanding = state.max_outstanding.max(state.pending.len());
        Ok(())
    }

    fn present(&self, request: &PresentRequest<MockDevice, MockSurface>) -> Result<PresentStatus> {
        let mut state = self.state.borrow_mut();
        state.log(Event::Present {
            wait: request.wait.0,
            image_index: request.image_index,
        });
        if let Some(err) = state.present_error {
            return Err(err.into());
        }
        Ok(state.present_status.unwrap_or(PresentStatus::Optimal))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything the orchestrator borrows, wired to one shared log.
pub struct MockBackend {
    pub state: SharedState,
    pub device: MockDevice,
    pub surface: MockSurface,
    pub queue: MockQueue,
    pub pool: MockPool,
}

impl MockBackend {
    pub fn new(image_count: u32) -> MockBackend {
        Self::with_acquire_order(image_count, vec![])
    }

    pub fn with_acquire_order(image_count: u32, acquire_order: Vec<u32>) -> MockBackend {
        init_tracing();
        let state: SharedState = Rc::new(RefCell::new(MockState::default()));
        MockBackend {
            device: MockDevice { state: state.clone() },
            surface: MockSurface {
                state: state.clone(),
                images: (0..image_count).map(image_handle).collect(),
                image_views: (0..image_count)
                    .map(|i| vk::ImageView::from_raw(0x2000 + i as u64))
                    .collect(),
                acquire_order,
                acquisitions: Cell::new(0),
            },
            queue: MockQueue { state: state.clone() },
            pool: MockPool,
            state,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Number of semaphores, fences and recorders currently alive.
    pub fn live_objects(&self) -> (usize, usize, usize) {
        let state = self.state.borrow();
        (state.live_semaphores, state.live_fences, state.live_recorders)
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| pred(e)).count()
    }
}

//! Frame orchestration for a Vulkan presentation loop.
//!
//! A `FrameOrchestrator` owns an ordered list of `Pass`es and a ring of frame slots. Each call to
//! `execute_frame` waits for the slot's previous work to retire, acquires a presentable image,
//! records every pass (with the layout transitions they declare), submits and presents.
//!
//! The device, surface and queues are provided by the application through the traits in
//! `backend`; the `vulkan` module implements them on top of `ash`.
pub use ash::{self, vk};

pub use backend::*;
pub use config::*;
pub use error::*;
pub use frame::FrameSlot;
pub use orchestrator::*;
pub use pass::*;
pub use resource_state::*;
pub use tracker::StateTracker;

pub mod backend;
mod config;
mod error;
mod frame;
mod orchestrator;
mod pass;
mod resource_state;
mod tracker;
pub mod vulkan;

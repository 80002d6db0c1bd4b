//! Implementation of the backend traits on top of `ash`.
//!
//! Requires a Vulkan 1.3 device with `synchronization2` enabled. The command pool handed to the
//! orchestrator must be created with `vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER`, since
//! command buffers are reset individually every time their frame slot comes up.
use crate::{
    backend::{
        AcquiredImage, CommandRecorder, Device, PresentRequest, PresentStatus, Queue, Submission, Surface,
    },
    vk, ImageBarrier, Result,
};
use ash::extensions::{ext::DebugUtils, khr::Swapchain};
use std::{ffi::CString, ptr, time::Duration};

/// Converts an optional timeout to the nanosecond value expected by Vulkan (`u64::MAX` = no timeout).
pub fn timeout_ns(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(timeout) => timeout.as_nanos().min(u64::MAX as u128) as u64,
        None => u64::MAX,
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A Vulkan device, as seen by the frame orchestrator.
#[derive(Clone)]
pub struct VulkanDevice {
    device: ash::Device,
    debug_utils: Option<DebugUtils>,
}

impl VulkanDevice {
    /// # Safety
    ///
    /// `device` must be a valid device that outlives this object and everything allocated through it.
    pub unsafe fn new(device: ash::Device) -> VulkanDevice {
        VulkanDevice {
            device,
            debug_utils: None,
        }
    }

    /// Enables debug labels on recorders allocated from now on.
    pub fn with_debug_utils(mut self, debug_utils: DebugUtils) -> VulkanDevice {
        self.debug_utils = Some(debug_utils);
        self
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl Device for VulkanDevice {
    type CommandPool = vk::CommandPool;
    type CommandRecorder = VulkanCommandRecorder;
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;

    fn allocate_command_recorders(&self, pool: &vk::CommandPool, count: u32) -> Result<Vec<VulkanCommandRecorder>> {
        let allocate_info = vk::CommandBufferAllocateInfo {
            command_pool: *pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        let command_buffers = unsafe { self.device.allocate_command_buffers(&allocate_info)? };
        Ok(command_buffers
            .into_iter()
            .map(|command_buffer| VulkanCommandRecorder {
                device: self.device.clone(),
                debug_utils: self.debug_utils.clone(),
                command_buffer,
            })
            .collect())
    }

    fn free_command_recorders(&self, pool: &vk::CommandPool, recorders: Vec<VulkanCommandRecorder>) {
        if recorders.is_empty() {
            return;
        }
        let command_buffers: Vec<_> = recorders.iter().map(|r| r.command_buffer).collect();
        unsafe {
            self.device.free_command_buffers(*pool, &command_buffers);
        }
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo { ..Default::default() };
        Ok(unsafe { self.device.create_semaphore(&create_info, None)? })
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let create_info = vk::FenceCreateInfo {
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        Ok(unsafe { self.device.create_fence(&create_info, None)? })
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: &vk::Fence, timeout: Option<Duration>) -> Result<()> {
        unsafe { self.device.wait_for_fences(&[*fence], true, timeout_ns(timeout))? }
        Ok(())
    }

    fn reset_fence(&self, fence: &vk::Fence) -> Result<()> {
        unsafe { self.device.reset_fences(&[*fence])? }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A primary command buffer.
pub struct VulkanCommandRecorder {
    device: ash::Device,
    debug_utils: Option<DebugUtils>,
    command_buffer: vk::CommandBuffer,
}

impl VulkanCommandRecorder {
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

impl CommandRecorder for VulkanCommandRecorder {
    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())?
        }
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        unsafe {
            self.device.begin_command_buffer(
                self.command_buffer,
                &vk::CommandBufferBeginInfo {
                    flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                    ..Default::default()
                },
            )?
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device.end_command_buffer(self.command_buffer)? }
        Ok(())
    }

    fn pipeline_barrier(&mut self, barrier: &ImageBarrier) {
        let image_barrier = barrier.to_vk();
        unsafe {
            self.device.cmd_pipeline_barrier2(
                self.command_buffer,
                &vk::DependencyInfo {
                    dependency_flags: Default::default(),
                    memory_barrier_count: 0,
                    p_memory_barriers: ptr::null(),
                    buffer_memory_barrier_count: 0,
                    p_buffer_memory_barriers: ptr::null(),
                    image_memory_barrier_count: 1,
                    p_image_memory_barriers: &image_barrier,
                    ..Default::default()
                },
            );
        }
    }

    fn begin_debug_label(&mut self, name: &str) {
        let Some(ref debug_utils) = self.debug_utils else {
            return;
        };
        let label_name = CString::new(name).unwrap_or_default();
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.command_buffer,
                &vk::DebugUtilsLabelEXT {
                    p_label_name: label_name.as_ptr(),
                    color: [0.0; 4],
                    ..Default::default()
                },
            );
        }
    }

    fn end_debug_label(&mut self) {
        if let Some(ref debug_utils) = self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.command_buffer);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A swapchain created by the application, with its image views.
///
/// None of the handles are destroyed by this object.
pub struct VulkanSwapchain {
    loader: Swapchain,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    extent: vk::Extent2D,
}

impl VulkanSwapchain {
    /// # Safety
    ///
    /// `handle` must be a valid swapchain created with `loader`, and `image_views` views of its
    /// images, in order. All of them must outlive this object.
    pub unsafe fn new(
        loader: Swapchain,
        handle: vk::SwapchainKHR,
        image_views: Vec<vk::ImageView>,
        extent: vk::Extent2D,
    ) -> Result<VulkanSwapchain> {
        let images = loader.get_swapchain_images(handle)?;
        Ok(VulkanSwapchain {
            loader,
            handle,
            images,
            image_views,
            extent,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }
}

impl Surface<VulkanDevice> for VulkanSwapchain {
    fn images(&self) -> &[vk::Image] {
        &self.images
    }

    fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn acquire_next_image(&self, timeout: Option<Duration>, signal: &vk::Semaphore) -> Result<AcquiredImage> {
        let (index, suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.handle, timeout_ns(timeout), *signal, vk::Fence::null())?
        };
        Ok(AcquiredImage { index, suboptimal })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A device queue used for submission and/or presentation.
pub struct VulkanQueue {
    device: ash::Device,
    queue: vk::Queue,
}

impl VulkanQueue {
    /// # Safety
    ///
    /// `queue` must have been retrieved from `device`.
    pub unsafe fn new(device: &VulkanDevice, queue: vk::Queue) -> VulkanQueue {
        VulkanQueue {
            device: device.raw().clone(),
            queue,
        }
    }

    pub fn handle(&self) -> vk::Queue {
        self.queue
    }
}

impl Queue<VulkanDevice, VulkanSwapchain> for VulkanQueue {
    fn submit(&self, submission: &Submission<VulkanDevice>) -> Result<()> {
        let wait_semaphores = [*submission.wait.semaphore];
        let wait_stages = [submission.wait.dst_stage];
        let command_buffers = [submission.command_recorder.handle()];
        let signal_semaphores = [*submission.signal];

        let submit_info = vk::SubmitInfo {
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: command_buffers.len() as u32,
            p_command_buffers: command_buffers.as_ptr(),
            signal_semaphore_count: signal_semaphores.len() as u32,
            p_signal_semaphores: signal_semaphores.as_ptr(),
            ..Default::default()
        };

        unsafe {
            self.device
                .queue_submit(self.queue, &[submit_info], *submission.fence)?
        }
        Ok(())
    }

    fn present(&self, request: &PresentRequest<VulkanDevice, VulkanSwapchain>) -> Result<PresentStatus> {
        let present_info = vk::PresentInfoKHR {
            wait_semaphore_count: 1,
            p_wait_semaphores: request.wait,
            swapchain_count: 1,
            p_swapchains: &request.surface.handle,
            p_image_indices: &request.image_index,
            p_results: ptr::null_mut(),
            ..Default::default()
        };
        let suboptimal = unsafe { request.surface.loader.queue_present(self.queue, &present_info)? };
        Ok(if suboptimal {
            PresentStatus::Suboptimal
        } else {
            PresentStatus::Optimal
        })
    }
}

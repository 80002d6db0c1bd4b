//! Per-frame-in-flight resources.
use crate::{backend::Device, Result};
use tracing::debug;

/// Resources owned by one frame in flight.
///
/// ```text
/// 1. Wait on in_flight_fence (previous use of this slot has retired)
/// 2. Acquire presentable image (signals image_available)
/// 3. Record passes into command_recorder
/// 4. Reset in_flight_fence, submit command_recorder:
///    - wait on image_available at COLOR_ATTACHMENT_OUTPUT
///    - signal work_complete and in_flight_fence
/// 5. Present (waits on work_complete)
/// ```
pub struct FrameSlot<D: Device> {
    pub(crate) command_recorder: D::CommandRecorder,
    pub(crate) image_available: D::Semaphore,
    pub(crate) work_complete: D::Semaphore,
    pub(crate) in_flight_fence: D::Fence,
}

impl<D: Device> FrameSlot<D> {
    /// Allocates `count` slots, one recorder each, from `pool`.
    ///
    /// Fences are created signaled so that the first wait on each slot returns immediately.
    /// If an allocation fails, everything allocated so far is released.
    pub(crate) fn allocate(device: &D, pool: &D::CommandPool, count: u32) -> Result<Vec<FrameSlot<D>>> {
        let recorders = device.allocate_command_recorders(pool, count)?;
        let mut sync = Vec::with_capacity(count as usize);
        for i in 0..count {
            match Self::create_sync_objects(device) {
                Ok(objects) => sync.push(objects),
                Err(err) => {
                    for (a, b, fence) in sync {
                        device.destroy_semaphore(a);
                        device.destroy_semaphore(b);
                        device.destroy_fence(fence);
                    }
                    device.free_command_recorders(pool, recorders);
                    return Err(err);
                }
            }
            debug!("created synchronization objects for frame slot {}", i);
        }

        Ok(recorders
            .into_iter()
            .zip(sync)
            .map(|(command_recorder, (image_available, work_complete, in_flight_fence))| FrameSlot {
                command_recorder,
                image_available,
                work_complete,
                in_flight_fence,
            })
            .collect())
    }

    fn create_sync_objects(device: &D) -> Result<(D::Semaphore, D::Semaphore, D::Fence)> {
        let image_available = device.create_semaphore()?;
        let work_complete = match device.create_semaphore() {
            Ok(s) => s,
            Err(err) => {
                device.destroy_semaphore(image_available);
                return Err(err);
            }
        };
        let in_flight_fence = match device.create_fence(true) {
            Ok(f) => f,
            Err(err) => {
                device.destroy_semaphore(image_available);
                device.destroy_semaphore(work_complete);
                return Err(err);
            }
        };
        Ok((image_available, work_complete, in_flight_fence))
    }

    /// Destroys all slots. The device must not be using them anymore.
    pub(crate) fn release_all(device: &D, pool: &D::CommandPool, slots: Vec<FrameSlot<D>>) {
        let mut recorders = Vec::with_capacity(slots.len());
        for slot in slots {
            device.destroy_semaphore(slot.image_available);
            device.destroy_semaphore(slot.work_complete);
            device.destroy_fence(slot.in_flight_fence);
            recorders.push(slot.command_recorder);
        }
        device.free_command_recorders(pool, recorders);
    }

    pub fn command_recorder(&self) -> &D::CommandRecorder {
        &self.command_recorder
    }

    pub fn image_available_semaphore(&self) -> &D::Semaphore {
        &self.image_available
    }

    pub fn work_complete_semaphore(&self) -> &D::Semaphore {
        &self.work_complete
    }

    pub fn in_flight_fence(&self) -> &D::Fence {
        &self.in_flight_fence
    }
}

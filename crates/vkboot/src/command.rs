//! One-shot command submission.

use crate::device::Device;
use crate::error::{Result, VkResultExt};
use crate::queue::QueueType;
use ash::vk;

/// Command pool bound to one queue family of a [`Device`].
pub struct CommandPool {
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a transient pool on the family serving `kind`.
    pub fn new(device: &Device, kind: QueueType) -> Result<Self> {
        let queue_family = device.get_queue_index(kind)?;
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);

        // SAFETY: the family index comes from the device's own queue table.
        let pool = unsafe { device.raw().create_command_pool(&create_info, None) }
            .call("vkCreateCommandPool")?;

        Ok(Self { pool, queue_family })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Queue family the pool allocates for.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Destroy the pool.
    ///
    /// # Safety
    /// No command buffer from this pool may be pending.
    pub unsafe fn destroy(&self, device: &Device) {
        device.raw().destroy_command_pool(self.pool, None);
    }
}

/// Allocate a primary command buffer and begin one-time recording.
pub fn begin_single_time_commands(device: &Device, pool: &CommandPool) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool.pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let raw = device.raw();
    // SAFETY: the pool belongs to this device.
    let cmd = unsafe { raw.allocate_command_buffers(&alloc_info) }
        .call("vkAllocateCommandBuffers")?[0];

    let begin_info =
        vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    // SAFETY: cmd was just allocated and is in the initial state.
    if let Err(result) = unsafe { raw.begin_command_buffer(cmd, &begin_info) } {
        unsafe { raw.free_command_buffers(pool.pool, &[cmd]) };
        return Err(crate::error::BootError::Vulkan {
            call: "vkBeginCommandBuffer",
            result,
        });
    }
    Ok(cmd)
}

/// End `cmd`, submit it to the pool's family and wait for completion.
///
/// The command buffer is freed whether or not submission succeeds.
pub fn end_single_time_commands(
    device: &Device,
    pool: &CommandPool,
    cmd: vk::CommandBuffer,
) -> Result<()> {
    let raw = device.raw();
    // SAFETY: the queue family has at least one queue on this device.
    let queue = unsafe { raw.get_device_queue(pool.queue_family, 0) };

    let result = (|| {
        // SAFETY: cmd is recording and owned by this pool.
        unsafe {
            raw.end_command_buffer(cmd).call("vkEndCommandBuffer")?;
            let cmd_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
            raw.queue_submit(queue, &[submit_info], vk::Fence::null())
                .call("vkQueueSubmit")?;
            raw.queue_wait_idle(queue).call("vkQueueWaitIdle")
        }
    })();

    // SAFETY: the queue is idle or the buffer was never submitted.
    unsafe { raw.free_command_buffers(pool.pool, &[cmd]) };
    result
}

/// Record with `f` and run to completion on the pool's family.
pub fn execute_single_time_commands<F>(device: &Device, pool: &CommandPool, f: F) -> Result<()>
where
    F: FnOnce(&ash::Device, vk::CommandBuffer),
{
    let cmd = begin_single_time_commands(device, pool)?;
    f(device.raw(), cmd);
    end_single_time_commands(device, pool, cmd)
}

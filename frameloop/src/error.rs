use crate::vk;

/// Errors produced while setting up or driving frames.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the surface reports zero presentable images")]
    NoSurfaceImages,
    #[error("frame orchestrator is already initialized")]
    AlreadyInitialized,
    #[error("frame orchestrator is not initialized")]
    NotInitialized,
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("device lost")]
    DeviceLost,
    #[error("surface is out of date")]
    SurfaceOutOfDate,
    #[error(
        "pass `{pass}` expects image #{image_index} in layout {expected:?}, but it is in layout {actual:?}"
    )]
    StateMismatch {
        pass: String,
        image_index: u32,
        expected: vk::ImageLayout,
        actual: vk::ImageLayout,
    },
    #[error("Vulkan error: {0}")]
    Vulkan(vk::Result),
}

impl From<vk::Result> for Error {
    fn from(result: vk::Result) -> Self {
        match result {
            vk::Result::TIMEOUT | vk::Result::NOT_READY => Error::Timeout,
            vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SurfaceOutOfDate,
            other => Error::Vulkan(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use crate::vk;

/// A declared way of using an image: the stages and accesses that touch it, and its layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResourceState {
    /// Stages that will access the resource.
    pub stages: vk::PipelineStageFlags2,
    /// Access flags for the resource.
    pub access: vk::AccessFlags2,
    /// Requested layout for the resource.
    pub layout: vk::ImageLayout,
}

impl ResourceState {
    /// Contents are discarded. Only valid as the source of a transition.
    pub const UNDEFINED: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::TOP_OF_PIPE,
        access: vk::AccessFlags2::NONE,
        layout: vk::ImageLayout::UNDEFINED,
    };
    pub const TRANSFER_SRC: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_READ,
        layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    };
    pub const TRANSFER_DST: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::TRANSFER,
        access: vk::AccessFlags2::TRANSFER_WRITE,
        layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    };
    pub const SHADER_READ: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::ALL_GRAPHICS,
        access: vk::AccessFlags2::SHADER_READ,
        layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    };
    pub const COLOR_ATTACHMENT_OUTPUT: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    pub const DEPTH_STENCIL_ATTACHMENT: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    pub const PRESENT: ResourceState = ResourceState {
        stages: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        access: vk::AccessFlags2::NONE,
        layout: vk::ImageLayout::PRESENT_SRC_KHR,
    };
}

/// A layout transition of the presentable image, with the scopes of its memory dependency.
///
/// Accesses in `src_access` performed by `src_stage` before the barrier are made visible to
/// accesses in `dst_access` performed by `dst_stage` after it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ImageTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
}

impl Default for ImageTransition {
    fn default() -> Self {
        ImageTransition::NONE
    }
}

impl ImageTransition {
    /// No transition: `old_layout == new_layout`.
    pub const NONE: ImageTransition = ImageTransition {
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::UNDEFINED,
        src_access: vk::AccessFlags2::NONE,
        dst_access: vk::AccessFlags2::NONE,
        src_stage: vk::PipelineStageFlags2::NONE,
        dst_stage: vk::PipelineStageFlags2::NONE,
    };

    /// Builds the transition that moves an image from one declared state to another.
    pub const fn between(from: ResourceState, to: ResourceState) -> ImageTransition {
        ImageTransition {
            old_layout: from.layout,
            new_layout: to.layout,
            src_access: from.access,
            dst_access: to.access,
            src_stage: from.stages,
            dst_stage: to.stages,
        }
    }

    /// Returns whether this transition emits no barrier.
    pub fn is_noop(&self) -> bool {
        self.old_layout == self.new_layout
    }
}

/// Subresource range covering the single mip level and array layer of a color image.
pub const COLOR_SUBRESOURCE_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// An image memory barrier as emitted into a command recorder.
#[derive(Copy, Clone, Debug)]
pub struct ImageBarrier {
    pub image: vk::Image,
    pub transition: ImageTransition,
    pub subresource_range: vk::ImageSubresourceRange,
}

impl ImageBarrier {
    /// Barrier over the whole color aspect of a presentable image.
    pub fn color(image: vk::Image, transition: ImageTransition) -> ImageBarrier {
        ImageBarrier {
            image,
            transition,
            subresource_range: COLOR_SUBRESOURCE_RANGE,
        }
    }

    pub fn to_vk(&self) -> vk::ImageMemoryBarrier2 {
        vk::ImageMemoryBarrier2 {
            src_stage_mask: self.transition.src_stage,
            src_access_mask: self.transition.src_access,
            dst_stage_mask: self.transition.dst_stage,
            dst_access_mask: self.transition.dst_access,
            old_layout: self.transition.old_layout,
            new_layout: self.transition.new_layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image: self.image,
            subresource_range: self.subresource_range,
            ..Default::default()
        }
    }
}

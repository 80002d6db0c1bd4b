//! Per-image layout tracking.
use crate::{vk, Error, Pass, Result};
use tracing::warn;

/// Tracks the layout of every presentable image across frames.
///
/// The layouts declared by passes are checked against the table before an image is acquired;
/// the table is only updated once the frame has been submitted.
#[derive(Clone, Debug)]
pub struct StateTracker {
    layouts: Vec<vk::ImageLayout>,
}

impl StateTracker {
    /// All images start in `UNDEFINED`.
    pub fn new(image_count: u32) -> StateTracker {
        StateTracker {
            layouts: vec![vk::ImageLayout::UNDEFINED; image_count as usize],
        }
    }

    pub fn layout(&self, image_index: u32) -> vk::ImageLayout {
        self.layouts[image_index as usize]
    }

    /// Walks the transitions declared by `passes` starting from the tracked layout of the image, and
    /// returns the layout the image ends up in.
    ///
    /// A transition from `UNDEFINED` is accepted whatever the current layout is, since the
    /// contents are discarded.
    pub fn resolve<R>(&self, image_index: u32, passes: &[Pass<R>]) -> Result<vk::ImageLayout> {
        walk(self.layout(image_index), image_index, passes)
    }

    /// Checks `passes` against every layout an image can be in when it is next acquired: the
    /// layouts currently tracked, and the layout the passes leave each image in.
    ///
    /// Once this succeeds, `resolve` succeeds for every image, on this frame and the next ones,
    /// until the pass list changes.
    pub fn validate<R>(&self, passes: &[Pass<R>]) -> Result<()> {
        let mut checked = Vec::with_capacity(2);
        for (image_index, &layout) in self.layouts.iter().enumerate() {
            let image_index = image_index as u32;
            let mut start = layout;
            while !checked.contains(&start) {
                checked.push(start);
                start = walk(start, image_index, passes)?;
            }
        }
        Ok(())
    }

    /// Layout the image ends up in after `passes`, without checking the declared source layouts.
    pub fn final_layout<R>(&self, image_index: u32, passes: &[Pass<R>]) -> vk::ImageLayout {
        passes
            .iter()
            .filter_map(|pass| pass.barrier_transition())
            .last()
            .map_or(self.layout(image_index), |transition| transition.new_layout)
    }

    pub fn commit(&mut self, image_index: u32, layout: vk::ImageLayout) {
        self.layouts[image_index as usize] = layout;
    }
}

fn walk<R>(start: vk::ImageLayout, image_index: u32, passes: &[Pass<R>]) -> Result<vk::ImageLayout> {
    let mut current = start;
    for pass in passes {
        let Some(transition) = pass.barrier_transition() else {
            continue;
        };
        if transition.old_layout != vk::ImageLayout::UNDEFINED && transition.old_layout != current {
            warn!(
                pass = pass.name(),
                image_index,
                expected = ?transition.old_layout,
                actual = ?current,
                "declared layout does not match tracked layout"
            );
            return Err(Error::StateMismatch {
                pass: pass.name().to_string(),
                image_index,
                expected: transition.old_layout,
                actual: current,
            });
        }
        current = transition.new_layout;
    }
    Ok(current)
}

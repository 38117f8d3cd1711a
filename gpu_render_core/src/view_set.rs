//! Up to [`crate::config::ABSOLUTE_MAX_VIEWS`] simultaneous views sharing one
//! culled command set, each accepting commands by render-pass bitmask.
//! Grounded on the teacher's triple-buffered per-frame constant ring
//! (`graphics/frame/buffer_capacity.rs`), generalized from one ring to one
//! ring per view slot.

use crate::config::ABSOLUTE_MAX_VIEWS;
use crate::layout::{SceneCommand, ViewConstants, ViewDescriptor};

/// A single view's render-pass acceptance mask plus its GPU constants.
#[derive(Debug, Clone, Copy)]
pub struct ViewSlot {
    pub descriptor: ViewDescriptor,
    pub constants: ViewConstants,
}

/// Triple-buffered per-view descriptor/constant rings, indexed by view slot
/// then by ring frame (0..3).
pub struct ViewSet {
    slots: Vec<ViewSlot>,
    ring: [Vec<ViewConstants>; 3],
    current_ring: usize,
}

impl Default for ViewSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSet {
    pub fn new() -> Self {
        Self { slots: Vec::new(), ring: [Vec::new(), Vec::new(), Vec::new()], current_ring: 0 }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registers a view, returning its slot index. Refuses beyond
    /// `ABSOLUTE_MAX_VIEWS`.
    pub fn add_view(&mut self, descriptor: ViewDescriptor, constants: ViewConstants) -> Option<u32> {
        if self.slots.len() >= ABSOLUTE_MAX_VIEWS {
            tracing::warn!("view_set: refusing view beyond ABSOLUTE_MAX_VIEWS={}", ABSOLUTE_MAX_VIEWS);
            return None;
        }
        self.slots.push(ViewSlot { descriptor, constants });
        Some((self.slots.len() - 1) as u32)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Advances to the next ring frame and stages this frame's constants for
    /// every view, for later upload by the render pass.
    pub fn advance_ring(&mut self) {
        self.current_ring = (self.current_ring + 1) % 3;
        let ring = &mut self.ring[self.current_ring];
        ring.clear();
        ring.extend(self.slots.iter().map(|s| s.constants));
    }

    pub fn current_ring_constants(&self) -> &[ViewConstants] {
        &self.ring[self.current_ring]
    }

    /// Writes a 64-bit acceptance mask per command: bit `i` set means view
    /// `i`'s `render_pass_mask` has the command's `render_pass` bit set.
    /// With a single view whose mask is all-ones, every command is accepted
    /// (the common single-view shortcut named in spec §4.6).
    pub fn prepare_command_view_masks(&self, commands: &[SceneCommand]) -> Vec<u64> {
        commands
            .iter()
            .map(|cmd| {
                let pass_bit = 1u64 << (cmd.render_pass % 64);
                self.slots.iter().enumerate().fold(0u64, |mask, (i, slot)| {
                    if slot.descriptor.render_pass_mask & pass_bit != 0 {
                        mask | (1u64 << i)
                    } else {
                        mask
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(mask: u64) -> ViewDescriptor {
        ViewDescriptor { render_pass_mask: mask, view_kind: 0, viewport: [0, 0, 1920, 1080], flags: 0 }
    }

    fn command_for_pass(render_pass: u32) -> SceneCommand {
        let mut c = SceneCommand::default();
        c.render_pass = render_pass;
        c
    }

    #[test]
    fn refuses_views_beyond_absolute_max() {
        let mut views = ViewSet::new();
        for _ in 0..ABSOLUTE_MAX_VIEWS {
            assert!(views.add_view(descriptor(u64::MAX), ViewConstants::default()).is_some());
        }
        assert!(views.add_view(descriptor(u64::MAX), ViewConstants::default()).is_none());
    }

    #[test]
    fn single_view_all_ones_accepts_every_command() {
        let mut views = ViewSet::new();
        views.add_view(descriptor(u64::MAX), ViewConstants::default());
        let commands = vec![command_for_pass(0), command_for_pass(5), command_for_pass(40)];
        let masks = views.prepare_command_view_masks(&commands);
        assert_eq!(masks, vec![1, 1, 1]);
    }

    #[test]
    fn view_mask_rejects_unlisted_pass() {
        let mut views = ViewSet::new();
        views.add_view(descriptor(1 << 0), ViewConstants::default());
        let commands = vec![command_for_pass(0), command_for_pass(1)];
        let masks = views.prepare_command_view_masks(&commands);
        assert_eq!(masks, vec![1, 0]);
    }
}

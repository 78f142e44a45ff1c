// renderer/wgpu_backend/frame.rs
//
// CPU side of a frame: immediate-style calls are grouped into passes, one per
// contiguous run of draws against the same target, and uniform snapshots are
// packed into a single buffer with dynamic offsets.

use crate::renderer::device::{
    ClearFlags, DepthTargetId, GeometryId, ProgramId, TextureId, Viewport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum PassTarget {
    #[default]
    Surface,
    Depth(DepthTargetId),
}

impl From<Option<DepthTargetId>> for PassTarget {
    fn from(target: Option<DepthTargetId>) -> Self {
        target.map_or(PassTarget::Surface, PassTarget::Depth)
    }
}

/// Group 1 contents of a lit draw. `None` selects the fallback texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TextureBindingKey {
    pub(crate) color: Option<TextureId>,
    pub(crate) depth: Option<DepthTargetId>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PassDraw {
    pub(crate) program: ProgramId,
    pub(crate) geometry: GeometryId,
    pub(crate) first_index: u32,
    pub(crate) index_count: u32,
    pub(crate) uniform_offset: u32,
    pub(crate) textures: Option<TextureBindingKey>,
    pub(crate) viewport: Viewport,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RecordedPass {
    pub(crate) target: PassTarget,
    pub(crate) clear: ClearFlags,
    pub(crate) draws: Vec<PassDraw>,
}

impl RecordedPass {
    fn new(target: PassTarget) -> Self {
        Self {
            target,
            clear: ClearFlags::empty(),
            draws: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FrameRecording {
    target: PassTarget,
    viewport: Option<Viewport>,
    passes: Vec<RecordedPass>,
}

impl FrameRecording {
    pub(crate) fn target(&self) -> PassTarget {
        self.target
    }

    pub(crate) fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub(crate) fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub(crate) fn bind_target(&mut self, target: PassTarget) {
        if self.target == target && !self.passes.is_empty() {
            return;
        }
        self.target = target;
        self.passes.push(RecordedPass::new(target));
    }

    pub(crate) fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// A clear issued before any draw folds into the current pass' load ops.
    pub(crate) fn clear(&mut self, flags: ClearFlags) {
        match self.passes.last_mut() {
            Some(pass) if pass.target == self.target && pass.draws.is_empty() => {
                pass.clear |= flags;
            }
            _ => {
                let mut pass = RecordedPass::new(self.target);
                pass.clear = flags;
                self.passes.push(pass);
            }
        }
    }

    pub(crate) fn push_draw(&mut self, draw: PassDraw) {
        let needs_pass = self
            .passes
            .last()
            .is_none_or(|pass| pass.target != self.target);
        if needs_pass {
            self.passes.push(RecordedPass::new(self.target));
        }
        if let Some(pass) = self.passes.last_mut() {
            pass.draws.push(draw);
        }
    }

    pub(crate) fn texture_keys(&self) -> impl Iterator<Item = TextureBindingKey> + '_ {
        self.passes
            .iter()
            .flat_map(|pass| pass.draws.iter())
            .filter_map(|draw| draw.textures)
    }
}

/// Uniform snapshots for one frame, each starting on the device's dynamic
/// offset alignment.
#[derive(Debug)]
pub(crate) struct UniformArena {
    alignment: u32,
    bytes: Vec<u8>,
}

impl UniformArena {
    pub(crate) fn new(alignment: u32) -> Self {
        Self {
            alignment: alignment.max(1),
            bytes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, block: &[u8]) -> u32 {
        let offset = self.bytes.len().next_multiple_of(self.alignment as usize);
        self.bytes.resize(offset, 0);
        self.bytes.extend_from_slice(block);
        offset as u32
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(program: u32) -> PassDraw {
        PassDraw {
            program: ProgramId(program),
            geometry: GeometryId(9),
            first_index: 0,
            index_count: 3,
            uniform_offset: 0,
            textures: None,
            viewport: Viewport::full(4, 4),
        }
    }

    #[test]
    fn shadow_then_main_pass_makes_two_passes() {
        let mut frame = FrameRecording::default();
        frame.bind_target(PassTarget::Depth(DepthTargetId(5)));
        frame.clear(ClearFlags::DEPTH);
        frame.push_draw(draw(1));
        frame.push_draw(draw(1));
        frame.bind_target(PassTarget::Surface);
        frame.clear(ClearFlags::COLOR);
        frame.clear(ClearFlags::DEPTH);
        frame.push_draw(draw(2));

        let passes = frame.passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].target, PassTarget::Depth(DepthTargetId(5)));
        assert_eq!(passes[0].clear, ClearFlags::DEPTH);
        assert_eq!(passes[0].draws.len(), 2);
        assert_eq!(passes[1].clear, ClearFlags::COLOR | ClearFlags::DEPTH);
        assert_eq!(passes[1].draws.len(), 1);
    }

    #[test]
    fn clear_after_draws_starts_a_new_pass() {
        let mut frame = FrameRecording::default();
        frame.push_draw(draw(1));
        frame.clear(ClearFlags::DEPTH);
        frame.push_draw(draw(1));

        let passes = frame.passes();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].clear, ClearFlags::empty());
        assert_eq!(passes[1].clear, ClearFlags::DEPTH);
    }

    #[test]
    fn rebinding_the_same_target_is_ignored() {
        let mut frame = FrameRecording::default();
        frame.bind_target(PassTarget::Surface);
        frame.bind_target(PassTarget::Surface);
        assert_eq!(frame.passes().len(), 1);
        assert_eq!(PassTarget::from(None), PassTarget::Surface);
    }

    #[test]
    fn arena_aligns_each_block() {
        let mut arena = UniformArena::new(256);
        assert_eq!(arena.push(&[1; 100]), 0);
        assert_eq!(arena.push(&[2; 16]), 256);
        assert_eq!(arena.push(&[3; 300]), 512);
        assert_eq!(arena.len(), 812);
        arena.clear();
        assert_eq!(arena.push(&[4; 4]), 0);
    }
}

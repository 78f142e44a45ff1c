// renderer/device.rs
//
// The seam between the scene renderer and a GPU. The model is close to a
// classic immediate API: one current program with named uniforms,
// numbered texture units, a bound framebuffer target and indexed draws. The
// wgpu backend records these calls and replays them into render passes; the
// recording backend keeps them for inspection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::DeviceError;
use crate::renderer::uniforms::{UniformLayout, UniformLocation, UniformValue};
use crate::renderer::vertex::Vertex;

macro_rules! handle_type {
    ($name:ident, $variant:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<$name> for ResourceId {
            fn from(handle: $name) -> Self {
                ResourceId::$variant(handle)
            }
        }
    };
}

handle_type!(ProgramId, Program);
handle_type!(GeometryId, Geometry);
handle_type!(TextureId, Texture);
handle_type!(DepthTargetId, DepthTarget);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Program(ProgramId),
    Geometry(GeometryId),
    Texture(TextureId),
    DepthTarget(DepthTargetId),
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// What a texture unit currently samples from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureSource {
    #[default]
    None,
    Texture(TextureId),
    Depth(DepthTargetId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramTarget {
    /// Colour + depth output to the window surface.
    Surface,
    /// Depth only, rendered into a depth target.
    DepthOnly,
}

pub struct ProgramDescriptor {
    pub label: &'static str,
    pub layout: UniformLayout,
    pub source: String,
    pub target: ProgramTarget,
    pub cull_back_faces: bool,
}

impl fmt::Debug for ProgramDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramDescriptor")
            .field("label", &self.label)
            .field("target", &self.target)
            .field("uniforms", &self.layout.slots().len())
            .finish()
    }
}

pub trait RenderDevice {
    fn begin_frame(&mut self);
    fn end_frame(&mut self) -> Result<(), DeviceError>;
    /// Size of the default framebuffer in pixels.
    fn drawable_size(&self) -> (u32, u32);

    fn create_program(&mut self, desc: ProgramDescriptor) -> Result<ProgramId, DeviceError>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn use_program(&mut self, program: ProgramId);
    /// Writes into the current program. `None` is a silent no-op.
    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue);

    fn create_geometry(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<GeometryId, DeviceError>;
    fn draw_indexed(&mut self, geometry: GeometryId, index_count: u32, byte_offset: u64);

    fn create_texture_rgba8(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureId, DeviceError>;
    fn create_depth_target(&mut self, width: u32, height: u32)
        -> Result<DepthTargetId, DeviceError>;

    /// `None` selects the default framebuffer.
    fn bind_target(&mut self, target: Option<DepthTargetId>);
    fn set_viewport(&mut self, viewport: Viewport);
    fn clear(&mut self, flags: ClearFlags);
    fn bind_texture(&mut self, unit: u32, source: TextureSource);

    fn releaser(&self) -> Releaser;
    /// Frees everything queued through the releaser.
    fn collect_garbage(&mut self);
}

/// Shared queue of resources whose owners were dropped.
#[derive(Clone, Default)]
pub struct Releaser {
    queue: Rc<RefCell<Vec<ResourceId>>>,
}

impl Releaser {
    pub fn release(&self, id: ResourceId) {
        self.queue.borrow_mut().push(id);
    }

    pub fn drain(&self) -> Vec<ResourceId> {
        std::mem::take(&mut *self.queue.borrow_mut())
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl fmt::Debug for Releaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Releaser")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Exclusively owned GPU handle. Dropping it queues the release.
pub struct GpuResource<H>
where
    H: Copy + Into<ResourceId>,
{
    handle: H,
    releaser: Releaser,
}

impl<H> GpuResource<H>
where
    H: Copy + Into<ResourceId>,
{
    pub fn new(handle: H, releaser: Releaser) -> Self {
        Self { handle, releaser }
    }

    pub fn handle(&self) -> H {
        self.handle
    }
}

impl<H> Drop for GpuResource<H>
where
    H: Copy + Into<ResourceId>,
{
    fn drop(&mut self) {
        self.releaser.release(self.handle.into());
    }
}

impl<H> fmt::Debug for GpuResource<H>
where
    H: Copy + Into<ResourceId> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GpuResource").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_resource_queues_its_release() {
        let releaser = Releaser::default();
        let geometry = GpuResource::new(GeometryId(3), releaser.clone());
        let target = GpuResource::new(DepthTargetId(4), releaser.clone());
        assert_eq!(releaser.pending(), 0);

        drop(geometry);
        drop(target);

        assert_eq!(
            releaser.drain(),
            vec![
                ResourceId::Geometry(GeometryId(3)),
                ResourceId::DepthTarget(DepthTargetId(4)),
            ]
        );
        assert_eq!(releaser.pending(), 0);
    }

    #[test]
    fn clear_flags_combine() {
        let both = ClearFlags::COLOR | ClearFlags::DEPTH;
        assert!(both.contains(ClearFlags::DEPTH));
        assert!(!ClearFlags::COLOR.contains(ClearFlags::DEPTH));
    }
}

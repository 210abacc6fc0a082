//! Resources owned by individual jobs: lazily created pipelines and
//! framebuffers that follow the size of the primary framebuffer.

use smallvec::SmallVec;
use wgpu::TextureFormat;

use super::frame::DeferredFrameTransform;
use crate::gpu::slots::uniform;
use crate::gpu::{
    Batch, BufferId, FramebufferDesc, FramebufferId, GpuContext, PipelineDesc, PipelineId,
    PipelineState,
};
use umbra_core::errors::GpuError;
use umbra_core::math::Viewport;

/// HDR colour format of the lighting and primary buffers.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
/// LDR colour format of G-buffer and post-process targets.
pub const LDR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const DEPTH_STENCIL_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
pub const LINEAR_DEPTH_FORMAT: TextureFormat = TextureFormat::R32Float;
pub const VELOCITY_FORMAT: TextureFormat = TextureFormat::Rg16Float;

/// A pipeline created on first use.
pub(crate) struct LazyPipeline {
    label: &'static str,
    state: PipelineState,
    id: Option<PipelineId>,
}

impl LazyPipeline {
    pub(crate) const fn new(label: &'static str, state: PipelineState) -> Self {
        Self {
            label,
            state,
            id: None,
        }
    }

    pub(crate) fn get(&mut self, gpu: &mut GpuContext) -> PipelineId {
        *self
            .id
            .get_or_insert_with(|| gpu.create_pipeline(PipelineDesc::new(self.label, self.state)))
    }
}

/// A framebuffer owned by a job and kept at `1 / divisor` of a reference size.
///
/// Allocation failures never propagate: a failed resize keeps the previous
/// allocation, and a failed first allocation falls back to a 1x1 target.
pub(crate) struct JobFramebuffer {
    label: &'static str,
    colors: SmallVec<[TextureFormat; 4]>,
    depth_stencil: Option<TextureFormat>,
    divisor: u32,
    id: Option<FramebufferId>,
}

impl JobFramebuffer {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            colors: SmallVec::new(),
            depth_stencil: None,
            divisor: 1,
            id: None,
        }
    }

    pub(crate) fn color(mut self, format: TextureFormat) -> Self {
        self.colors.push(format);
        self
    }

    pub(crate) fn depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_stencil = Some(format);
        self
    }

    pub(crate) fn downscaled(mut self, divisor: u32) -> Self {
        self.divisor = divisor.max(1);
        self
    }

    fn desc(&self, width: u32, height: u32) -> FramebufferDesc {
        FramebufferDesc {
            label: self.label.to_owned(),
            width,
            height,
            color_formats: self.colors.clone(),
            depth_stencil_format: self.depth_stencil,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> Option<FramebufferId> {
        self.id
    }

    /// Allocates or resizes the framebuffer for a reference size.
    pub(crate) fn ensure(&mut self, gpu: &mut GpuContext, size: (u32, u32)) -> FramebufferId {
        let width = size.0.div_ceil(self.divisor);
        let height = size.1.div_ceil(self.divisor);

        if let Some(id) = self.id {
            if let Err(err) = gpu.resize_framebuffer(id, width, height) {
                log::warn!(
                    "{}: resize to {width}x{height} failed ({err}); keeping previous allocation",
                    self.label
                );
            }
            return id;
        }

        let id = match gpu.create_framebuffer(self.desc(width, height)) {
            Ok(id) => id,
            Err(err) => {
                log::warn!(
                    "{}: allocation at {width}x{height} failed ({err}); using a 1x1 fallback",
                    self.label
                );
                gpu.create_framebuffer(self.desc(1, 1)).unwrap_or_default()
            }
        };
        self.id = Some(id);
        id
    }
}

/// Size of `framebuffer`, or of the viewport when it is not (yet) allocated.
pub(crate) fn reference_size(
    gpu: &GpuContext,
    framebuffer: FramebufferId,
    fallback: Viewport,
) -> (u32, u32) {
    gpu.framebuffer_size(framebuffer)
        .unwrap_or((fallback.width.max(1), fallback.height.max(1)))
}

/// Writes `bytes` into the buffer in `slot`, creating it on first use.
pub(crate) fn upload_bytes(
    gpu: &mut GpuContext,
    slot: &mut Option<BufferId>,
    label: &str,
    bytes: &[u8],
) -> Result<BufferId, GpuError> {
    match *slot {
        Some(id) => {
            gpu.update_buffer(id, bytes)?;
            Ok(id)
        }
        None => Ok(*slot.insert(gpu.create_buffer(label, bytes))),
    }
}

/// [`upload_bytes`] for a single uniform block.
pub(crate) fn upload_uniform<T: bytemuck::Pod>(
    gpu: &mut GpuContext,
    slot: &mut Option<BufferId>,
    label: &str,
    value: &T,
) -> Result<BufferId, GpuError> {
    upload_bytes(gpu, slot, label, bytemuck::bytes_of(value))
}

pub(crate) fn bind_frame_transform(batch: &mut Batch, transform: &DeferredFrameTransform) {
    batch.set_uniform_buffer(uniform::DEFERRED_FRAME_TRANSFORM, transform.buffer);
}

/// Opens a batch targeting `framebuffer` with a viewport covering it.
pub(crate) fn pass_batch(
    name: &str,
    gpu: &GpuContext,
    framebuffer: Option<FramebufferId>,
    fallback: Viewport,
) -> Batch {
    let viewport = framebuffer
        .and_then(|fb| gpu.framebuffer_size(fb))
        .map_or(fallback, |(width, height)| Viewport::from_size(width, height));
    let mut batch = Batch::new(name);
    batch.set_framebuffer(framebuffer);
    batch.set_viewport(viewport);
    batch
}

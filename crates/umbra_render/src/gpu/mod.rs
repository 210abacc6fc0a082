//! Recording GPU Layer
//!
//! The render graph talks to the GPU exclusively through [`GpuContext`] and
//! [`Batch`]. This implementation records instead of executing:
//!
//! - resources (framebuffers, textures, buffers, pipelines) are slot-mapped
//!   descriptors with stable handles;
//! - submitted batches and timer ranges are collected into a [`FrameRecord`]
//!   between [`GpuContext::begin_frame`] and [`GpuContext::end_frame`].
//!
//! # Frame discipline
//!
//! ```text
//! begin_frame ─► submit(batch)* / begin_timer / end_timer ─► end_frame ─► FrameRecord
//!                     └── error: no frame open                 └── error: timers still open
//! ```
//!
//! Timer ranges nest strictly: closing any range other than the innermost
//! one is a precondition violation.

pub mod batch;
pub mod slots;
pub mod uniforms;

pub use batch::{Batch, BatchCommand};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use wgpu::TextureFormat;

use umbra_core::errors::GpuError;

new_key_type! {
    pub struct FramebufferId;
    pub struct TextureId;
    pub struct BufferId;
    pub struct PipelineId;
}

/// Device limits honoured by resource creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuLimits {
    pub max_texture_dimension: u32,
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self {
            max_texture_dimension: 8192,
        }
    }
}

// ─── Resource descriptors ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub desc: TextureDesc,
    /// Bumped whenever the texture is reallocated.
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color_formats: SmallVec<[TextureFormat; 4]>,
    pub depth_stencil_format: Option<TextureFormat>,
}

impl FramebufferDesc {
    #[must_use]
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            color_formats: SmallVec::new(),
            depth_stencil_format: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    #[must_use]
    pub fn with_depth_stencil(mut self, format: TextureFormat) -> Self {
        self.depth_stencil_format = Some(format);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    pub desc: FramebufferDesc,
    pub color_attachments: SmallVec<[TextureId; 4]>,
    pub depth_stencil: Option<TextureId>,
    pub version: u64,
}

impl Framebuffer {
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    #[inline]
    #[must_use]
    pub fn color(&self, index: usize) -> Option<TextureId> {
        self.color_attachments.get(index).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub label: String,
    pub data: Vec<u8>,
    pub version: u64,
}

/// Fixed-function state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_back_faces: bool,
    pub blend: bool,
    pub stencil_test: bool,
    pub wireframe: bool,
    pub depth_bias: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            cull_back_faces: true,
            blend: false,
            stencil_test: false,
            wireframe: false,
            depth_bias: false,
        }
    }
}

impl PipelineState {
    /// State for fullscreen passes: no depth, no culling.
    #[must_use]
    pub fn fullscreen() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            cull_back_faces: false,
            ..Self::default()
        }
    }

    /// Alpha-blended fullscreen pass.
    #[must_use]
    pub fn fullscreen_blended() -> Self {
        Self {
            blend: true,
            ..Self::fullscreen()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDesc {
    pub label: String,
    pub state: PipelineState,
}

impl PipelineDesc {
    #[must_use]
    pub fn new(label: impl Into<String>, state: PipelineState) -> Self {
        Self {
            label: label.into(),
            state,
        }
    }
}

// ─── Frame recording ───────────────────────────────────────────────────────

/// Handle of an open timer range. The default handle is inert: ending it is
/// a no-op, which keeps begin/end pairs balanced when the opener was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeTimer {
    index: Option<usize>,
}

impl RangeTimer {
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.index.is_some()
    }
}

/// One recorded timer range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerRecord {
    pub name: String,
    /// Nesting depth at the time the range was opened.
    pub depth: usize,
    /// Index of the first batch submitted inside the range.
    pub first_batch: usize,
    /// One past the last batch inside the range; `None` while open.
    pub end_batch: Option<usize>,
}

impl TimerRecord {
    /// Batches submitted inside the range (zero while open).
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.end_batch.map_or(0, |end| end - self.first_batch)
    }
}

/// Everything recorded between `begin_frame` and `end_frame`.
#[derive(Debug, Clone, Default)]
pub struct FrameRecord {
    pub index: u64,
    pub batches: Vec<Batch>,
    pub timers: Vec<TimerRecord>,
}

impl FrameRecord {
    /// First batch with the given name.
    #[must_use]
    pub fn batch(&self, name: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.name() == name)
    }

    #[must_use]
    pub fn batch_names(&self) -> Vec<&str> {
        self.batches.iter().map(Batch::name).collect()
    }

    #[must_use]
    pub fn timer(&self, name: &str) -> Option<&TimerRecord> {
        self.timers.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.batches.iter().map(Batch::draw_count).sum()
    }
}

// ─── Context ───────────────────────────────────────────────────────────────

/// Resource registry and command recorder.
pub struct GpuContext {
    limits: GpuLimits,
    framebuffers: SlotMap<FramebufferId, Framebuffer>,
    textures: SlotMap<TextureId, Texture>,
    buffers: SlotMap<BufferId, Buffer>,
    pipelines: SlotMap<PipelineId, PipelineDesc>,
    named_textures: FxHashMap<String, TextureId>,
    placeholder: TextureId,

    frame: Option<FrameRecord>,
    open_timers: Vec<usize>,
    frame_index: u64,
}

impl Default for GpuContext {
    fn default() -> Self {
        Self::new(GpuLimits::default())
    }
}

impl GpuContext {
    #[must_use]
    pub fn new(limits: GpuLimits) -> Self {
        let mut textures = SlotMap::with_key();
        let placeholder = textures.insert(Texture {
            desc: TextureDesc {
                label: "Placeholder".into(),
                width: 1,
                height: 1,
                format: TextureFormat::Rgba8UnormSrgb,
            },
            version: 0,
        });

        Self {
            limits,
            framebuffers: SlotMap::with_key(),
            textures,
            buffers: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            named_textures: FxHashMap::default(),
            placeholder,
            frame: None,
            open_timers: Vec::new(),
            frame_index: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn limits(&self) -> GpuLimits {
        self.limits
    }

    // === Frame ===

    pub fn begin_frame(&mut self) -> Result<(), GpuError> {
        if self.frame.is_some() {
            return Err(GpuError::FrameAlreadyActive);
        }
        self.frame_index += 1;
        self.frame = Some(FrameRecord {
            index: self.frame_index,
            ..FrameRecord::default()
        });
        Ok(())
    }

    /// Closes the frame and returns what was recorded.
    ///
    /// Fails (and discards the frame) if a timer range is still open.
    pub fn end_frame(&mut self) -> Result<FrameRecord, GpuError> {
        let frame = self.frame.take().ok_or(GpuError::NoActiveFrame)?;
        if !self.open_timers.is_empty() {
            let open = self.open_timers.len();
            self.open_timers.clear();
            return Err(GpuError::UnclosedTimers(open));
        }
        Ok(frame)
    }

    /// Drops the current frame without validation, e.g. after a job error.
    pub fn abort_frame(&mut self) {
        if self.frame.take().is_some() {
            log::warn!("GPU frame {} aborted", self.frame_index);
        }
        self.open_timers.clear();
    }

    #[inline]
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.frame.is_some()
    }

    /// The frame being recorded.
    #[inline]
    #[must_use]
    pub fn current_frame(&self) -> Option<&FrameRecord> {
        self.frame.as_ref()
    }

    pub fn submit(&mut self, batch: Batch) -> Result<(), GpuError> {
        let frame = self.frame.as_mut().ok_or(GpuError::NoActiveFrame)?;
        log::trace!(
            "Submit batch '{}' ({} commands)",
            batch.name(),
            batch.commands().len()
        );
        frame.batches.push(batch);
        Ok(())
    }

    pub fn begin_timer(&mut self, name: &str) -> Result<RangeTimer, GpuError> {
        let depth = self.open_timers.len();
        let frame = self.frame.as_mut().ok_or(GpuError::NoActiveFrame)?;
        let index = frame.timers.len();
        frame.timers.push(TimerRecord {
            name: name.to_owned(),
            depth,
            first_batch: frame.batches.len(),
            end_batch: None,
        });
        self.open_timers.push(index);
        Ok(RangeTimer { index: Some(index) })
    }

    /// Closes a range and returns the number of batches it covered.
    /// Inert handles return `Ok(None)`.
    pub fn end_timer(&mut self, timer: &RangeTimer) -> Result<Option<usize>, GpuError> {
        let Some(index) = timer.index else {
            return Ok(None);
        };
        let frame = self.frame.as_mut().ok_or(GpuError::NoActiveFrame)?;

        let innermost = self.open_timers.last().copied();
        if innermost != Some(index) {
            let name_of = |i: Option<usize>| {
                i.and_then(|i| frame.timers.get(i))
                    .map_or_else(|| "<none>".to_owned(), |t| t.name.clone())
            };
            return Err(GpuError::TimerMismatch {
                expected: name_of(innermost),
                found: name_of(Some(index)),
            });
        }

        self.open_timers.pop();
        let end = frame.batches.len();
        let record = &mut frame.timers[index];
        record.end_batch = Some(end);
        Ok(Some(record.batch_count()))
    }

    // === Framebuffers ===

    fn validate_extent(&self, width: u32, height: u32) -> Result<(), GpuError> {
        if width == 0 || height == 0 {
            return Err(GpuError::InvalidFramebufferSize { width, height });
        }
        let max = self.limits.max_texture_dimension;
        if width > max || height > max {
            return Err(GpuError::FramebufferTooLarge { width, height, max });
        }
        Ok(())
    }

    pub fn create_framebuffer(&mut self, desc: FramebufferDesc) -> Result<FramebufferId, GpuError> {
        self.validate_extent(desc.width, desc.height)?;

        let color_attachments = desc
            .color_formats
            .iter()
            .enumerate()
            .map(|(i, format)| {
                self.create_texture(TextureDesc {
                    label: format!("{}.color{i}", desc.label),
                    width: desc.width,
                    height: desc.height,
                    format: *format,
                })
            })
            .collect();
        let depth_stencil = desc.depth_stencil_format.map(|format| {
            self.create_texture(TextureDesc {
                label: format!("{}.depthStencil", desc.label),
                width: desc.width,
                height: desc.height,
                format,
            })
        });

        log::debug!(
            "Created framebuffer '{}' {}x{}",
            desc.label,
            desc.width,
            desc.height
        );
        Ok(self.framebuffers.insert(Framebuffer {
            desc,
            color_attachments,
            depth_stencil,
            version: 0,
        }))
    }

    /// Reallocates a framebuffer's attachments at a new size.
    ///
    /// On failure the framebuffer keeps its previous, valid allocation.
    pub fn resize_framebuffer(
        &mut self,
        id: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<(), GpuError> {
        self.validate_extent(width, height)?;
        let framebuffer = self
            .framebuffers
            .get_mut(id)
            .ok_or(GpuError::UnknownResource {
                kind: "framebuffer",
            })?;
        if framebuffer.size() == (width, height) {
            return Ok(());
        }

        framebuffer.desc.width = width;
        framebuffer.desc.height = height;
        framebuffer.version += 1;
        for texture_id in framebuffer
            .color_attachments
            .iter()
            .chain(framebuffer.depth_stencil.iter())
        {
            if let Some(texture) = self.textures.get_mut(*texture_id) {
                texture.desc.width = width;
                texture.desc.height = height;
                texture.version += 1;
            }
        }
        log::debug!(
            "Resized framebuffer '{}' to {width}x{height}",
            framebuffer.desc.label
        );
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn framebuffer(&self, id: FramebufferId) -> Option<&Framebuffer> {
        self.framebuffers.get(id)
    }

    #[must_use]
    pub fn framebuffer_size(&self, id: FramebufferId) -> Option<(u32, u32)> {
        self.framebuffers.get(id).map(Framebuffer::size)
    }

    /// Color attachment `index`, or the placeholder texture.
    #[must_use]
    pub fn framebuffer_color(&self, id: FramebufferId, index: usize) -> TextureId {
        self.framebuffers
            .get(id)
            .and_then(|fb| fb.color(index))
            .unwrap_or(self.placeholder)
    }

    /// Depth-stencil attachment, or the placeholder texture.
    #[must_use]
    pub fn framebuffer_depth(&self, id: FramebufferId) -> TextureId {
        self.framebuffers
            .get(id)
            .and_then(|fb| fb.depth_stencil)
            .unwrap_or(self.placeholder)
    }

    // === Textures ===

    pub fn create_texture(&mut self, desc: TextureDesc) -> TextureId {
        self.textures.insert(Texture { desc, version: 0 })
    }

    /// Registers a texture under an asset name so jobs can look it up.
    pub fn register_texture_asset(&mut self, name: &str, desc: TextureDesc) -> TextureId {
        let id = self.create_texture(desc);
        self.named_textures.insert(name.to_owned(), id);
        id
    }

    pub fn find_texture(&self, name: &str) -> Result<TextureId, GpuError> {
        self.named_textures
            .get(name)
            .copied()
            .ok_or_else(|| GpuError::TextureNotFound(name.to_owned()))
    }

    #[inline]
    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// 1x1 texture bound wherever a real one is unavailable.
    #[inline]
    #[must_use]
    pub fn placeholder_texture(&self) -> TextureId {
        self.placeholder
    }

    // === Buffers ===

    pub fn create_buffer(&mut self, label: &str, data: &[u8]) -> BufferId {
        self.buffers.insert(Buffer {
            label: label.to_owned(),
            data: data.to_vec(),
            version: 0,
        })
    }

    pub fn create_uniform_buffer<T: bytemuck::Pod>(&mut self, label: &str, value: &T) -> BufferId {
        self.create_buffer(label, bytemuck::bytes_of(value))
    }

    pub fn update_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), GpuError> {
        let buffer = self
            .buffers
            .get_mut(id)
            .ok_or(GpuError::UnknownResource { kind: "buffer" })?;
        if buffer.data != data {
            buffer.data.clear();
            buffer.data.extend_from_slice(data);
            buffer.version += 1;
        }
        Ok(())
    }

    pub fn update_uniform<T: bytemuck::Pod>(&mut self, id: BufferId, value: &T) -> Result<(), GpuError> {
        self.update_buffer(id, bytemuck::bytes_of(value))
    }

    #[inline]
    #[must_use]
    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    /// Reads a buffer back as a `T`, if it holds exactly one.
    #[must_use]
    pub fn read_uniform<T: bytemuck::Pod>(&self, id: BufferId) -> Option<T> {
        let buffer = self.buffers.get(id)?;
        bytemuck::try_pod_read_unaligned(&buffer.data).ok()
    }

    // === Pipelines ===

    pub fn create_pipeline(&mut self, desc: PipelineDesc) -> PipelineId {
        log::debug!("Created pipeline '{}'", desc.label);
        self.pipelines.insert(desc)
    }

    #[inline]
    #[must_use]
    pub fn pipeline(&self, id: PipelineId) -> Option<&PipelineDesc> {
        self.pipelines.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_requires_open_frame() {
        let mut gpu = GpuContext::default();
        assert_eq!(gpu.submit(Batch::new("x")), Err(GpuError::NoActiveFrame));
        gpu.begin_frame().unwrap();
        gpu.submit(Batch::new("x")).unwrap();
        let frame = gpu.end_frame().unwrap();
        assert_eq!(frame.batch_names(), ["x"]);
    }

    #[test]
    fn test_timers_nest_strictly() {
        let mut gpu = GpuContext::default();
        gpu.begin_frame().unwrap();
        let outer = gpu.begin_timer("outer").unwrap();
        let inner = gpu.begin_timer("inner").unwrap();
        assert!(matches!(
            gpu.end_timer(&outer),
            Err(GpuError::TimerMismatch { .. })
        ));
        gpu.submit(Batch::new("work")).unwrap();
        assert_eq!(gpu.end_timer(&inner).unwrap(), Some(1));
        assert_eq!(gpu.end_timer(&outer).unwrap(), Some(1));
        assert_eq!(gpu.end_timer(&RangeTimer::default()).unwrap(), None);

        let frame = gpu.end_frame().unwrap();
        assert_eq!(frame.timer("inner").unwrap().depth, 1);
    }

    #[test]
    fn test_unclosed_timer_fails_frame() {
        let mut gpu = GpuContext::default();
        gpu.begin_frame().unwrap();
        gpu.begin_timer("dangling").unwrap();
        assert_eq!(gpu.end_frame().unwrap_err(), GpuError::UnclosedTimers(1));
        assert!(!gpu.is_recording());
    }

    #[test]
    fn test_failed_resize_keeps_previous_allocation() {
        let mut gpu = GpuContext::default();
        let fb = gpu
            .create_framebuffer(
                FramebufferDesc::new("test", 64, 32).with_color(TextureFormat::Rgba8Unorm),
            )
            .unwrap();

        assert!(gpu.resize_framebuffer(fb, 0, 10).is_err());
        assert!(gpu.resize_framebuffer(fb, 100_000, 10).is_err());
        assert_eq!(gpu.framebuffer_size(fb), Some((64, 32)));

        gpu.resize_framebuffer(fb, 128, 64).unwrap();
        let color = gpu.framebuffer_color(fb, 0);
        assert_eq!(gpu.texture(color).unwrap().desc.width, 128);
    }

    #[test]
    fn test_uniform_roundtrip_bumps_version_on_change() {
        let mut gpu = GpuContext::default();
        let id = gpu.create_uniform_buffer("u", &[1.0f32, 2.0]);
        gpu.update_uniform(id, &[1.0f32, 2.0]).unwrap();
        assert_eq!(gpu.buffer(id).unwrap().version, 0);
        gpu.update_uniform(id, &[3.0f32, 2.0]).unwrap();
        assert_eq!(gpu.buffer(id).unwrap().version, 1);
        assert_eq!(gpu.read_uniform::<[f32; 2]>(id), Some([3.0, 2.0]));
    }
}

//! Command batches.
//!
//! A [`Batch`] is a named list of [`BatchCommand`]s recorded by one job and
//! submitted to the [`GpuContext`](super::GpuContext) as a unit. The
//! recording layer keeps commands as plain data so that frames can be
//! inspected after the fact.

use glam::Mat4;
use smallvec::SmallVec;

use super::{BufferId, FramebufferId, PipelineId, TextureId};
use umbra_core::math::Viewport;

/// One recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchCommand {
    SetViewport(Viewport),
    SetScissor(Viewport),
    SetProjection(Mat4),
    SetView(Mat4),
    SetModel(Mat4),
    /// `None` binds the swap-chain target.
    SetFramebuffer(Option<FramebufferId>),
    Clear {
        color: Option<wgpu::Color>,
        depth: Option<f32>,
        stencil: Option<u32>,
    },
    SetPipeline(PipelineId),
    /// `None` unbinds the slot.
    SetUniformBuffer {
        slot: u32,
        buffer: Option<BufferId>,
    },
    SetResourceBuffer {
        slot: u32,
        buffer: Option<BufferId>,
    },
    SetResourceTexture {
        slot: u32,
        texture: Option<TextureId>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Blit {
        source: FramebufferId,
        source_rect: Viewport,
        target: Option<FramebufferId>,
        target_rect: Viewport,
    },
    PushProfileRange(String),
    PopProfileRange,
}

impl BatchCommand {
    #[inline]
    #[must_use]
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw { .. } | Self::DrawIndexed { .. })
    }
}

/// Named command list recorded by one job.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    name: String,
    commands: Vec<BatchCommand>,
}

impl Batch {
    /// Vertex count of a fullscreen quad drawn as a triangle strip.
    pub const FULLSCREEN_VERTEX_COUNT: u32 = 4;

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[BatchCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Pipelines bound by this batch, in order.
    #[must_use]
    pub fn pipelines(&self) -> SmallVec<[PipelineId; 8]> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                BatchCommand::SetPipeline(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Framebuffers bound by this batch, in order. `None` entries bind the
    /// swap-chain target.
    #[must_use]
    pub fn framebuffers(&self) -> SmallVec<[Option<FramebufferId>; 4]> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                BatchCommand::SetFramebuffer(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[inline]
    pub fn push(&mut self, command: BatchCommand) {
        self.commands.push(command);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.push(BatchCommand::SetViewport(viewport));
    }

    pub fn set_scissor(&mut self, scissor: Viewport) {
        self.push(BatchCommand::SetScissor(scissor));
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.push(BatchCommand::SetProjection(projection));
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.push(BatchCommand::SetView(view));
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.push(BatchCommand::SetModel(model));
    }

    pub fn set_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.push(BatchCommand::SetFramebuffer(framebuffer));
    }

    pub fn clear(&mut self, color: Option<wgpu::Color>, depth: Option<f32>, stencil: Option<u32>) {
        self.push(BatchCommand::Clear {
            color,
            depth,
            stencil,
        });
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.push(BatchCommand::SetPipeline(pipeline));
    }

    pub fn set_uniform_buffer(&mut self, slot: u32, buffer: Option<BufferId>) {
        self.push(BatchCommand::SetUniformBuffer { slot, buffer });
    }

    pub fn set_resource_buffer(&mut self, slot: u32, buffer: Option<BufferId>) {
        self.push(BatchCommand::SetResourceBuffer { slot, buffer });
    }

    pub fn set_resource_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        self.push(BatchCommand::SetResourceTexture { slot, texture });
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push(BatchCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.push(BatchCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    /// Draws one fullscreen quad.
    pub fn draw_fullscreen(&mut self) {
        self.draw(Self::FULLSCREEN_VERTEX_COUNT, 1);
    }

    pub fn blit(
        &mut self,
        source: FramebufferId,
        source_rect: Viewport,
        target: Option<FramebufferId>,
        target_rect: Viewport,
    ) {
        self.push(BatchCommand::Blit {
            source,
            source_rect,
            target,
            target_rect,
        });
    }

    pub fn push_profile_range(&mut self, name: impl Into<String>) {
        self.push(BatchCommand::PushProfileRange(name.into()));
    }

    pub fn pop_profile_range(&mut self) {
        self.push(BatchCommand::PopProfileRange);
    }
}

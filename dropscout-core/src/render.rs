// src/render.rs
//
// Collage rendering seam. Building the PNG grid out of benefit icons is an
// external collaborator; the core only decides when to attempt a render and
// how to fall back when it yields nothing.

use async_trait::async_trait;

use crate::models::CampaignRecord;

/// Knobs for a collage render attempt.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Max icons to include; 0 means all.
    pub icon_limit: usize,
    /// Square icon edge in pixels.
    pub icon_size: u32,
    pub columns: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            icon_limit: 9,
            icon_size: 96,
            columns: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedCollage {
    pub png: Vec<u8>,
    pub filename: String,
}

/// Renders benefit-icon collages. Implementations return None on any failure;
/// the caller falls back to linking a raw benefit image instead.
#[async_trait]
pub trait CollageRenderer: Send + Sync {
    async fn render(&self, campaign: &CampaignRecord, opts: RenderOptions)
        -> Option<RenderedCollage>;
}

/// Renderer used when no collage backend is wired up. Always yields nothing,
/// which routes every message through the raw-image fallback path.
#[derive(Debug, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl CollageRenderer for DisabledRenderer {
    async fn render(
        &self,
        _campaign: &CampaignRecord,
        _opts: RenderOptions,
    ) -> Option<RenderedCollage> {
        None
    }
}

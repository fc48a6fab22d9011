//! Editor service
//!
//! Orchestrates sessions, the pixel engine and the image model. Pixel work
//! runs on the blocking pool; model calls are awaited while the session stays
//! claimed so nothing else can touch its buffer meanwhile.

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use tracing::{info, warn};

use crate::engine::codec::{decode_data_url, decode_model_image, decode_upload};
use crate::engine::export::{self, ExportedImage, Resolution};
use crate::engine::transform::{self, CropRegion};
use crate::engine::{apply_adjustments, Adjustments, BrushStroke, Mask};
use crate::error::{EditorError, EditorResult};
use crate::generative::prompts::{fill_instruction, filter_instruction, AiFilter};
use crate::generative::{ImageModel, InlineImage, ModelRequest};
use crate::utils::image::encode_png;

use super::session::SessionStore;
use super::types::{GeneratedImage, SessionInfo};

/// Run CPU-bound pixel work off the async runtime
async fn blocking<T, F>(f: F) -> EditorResult<T>
where
    F: FnOnce() -> EditorResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EditorError::Internal(anyhow::anyhow!("pixel task failed: {}", e)))?
}

/// Editor operations over server-side sessions
pub struct EditorService<M: ImageModel> {
    sessions: Arc<SessionStore>,
    model: Arc<M>,
    max_upload_bytes: usize,
}

impl<M: ImageModel> EditorService<M> {
    pub fn new(sessions: Arc<SessionStore>, model: Arc<M>, max_upload_bytes: usize) -> Self {
        Self {
            sessions,
            model,
            max_upload_bytes,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Open an editor on uploaded file bytes
    pub async fn open_upload(&self, data: Vec<u8>) -> EditorResult<SessionInfo> {
        let max = self.max_upload_bytes;
        let image = blocking(move || decode_upload(&data, max)).await?;
        let info = self.sessions.create(image);
        info!("Editor opened from upload: {} ({}x{})", info.id, info.width, info.height);
        Ok(info)
    }

    /// Open an editor on an image handed over by the generator or gallery
    pub async fn open_handoff(&self, token: &str) -> EditorResult<SessionInfo> {
        let image = self.sessions.handoffs().take(token)?;
        Ok(self.sessions.create(image))
    }

    /// Open an editor on an inline `data:` URL
    pub async fn open_data_url(&self, url: String) -> EditorResult<SessionInfo> {
        let max = self.max_upload_bytes;
        let image = blocking(move || decode_data_url(&url, max)).await?;
        Ok(self.sessions.create(image))
    }

    /// Stage a `data:` URL for the editor, e.g. from a gallery entry
    pub async fn handoff_data_url(&self, url: String) -> EditorResult<String> {
        let max = self.max_upload_bytes;
        let image = blocking(move || decode_data_url(&url, max)).await?;
        Ok(self.sessions.handoffs().put(image))
    }

    pub fn info(&self, id: &str) -> EditorResult<SessionInfo> {
        self.sessions.info(id)
    }

    /// Run a local pixel transform on the working buffer.
    ///
    /// `None` from the transform leaves the buffer as it was.
    async fn transform<F>(&self, id: &str, f: F) -> EditorResult<SessionInfo>
    where
        F: FnOnce(&RgbaImage) -> EditorResult<Option<RgbaImage>> + Send + 'static,
    {
        let guard = self.sessions.begin(id)?;
        let (current, _) = guard.snapshot()?;

        match blocking(move || f(&current)).await? {
            Some(output) => guard.commit(|s| s.replace_image(output)),
            None => guard.commit(|_| {}),
        }
    }

    pub async fn adjust(&self, id: &str, adjustments: Adjustments) -> EditorResult<SessionInfo> {
        adjustments.validate()?;
        if adjustments.is_identity() {
            return self.info(id);
        }
        self.transform(id, move |img| apply_adjustments(img, &adjustments).map(Some))
            .await
    }

    /// Zero-area or off-canvas regions are a no-op
    pub async fn crop(&self, id: &str, region: CropRegion) -> EditorResult<SessionInfo> {
        self.transform(id, move |img| Ok(transform::crop(img, region)))
            .await
    }

    pub async fn rotate(&self, id: &str, degrees: f32) -> EditorResult<SessionInfo> {
        if !degrees.is_finite() {
            return Err(EditorError::invalid("Rotation must be a finite number of degrees"));
        }
        if transform::normalize_degrees(degrees) == 0.0 {
            return self.info(id);
        }
        self.transform(id, move |img| Ok(Some(transform::rotate(img, degrees))))
            .await
    }

    /// Discard every edit and return to the uploaded image
    pub fn reset(&self, id: &str) -> EditorResult<SessionInfo> {
        self.sessions.update(id, |s| {
            s.reset();
            Ok(())
        })?;
        self.info(id)
    }

    /// Paint or erase along a pointer path
    pub async fn stroke(&self, id: &str, stroke: BrushStroke) -> EditorResult<SessionInfo> {
        stroke.validate()?;
        let guard = self.sessions.begin(id)?;
        let mut mask = guard.mask()?;

        let mask = blocking(move || {
            mask.apply_stroke(&stroke)?;
            Ok(mask)
        })
        .await?;
        guard.commit(|s| s.mask = mask)
    }

    /// Replace the mask with a client-rendered PNG of the same size
    pub async fn set_mask(&self, id: &str, png: Vec<u8>) -> EditorResult<SessionInfo> {
        let max = self.max_upload_bytes;
        let image = blocking(move || decode_upload(&png, max)).await?;
        self.sessions.update(id, |s| {
            s.mask = Mask::from_image(image, s.image.dimensions())?;
            Ok(())
        })?;
        self.info(id)
    }

    pub fn clear_mask(&self, id: &str) -> EditorResult<SessionInfo> {
        self.sessions.update(id, |s| {
            s.mask.clear();
            Ok(())
        })?;
        self.info(id)
    }

    pub async fn mask_png(&self, id: &str) -> EditorResult<Vec<u8>> {
        let mask = self.sessions.read(id, |s| s.mask.clone())?;
        blocking(move || Ok(mask.to_png()?)).await
    }

    pub async fn current_png(&self, id: &str) -> EditorResult<Vec<u8>> {
        let current = self.sessions.read(id, |s| s.image.current().clone())?;
        blocking(move || Ok(encode_png(&current)?)).await
    }

    /// Send the request and decode the returned image
    async fn call_model(&self, request: ModelRequest) -> EditorResult<(InlineImage, RgbaImage)> {
        let start = Instant::now();
        let output = self.model.edit(request).await?;
        let bytes = output.data.clone();
        let decoded = blocking(move || decode_model_image(&bytes)).await?;
        info!(
            "Model returned {}x{} image in {:?}",
            decoded.width(),
            decoded.height(),
            start.elapsed()
        );
        Ok((output, decoded))
    }

    /// Regenerate the masked area.
    ///
    /// An empty mask is rejected before the model is called. On success the
    /// buffer is replaced and the mask cleared; on failure both are kept.
    pub async fn generative_fill(&self, id: &str, prompt: &str) -> EditorResult<SessionInfo> {
        let guard = self.sessions.begin(id)?;
        let (current, mask) = guard.snapshot()?;
        if mask.is_empty() {
            return Err(EditorError::EmptyMask);
        }

        let (image_png, mask_png) =
            blocking(move || Ok((encode_png(&current)?, mask.to_png()?))).await?;
        let request = ModelRequest::text(fill_instruction(prompt))
            .with_image(InlineImage::png(image_png))
            .with_image(InlineImage::png(mask_png));

        let (_, output) = self.call_model(request).await.map_err(|e| {
            warn!("Generative fill failed for {}: {}", id, e);
            e
        })?;

        guard.commit(|s| {
            s.replace_image(output);
            s.mask.clear();
        })
    }

    /// Apply a model-backed style filter; there is no local fallback
    pub async fn apply_ai_filter(
        &self,
        id: &str,
        filter: AiFilter,
        extra: Option<&str>,
    ) -> EditorResult<SessionInfo> {
        let guard = self.sessions.begin(id)?;
        let (current, _) = guard.snapshot()?;

        let image_png = blocking(move || Ok(encode_png(&current)?)).await?;
        let request = ModelRequest::text(filter_instruction(filter, extra))
            .with_image(InlineImage::png(image_png));

        let (_, output) = self.call_model(request).await.map_err(|e| {
            warn!("AI filter {} failed for {}: {}", filter, id, e);
            e
        })?;

        guard.commit(|s| s.replace_image(output))
    }

    pub async fn export(&self, id: &str, resolution: Resolution) -> EditorResult<ExportedImage> {
        let current = self.sessions.read(id, |s| s.image.current().clone())?;
        blocking(move || export::export(&current, resolution)).await
    }

    pub fn close(&self, id: &str) -> EditorResult<()> {
        if self.sessions.remove(id) {
            Ok(())
        } else {
            Err(EditorError::not_found(format!("Edit session not found: {}", id)))
        }
    }

    /// Generate a new image from a text prompt and stage it for the editor
    pub async fn generate(&self, prompt: &str) -> EditorResult<GeneratedImage> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(EditorError::invalid("Please enter a prompt to generate an image"));
        }

        let (output, decoded) = self.call_model(ModelRequest::text(prompt)).await?;
        let (width, height) = decoded.dimensions();
        let handoff = self.sessions.handoffs().put(decoded);

        Ok(GeneratedImage {
            image: output.to_data_url(),
            handoff,
            width,
            height,
        })
    }
}

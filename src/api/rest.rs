//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{delete, get, post},
    body::Bytes,
    extract::{Path, State, Multipart, Query, DefaultBodyLimit, FromRequest, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::engine::{Adjustments, BrushStroke, CropRegion, Resolution};
use crate::error::EditorError;
use crate::generative::prompts::SAMPLE_PROMPTS;
use crate::generative::{AiFilter, ImageModel};
use crate::service::{EditorService, ImageUpdate, LibraryService, SaveImageRequest, SessionInfo};
use crate::storage::{GalleryEntry, GalleryRepository, ImageStorage};

use super::dto::*;

/// Application state shared across handlers
pub struct AppState<M: ImageModel, S: ImageStorage, G: GalleryRepository> {
    pub editor: Arc<EditorService<M>>,
    pub library: Arc<LibraryService<S, G>>,
    pub start_time: Instant,
}

type SharedState<M, S, G> = State<Arc<AppState<M, S, G>>>;
type ApiError = (StatusCode, Json<ErrorResponse>);

/// Create the REST API router
pub fn create_rest_router<M, S, G>(state: Arc<AppState<M, S, G>>, body_limit: usize) -> Router
where
    M: ImageModel,
    S: ImageStorage,
    G: GalleryRepository,
{
    Router::new()
        // Account images
        .route(
            "/images",
            post(save_image_handler::<M, S, G>)
                .get(list_images_handler::<M, S, G>)
                .delete(delete_image_handler::<M, S, G>)
                .patch(update_image_handler::<M, S, G>),
        )
        .route("/images/:id", get(get_image_handler::<M, S, G>))
        // Editor sessions
        .route("/editor/sessions", post(create_session_handler::<M, S, G>))
        .route(
            "/editor/sessions/:id",
            get(session_image_handler::<M, S, G>).delete(close_session_handler::<M, S, G>),
        )
        .route("/editor/sessions/:id/info", get(session_info_handler::<M, S, G>))
        .route("/editor/sessions/:id/adjust", post(adjust_handler::<M, S, G>))
        .route("/editor/sessions/:id/crop", post(crop_handler::<M, S, G>))
        .route("/editor/sessions/:id/rotate", post(rotate_handler::<M, S, G>))
        .route("/editor/sessions/:id/reset", post(reset_handler::<M, S, G>))
        .route("/editor/sessions/:id/mask/strokes", post(stroke_handler::<M, S, G>))
        .route(
            "/editor/sessions/:id/mask",
            get(get_mask_handler::<M, S, G>)
                .put(put_mask_handler::<M, S, G>)
                .delete(clear_mask_handler::<M, S, G>),
        )
        .route("/editor/sessions/:id/fill", post(fill_handler::<M, S, G>))
        .route("/editor/sessions/:id/ai-filter", post(ai_filter_handler::<M, S, G>))
        .route("/editor/sessions/:id/export", get(export_handler::<M, S, G>))
        .route("/editor/filters", get(editor_options_handler))
        // Generator
        .route("/generate", post(generate_handler::<M, S, G>))
        .route("/generate/prompts", get(prompts_handler))
        // Local gallery
        .route(
            "/gallery",
            get(gallery_list_handler::<M, S, G>).post(gallery_add_handler::<M, S, G>),
        )
        .route("/gallery/from-session/:id", post(gallery_from_session_handler::<M, S, G>))
        .route("/gallery/:id", delete(gallery_delete_handler::<M, S, G>))
        .route("/gallery/:id/edit", post(gallery_edit_handler::<M, S, G>))
        // System endpoints
        .route("/health", get(health_handler::<M, S, G>))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(err: &EditorError) -> StatusCode {
    match err {
        EditorError::InvalidInput(_)
        | EditorError::UnsupportedFormat
        | EditorError::TooLarge { .. }
        | EditorError::EmptyMask => StatusCode::BAD_REQUEST,
        EditorError::NotFound(_) => StatusCode::NOT_FOUND,
        EditorError::Busy => StatusCode::CONFLICT,
        EditorError::Model(_) => StatusCode::BAD_GATEWAY,
        EditorError::Storage(_) | EditorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: EditorError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    (status, Json(ErrorResponse::new(&err.to_string(), err.code())))
}

fn bad_request(message: &str, code: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message, code)))
}

fn png_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

/// Save an image to the caller's account
async fn save_image_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Json(request): Json<SaveImageRequest>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state.library.save_image(request).await.map_err(api_error)?;
    Ok(Json(ImageResponse { success: true, image }))
}

/// List images of the user with `?email=`
async fn list_images_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Query(query): Query<ImagesQuery>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let email = query.email.unwrap_or_default();
    let images = state.library.list_images(&email).await.map_err(api_error)?;
    Ok(Json(ImagesResponse { success: true, images }))
}

async fn get_image_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = state.library.get_image(&id).await.map_err(api_error)?;
    Ok(Json(ImageResponse { success: true, image }))
}

/// Delete the image with `?id=`
async fn delete_image_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Query(query): Query<ImagesQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = query.id.unwrap_or_default();
    state.library.delete_image(&id).await.map_err(api_error)?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Image deleted successfully".to_string(),
    }))
}

async fn update_image_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Query(query): Query<ImagesQuery>,
    Json(update): Json<ImageUpdate>,
) -> Result<Json<ImageResponse>, ApiError> {
    let id = query.id.unwrap_or_default();
    let image = state.library.update_image(&id, update).await.map_err(api_error)?;
    Ok(Json(ImageResponse { success: true, image }))
}

/// Open an editor from a multipart upload (`image` field) or a JSON body
async fn create_session_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    request: Request,
) -> Result<Json<SessionInfo>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let result = if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| bad_request(&e.body_text(), "MULTIPART_ERROR"))?;

        let mut image_data: Option<Vec<u8>> = None;
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            bad_request(&e.to_string(), "MULTIPART_ERROR")
        })? {
            if field.name() == Some("image") {
                image_data = Some(field.bytes().await.map_err(|e| {
                    bad_request(&e.to_string(), "READ_ERROR")
                })?.to_vec());
            }
        }

        let image_data = image_data.ok_or_else(|| bad_request("Missing image field", "MISSING_IMAGE"))?;
        state.editor.open_upload(image_data).await
    } else {
        let Json(body) = Json::<OpenSessionRequest>::from_request(request, &())
            .await
            .map_err(|e| bad_request(&e.body_text(), "INVALID_JSON"))?;

        match (body.handoff, body.image_url) {
            (Some(token), _) => state.editor.open_handoff(&token).await,
            (None, Some(url)) => state.editor.open_data_url(url).await,
            (None, None) => Err(EditorError::invalid("Either handoff or imageUrl is required")),
        }
    };

    Ok(Json(result.map_err(api_error)?))
}

/// Current working buffer as PNG
async fn session_image_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let png = state.editor.current_png(&id).await.map_err(api_error)?;
    Ok(png_response(png))
}

async fn session_info_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.info(&id).map_err(api_error)?))
}

async fn close_session_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.editor.close(&id).map_err(api_error)?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Session closed".to_string(),
    }))
}

async fn adjust_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(adjustments): Json<Adjustments>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.adjust(&id, adjustments).await.map_err(api_error)?))
}

async fn crop_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(region): Json<CropRegion>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.crop(&id, region).await.map_err(api_error)?))
}

async fn rotate_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(request): Json<RotateRequest>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.rotate(&id, request.degrees).await.map_err(api_error)?))
}

async fn reset_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.reset(&id).map_err(api_error)?))
}

async fn stroke_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(stroke): Json<BrushStroke>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.stroke(&id, stroke).await.map_err(api_error)?))
}

async fn get_mask_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let png = state.editor.mask_png(&id).await.map_err(api_error)?;
    Ok(png_response(png))
}

/// Replace the mask with a PNG body of the same size as the image
async fn put_mask_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.set_mask(&id, body.to_vec()).await.map_err(api_error)?))
}

async fn clear_mask_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(state.editor.clear_mask(&id).map_err(api_error)?))
}

async fn fill_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(request): Json<FillRequest>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(
        state
            .editor
            .generative_fill(&id, &request.prompt)
            .await
            .map_err(api_error)?,
    ))
}

async fn ai_filter_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Json(request): Json<AiFilterRequest>,
) -> Result<Json<SessionInfo>, ApiError> {
    let filter: AiFilter = request.filter.parse().map_err(api_error)?;
    Ok(Json(
        state
            .editor
            .apply_ai_filter(&id, filter, request.prompt.as_deref())
            .await
            .map_err(api_error)?,
    ))
}

/// Download the working buffer at `?resolution=` as a PNG attachment
async fn export_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let resolution: Resolution = match query.resolution.as_deref() {
        Some(r) => r.parse().map_err(api_error)?,
        None => Resolution::Original,
    };
    let exported = state.editor.export(&id, resolution).await.map_err(api_error)?;

    let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

/// AI filter catalogue and export resolutions
async fn editor_options_handler() -> Json<EditorOptionsResponse> {
    let filters = AiFilter::ALL
        .iter()
        .map(|f| FilterDto {
            id: f.id(),
            name: f.name(),
            description: f.description(),
        })
        .collect();
    let resolutions = Resolution::ALL
        .iter()
        .map(|r| {
            let dims = r.dimensions();
            ResolutionDto {
                id: r.id(),
                label: r.label(),
                width: dims.map(|d| d.0),
                height: dims.map(|d| d.1),
            }
        })
        .collect();

    Json(EditorOptionsResponse { filters, resolutions })
}

/// Generate an image from a prompt, optionally keeping it in the gallery
async fn generate_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let generated = state.editor.generate(&request.prompt).await.map_err(api_error)?;

    let (gallery_entry, gallery_error) = if request.save_to_gallery {
        match state
            .library
            .gallery_add_generated(generated.image.clone(), &request.prompt)
            .await
        {
            Ok(entry) => (Some(entry), None),
            Err(e) => {
                warn!("Generated image not saved to gallery: {}", e);
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(Json(GenerateResponse {
        image: generated.image,
        handoff: generated.handoff,
        width: generated.width,
        height: generated.height,
        gallery_entry,
        gallery_error,
    }))
}

async fn prompts_handler() -> Json<PromptsResponse> {
    Json(PromptsResponse {
        prompts: SAMPLE_PROMPTS.to_vec(),
    })
}

async fn gallery_list_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Query(query): Query<GalleryQuery>,
) -> Result<Json<GalleryResponse>, ApiError> {
    let images = state
        .library
        .gallery_list(query.search.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(GalleryResponse { images }))
}

async fn gallery_add_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Json(request): Json<GalleryAddRequest>,
) -> Result<Json<GalleryEntry>, ApiError> {
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| crate::service::library::DEFAULT_TITLE.to_string());
    let entry = state
        .library
        .gallery_add(request.url, name, request.tags)
        .await
        .map_err(api_error)?;
    Ok(Json(entry))
}

/// Keep the current editor result in the gallery
async fn gallery_from_session_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<GalleryEntry>, ApiError> {
    let png = state.editor.current_png(&id).await.map_err(api_error)?;
    let entry = state.library.gallery_add_edited(&png).await.map_err(api_error)?;
    Ok(Json(entry))
}

/// Stage a gallery image for the editor
async fn gallery_edit_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<HandoffResponse>, ApiError> {
    let entry = state.library.gallery_get(&id).await.map_err(api_error)?;
    let handoff = state.editor.handoff_data_url(entry.url).await.map_err(api_error)?;
    Ok(Json(HandoffResponse { handoff }))
}

async fn gallery_delete_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.library.gallery_delete(&id).await.map_err(api_error)?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Image removed from gallery".to_string(),
    }))
}

/// Health check handler
async fn health_handler<M: ImageModel, S: ImageStorage, G: GalleryRepository>(
    State(state): SharedState<M, S, G>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        open_sessions: state.editor.sessions().len(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        Category, ClosetItem, FeedbackRequest, FeedbackResponse, Hyperparams, NewClosetItem,
        RecommendRequest, RecommendResponse,
    },
    services::feedback,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ClosetQuery {
    pub category: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendRequest>,
) -> AppResult<Json<RecommendResponse>> {
    tracing::info!(
        request_id = %request_id,
        mood = %request.mood,
        temperature = ?request.temperature,
        "Processing recommendation request"
    );

    let response = state.recommender.recommend(request).await?;
    Ok(Json(response))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<FeedbackResponse>> {
    let recommendation_id = request
        .recommendation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::NotFound("Recommendation id is missing".to_string()))?;

    let liked = match request.liked {
        Some(Value::Bool(liked)) => liked,
        _ => return Err(AppError::InvalidInput("liked must be a boolean".to_string())),
    };

    tracing::info!(request_id = %request_id, recommendation_id, liked, "Processing feedback");

    let updated = feedback::apply_feedback(
        state.history.as_ref(),
        state.hyperparams.as_ref(),
        recommendation_id,
        liked,
    )
    .await?;

    Ok(Json(FeedbackResponse { ok: true, updated }))
}

pub async fn get_hyperparams(State(state): State<AppState>) -> AppResult<Json<Hyperparams>> {
    Ok(Json(state.hyperparams.get_baseline().await?))
}

pub async fn list_closet(
    State(state): State<AppState>,
    Query(query): Query<ClosetQuery>,
) -> AppResult<Json<Vec<ClosetItem>>> {
    let items = match query.category.as_deref() {
        Some(raw) => {
            let category = Category::parse(raw)
                .ok_or_else(|| AppError::InvalidInput(format!("Unknown category: {}", raw)))?;
            state.closet.find_by_category(category).await?
        }
        None => state.closet.find_all().await?,
    };
    Ok(Json(items))
}

pub async fn create_closet_item(
    State(state): State<AppState>,
    Json(request): Json<NewClosetItem>,
) -> AppResult<(StatusCode, Json<ClosetItem>)> {
    let item = state.closet.create(request).await?;
    tracing::info!(item_id = %item.id, category = %item.category(), "Created closet item");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_closet_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ClosetItem>> {
    state
        .closet
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Closet item {}", id)))
}

pub async fn delete_closet_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.closet.delete(&id).await?;
    tracing::info!(item_id = %id, "Deleted closet item");
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts a raw image and encodes it in the background; the vector is stored
/// once the embedder answers. Encoding failures are only logged.
pub async fn upload_item_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<Value>)> {
    if body.is_empty() {
        return Err(AppError::InvalidInput("Image body is empty".to_string()));
    }
    if state.closet.find_by_id(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Closet item {}", id)));
    }

    let closet = state.closet.clone();
    let embedder = state.embedder.clone();
    let item_id = id.clone();
    tokio::spawn(async move {
        let file_name = format!("{}.jpg", item_id);
        let stored = match embedder.encode_image(body.to_vec(), file_name).await {
            Ok(vector) => closet.update_vector(&item_id, vector).await,
            Err(e) => Err(e),
        };
        match stored {
            Ok(()) => tracing::info!(item_id = %item_id, "Stored image vector"),
            Err(e) => tracing::warn!(item_id = %item_id, error = %e, "Image encoding failed"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id, "status": "encoding" }))))
}

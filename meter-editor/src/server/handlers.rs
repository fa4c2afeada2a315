use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::{EditorError, MeterEditor};
use crate::edit::EditError;
use crate::notice::Notice;

pub(super) struct ApiError(EditorError);

impl From<EditorError> for ApiError {
    fn from(err: EditorError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &EditorError) -> StatusCode {
    match err {
        EditorError::Loading | EditorError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EditorError::UnknownMeter(_) => StatusCode::NOT_FOUND,
        EditorError::NoSelection => StatusCode::CONFLICT,
        EditorError::Edit(EditError::Rejected { .. }) => StatusCode::CONFLICT,
        EditorError::Edit(EditError::Store(_)) | EditorError::Load(_) | EditorError::Store(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request refused");
        }
        (status, Json(json!({ "notice": self.0.notice() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub(super) async fn status(State(editor): State<Arc<MeterEditor>>) -> impl IntoResponse {
    Json(editor.status().await)
}

pub(super) async fn reload(State(editor): State<Arc<MeterEditor>>) -> Response {
    match editor.reload().await {
        Ok(summary) => Json(json!({
            "summary": summary,
            "notice": Notice::info(format!("Loaded {} meters.", summary.total)),
        }))
        .into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

pub(super) async fn layer(State(editor): State<Arc<MeterEditor>>) -> ApiResult<serde_json::Value> {
    Ok(Json(editor.layer().await?))
}

pub(super) async fn renderer(
    State(editor): State<Arc<MeterEditor>>,
) -> ApiResult<crate::classify::RendererView> {
    Ok(Json(editor.renderer().await?))
}

pub(super) async fn summary(
    State(editor): State<Arc<MeterEditor>>,
) -> ApiResult<crate::classify::Summary> {
    Ok(Json(editor.summary().await?))
}

pub(super) async fn extent(
    State(editor): State<Arc<MeterEditor>>,
) -> ApiResult<Option<feature_client::Extent>> {
    Ok(Json(editor.extent().await?))
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    #[serde(default)]
    q: String,
}

pub(super) async fn search(
    State(editor): State<Arc<MeterEditor>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<crate::search::SearchOutcome> {
    Ok(Json(editor.search(&params.q).await?))
}

pub(super) async fn meter(
    State(editor): State<Arc<MeterEditor>>,
    Path(id): Path<i64>,
) -> ApiResult<feature_client::MeterRecord> {
    Ok(Json(editor.find(id).await?))
}

pub(super) async fn select(
    State(editor): State<Arc<MeterEditor>>,
    Path(id): Path<i64>,
) -> ApiResult<crate::selection::SelectedMeter> {
    Ok(Json(editor.select_by_id(id).await?))
}

pub(super) async fn selection(State(editor): State<Arc<MeterEditor>>) -> impl IntoResponse {
    Json(editor.selection().await)
}

pub(super) async fn close_selection(State(editor): State<Arc<MeterEditor>>) -> impl IntoResponse {
    let closed = editor.close_selection().await;
    Json(json!({ "closed": closed }))
}

#[derive(Debug, Deserialize)]
pub(super) struct MapClick {
    x: f64,
    y: f64,
}

pub(super) async fn hit_test(
    State(editor): State<Arc<MeterEditor>>,
    Json(click): Json<MapClick>,
) -> Result<Response, ApiError> {
    let hit = editor.select_at(click.x, click.y).await?;
    let selection = editor.selection().await;
    Ok(Json(json!({ "hit": hit.is_some(), "selection": selection })).into_response())
}

#[derive(Debug, Deserialize)]
pub(super) struct AccountUpdateBody {
    #[serde(default)]
    value: String,
}

pub(super) async fn submit_edit(
    State(editor): State<Arc<MeterEditor>>,
    Json(body): Json<AccountUpdateBody>,
) -> Response {
    match editor.submit_edit(&body.value).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e @ EditorError::Edit(_)) => {
            // The form stays open with the attempted value, so send it back.
            tracing::warn!(error = %e, "account update not saved");
            let selection = editor.selection().await;
            (
                status_for(&e),
                Json(json!({ "notice": e.notice(), "selection": selection })),
            )
                .into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

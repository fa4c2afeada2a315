mod handlers;
mod live_search;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};

use crate::app::MeterEditor;

pub fn router(editor: Arc<MeterEditor>) -> Router {
    Router::new()
        .route("/api/status", get(handlers::status))
        .route("/api/reload", post(handlers::reload))
        .route("/api/layer", get(handlers::layer))
        .route("/api/renderer", get(handlers::renderer))
        .route("/api/summary", get(handlers::summary))
        .route("/api/extent", get(handlers::extent))
        .route("/api/search", get(handlers::search))
        .route("/api/search/live", get(live_search::live_search))
        .route("/api/meters/:id", get(handlers::meter))
        .route("/api/meters/:id/select", post(handlers::select))
        .route(
            "/api/selection",
            get(handlers::selection).delete(handlers::close_selection),
        )
        .route("/api/selection/hit-test", post(handlers::hit_test))
        .route("/api/selection/account-update", put(handlers::submit_edit))
        .with_state(editor)
}

pub async fn serve(bind_addr: &str, editor: Arc<MeterEditor>) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid server bind address '{bind_addr}'"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "meter editor listening");

    axum::serve(listener, router(editor).into_make_service()).await?;
    Ok(())
}

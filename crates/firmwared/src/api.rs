// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! HTTP surface
//!
//! Thin translation layer: every request becomes a `Command` on the agent's
//! channel and the handler waits for the agent's reply. Request semantics
//! live in `agent`, not here.

use crate::agent::{ApiResponse, Command};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone, Debug)]
pub struct ApiState {
    tx: mpsc::Sender<Command>,
}

pub fn router(tx: mpsc::Sender<Command>) -> Router {
    Router::new()
        .route("/system/firmware", get(get_firmware).put(put_firmware))
        .route("/system/firmware/check", get(check_firmware))
        .with_state(ApiState { tx })
}

async fn get_firmware(State(state): State<ApiState>) -> Response {
    dispatch(&state, |reply| Command::Get { reply }).await
}

async fn check_firmware(State(state): State<ApiState>) -> Response {
    dispatch(&state, |reply| Command::Check { reply }).await
}

async fn put_firmware(State(state): State<ApiState>, body: Bytes) -> Response {
    dispatch(&state, move |reply| Command::Put {
        body: body.to_vec(),
        reply,
    })
    .await
}

async fn dispatch(
    state: &ApiState,
    make: impl FnOnce(oneshot::Sender<ApiResponse>) -> Command,
) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();

    if state.tx.send(make(reply_tx)).await.is_err() {
        return unavailable();
    }

    match reply_rx.await {
        Ok(response) => {
            let code = StatusCode::from_u16(response.code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (code, Json(response.body)).into_response()
        }
        Err(_) => unavailable(),
    }
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "message": "Unknown error." })),
    )
        .into_response()
}

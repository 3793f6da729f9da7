//! Request handlers.

use std::sync::Arc;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use spout_logs::{Source, TypeFilter};
use spout_routes::Route;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{HttpError, HttpResult};
use crate::format::{LineFormatter, OutputMode};
use crate::state::AppState;
use crate::stream::RecordStream;
use crate::websocket;

/// Query parameters accepted by the log endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Comma separated stream types to include (`stdout`, `stderr`).
    #[serde(default, alias = "type")]
    pub types: Option<String>,
    /// `off` disables colour in multi-container text output.
    #[serde(default)]
    pub colors: Option<String>,
}

impl LogQuery {
    fn type_filter(&self) -> HttpResult<TypeFilter> {
        match self.types.as_deref() {
            None | Some("") => Ok(TypeFilter::default()),
            Some(list) => Ok(TypeFilter::parse_list(list)?),
        }
    }

    fn colors(&self) -> bool {
        self.colors.as_deref() != Some("off")
    }
}

/// `GET /logs`: every container.
pub async fn logs_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> HttpResult<Response> {
    stream_logs(&state, Source::All, &query, &headers, ws.ok())
}

/// `GET /logs/{predicate}:{value}`: containers selected by id, name or filter.
pub async fn logs_selected(
    State(state): State<Arc<AppState>>,
    Path(selector): Path<String>,
    Query(query): Query<LogQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> HttpResult<Response> {
    let source = parse_selector(&selector)?;
    stream_logs(&state, source, &query, &headers, ws.ok())
}

/// Parses a `<predicate>:<value>` path segment.
pub fn parse_selector(selector: &str) -> HttpResult<Source> {
    let Some((predicate, value)) = selector.split_once(':') else {
        return Err(HttpError::BadRequest(format!(
            "expected <predicate>:<value>, got {selector:?}"
        )));
    };
    if value.is_empty() {
        return Err(HttpError::BadRequest(format!("empty value for {predicate}")));
    }
    Ok(Source::from_predicate(predicate, value)?)
}

fn stream_logs(
    state: &AppState,
    source: Source,
    query: &LogQuery,
    headers: &HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> HttpResult<Response> {
    let types = query.type_filter()?;
    let multi = source.is_multi();
    let (tx, rx) = mpsc::channel(state.attacher().config().listener_buffer);
    let subscription = state.attacher().subscribe(source, tx)?;

    if let Some(ws) = ws {
        debug!(listener = subscription.id(), "upgrading log stream to websocket");
        return Ok(ws.on_upgrade(move |socket| {
            websocket::stream_records(socket, rx, subscription, types)
        }));
    }

    let json = accepts_json(headers);
    let mode = if json {
        OutputMode::Json
    } else if multi {
        OutputMode::Prefixed {
            colors: query.colors(),
        }
    } else {
        OutputMode::Raw
    };
    let content_type = if json {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };

    let formatter = LineFormatter::new(mode, state.config().name_width);
    let body = Body::from_stream(RecordStream::new(rx, subscription, types, formatter));
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// `GET /routes`
pub async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<Route>> {
    Json(state.routes().get_all())
}

/// `POST /routes`
///
/// The body is decoded by hand so a malformed route yields a 400 with the
/// decoder's message regardless of the request's content type.
pub async fn create_route(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> HttpResult<(StatusCode, Json<Route>)> {
    let route: Route =
        serde_json::from_slice(&body).map_err(|e| HttpError::BadRequest(e.to_string()))?;
    let route = state.routes().add(route).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

/// `GET /routes/{id}`
pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HttpResult<Json<Route>> {
    state
        .routes()
        .get(&id)
        .map(Json)
        .ok_or_else(|| HttpError::NotFound("route".to_string(), id))
}

/// `DELETE /routes/{id}`
pub async fn delete_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> HttpResult<StatusCode> {
    if state.routes().remove(&id).await? {
        Ok(StatusCode::OK)
    } else {
        Err(HttpError::NotFound("route".to_string(), id))
    }
}

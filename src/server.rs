/*
 * @file server.rs
 * @brief HTTP API surface bridging chat clients and the device link
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! HTTP routes, request validation, and the shared application state.

use crate::dispatcher::Dispatcher;
use crate::llm::LlmClient;
use crate::sensor::SensorHandle;
use crate::translator::translate;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared state for the HTTP server.
///
/// # Details
/// Owns the three long-lived collaborators every request may touch:
/// the device dispatcher, the latest sensor readings, and the chat
/// completion client. Handlers receive it behind an `Arc`.
pub struct AppState {
    /// Write side of the device link.
    pub dispatcher: Dispatcher,
    /// Latest telemetry from the reader thread.
    pub sensors: SensorHandle,
    /// Chat completion client.
    pub llm: LlmClient,
}

/// Chat request body; `msg` is accepted as an alias for `message`.
#[derive(Default, Deserialize)]
struct ChatRequest {
    #[serde(alias = "msg")]
    message: Option<String>,
    temp: Option<String>,
    humidity: Option<String>,
}

/// Successful chat reply with the commands it produced.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
    commands: Vec<String>,
}

/// Error body shared by every endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health probe payload.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(rename = "serialConnected")]
    serial_connected: bool,
}

/// Manual command request body.
#[derive(Default, Deserialize)]
struct CommandRequest {
    command: Option<String>,
}

/// Manual command acknowledgment.
#[derive(Serialize)]
struct CommandResponse {
    message: &'static str,
    command: String,
}

/// Raw control request; fields stay untyped so validation can tell
/// a missing value from a non-integer one.
#[derive(Default, Deserialize)]
struct ControlRequest {
    r: Option<Value>,
    g: Option<Value>,
    b: Option<Value>,
    fan: Option<Value>,
}

/// Control acknowledgment echoing the validated values.
#[derive(Serialize)]
struct ControlResponse {
    message: &'static str,
    r: i64,
    g: i64,
    b: i64,
    fan: i64,
}

/// Constructs the router with all bridge routes installed.
///
/// # Arguments
/// * `state` - The application state to share across handlers.
///
/// # Returns
/// * `Router` - Ready to serve, CORS middleware included.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);
    Router::new()
        .route("/api/chat", post(post_chat))
        .route("/api/health", get(get_health))
        .route("/api/arduino", post(post_arduino))
        .route("/api/sensor", get(get_sensor))
        .route("/api/control", post(post_control))
        .layer(middleware::from_fn(cors))
        .with_state(shared)
}

/// Runs the server on the provided socket address.
///
/// # Arguments
/// * `state` - The application state to share across handlers.
/// * `addr` - Address to bind, port 0 picks a free one.
///
/// # Errors
/// Returns an error if binding or serving fails.
pub async fn run_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", listener.local_addr()?.port());
    axum::serve(listener, build_router(state)).await
}

/// Wildcard CORS for the browser clients on other origins.
///
/// # Details
/// Preflight requests are answered directly with no content; every
/// other response gets the same fixed allowance headers attached on
/// the way out.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

/// Attaches the fixed CORS allowance headers.
fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Handles a chat exchange end to end.
///
/// # Details
/// Validates the message, folds optional studio telemetry into the
/// prompt, fetches the completion, translates it into device commands,
/// and dispatches each one best effort. Dispatch outcomes never change
/// the HTTP result; the reply and commands are returned even when the
/// board is unplugged.
async fn post_chat(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ChatRequest>>,
) -> Response {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let message = match request.message.filter(|message| !message.is_empty()) {
        Some(message) => message,
        None => return error_response(StatusCode::BAD_REQUEST, "Message is required"),
    };
    if !state.llm.is_configured() {
        error!("OPENAI_API_KEY is not set");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OpenAI API key not configured",
        );
    }
    let prompt = compose_prompt(&message, request.temp.as_deref(), request.humidity.as_deref());
    let reply = match state.llm.chat(&prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("Chat completion error: {:#}", err);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to process request",
            );
        }
    };
    let commands = translate(&reply);
    for command in &commands {
        state.dispatcher.dispatch(command);
    }
    (
        StatusCode::OK,
        Json(ChatResponse {
            response: reply,
            commands,
        }),
    )
        .into_response()
}

/// Reports service liveness and the device link state.
async fn get_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            serial_connected: state.dispatcher.is_connected(),
        }),
    )
}

/// Dispatches one raw command straight to the device.
///
/// # Details
/// The command text is not validated against the chat vocabulary; this
/// endpoint exists for panels and scripts that speak the device wire
/// format directly. Dispatch remains best effort.
async fn post_arduino(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CommandRequest>>,
) -> Response {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let command = match request.command.filter(|command| !command.is_empty()) {
        Some(command) => command,
        None => return error_response(StatusCode::BAD_REQUEST, "Command is required"),
    };
    state.dispatcher.dispatch(&command);
    (
        StatusCode::OK,
        Json(CommandResponse {
            message: "Command sent to Arduino",
            command,
        }),
    )
        .into_response()
}

/// Returns the latest sensor readings.
async fn get_sensor(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readings = *state.sensors.lock().unwrap();
    (StatusCode::OK, Json(readings))
}

/// Validates and dispatches an RGB plus fan control frame.
///
/// # Details
/// Each channel must be a JSON integer between 0 and 255. All four are
/// checked before answering so one request reports every problem at
/// once, joined in field order.
async fn post_control(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ControlRequest>>,
) -> Response {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let mut errors = Vec::new();
    let r = validate_channel(request.r.as_ref(), "r", &mut errors);
    let g = validate_channel(request.g.as_ref(), "g", &mut errors);
    let b = validate_channel(request.b.as_ref(), "b", &mut errors);
    let fan = validate_channel(request.fan.as_ref(), "fan", &mut errors);
    if let (Some(r), Some(g), Some(b), Some(fan)) = (r, g, b, fan) {
        state
            .dispatcher
            .dispatch(&format!("{},{},{},{}", r, g, b, fan));
        (
            StatusCode::OK,
            Json(ControlResponse {
                message: "RGB and fan values sent",
                r,
                g,
                b,
                fan,
            }),
        )
            .into_response()
    } else {
        error_response(StatusCode::BAD_REQUEST, &errors.join("; "))
    }
}

/// Validates one control channel, collecting a message on failure.
///
/// # Arguments
/// * `value` - The raw JSON value, if the field was present.
/// * `name` - Field name used in error messages.
/// * `errors` - Sink for validation messages.
///
/// # Returns
/// * `Some(i64)` - The in-range integer value.
/// * `None` - Invalid; a message was added to `errors`.
fn validate_channel(value: Option<&Value>, name: &str, errors: &mut Vec<String>) -> Option<i64> {
    match value.and_then(Value::as_i64) {
        Some(channel) if (0..=255).contains(&channel) => Some(channel),
        Some(_) => {
            errors.push(format!("{} must be between 0 and 255", name));
            None
        }
        None => {
            errors.push(format!("{} must be an integer", name));
            None
        }
    }
}

/// Builds the studio prompt, folding in telemetry when provided.
///
/// # Details
/// A bare message passes through untouched. As soon as either reading
/// appears the whole message is wrapped in the annotated form the
/// model was prompted to expect, with `0` standing in for the missing
/// reading.
fn compose_prompt(message: &str, temp: Option<&str>, humidity: Option<&str>) -> String {
    if temp.is_none() && humidity.is_none() {
        return message.to_string();
    }
    let temp = temp.unwrap_or("0");
    let humidity = humidity.unwrap_or("0");
    format!(
        "{{msg: \"{}\", temp: \"{}\", humidity: \"{}\"}}",
        message, temp, humidity
    )
}

/// Uniform JSON error body.
fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::routing::post;
use axum::{Json, Router};
use chatduino::config::Settings;
use chatduino::dispatcher::{DeviceChannel, Dispatcher};
use chatduino::llm::LlmClient;
use chatduino::sensor::{self, SensorReadings};
use chatduino::server::{build_router, AppState};
use reqwest::Client;
use tokio::task::JoinHandle;

/// Channel that records every frame instead of touching hardware.
struct RecordingChannel {
    frames: Arc<Mutex<Vec<String>>>,
}

impl DeviceChannel for RecordingChannel {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(frame).into_owned();
        self.frames.lock().unwrap().push(text);
        Ok(())
    }
}

fn test_settings(api_url: &str, api_key: Option<&str>) -> Settings {
    Settings {
        serial_port: String::new(),
        baud_rate: 9600,
        http_port: 0,
        api_key: api_key.map(str::to_string),
        chat_api_url: api_url.to_string(),
        chat_model: "gpt-3.5-turbo".to_string(),
    }
}

fn disconnected_state(api_url: &str, api_key: Option<&str>) -> AppState {
    AppState {
        dispatcher: Dispatcher::disconnected(),
        sensors: sensor::new_handle(),
        llm: LlmClient::new(&test_settings(api_url, api_key)),
    }
}

fn recording_state(api_url: &str, api_key: Option<&str>) -> (AppState, Arc<Mutex<Vec<String>>>) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let channel = RecordingChannel {
        frames: frames.clone(),
    };
    let state = AppState {
        dispatcher: Dispatcher::connected(Box::new(channel)),
        sensors: sensor::new_handle(),
        llm: LlmClient::new(&test_settings(api_url, api_key)),
    };
    (state, frames)
}

async fn start_server(router: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, handle)
}

/// Stub completions endpoint answering with a fixed reply.
async fn start_completions_stub(reply: &'static str) -> (SocketAddr, JoinHandle<()>) {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(_body): Json<serde_json::Value>| async move {
            Json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            }))
        }),
    );
    start_server(router).await
}

/// Stub completions endpoint echoing the user prompt back as the reply.
async fn start_echo_stub() -> (SocketAddr, JoinHandle<()>) {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<serde_json::Value>| async move {
            let prompt = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
            Json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": prompt}}]
            }))
        }),
    );
    start_server(router).await
}

/// Stub completions endpoint that always fails.
async fn start_failing_stub() -> (SocketAddr, JoinHandle<()>) {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": {"message": "quota exceeded"}})),
            )
        }),
    );
    start_server(router).await
}

#[tokio::test]
async fn health_reports_link_state_and_cors() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;

    let response = Client::new()
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .expect("http health");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["serialConnected"], false);

    server.abort();
}

#[tokio::test]
async fn health_reports_open_link() {
    let (state, _frames) = recording_state("http://unused", None);
    let (addr, server) = start_server(build_router(state)).await;

    let body: serde_json::Value = Client::new()
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .expect("http health")
        .json()
        .await
        .expect("json");
    assert_eq!(body["serialConnected"], true);

    server.abort();
}

#[tokio::test]
async fn preflight_is_answered_with_cors_headers() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;

    let response = Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/api/chat"),
        )
        .send()
        .await
        .expect("http preflight");
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-methods")
            .and_then(|value| value.to_str().ok()),
        Some("GET, POST, OPTIONS")
    );
    assert_eq!(
        headers
            .get("access-control-allow-headers")
            .and_then(|value| value.to_str().ok()),
        Some("Content-Type")
    );

    server.abort();
}

#[tokio::test]
async fn chat_requires_a_message() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", Some("sk-test")))).await;
    let client = Client::new();

    let empty_object = client
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("http chat");
    assert_eq!(empty_object.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = empty_object.json().await.expect("json");
    assert_eq!(body["error"], "Message is required");

    // No body at all behaves the same as an empty one.
    let no_body = client
        .post(format!("http://{addr}/api/chat"))
        .send()
        .await
        .expect("http chat");
    assert_eq!(no_body.status(), reqwest::StatusCode::BAD_REQUEST);

    let empty_message = client
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({"message": ""}))
        .send()
        .await
        .expect("http chat");
    assert_eq!(empty_message.status(), reqwest::StatusCode::BAD_REQUEST);

    server.abort();
}

#[tokio::test]
async fn chat_without_api_key_is_a_server_error() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({"message": "turn on the led"}))
        .send()
        .await
        .expect("http chat");
    assert_eq!(
        response.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["error"], "OpenAI API key not configured");

    server.abort();
}

#[tokio::test]
async fn chat_translates_reply_and_dispatches_commands() {
    let (stub_addr, stub) = start_completions_stub("Sure, I'll turn the LED on now.").await;
    let api_url = format!("http://{stub_addr}/v1/chat/completions");
    let (state, frames) = recording_state(&api_url, Some("sk-test"));
    let (addr, server) = start_server(build_router(state)).await;

    let body: serde_json::Value = Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({"message": "please turn on the led"}))
        .send()
        .await
        .expect("http chat")
        .json()
        .await
        .expect("json");
    assert_eq!(body["response"], "Sure, I'll turn the LED on now.");
    assert_eq!(body["commands"], serde_json::json!(["LED_ON"]));
    assert_eq!(*frames.lock().unwrap(), vec!["LED_ON\n".to_string()]);

    server.abort();
    stub.abort();
}

#[tokio::test]
async fn chat_folds_telemetry_into_the_prompt() {
    let (stub_addr, stub) = start_echo_stub().await;
    let api_url = format!("http://{stub_addr}/v1/chat/completions");
    let (addr, server) = start_server(build_router(disconnected_state(&api_url, Some("sk-test")))).await;

    let body: serde_json::Value = Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({"msg": "hello", "temp": "21", "humidity": "40"}))
        .send()
        .await
        .expect("http chat")
        .json()
        .await
        .expect("json");
    assert_eq!(
        body["response"],
        "{msg: \"hello\", temp: \"21\", humidity: \"40\"}"
    );
    // The folded prompt has no device keywords, so only the fallback fires.
    assert_eq!(body["commands"], serde_json::json!(["RESPONSE_RECEIVED"]));

    server.abort();
    stub.abort();
}

#[tokio::test]
async fn chat_upstream_failure_maps_to_uniform_error() {
    let (stub_addr, stub) = start_failing_stub().await;
    let api_url = format!("http://{stub_addr}/v1/chat/completions");
    let (addr, server) = start_server(build_router(disconnected_state(&api_url, Some("sk-test")))).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/chat"))
        .json(&serde_json::json!({"message": "turn on the led"}))
        .send()
        .await
        .expect("http chat");
    assert_eq!(
        response.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["error"], "Failed to process request");

    server.abort();
    stub.abort();
}

#[tokio::test]
async fn arduino_dispatches_raw_commands() {
    let (state, frames) = recording_state("http://unused", None);
    let (addr, server) = start_server(build_router(state)).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/arduino"))
        .json(&serde_json::json!({"command": "SERVO_45"}))
        .send()
        .await
        .expect("http arduino");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["message"], "Command sent to Arduino");
    assert_eq!(body["command"], "SERVO_45");
    assert_eq!(*frames.lock().unwrap(), vec!["SERVO_45\n".to_string()]);

    server.abort();
}

#[tokio::test]
async fn arduino_requires_a_command() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;
    let client = Client::new();

    let missing = client
        .post(format!("http://{addr}/api/arduino"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("http arduino");
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = missing.json().await.expect("json");
    assert_eq!(body["error"], "Command is required");

    let empty = client
        .post(format!("http://{addr}/api/arduino"))
        .json(&serde_json::json!({"command": ""}))
        .send()
        .await
        .expect("http arduino");
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);

    server.abort();
}

#[tokio::test]
async fn arduino_succeeds_without_hardware() {
    // Best effort: a missing device never turns into a client-visible error.
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/arduino"))
        .json(&serde_json::json!({"command": "LED_ON"}))
        .send()
        .await
        .expect("http arduino");
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.abort();
}

#[tokio::test]
async fn write_failure_flips_health_without_failing_the_request() {
    struct BrokenChannel;

    impl DeviceChannel for BrokenChannel {
        fn write_frame(&mut self, _frame: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))
        }
    }

    let state = AppState {
        dispatcher: Dispatcher::connected(Box::new(BrokenChannel)),
        sensors: sensor::new_handle(),
        llm: LlmClient::new(&test_settings("http://unused", None)),
    };
    let (addr, server) = start_server(build_router(state)).await;
    let client = Client::new();

    let before: serde_json::Value = client
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .expect("http health")
        .json()
        .await
        .expect("json");
    assert_eq!(before["serialConnected"], true);

    let send = client
        .post(format!("http://{addr}/api/arduino"))
        .json(&serde_json::json!({"command": "LED_ON"}))
        .send()
        .await
        .expect("http arduino");
    assert_eq!(send.status(), reqwest::StatusCode::OK);

    let after: serde_json::Value = client
        .get(format!("http://{addr}/api/health"))
        .send()
        .await
        .expect("http health")
        .json()
        .await
        .expect("json");
    assert_eq!(after["serialConnected"], false);

    server.abort();
}

#[tokio::test]
async fn sensor_returns_latest_readings() {
    let state = disconnected_state("http://unused", None);
    *state.sensors.lock().unwrap() = SensorReadings {
        temperature: 22,
        humidity: 51,
    };
    let (addr, server) = start_server(build_router(state)).await;

    let body: serde_json::Value = Client::new()
        .get(format!("http://{addr}/api/sensor"))
        .send()
        .await
        .expect("http sensor")
        .json()
        .await
        .expect("json");
    assert_eq!(body["temperature"], 22);
    assert_eq!(body["humidity"], 51);

    server.abort();
}

#[tokio::test]
async fn control_validates_then_dispatches_frame() {
    let (state, frames) = recording_state("http://unused", None);
    let (addr, server) = start_server(build_router(state)).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/control"))
        .json(&serde_json::json!({"r": 255, "g": 128, "b": 0, "fan": 200}))
        .send()
        .await
        .expect("http control");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["message"], "RGB and fan values sent");
    assert_eq!(body["r"], 255);
    assert_eq!(body["fan"], 200);
    assert_eq!(*frames.lock().unwrap(), vec!["255,128,0,200\n".to_string()]);

    server.abort();
}

#[tokio::test]
async fn control_reports_every_invalid_field() {
    let (addr, server) = start_server(build_router(disconnected_state("http://unused", None))).await;

    let response = Client::new()
        .post(format!("http://{addr}/api/control"))
        .json(&serde_json::json!({"r": "red", "g": 300, "b": 12}))
        .send()
        .await
        .expect("http control");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(
        body["error"],
        "r must be an integer; g must be between 0 and 255; fan must be an integer"
    );

    server.abort();
}

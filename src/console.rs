/*
 * @file console.rs
 * @brief Interactive terminal client for the bridge service
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

//! Interactive terminal client that talks to the bridge over HTTP.

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

/// Default bridge URL when none is given on the command line.
const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Reply shown when the bridge cannot be reached or errors out.
const LOCAL_ERROR_REPLY: &str =
    "Sorry, I encountered an error. Please check your connection and try again.";

/// Spacing between health probes.
const HEALTH_POLL_PERIOD: Duration = Duration::from_secs(10);

/// Spacing between sensor refreshes.
const SENSOR_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Transient session state shared with the poll tasks.
///
/// # Details
/// Nothing here survives a restart. The connected flag is owned by the
/// health poll task; the input loop only reads it to decide whether a
/// request is worth attempting.
#[derive(Default)]
struct Session {
    connected: bool,
    servo_target: Option<u32>,
}

/// Health payload subset the client inspects.
#[derive(Default, Deserialize)]
struct HealthPayload {
    #[serde(default)]
    status: String,
}

/// Sensor payload mirrored from the bridge.
#[derive(Clone, Copy, Default, PartialEq, Eq, Deserialize)]
struct SensorPayload {
    #[serde(default)]
    temperature: i64,
    #[serde(default)]
    humidity: i64,
}

/// Chat payload subset the client displays.
#[derive(Deserialize)]
struct ChatPayload {
    response: String,
    #[serde(default)]
    commands: Vec<String>,
}

/// What one line of input asks the client to do.
#[derive(Debug, PartialEq, Eq)]
enum InputAction {
    Quit,
    Chat(String),
    Servo(u32),
    Raw(String),
    Invalid(&'static str),
}

/// Runs the console until the user quits or stdin closes.
///
/// # Details
/// Two background tasks poll bridge health and sensor readings while
/// the foreground loop turns typed lines into chat messages or device
/// commands. The poll tasks are aborted on the way out; they hold no
/// state worth a graceful handoff.
///
/// # Arguments
/// * `base_url` - Bridge URL override, usually from the command line.
///
/// # Returns
/// * `Ok(())` when the user quits or input ends.
///
/// # Errors
/// Returns an error only if reading stdin fails.
pub async fn run(base_url: Option<String>) -> Result<()> {
    let client = ConsoleClient::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()));
    println!("Chat bridge console at {}", client.base_url);
    println!("Type a message, /servo <0-180>, /cmd <COMMAND>, or quit to leave.");
    let health = client.spawn_health_poll();
    let sensors = client.spawn_sensor_poll();
    let result = client.input_loop().await;
    health.abort();
    sensors.abort();
    result
}

/// Client container owning the HTTP client and session state.
struct ConsoleClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<Mutex<Session>>,
}

/// Implementation of the console input loop and request paths.
impl ConsoleClient {
    /// Creates a client with a fresh, disconnected session.
    fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    /// Starts the periodic health probe.
    ///
    /// # Details
    /// The first probe fires immediately, so the console learns the
    /// bridge state at startup rather than after the first interval.
    fn spawn_health_poll(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = format!("{}/api/health", self.base_url);
        let session = self.session.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_POLL_PERIOD);
            loop {
                ticker.tick().await;
                let connected = probe_health(&client, &url).await;
                note_connection(&session, connected);
            }
        })
    }

    /// Starts the periodic sensor refresh, reporting only changes.
    fn spawn_sensor_poll(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = format!("{}/api/sensor", self.base_url);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SENSOR_POLL_PERIOD);
            let mut last = SensorPayload::default();
            loop {
                ticker.tick().await;
                if let Some(latest) = fetch_sensors(&client, &url).await {
                    if latest != last {
                        info!(
                            "Sensors: {}°C, {}% humidity",
                            latest.temperature, latest.humidity
                        );
                        last = latest;
                    }
                }
            }
        })
    }

    /// Reads stdin line by line and acts on each one.
    async fn input_loop(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read console input")?
        {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match classify_input(line) {
                InputAction::Quit => break,
                InputAction::Chat(message) => self.submit_chat(&message).await,
                InputAction::Servo(angle) => self.send_servo(angle).await,
                InputAction::Raw(command) => self.send_command(&command).await,
                InputAction::Invalid(reason) => println!("{}", reason),
            }
        }
        Ok(())
    }

    /// Sends a chat message and displays the reply line.
    async fn submit_chat(&self, message: &str) {
        let reply = self.chat_reply(message).await;
        println!("assistant> {}", reply);
    }

    /// Resolves one chat message to the assistant line to display.
    ///
    /// # Details
    /// A disconnected session short-circuits to the local error reply
    /// with no doomed network round trip; the next health probe decides
    /// when chat opens up again. Request failures collapse to the same
    /// reply so the conversation pane stays coherent.
    ///
    /// # Arguments
    /// * `message` - The chat message to submit.
    ///
    /// # Returns
    /// * `String` - The reply text to show for the assistant.
    async fn chat_reply(&self, message: &str) -> String {
        if !self.is_connected() {
            warn!("Error: Not connected to server");
            return LOCAL_ERROR_REPLY.to_string();
        }
        match self.post_chat(message).await {
            Ok(payload) => {
                for command in payload.commands {
                    info!("Sent: {}", command);
                }
                payload.response
            }
            Err(err) => {
                error!("Chat error: {:#}", err);
                LOCAL_ERROR_REPLY.to_string()
            }
        }
    }

    /// Posts one chat message to the bridge.
    async fn post_chat(&self, message: &str) -> Result<ChatPayload> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "message": message }))
            .send()
            .await
            .with_context(|| "Failed to reach the bridge")?
            .error_for_status()
            .with_context(|| "Bridge rejected the request")?;
        response
            .json()
            .await
            .with_context(|| "Failed to parse bridge response")
    }

    /// Targets the servo, remembering the angle for the session.
    async fn send_servo(&self, angle: u32) {
        let previous = self.session.lock().unwrap().servo_target.replace(angle);
        if previous == Some(angle) {
            info!("Servo already targeting {}°", angle);
        }
        self.send_command(&format!("SERVO_{}", angle)).await;
    }

    /// Sends one raw device command through the bridge.
    async fn send_command(&self, command: &str) {
        if !self.is_connected() {
            warn!("Error sending command: Not connected to server");
            return;
        }
        let url = format!("{}/api/arduino", self.base_url);
        let result = self
            .client
            .post(&url)
            .json(&json!({ "command": command }))
            .send()
            .await
            .and_then(|response| response.error_for_status());
        match result {
            Ok(_) => info!("Sent: {}", command),
            Err(err) => error!("Error sending command: {}", err),
        }
    }

    /// Reads the connected flag maintained by the health poll.
    fn is_connected(&self) -> bool {
        self.session.lock().unwrap().connected
    }
}

/// Queries bridge health once.
///
/// # Returns
/// * `bool` - `true` only for an HTTP success whose payload carries
///   status "ok".
async fn probe_health(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            match response.json::<HealthPayload>().await {
                Ok(payload) => payload.status == "ok",
                Err(_) => false,
            }
        }
        _ => false,
    }
}

/// Fetches sensor readings once, swallowing failures.
async fn fetch_sensors(client: &reqwest::Client, url: &str) -> Option<SensorPayload> {
    let response = client.get(url).send().await.ok()?;
    response.json().await.ok()
}

/// Folds a probe result into the session, reporting transitions.
///
/// # Details
/// Repeated results are silent; only an actual state change reaches
/// the log, so a stable connection does not fill the screen.
fn note_connection(session: &Arc<Mutex<Session>>, connected: bool) {
    let mut session = session.lock().unwrap();
    if connected == session.connected {
        return;
    }
    session.connected = connected;
    if connected {
        info!("Connected to backend server");
    } else {
        warn!("Failed to connect to backend server");
    }
}

/// Sorts one trimmed input line into an action.
///
/// # Details
/// Slash commands drive the device directly, quit words end the
/// session, and everything else is a chat message. Quit matching is
/// exact so phrases like "stop the buzzer" still reach the model.
fn classify_input(line: &str) -> InputAction {
    if should_quit(line) {
        return InputAction::Quit;
    }
    if let Some(rest) = line.strip_prefix("/servo") {
        return match rest.trim().parse::<u32>() {
            Ok(angle) if angle <= 180 => InputAction::Servo(angle),
            _ => InputAction::Invalid("servo angle must be a number between 0 and 180"),
        };
    }
    if let Some(rest) = line.strip_prefix("/cmd") {
        let command = rest.trim();
        if command.is_empty() {
            return InputAction::Invalid("usage: /cmd <COMMAND>");
        }
        return InputAction::Raw(command.to_string());
    }
    if line.starts_with('/') {
        return InputAction::Invalid("unknown command, try /servo <angle> or /cmd <COMMAND>");
    }
    InputAction::Chat(line.to_string())
}

/// Determines whether the user has asked to leave the console.
fn should_quit(line: &str) -> bool {
    matches!(line, "quit" | "exit" | "/quit")
}

/*
 * @file config.rs
 * @brief Runtime configuration from config.json and the environment
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

//! Layered runtime configuration for the bridge service.

use log::{debug, warn};
use serde::Deserialize;
use std::{env, fs};

/// Path to the JSON configuration file that holds runtime defaults.
const CONFIG_PATH: &str = "config.json";

/// Default serial device when neither config nor environment name one.
const FALLBACK_SERIAL_PORT: &str = "/dev/tty.usbmodem1101";

/// Default baud rate for the device link.
const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default TCP port the HTTP server listens on.
const DEFAULT_HTTP_PORT: u16 = 3001;

/// Default chat completions endpoint.
const FALLBACK_CHAT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default chat model name.
const FALLBACK_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Strongly typed representation of `config.json`.
#[derive(Clone, Deserialize)]
struct AppConfig {
    #[serde(default = "fallback_serial_port")]
    default_serial_port: String,
    #[serde(default = "fallback_chat_api_url")]
    default_chat_api_url: String,
    #[serde(default = "fallback_chat_model")]
    default_chat_model: String,
}

/// Baked defaults used when config.json is missing or invalid.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_serial_port: fallback_serial_port(),
            default_chat_api_url: fallback_chat_api_url(),
            default_chat_model: fallback_chat_model(),
        }
    }
}

/// Resolved settings the rest of the service runs on.
///
/// # Details
/// Environment variables win over config.json, which wins over the
/// baked defaults. Setting SERIAL_PORT to an empty string disables the
/// device link entirely, which is how the service runs on development
/// machines without hardware.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Serial device path, empty to run without hardware.
    pub serial_port: String,
    /// Baud rate for the device link.
    pub baud_rate: u32,
    /// TCP port for the HTTP server.
    pub http_port: u16,
    /// Chat API key; `None` leaves the chat endpoint unconfigured.
    pub api_key: Option<String>,
    /// Chat completions endpoint URL.
    pub chat_api_url: String,
    /// Chat model name.
    pub chat_model: String,
}

/// Implementation of settings resolution.
impl Settings {
    /// Loads settings from config.json and the environment.
    ///
    /// # Details
    /// Never fails; every layer has a fallback so the service always
    /// starts with something sensible.
    ///
    /// # Returns
    /// * `Self` - Fully resolved settings.
    pub fn load() -> Self {
        let config = load_app_config();
        Self {
            serial_port: serial_port_path(&config),
            baud_rate: baud_rate(),
            http_port: http_port(),
            api_key: api_key(),
            chat_api_url: chat_api_url(&config),
            chat_model: chat_model(&config),
        }
    }
}

/// Loads configuration from `config.json`, falling back to baked defaults when missing.
///
/// # Details
/// A missing file is routine and only logged at debug level; a present
/// but unparseable file is worth a warning since someone edited it.
///
/// # Returns
/// * `AppConfig` - The loaded or default configuration.
fn load_app_config() -> AppConfig {
    match fs::read_to_string(CONFIG_PATH) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("Config parse error ({}): {}", CONFIG_PATH, err);
                AppConfig::default()
            }
        },
        Err(err) => {
            debug!("Config load skipped ({}): {}", CONFIG_PATH, err);
            AppConfig::default()
        }
    }
}

/// Determines the serial port path from environment variable or configuration.
///
/// # Details
/// SERIAL_PORT wins when set, including when set to an empty string,
/// which is the documented way to disable the device link.
///
/// # Arguments
/// * `config` - The loaded application configuration.
///
/// # Returns
/// * `String` - The serial port device path to use.
fn serial_port_path(config: &AppConfig) -> String {
    env::var("SERIAL_PORT").unwrap_or_else(|_| config.default_serial_port.clone())
}

/// Determines the baud rate from BAUD_RATE or the default.
///
/// # Returns
/// * `u32` - Parsed rate, or the default when unset or invalid.
fn baud_rate() -> u32 {
    env::var("BAUD_RATE")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_BAUD_RATE)
}

/// Determines the HTTP port from PORT or the default.
///
/// # Returns
/// * `u16` - Parsed port, or the default when unset or invalid.
fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_HTTP_PORT)
}

/// Reads the chat API key from OPENAI_API_KEY.
///
/// # Details
/// An empty value counts as unconfigured so an accidentally blank
/// .env entry behaves the same as no entry at all.
///
/// # Returns
/// * `Option<String>` - The key, or `None` when unset or empty.
fn api_key() -> Option<String> {
    env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty())
}

/// Determines the chat endpoint from OPENAI_API_URL or configuration.
///
/// # Arguments
/// * `config` - The loaded application configuration.
///
/// # Returns
/// * `String` - The chat completions URL to use.
fn chat_api_url(config: &AppConfig) -> String {
    env::var("OPENAI_API_URL").unwrap_or_else(|_| config.default_chat_api_url.clone())
}

/// Determines the chat model from OPENAI_MODEL or configuration.
///
/// # Arguments
/// * `config` - The loaded application configuration.
///
/// # Returns
/// * `String` - The chat model name to use.
fn chat_model(config: &AppConfig) -> String {
    env::var("OPENAI_MODEL").unwrap_or_else(|_| config.default_chat_model.clone())
}

/// Returns the hardcoded fallback serial port path.
fn fallback_serial_port() -> String {
    FALLBACK_SERIAL_PORT.to_string()
}

/// Returns the hardcoded fallback chat endpoint.
fn fallback_chat_api_url() -> String {
    FALLBACK_CHAT_API_URL.to_string()
}

/// Returns the hardcoded fallback chat model name.
fn fallback_chat_model() -> String {
    FALLBACK_CHAT_MODEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn app_config_defaults_fill_missing_fields() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_serial_port, FALLBACK_SERIAL_PORT);
        assert_eq!(config.default_chat_api_url, FALLBACK_CHAT_API_URL);
        assert_eq!(config.default_chat_model, FALLBACK_CHAT_MODEL);
    }

    #[test]
    fn app_config_keeps_provided_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"default_serial_port": "/dev/ttyACM0"}"#).unwrap();
        assert_eq!(config.default_serial_port, "/dev/ttyACM0");
        assert_eq!(config.default_chat_model, FALLBACK_CHAT_MODEL);
    }

    #[test]
    fn serial_port_env_wins_even_when_empty() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("SERIAL_PORT", "");
        assert_eq!(serial_port_path(&AppConfig::default()), "");
        env::set_var("SERIAL_PORT", "/dev/ttyUSB0");
        assert_eq!(serial_port_path(&AppConfig::default()), "/dev/ttyUSB0");
        env::remove_var("SERIAL_PORT");
        assert_eq!(serial_port_path(&AppConfig::default()), FALLBACK_SERIAL_PORT);
    }

    #[test]
    fn baud_rate_parses_env_with_fallback() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("BAUD_RATE", "115200");
        assert_eq!(baud_rate(), 115_200);
        env::set_var("BAUD_RATE", "fast");
        assert_eq!(baud_rate(), DEFAULT_BAUD_RATE);
        env::remove_var("BAUD_RATE");
        assert_eq!(baud_rate(), DEFAULT_BAUD_RATE);
    }

    #[test]
    fn http_port_parses_env_with_fallback() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("PORT", "8080");
        assert_eq!(http_port(), 8080);
        env::remove_var("PORT");
        assert_eq!(http_port(), DEFAULT_HTTP_PORT);
    }

    #[test]
    fn empty_api_key_counts_as_unconfigured() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("OPENAI_API_KEY", "");
        assert_eq!(api_key(), None);
        env::set_var("OPENAI_API_KEY", "sk-test");
        assert_eq!(api_key(), Some("sk-test".to_string()));
        env::remove_var("OPENAI_API_KEY");
        assert_eq!(api_key(), None);
    }
}

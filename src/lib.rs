/*
 * @file lib.rs
 * @brief Chatduino library root
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

//! Chatduino - a chat-to-microcontroller bridge service.
//!
//! The bridge turns natural-language chat into device commands:
//! - an HTTP API accepts chat messages and manual commands
//! - a hosted language model phrases the reply
//! - a fixed keyword vocabulary translates replies into UART commands
//! - a serial link carries commands to the board and telemetry back
//!
//! # Example
//! ```
//! use chatduino::translator::translate;
//!
//! let commands = translate("turn on the led");
//! assert_eq!(commands, vec!["LED_ON"]);
//! ```

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod llm;
pub mod sensor;
pub mod server;
pub mod translator;

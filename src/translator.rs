/*
 * @file translator.rs
 * @brief Keyword translation from assistant replies to device command tokens
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

//! Rule-based translation of natural-language text into device commands.

/// Command sent when no rule produced a device command.
pub const FALLBACK_COMMAND: &str = "RESPONSE_RECEIVED";

/// A two-state device rule mapping keywords to an on or off command.
///
/// # Details
/// The rule fires only when one of its trigger words appears in the
/// text. It then resolves to the on command or the off command based
/// on which direction words are present. If both directions (or
/// neither) appear, the text is ambiguous and the rule stays silent.
struct ToggleRule {
    /// Words that select this rule.
    triggers: &'static [&'static str],
    /// Words that resolve the rule to its on command.
    on_words: &'static [&'static str],
    /// Words that resolve the rule to its off command.
    off_words: &'static [&'static str],
    /// Command emitted for the on direction.
    on_command: &'static str,
    /// Command emitted for the off direction.
    off_command: &'static str,
}

/// A positional device rule mapping keywords plus a number to a command.
///
/// # Details
/// The rule fires when a trigger word appears and the text contains a
/// number inside the accepted range. The number is taken from the first
/// unbroken run of digits in the original (pre-lowercasing) text.
struct AngleRule {
    /// Words that select this rule.
    triggers: &'static [&'static str],
    /// Smallest accepted value, inclusive.
    min: u32,
    /// Largest accepted value, inclusive.
    max: u32,
    /// Command prefix the value is appended to.
    prefix: &'static str,
}

/// LED control keywords.
const LIGHT_RULE: ToggleRule = ToggleRule {
    triggers: &["led", "light"],
    on_words: &["on", "turn on"],
    off_words: &["off", "turn off"],
    on_command: "LED_ON",
    off_command: "LED_OFF",
};

/// Servo positioning keywords, angles in degrees.
const SERVO_RULE: AngleRule = AngleRule {
    triggers: &["servo", "motor"],
    min: 0,
    max: 180,
    prefix: "SERVO_",
};

/// Buzzer control keywords.
const BUZZER_RULE: ToggleRule = ToggleRule {
    triggers: &["buzzer", "beep"],
    on_words: &["on", "play"],
    off_words: &["off", "stop"],
    on_command: "BUZZER_ON",
    off_command: "BUZZER_OFF",
};

/// Translates assistant text into device command strings.
///
/// # Details
/// Every rule is evaluated against the text independently and in a
/// fixed order (LED, servo, buzzer), so a single reply can produce
/// several commands. Keyword matching is case-insensitive substring
/// containment. The output vocabulary is closed: only commands named
/// by the rules above (plus the fallback) can ever be produced. When
/// no rule fires, the fallback command is emitted so the device always
/// hears back.
///
/// # Arguments
/// * `text` - The assistant reply to scan.
///
/// # Returns
/// * `Vec<String>` - Device commands in rule order, never empty.
pub fn translate(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut commands = Vec::new();

    if let Some(command) = apply_toggle(&LIGHT_RULE, &lowered) {
        commands.push(command);
    }
    if let Some(command) = apply_angle(&SERVO_RULE, &lowered, text) {
        commands.push(command);
    }
    if let Some(command) = apply_toggle(&BUZZER_RULE, &lowered) {
        commands.push(command);
    }

    if commands.is_empty() {
        commands.push(FALLBACK_COMMAND.to_string());
    }
    commands
}

/// Evaluates a toggle rule against lowercased text.
///
/// # Details
/// Resolves the direction from the on and off word lists. Text that
/// matches both directions is ambiguous and yields no command rather
/// than guessing.
///
/// # Arguments
/// * `rule` - The toggle rule to evaluate.
/// * `lowered` - The text, already lowercased.
///
/// # Returns
/// * `Some(String)` - The resolved on or off command.
/// * `None` - Rule not triggered or direction ambiguous.
fn apply_toggle(rule: &ToggleRule, lowered: &str) -> Option<String> {
    if !contains_any(lowered, rule.triggers) {
        return None;
    }
    let on = contains_any(lowered, rule.on_words);
    let off = contains_any(lowered, rule.off_words);
    match (on, off) {
        (true, false) => Some(rule.on_command.to_string()),
        (false, true) => Some(rule.off_command.to_string()),
        _ => None,
    }
}

/// Evaluates an angle rule against the text.
///
/// # Details
/// The digit scan runs over the original text, not the lowercased
/// copy, so the extracted value matches what the author wrote. Values
/// outside the accepted range yield no command.
///
/// # Arguments
/// * `rule` - The angle rule to evaluate.
/// * `lowered` - The text, already lowercased, used for trigger matching.
/// * `original` - The untouched text, used for the digit scan.
///
/// # Returns
/// * `Some(String)` - Prefix plus the in-range value.
/// * `None` - Rule not triggered, no digits, or value out of range.
fn apply_angle(rule: &AngleRule, lowered: &str, original: &str) -> Option<String> {
    if !contains_any(lowered, rule.triggers) {
        return None;
    }
    let digits = first_digit_run(original)?;
    let value: u32 = digits.parse().ok()?;
    if !(rule.min..=rule.max).contains(&value) {
        return None;
    }
    Some(format!("{}{}", rule.prefix, value))
}

/// Reports whether any of the words occurs in the text.
fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

/// Returns the first unbroken run of ASCII digits in the text.
fn first_digit_run(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

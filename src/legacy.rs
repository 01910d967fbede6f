//! Legacy semicolon-separated text commands.
//!
//! Bench tooling and the interactive shell speak a line protocol of
//! `key=value` pairs separated by semicolons:
//!
//! ```text
//! command=set_speed;value=1.5
//! command=set_direction;value=reverse
//! command=headlights;value=on
//! command=horn;value=off
//! command=emergency
//! ```
//!
//! [`controller_parser`] wires this grammar to a controller and returns a
//! [`LegacyParser`] ready to install on the
//! [`CommandProcessor`](crate::CommandProcessor), which feeds it the text
//! carried after the control-flag byte of a command frame.

use std::collections::HashMap;
use std::sync::Arc;

use crate::controller::TrainController;
use crate::processor::LegacyParser;
use crate::state::Direction;
use crate::traits::{Clock, MotorOutput, TelemetrySink};

/// Split a command line into trimmed `key=value` pairs.
///
/// Empty segments and segments without `=` are skipped; a repeated key
/// keeps its last value.
pub fn parse_key_values(text: &str) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    for segment in text.split(';') {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.insert(key.to_string(), value.trim().to_string());
    }
    pairs
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("Invalid switch value: {other}")),
    }
}

/// Build a legacy parser that applies the text grammar to a controller.
pub fn controller_parser<M, T, C>(controller: Arc<TrainController<M, T, C>>) -> LegacyParser
where
    M: MotorOutput + Send + 'static,
    T: TelemetrySink + Send + 'static,
    C: Clock + Send + Sync + 'static,
{
    Box::new(move |text: &str| {
        let pairs = parse_key_values(text);
        let command = pairs
            .get("command")
            .ok_or_else(|| "Missing command key".to_string())?;

        match command.as_str() {
            "set_speed" => {
                let value = pairs.get("value").ok_or_else(|| "Missing value".to_string())?;
                let speed: f32 = value
                    .parse()
                    .map_err(|_| format!("Invalid speed value: {value}"))?;
                controller.set_target_speed(speed);
                Ok("Speed updated".to_string())
            }
            "set_direction" => {
                let value = pairs.get("value").ok_or_else(|| "Missing value".to_string())?;
                let direction = Direction::from_text(value)
                    .ok_or_else(|| format!("Invalid direction value: {value}"))?;
                controller.set_direction(direction);
                Ok("Direction updated".to_string())
            }
            "headlights" => {
                let value = pairs.get("value").ok_or_else(|| "Missing value".to_string())?;
                controller.toggle_headlights(parse_switch(value)?);
                Ok("Headlights toggled".to_string())
            }
            "horn" => {
                let value = pairs.get("value").ok_or_else(|| "Missing value".to_string())?;
                controller.toggle_horn(parse_switch(value)?);
                Ok("Horn toggled".to_string())
            }
            "emergency" => {
                controller.trigger_emergency_stop();
                Ok("Emergency stop".to_string())
            }
            other => Err(format!("Unknown command: {other}")),
        }
    })
}

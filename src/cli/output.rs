//! CLI output helpers: JSON envelopes for robot mode, key/value layout for
//! humans.

use console::style;
use serde::Serialize;

use crate::api::Envelope;
use crate::error::{Result, RollpointError};

/// Print a value as pretty JSON.
pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| RollpointError::Config(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

/// Render an envelope: JSON in robot mode, the `human` rendering otherwise.
/// Returns the envelope's success flag so commands can drive the exit code.
pub fn emit_envelope<T: Serialize>(
    robot: bool,
    envelope: &Envelope<T>,
    human: impl FnOnce(&T) -> String,
) -> Result<bool> {
    if robot {
        emit_json(envelope)?;
        return Ok(envelope.success);
    }

    if let Some(data) = &envelope.data {
        println!("{}", human(data));
    }
    if let Some(error) = &envelope.error {
        eprintln!(
            "{} [{}] {}",
            style("Error:").red().bold(),
            error.code.code_string(),
            error.message
        );
        if let Some(path) = &error.pre_restore_backup {
            eprintln!("Pre-restore backup kept at: {path}");
        }
    }
    Ok(envelope.success)
}

/// Simple key/value line formatting used by human output.
pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key_style = style(key).dim().to_string();
        self.lines.push(format!(
            "{key_style:width$} {value}",
            width = self.key_width
        ));
        self
    }

    pub fn kv_opt(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        self.kv(key, value.unwrap_or("-"))
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_builds_key_value_lines() {
        let mut layout = HumanLayout::new();
        layout.title("Recovery point").kv("Id", "3").kv_opt("Name", None);
        let text = layout.build();
        assert!(text.contains("Recovery point"));
        assert!(text.contains('3'));
        assert!(text.contains('-'));
    }

    #[test]
    fn emit_envelope_reports_success_flag() {
        let ok = Envelope::ok(1);
        assert!(emit_envelope(true, &ok, |v| v.to_string()).unwrap());

        let err = Envelope::<i32>::err(&RollpointError::NotFound("x".into()));
        assert!(!emit_envelope(true, &err, |v| v.to_string()).unwrap());
    }
}

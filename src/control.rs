//! Line-oriented control input for the headless driver.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::events::ViewerCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlInput {
    /// Raw source text; resolved to a `MediaSource` by the caller since that
    /// may need to read a file.
    Load(String),
    Command(ViewerCommand),
    Quit,
}

/// Parses one control line. Blank lines and `#` comments yield `None`.
pub fn parse_control_line(line: &str) -> Result<Option<ControlInput>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let input = match verb.to_ascii_lowercase().as_str() {
        "load" | "open" => {
            if rest.is_empty() {
                bail!("load needs a path, URL or viewer query");
            }
            ControlInput::Load(rest.to_string())
        }
        "stereo" => ControlInput::Command(ViewerCommand::ToggleStereo),
        "zoom" => ControlInput::Command(ViewerCommand::AdjustFov(number(verb, rest)?)),
        "wheel" => ControlInput::Command(ViewerCommand::Wheel(number(verb, rest)?)),
        "pinch-start" => ControlInput::Command(ViewerCommand::PinchStart(number(verb, rest)?)),
        "pinch" => ControlInput::Command(ViewerCommand::Pinch(number(verb, rest)?)),
        "play" => ControlInput::Command(ViewerCommand::Play),
        "pause" => ControlInput::Command(ViewerCommand::Pause),
        "toggle" => ControlInput::Command(ViewerCommand::TogglePlayback),
        "seek" => ControlInput::Command(ViewerCommand::Seek(number(verb, rest)?)),
        "tick" => ControlInput::Command(ViewerCommand::Tick),
        "click" => ControlInput::Command(ViewerCommand::Interact),
        "screenshot" => ControlInput::Command(ViewerCommand::Screenshot(
            (!rest.is_empty()).then(|| PathBuf::from(rest)),
        )),
        "reset" => ControlInput::Command(ViewerCommand::Reset),
        "status" => ControlInput::Command(ViewerCommand::Status),
        "quit" | "exit" => ControlInput::Quit,
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(input))
}

fn number(verb: &str, raw: &str) -> Result<f32> {
    let value: f32 = raw
        .parse()
        .with_context(|| format!("{verb} expects a number, got {raw:?}"))?;
    if !value.is_finite() {
        bail!("{verb} expects a finite number");
    }
    Ok(value)
}

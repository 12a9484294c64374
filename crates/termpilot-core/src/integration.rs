//! Shell-integration protocol types.
//!
//! A shell configured for integration emits `OSC 133 ; TAG [; param...]`
//! around prompts and commands. Only the four tags below are understood;
//! anything else is ignored so newer shells keep working.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// OSC code carrying shell-integration markers.
pub const SHELL_INTEGRATION_OSC: u16 = 133;

/// Recognized shell-integration marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShellIntegrationKind {
    /// `A`: the prompt is about to be drawn
    PromptStart,
    /// `B`: the prompt is drawn and command input begins
    CommandStart,
    /// `C`: the command was submitted and its output starts
    CommandExecuted,
    /// `D`: the command finished; the first param is its exit status
    CommandFinished,
}

impl ShellIntegrationKind {
    /// Map a wire tag to a kind. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "A" => Some(Self::PromptStart),
            "B" => Some(Self::CommandStart),
            "C" => Some(Self::CommandExecuted),
            "D" => Some(Self::CommandFinished),
            _ => None,
        }
    }

    /// Wire tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PromptStart => "A",
            Self::CommandStart => "B",
            Self::CommandExecuted => "C",
            Self::CommandFinished => "D",
        }
    }
}

/// Decoded shell-integration marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShellIntegrationEvent {
    /// Marker kind
    pub kind: ShellIntegrationKind,
    /// Parameters following the tag, in order
    pub params: Vec<String>,
}

impl ShellIntegrationEvent {
    /// Decode a `TAG[;param...]` payload.
    ///
    /// Returns `None` for unrecognized tags.
    pub fn decode(payload: &str) -> Option<Self> {
        let mut parts = payload.split(';');
        let kind = ShellIntegrationKind::from_tag(parts.next()?)?;
        Some(Self {
            kind,
            params: parts.map(str::to_string).collect(),
        })
    }

    /// Exit status carried by a `CommandFinished` marker.
    ///
    /// Any finite number is accepted, including negative or fractional
    /// values. Anything else yields `None`.
    pub fn exit_code(&self) -> Option<f64> {
        if self.kind != ShellIntegrationKind::CommandFinished {
            return None;
        }
        parse_exit_code(self.params.first()?)
    }
}

/// Lenient numeric parse of an exit status parameter.
pub fn parse_exit_code(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Shell family with a known integration script and injection encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Shell {
    /// bash and other POSIX shells with `base64 -d`
    Bash,
    /// PowerShell (Windows PowerShell or pwsh)
    Pwsh,
}

impl Shell {
    /// Guess the shell family from a process name.
    pub fn detect(process_name: &str) -> Self {
        let name = process_name.to_ascii_lowercase();
        if name.contains("pwsh") || name.contains("powershell") {
            Shell::Pwsh
        } else {
            Shell::Bash
        }
    }
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(Shell::Bash),
            "pwsh" | "powershell" => Ok(Shell::Pwsh),
            other => Err(Error::UnsupportedShell(other.to_string())),
        }
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shell::Bash => write!(f, "bash"),
            Shell::Pwsh => write!(f, "pwsh"),
        }
    }
}

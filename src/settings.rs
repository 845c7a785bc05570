//! Automation settings
//!
//! Record types for aliases, variables, triggers and keybindings, plus TOML
//! persistence at `~/.mudlink/settings.toml`. List order is load-bearing:
//! alias expansion takes the first matching entry.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to serialize settings")]
    Serialize(#[source] toml::ser::Error),

    #[error("failed to write settings file")]
    Write(#[source] std::io::Error),

    #[error("could not determine settings path")]
    NoHome,
}

/// Shorthand expanded when it is the first word of an outbound line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Token matched against the start of the line
    pub token: String,
    /// Command the token expands to
    pub command: String,
}

/// Declared type of a variable's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    String,
    Number,
    Boolean,
}

/// Named value substituted for `$NAME` tokens in outbound commands.
///
/// Names are canonicalized to uppercase; the value keeps its string encoding
/// regardless of kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub value: String,
}

impl Variable {
    pub fn new(name: &str, kind: VarKind, value: &str) -> Self {
        Self {
            name: name.to_uppercase(),
            kind,
            value: value.to_string(),
        }
    }
}

/// How a trigger pattern is matched against inbound text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Regex,
    Substring,
    Exact,
}

/// What a fired trigger does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Send the action body as an outbound command
    Text,
    /// Run the action body through the host's script engine
    Script,
}

/// Pattern watched for in inbound text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub pattern: String,
    pub match_kind: MatchKind,
    /// Command text or script source, depending on `action_kind`
    pub action: String,
    pub action_kind: ActionKind,
}

/// Key chord bound to one or more commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: String,
    pub commands: String,
}

/// All user automation settings, owned by the embedding client and passed by
/// reference into pipeline calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub aliases: Vec<Alias>,
    pub variables: Vec<Variable>,
    pub triggers: Vec<Trigger>,
    pub keybindings: Vec<KeyBinding>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aliases: vec![
                Alias {
                    token: "'".to_string(),
                    command: "say".to_string(),
                },
                Alias {
                    token: ".".to_string(),
                    command: "yell".to_string(),
                },
            ],
            variables: Vec::new(),
            triggers: Vec::new(),
            keybindings: vec![
                KeyBinding {
                    key: "Numpad8".to_string(),
                    commands: "north".to_string(),
                },
                KeyBinding {
                    key: "Numpad6".to_string(),
                    commands: "east".to_string(),
                },
                KeyBinding {
                    key: "Numpad2".to_string(),
                    commands: "south".to_string(),
                },
                KeyBinding {
                    key: "Numpad4".to_string(),
                    commands: "west".to_string(),
                },
                KeyBinding {
                    key: "Numpad9".to_string(),
                    commands: "up".to_string(),
                },
                KeyBinding {
                    key: "Numpad3".to_string(),
                    commands: "down".to_string(),
                },
                KeyBinding {
                    key: "Numpad5".to_string(),
                    commands: "look".to_string(),
                },
            ],
        }
    }
}

impl Settings {
    /// Load settings from file, falling back to defaults on any problem.
    pub fn load() -> Self {
        if let Some(path) = Self::settings_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match toml::from_str::<Settings>(&content) {
                        Ok(mut settings) => {
                            settings.canonicalize();
                            return settings;
                        }
                        Err(e) => warn!("ignoring malformed settings file: {e}"),
                    }
                }
            }
        }
        Self::default()
    }

    /// Save settings to file
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoHome)?;
        let content = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        fs::write(&path, content).map_err(SettingsError::Write)?;
        Ok(())
    }

    /// Commands bound to a key word, if any. The terminal client has no raw
    /// key events, so binding keys double as typed words (`Numpad8` sends
    /// `north`).
    pub fn keybinding(&self, key: &str) -> Option<&str> {
        self.keybindings
            .iter()
            .find(|binding| binding.key == key)
            .map(|binding| binding.commands.as_str())
    }

    /// Variable names are looked up by their uppercase spelling; enforce
    /// that on anything that came in from a file.
    fn canonicalize(&mut self) {
        for var in &mut self.variables {
            var.name = var.name.to_uppercase();
        }
    }

    /// Get settings file path
    fn settings_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".mudlink");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("settings.toml"));
        }
        None
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

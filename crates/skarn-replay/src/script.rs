//! Replay scripts: a pinned config plus a per-tick command list.

use serde::{Deserialize, Serialize};
use skarn_core::{Command, WorldConfig};

/// One scheduled command: admitted while the server is at `tick`, so
/// it applies on `tick + 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCommand {
    /// Tick at which the command is admitted.
    pub tick: u64,
    /// The command itself.
    pub command: Command,
}

/// A recorded (or authored) run description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    /// Human label.
    pub name: String,
    /// The exact configuration of the run.
    pub config: WorldConfig,
    /// How many ticks to execute.
    pub ticks: u64,
    /// Commands in admission order.
    pub commands: Vec<ScriptCommand>,
}

impl Script {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Encoding failures (non-finite floats in the config).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Malformed JSON or schema mismatch.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Commands admitted at a given tick, in script order.
    pub fn commands_at(&self, tick: u64) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(move |c| c.tick == tick)
            .map(|c| &c.command)
    }
}

//! mudlink - MUD client protocol and automation engine
//!
//! The engine half of a MUD client: everything between raw server bytes and
//! the display/transport pair an embedder supplies.
//!
//! - **telnet**: IAC option negotiation, answering terminal-type requests
//! - **ansi**: SGR escape codes turned into styled markup regions
//! - **command**: outbound alias expansion and `$VARIABLE` substitution
//! - **trigger**: inbound pattern triggers with text and script actions
//! - **session**: one engine instance per connection, fixed processing order
//! - **settings**: automation record types and TOML persistence
//! - **history**: input command recall
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Negotiator    (raw bytes -> content + negotiation replies)
//! ├── StyleRenderer (SGR codes -> styled markup regions)
//! ├── TriggerEngine (cleaned text -> deferred sends / script calls)
//! └── pending queue (trigger output, drained after each pass)
//! ```
//!
//! Outbound commands go through [`command::resolve`]: aliases first, then
//! variables, so an alias may expand into text carrying `$VAR` references.

pub mod ansi;
pub mod command;
pub mod history;
pub mod session;
pub mod settings;
pub mod telnet;
pub mod trigger;

pub use ansi::{Style, StyleRenderer};
pub use history::CommandHistory;
pub use session::{Inbound, NullScriptHost, Session};
pub use settings::{
    ActionKind, Alias, KeyBinding, MatchKind, Settings, SettingsError, Trigger, VarKind, Variable,
};
pub use telnet::{Negotiation, Negotiator};
pub use trigger::{ScriptContext, ScriptError, ScriptHost, TriggerEngine, TriggerEvent};

//! Session engine
//!
//! One [`Session`] per connection. It owns the negotiation, style and
//! trigger state and runs the fixed inbound order: demultiplex, decode,
//! render, trigger evaluation. The next chunk is not touched until the
//! current one is fully processed.
//!
//! Trigger text actions are queued rather than transmitted mid-pass; the
//! host drains them with [`Session::pending_commands`] after `receive`
//! returns. That breaks synchronous recursion and leaves nothing armed to
//! fire against a connection that has since been torn down.

use std::collections::VecDeque;

use crate::ansi::StyleRenderer;
use crate::command;
use crate::settings::Settings;
use crate::telnet::{Negotiation, Negotiator};
use crate::trigger::{ScriptContext, ScriptError, ScriptHost, TriggerEngine, TriggerEvent};

/// Outcome of one inbound chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbound {
    /// Decoded content with negotiation sequences removed, ANSI intact
    pub text: String,
    /// Markup to append to a styled display stream
    pub markup: String,
    /// Negotiation reply bytes the transport must write back verbatim
    pub response: Vec<u8>,
}

/// Script host for embeddings without a scripting engine: every script
/// action fails, which surfaces as an error line instead of silence.
pub struct NullScriptHost;

impl ScriptHost for NullScriptHost {
    fn run(&mut self, _source: &str, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
        Err(ScriptError(
            "script execution is not available in this client".to_string(),
        ))
    }
}

/// Protocol and automation engine for a single connection.
///
/// All mutable state lives here; concurrent sessions each get their own
/// instance and share nothing.
pub struct Session {
    negotiator: Negotiator,
    renderer: StyleRenderer,
    triggers: TriggerEngine,
    /// Trigger text actions awaiting transmission
    pending: VecDeque<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            negotiator: Negotiator::new(),
            renderer: StyleRenderer::new(),
            triggers: TriggerEngine::new(),
            pending: VecDeque::new(),
        }
    }

    /// Process one raw inbound chunk from the transport.
    pub fn receive(
        &mut self,
        bytes: &[u8],
        settings: &Settings,
        host: &mut dyn ScriptHost,
    ) -> Inbound {
        let Negotiation { content, response } = if self.negotiator.requires_negotiation(bytes) {
            self.negotiator.negotiate(bytes)
        } else {
            Negotiation {
                content: bytes.to_vec(),
                response: Vec::new(),
            }
        };

        let text = String::from_utf8_lossy(&content).into_owned();
        let mut markup = self.renderer.render(&text);

        let events = self
            .triggers
            .process(&text, &settings.triggers, &settings.variables, host);
        for event in events {
            match event {
                TriggerEvent::Send(body) => self.pending.push_back(body),
                TriggerEvent::Echo(line) => {
                    let line = format!("\x1b[0m{}\n", line);
                    markup.push_str(&self.renderer.render(&line));
                }
                TriggerEvent::ScriptError(message) => {
                    // Reset-prefixed so the error line never inherits
                    // whatever style the server left open.
                    let line = format!("\x1b[0m[script error] {}\n", message);
                    markup.push_str(&self.renderer.render(&line));
                }
            }
        }

        Inbound {
            text,
            markup,
            response,
        }
    }

    /// Resolve a user command for transmission.
    pub fn submit(&self, line: &str, settings: &Settings) -> String {
        command::resolve(line, &settings.aliases, &settings.variables)
    }

    /// Drain trigger text actions queued during the last pass, each resolved
    /// through the pipeline exactly like a user command.
    pub fn pending_commands(&mut self, settings: &Settings) -> Vec<String> {
        self.pending
            .drain(..)
            .map(|body| command::resolve(&body, &settings.aliases, &settings.variables))
            .collect()
    }

    /// Close any open style region at end-of-stream and reset the renderer.
    pub fn finish(&mut self) -> String {
        self.renderer.finish()
    }
}

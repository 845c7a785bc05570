//! Inbound trigger engine
//!
//! Strips control sequences out of inbound text, evaluates every configured
//! trigger against the cleaned chunk, and dispatches the resulting actions.
//! All triggers are evaluated independently; this is not first-match-wins.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::{ActionKind, MatchKind, Trigger, Variable};

/// Error raised by a host script callable
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ScriptError(pub String);

/// What a running script can reach.
///
/// Scripts read the variable table and queue output lines and outbound
/// commands; the engine turns the queues into [`TriggerEvent`]s after the
/// callable returns, so a script is subject to the same deferred-send rules
/// as a text action.
pub struct ScriptContext<'a> {
    /// Variable table, read-only for the duration of the call
    pub variables: &'a [Variable],
    /// Lines to echo to the user's display
    pub output: Vec<String>,
    /// Commands to transmit, resolved like user input
    pub sends: Vec<String>,
}

/// Host-provided script execution capability.
///
/// The engine only requires that the callable runs synchronously and may
/// fail; everything it is allowed to touch comes in through the context.
pub trait ScriptHost {
    fn run(&mut self, source: &str, ctx: &mut ScriptContext) -> Result<(), ScriptError>;
}

/// Something a fired trigger asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Send command text once the current processing pass has finished
    Send(String),
    /// A script produced a line for the user's display
    Echo(String),
    /// A script action failed; echo this to the user
    ScriptError(String),
}

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum EvalState {
    #[default]
    Idle,
    Evaluating,
}

/// Trigger evaluation state for one session.
pub struct TriggerEngine {
    /// Recursion latch: output generated while a pass is active must not
    /// start a nested pass
    state: EvalState,
    /// Compiled patterns keyed by pattern text; an edited pattern is simply
    /// a new key
    regex_cache: HashMap<String, Regex>,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self {
            state: EvalState::Idle,
            regex_cache: HashMap::new(),
        }
    }

    /// Evaluate all triggers against one inbound chunk.
    ///
    /// Text actions are returned as deferred [`TriggerEvent::Send`] events
    /// rather than transmitted here; the caller sends them after the pass,
    /// so a trigger whose own output matches it again cannot loop. Script
    /// actions run immediately through `host` and any failure becomes a
    /// [`TriggerEvent::ScriptError`] instead of tearing anything down.
    pub fn process(
        &mut self,
        chunk: &str,
        triggers: &[Trigger],
        variables: &[Variable],
        host: &mut dyn ScriptHost,
    ) -> Vec<TriggerEvent> {
        if self.state == EvalState::Evaluating {
            return Vec::new();
        }
        self.state = EvalState::Evaluating;

        let cleaned = strip_control_codes(chunk);
        let mut events = Vec::new();

        for trigger in triggers {
            if !self.matches(trigger, &cleaned) {
                continue;
            }
            match trigger.action_kind {
                ActionKind::Text => events.push(TriggerEvent::Send(trigger.action.clone())),
                ActionKind::Script => {
                    let mut ctx = ScriptContext {
                        variables,
                        output: Vec::new(),
                        sends: Vec::new(),
                    };
                    if let Err(e) = host.run(&trigger.action, &mut ctx) {
                        warn!(pattern = %trigger.pattern, "trigger script failed: {e}");
                        events.push(TriggerEvent::ScriptError(e.to_string()));
                    }
                    events.extend(ctx.output.into_iter().map(TriggerEvent::Echo));
                    events.extend(ctx.sends.into_iter().map(TriggerEvent::Send));
                }
            }
        }

        self.state = EvalState::Idle;
        events
    }

    fn matches(&mut self, trigger: &Trigger, text: &str) -> bool {
        match trigger.match_kind {
            MatchKind::Substring => text.contains(&trigger.pattern),
            MatchKind::Exact => text.lines().any(|line| line == trigger.pattern),
            MatchKind::Regex => match self.compiled(&trigger.pattern) {
                Some(re) => re.is_match(text),
                None => false,
            },
        }
    }

    /// Compile a trigger pattern once, multi-line so `^`/`$` anchor at
    /// internal newlines. A bad pattern is logged and treated as no-match.
    fn compiled(&mut self, pattern: &str) -> Option<&Regex> {
        if !self.regex_cache.contains_key(pattern) {
            match Regex::new(&format!("(?m){}", pattern)) {
                Ok(re) => {
                    self.regex_cache.insert(pattern.to_string(), re);
                }
                Err(e) => {
                    debug!(pattern, "invalid trigger pattern: {e}");
                    return None;
                }
            }
        }
        self.regex_cache.get(pattern)
    }

    #[cfg(test)]
    fn force_evaluating(&mut self) {
        self.state = EvalState::Evaluating;
    }
}

/// Remove everything triggers should never see: CSI and OSC sequences,
/// other two-byte escapes, and legacy `^C`-style inline color codes.
fn strip_control_codes(text: &str) -> String {
    static CONTROL: OnceLock<Regex> = OnceLock::new();
    let control = CONTROL.get_or_init(|| {
        Regex::new(
            r"\x1b\[[^\x1b\x07A-Za-z]*[A-Za-z]|\x1b\].*?(?:\x07|\x1b\\)|\x1b.|\x03\d{0,2}(?:,\d{1,2})?",
        )
        .unwrap()
    });
    control.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingHost;
    impl ScriptHost for FailingHost {
        fn run(&mut self, _source: &str, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
            Err(ScriptError("boom".to_string()))
        }
    }

    struct RecordingHost(Vec<String>);
    impl ScriptHost for RecordingHost {
        fn run(&mut self, source: &str, _ctx: &mut ScriptContext) -> Result<(), ScriptError> {
            self.0.push(source.to_string());
            Ok(())
        }
    }

    fn text_trigger(pattern: &str, kind: MatchKind, action: &str) -> Trigger {
        Trigger {
            pattern: pattern.to_string(),
            match_kind: kind,
            action: action.to_string(),
            action_kind: ActionKind::Text,
        }
    }

    #[test]
    fn regex_trigger_anchors_at_line_boundaries() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![text_trigger(
            r"^You are hungry\.$",
            MatchKind::Regex,
            "eat bread",
        )];

        let fired = engine.process("You are hungry.\n", &triggers, &[], &mut RecordingHost(vec![]));
        assert_eq!(fired, vec![TriggerEvent::Send("eat bread".to_string())]);

        let not_fired = engine.process(
            "You are very hungry.\n",
            &triggers,
            &[],
            &mut RecordingHost(vec![]),
        );
        assert!(not_fired.is_empty());
    }

    #[test]
    fn substring_trigger_matches_anywhere() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![text_trigger("hungry", MatchKind::Substring, "eat")];

        let fired = engine.process(
            "A goblin looks hungry today.",
            &triggers,
            &[],
            &mut RecordingHost(vec![]),
        );
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn exact_trigger_compares_whole_lines() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![text_trigger("You die.", MatchKind::Exact, "pray")];
        let mut host = RecordingHost(vec![]);

        assert_eq!(
            engine
                .process("ouch\r\nYou die.\r\n", &triggers, &[], &mut host)
                .len(),
            1
        );
        assert!(engine
            .process("  You die.", &triggers, &[], &mut host)
            .is_empty());
    }

    #[test]
    fn all_matching_triggers_fire() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![
            text_trigger("gold", MatchKind::Substring, "get gold"),
            text_trigger("gold", MatchKind::Substring, "put gold in bag"),
        ];

        let fired = engine.process("A pile of gold.", &triggers, &[], &mut RecordingHost(vec![]));
        assert_eq!(fired.len(), 2);
    }

    #[test]
    fn bad_pattern_does_not_stop_other_triggers() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![
            text_trigger("(unclosed", MatchKind::Regex, "never"),
            text_trigger("fine", MatchKind::Substring, "works"),
        ];

        let fired = engine.process("this is fine", &triggers, &[], &mut RecordingHost(vec![]));
        assert_eq!(fired, vec![TriggerEvent::Send("works".to_string())]);
    }

    #[test]
    fn script_failure_is_reported_not_fatal() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![
            Trigger {
                pattern: "cue".to_string(),
                match_kind: MatchKind::Substring,
                action: "broken()".to_string(),
                action_kind: ActionKind::Script,
            },
            text_trigger("cue", MatchKind::Substring, "still fires"),
        ];

        let fired = engine.process("cue", &triggers, &[], &mut FailingHost);
        assert_eq!(
            fired,
            vec![
                TriggerEvent::ScriptError("boom".to_string()),
                TriggerEvent::Send("still fires".to_string()),
            ]
        );
    }

    #[test]
    fn script_actions_receive_their_source() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![Trigger {
            pattern: "cast".to_string(),
            match_kind: MatchKind::Substring,
            action: "engine.send('ok')".to_string(),
            action_kind: ActionKind::Script,
        }];
        let mut host = RecordingHost(Vec::new());

        engine.process("you cast a spell", &triggers, &[], &mut host);
        assert_eq!(host.0, vec!["engine.send('ok')".to_string()]);
    }

    #[test]
    fn scripts_reach_the_session_through_the_context() {
        struct GreetingHost;
        impl ScriptHost for GreetingHost {
            fn run(&mut self, _source: &str, ctx: &mut ScriptContext) -> Result<(), ScriptError> {
                let hp = ctx
                    .variables
                    .iter()
                    .find(|v| v.name == "HP")
                    .map(|v| v.value.clone())
                    .unwrap_or_default();
                ctx.output.push(format!("hp is {}", hp));
                ctx.sends.push("wave".to_string());
                Ok(())
            }
        }

        let mut engine = TriggerEngine::new();
        let triggers = vec![Trigger {
            pattern: "cue".to_string(),
            match_kind: MatchKind::Substring,
            action: "report()".to_string(),
            action_kind: ActionKind::Script,
        }];
        let variables = vec![crate::settings::Variable::new(
            "HP",
            crate::settings::VarKind::Number,
            "42",
        )];

        let fired = engine.process("cue", &triggers, &variables, &mut GreetingHost);
        assert_eq!(
            fired,
            vec![
                TriggerEvent::Echo("hp is 42".to_string()),
                TriggerEvent::Send("wave".to_string()),
            ]
        );
    }

    #[test]
    fn latched_engine_ignores_nested_chunks() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![text_trigger("x", MatchKind::Substring, "y")];

        engine.force_evaluating();
        assert!(engine
            .process("x", &triggers, &[], &mut RecordingHost(vec![]))
            .is_empty());
    }

    #[test]
    fn triggers_match_against_cleaned_text() {
        let mut engine = TriggerEngine::new();
        let triggers = vec![text_trigger("You are hungry.", MatchKind::Exact, "eat")];

        // Color codes split the line on the wire but not after cleaning.
        let chunk = "\x1b[31mYou are \x1b[1;31mhungry.\x1b[0m\n";
        let fired = engine.process(chunk, &triggers, &[], &mut RecordingHost(vec![]));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn control_stripping_covers_osc_and_caret_codes() {
        assert_eq!(
            strip_control_codes("\x1b]0;title\x07hello \x1b[2Jworld"),
            "hello world"
        );
        assert_eq!(strip_control_codes("\x0312,04red\x03plain"), "redplain");
        assert_eq!(strip_control_codes("\x1b7saved"), "saved");
    }
}

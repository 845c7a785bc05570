//! Outbound command pipeline
//!
//! Resolves user command text before transmission: alias expansion first,
//! then `$VARIABLE` substitution, so an alias may expand into text that
//! itself carries variable references.

use std::sync::OnceLock;

use regex::Regex;

use crate::settings::{Alias, Variable};

/// Resolve one outbound command through the alias and variable tables.
pub fn resolve(command: &str, aliases: &[Alias], variables: &[Variable]) -> String {
    let expanded = expand_aliases(command, aliases);
    substitute_variables(&expanded, variables)
}

/// Each line is expanded independently; the first alias in list order wins.
fn expand_aliases(command: &str, aliases: &[Alias]) -> String {
    command
        .split('\n')
        .map(|line| expand_line(line, aliases))
        .collect::<Vec<_>>()
        .join("\n")
}

fn expand_line(line: &str, aliases: &[Alias]) -> String {
    for alias in aliases {
        // The token must be the whole first word: anchored, and separated
        // from any trailing text by whitespace.
        let pattern = format!(r"^{}(?:\s+(.*))?$", regex::escape(&alias.token));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(line) {
            return match caps.get(1) {
                Some(rest) if !rest.as_str().trim().is_empty() => {
                    format!("{} {}", alias.command, rest.as_str().trim())
                }
                _ => alias.command.clone(),
            };
        }
    }
    line.trim().to_string()
}

/// Replace `$NAME` tokens with their stored values. Lookup uppercases the
/// token, and replacement rewrites the canonical uppercase spelling; unknown
/// tokens stay verbatim.
fn substitute_variables(command: &str, variables: &[Variable]) -> String {
    if variables.is_empty() || !command.contains('$') {
        return command.to_string();
    }

    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let token = TOKEN.get_or_init(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*").unwrap());

    let mut resolved = command.to_string();
    for found in token.find_iter(command) {
        let name = found.as_str()[1..].to_uppercase();
        if let Some(var) = variables.iter().find(|v| v.name == name) {
            // The trailing boundary keeps $HP from rewriting inside $HPX.
            let Ok(re) = Regex::new(&format!(r"\${}\b", regex::escape(&name))) else {
                continue;
            };
            resolved = re
                .replace_all(&resolved, regex::NoExpand(&var.value))
                .into_owned();
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::VarKind;

    fn say_alias() -> Vec<Alias> {
        vec![Alias {
            token: "'".to_string(),
            command: "say".to_string(),
        }]
    }

    #[test]
    fn alias_expands_with_trailing_text() {
        let out = resolve("' hello", &say_alias(), &[]);
        assert_eq!(out, "say hello");
    }

    #[test]
    fn alias_without_separator_does_not_match() {
        let out = resolve("'hello", &say_alias(), &[]);
        assert_eq!(out, "'hello");
    }

    #[test]
    fn bare_alias_expands_to_command_alone() {
        let out = resolve("'", &say_alias(), &[]);
        assert_eq!(out, "say");
    }

    #[test]
    fn first_matching_alias_wins() {
        let aliases = vec![
            Alias {
                token: "n".to_string(),
                command: "north".to_string(),
            },
            Alias {
                token: "n".to_string(),
                command: "nod".to_string(),
            },
        ];
        assert_eq!(resolve("n", &aliases, &[]), "north");
    }

    #[test]
    fn lines_are_expanded_independently() {
        let out = resolve("' hi\nlook\n' bye", &say_alias(), &[]);
        assert_eq!(out, "say hi\nlook\nsay bye");
    }

    #[test]
    fn trailing_text_is_trimmed() {
        let out = resolve("'   hi there   ", &say_alias(), &[]);
        assert_eq!(out, "say hi there");
    }

    #[test]
    fn variables_resolve_by_uppercase_name() {
        let vars = vec![Variable::new("HP", VarKind::Number, "42")];
        assert_eq!(resolve("attack $HP", &[], &vars), "attack 42");
        assert_eq!(resolve("attack $FOO", &[], &vars), "attack $FOO");
    }

    #[test]
    fn variable_does_not_rewrite_longer_tokens() {
        let vars = vec![Variable::new("HP", VarKind::Number, "42")];
        assert_eq!(resolve("attack $HP $HPX", &[], &vars), "attack 42 $HPX");
        assert_eq!(resolve("cast $HP_MAX", &[], &vars), "cast $HP_MAX");
    }

    #[test]
    fn lowercase_spelling_is_left_in_place() {
        // Lookup is case-insensitive but only the canonical uppercase
        // spelling is rewritten; a literal `$hp` survives.
        let vars = vec![Variable::new("HP", VarKind::Number, "42")];
        assert_eq!(resolve("attack $hp", &[], &vars), "attack $hp");
        assert_eq!(resolve("attack $hp $HP", &[], &vars), "attack $hp 42");
    }

    #[test]
    fn alias_expansion_feeds_variable_substitution() {
        let aliases = vec![Alias {
            token: "h".to_string(),
            command: "cast heal $TARGET".to_string(),
        }];
        let vars = vec![Variable::new("TARGET", VarKind::String, "bob")];
        assert_eq!(resolve("h", &aliases, &vars), "cast heal bob");
    }
}

//! Slash-command palette.

use serde::Serialize;

/// Built-in commands with their argument placeholder.
const COMMANDS: &[(&str, &str)] = &[
    ("/chart", "<query>"),
    ("/tableau", "<keyword>"),
    ("/project", "<code>"),
    ("/vendor", "<name>"),
    ("/person", "<name>"),
    ("/jira", "<jql>"),
    ("/playbook", "<name>"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSuggestion {
    pub command: &'static str,
    /// Suggested input: the placeholder form, or the command with the typed
    /// argument once one is given.
    pub text: String,
}

/// Suggests commands for input starting with `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandPalette;

impl CommandPalette {
    /// Palette is shown only for slash input.
    pub fn is_command(input: &str) -> bool {
        input.starts_with('/')
    }

    /// Suggestions for `input`, in fixed command order.
    ///
    /// The word after `/` filters commands by prefix (an empty word keeps
    /// them all); anything after the first space replaces the placeholder.
    pub fn suggest(&self, input: &str) -> Vec<CommandSuggestion> {
        let Some(body) = input.strip_prefix('/') else {
            return Vec::new();
        };
        let (word, value) = match body.split_once(' ') {
            Some((word, value)) => (word, value),
            None => (body, ""),
        };

        COMMANDS
            .iter()
            .filter(|(command, _)| word.is_empty() || command[1..].starts_with(word))
            .map(|&(command, placeholder)| CommandSuggestion {
                command,
                text: if value.is_empty() {
                    format!("{} {}", command, placeholder)
                } else {
                    format!("{} {}", command, value)
                },
            })
            .collect()
    }
}

//! Parser for bot commands in comment text.
//!
//! Pure function from comment text to [`Command`]; no I/O.

use crate::git::MessageOverride;

use super::types::Command;

/// Parses the first bot command found in comment text.
///
/// # Arguments
///
/// * `text` - The comment text to parse
/// * `bot_name` - The bot name without the `@` prefix (e.g., `"merge-bot"`)
///
/// # Parsing Rules
///
/// - The trigger `@{bot_name}` is case-insensitive (like GitHub mentions)
/// - The trigger must be at a word boundary (not preceded by alphanumeric chars)
///   and followed by spaces or tabs, then the command word on the same line
/// - Command names (`merge`, `stop`) are case-insensitive
/// - For `merge`, the lines after the command line form an optional message
///   override: first non-blank line is the subject, the rest the description
/// - If multiple commands are present, the first valid one wins
/// - Returns `None` if no valid command is found
///
/// # Examples
///
/// ```
/// use merge_bot::commands::{parse_command, Command};
///
/// assert_eq!(parse_command("@Merge-Bot STOP", "merge-bot"), Some(Command::Stop));
/// assert_eq!(parse_command("no command here", "merge-bot"), None);
/// // Not a valid mention (preceded by alphanumeric):
/// assert_eq!(parse_command("foo@merge-bot merge", "merge-bot"), None);
/// ```
pub fn parse_command(text: &str, bot_name: &str) -> Option<Command> {
    let trigger = format!("@{}", bot_name);
    let mut search_start = 0;
    while let Some(abs_pos) = find_trigger(text, search_start, &trigger) {
        let after_trigger = &text[abs_pos + trigger.len()..];

        if let Some(cmd) = try_parse_after_trigger(after_trigger) {
            return Some(cmd);
        }

        search_start = abs_pos + trigger.len();
    }
    None
}

/// Finds the next occurrence of the trigger (case-insensitive) at a valid word boundary.
/// Returns the byte position of the `@` character if found.
fn find_trigger(text: &str, start: usize, trigger: &str) -> Option<usize> {
    let mut search_pos = start;

    while search_pos < text.len() {
        let at_pos = text[search_pos..].find('@')?;
        let abs_pos = search_pos + at_pos;

        // `get` returns None when the end lands inside a multi-byte character.
        if let Some(candidate) = text.get(abs_pos..abs_pos + trigger.len())
            && candidate.eq_ignore_ascii_case(trigger)
            && text[..abs_pos]
                .chars()
                .next_back()
                .is_none_or(|prev| !prev.is_alphanumeric())
        {
            return Some(abs_pos);
        }

        search_pos = abs_pos + 1;
    }
    None
}

/// Attempts to parse a command from text immediately following the trigger.
fn try_parse_after_trigger(text: &str) -> Option<Command> {
    // The command word must be on the same line as the trigger.
    let text = text.strip_prefix([' ', '\t'])?;
    let text = text.trim_start_matches([' ', '\t']);

    let (cmd_word, rest) = split_first_word(text);

    match cmd_word.to_ascii_lowercase().as_str() {
        "merge" => Some(parse_merge(rest)),
        "stop" => Some(Command::Stop),
        _ => None,
    }
}

/// Parses the optional message override following `merge`.
///
/// Anything after `merge` on the command line itself is ignored.
fn parse_merge(rest: &str) -> Command {
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => "",
    };

    let mut lines = body.lines().skip_while(|l| l.trim().is_empty());
    let message_override = match lines.next() {
        Some(subject) => {
            let description = lines.collect::<Vec<_>>().join("\n");
            Some(MessageOverride {
                subject: subject.trim().to_string(),
                description: description.trim().to_string(),
            })
        }
        None => None,
    };

    Command::Merge { message_override }
}

/// Splits text at the first whitespace, returning (word, rest).
/// If no whitespace, returns (text, "").
fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(|c: char| c.is_ascii_whitespace()) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

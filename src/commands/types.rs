//! Command types for `@<bot>` comment commands.

use crate::git::MessageOverride;

/// A parsed bot command from a pull request comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Squash-merges the PR once its build is green: `@<bot> merge`
    ///
    /// Lines after the command line, if any, replace the commit message: the
    /// first non-blank line is the subject and the rest the description.
    Merge {
        message_override: Option<MessageOverride>,
    },

    /// Marks the PR as not to be merged: `@<bot> stop`
    Stop,
}

impl Command {
    /// The command word, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Merge { .. } => "merge",
            Command::Stop => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names() {
        assert_eq!(Command::Merge { message_override: None }.name(), "merge");
        assert_eq!(Command::Stop.name(), "stop");
    }
}

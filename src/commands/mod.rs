//! Bot commands issued through pull request comments.
//!
//! # Supported Commands
//!
//! - `@{bot_name} merge` - Squash-merges the PR once all status checks pass
//! - `@{bot_name} stop` - Sets a failing review status so the PR won't be merged
//!
//! # Example
//!
//! ```
//! use merge_bot::commands::{parse_command, Command};
//!
//! assert_eq!(
//!     parse_command("LGTM\n\n@merge-bot merge", "merge-bot"),
//!     Some(Command::Merge { message_override: None })
//! );
//! assert_eq!(parse_command("@my-bot stop", "my-bot"), Some(Command::Stop));
//! ```

mod parser;
mod types;

pub use parser::parse_command;
pub use types::Command;

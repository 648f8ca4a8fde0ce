//! Webhook handling for GitHub events.
//!
//! - [`signature`]: HMAC-SHA256 verification of deliveries
//! - [`parser`]: raw payload to typed [`GitHubEvent`]
//! - [`events`]: the event types the bot acts on

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{CommentAction, GitHubEvent, IssueCommentEvent, PrAction, PullRequestEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, WebhookSecret};

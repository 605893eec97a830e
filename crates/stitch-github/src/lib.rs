//! GitHub side of the stitch bridge: REST/GraphQL client implementing the
//! `IssueTracker` capabilities and webhook payload normalization.

pub mod github_client;
pub mod webhook_event;

pub use github_client::{GithubClient, RepoRef};
pub use webhook_event::normalize_webhook_payload;

//! Payloads accepted by the relay's endpoints.
//!
//! Only the fields the relay acts on are decoded; everything else in the
//! body is ignored. Missing fields decode as empty strings.

use serde::Deserialize;

/// The part of a Sentry issue webhook the relay needs to assign the issue.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct IssueNotification {
    /// Issue (group) id, used in the issue detail API path
    #[serde(default)]
    pub id: String,
    /// Project slug the issue belongs to
    #[serde(default)]
    pub project: String,
}

/// Body of a synthetic test event.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TestEvent {
    #[serde(default)]
    pub culprit: String,
}

//! Client for the Sentry issue API.
//!
//! refs: <https://docs.sentry.io/api/events/update-an-issue/>

use reqwest::StatusCode;
use reqwest::header::USER_AGENT;
use serde::Serialize;
use url::Url;

const CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    #[error("HTTP client error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("received non-200 status from Sentry: {0}")]
    UnexpectedStatus(StatusCode),
    #[error("cannot build issue URL from API base {0}")]
    InvalidIssueUrl(Url),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest<'a> {
    assigned_to: &'a str,
}

#[derive(Clone)]
pub struct TrackerClient {
    client: reqwest::Client,
    api_base: Url,
    api_token: String,
}

impl TrackerClient {
    pub fn new(api_base: Url, api_token: String) -> Self {
        TrackerClient {
            client: reqwest::Client::new(),
            api_base,
            api_token,
        }
    }

    /// Assigns the issue to `assignee`.
    ///
    /// Only a 200 response counts as success. The call is made once; failures
    /// are returned to the caller as-is.
    pub async fn assign(&self, issue_id: &str, assignee: &str) -> Result<(), TrackerError> {
        let url = self.issue_url(issue_id)?;

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.api_token)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .json(&AssignRequest {
                assigned_to: assignee,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(TrackerError::UnexpectedStatus(status)),
        }
    }

    /// `<api_base>/api/0/issues/<issue_id>/`, with the id encoded as a single
    /// path segment.
    fn issue_url(&self, issue_id: &str) -> Result<Url, TrackerError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| TrackerError::InvalidIssueUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(["api", "0", "issues", issue_id, ""]);

        Ok(url)
    }
}

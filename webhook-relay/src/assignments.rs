//! Project to default assignee mapping.
//!
//! The mapping is a flat JSON object keyed by project slug, for example:
//!
//! ```json
//! {
//!   "sentry-bot": "name@domain.com",
//!   "sentry-bot-client": "name2@domain.com"
//! }
//! ```
//!
//! It is read once at startup and never modified afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum AssignmentsError {
    #[error("could not open assignment mapping: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse assignment mapping: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AssignmentMap(HashMap<String, String>);

impl AssignmentMap {
    pub fn from_file(path: &Path) -> Result<Self, AssignmentsError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AssignmentsError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Default assignee for `project`, if one is configured.
    pub fn lookup(&self, project: &str) -> Option<&str> {
        self.0.get(project).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for AssignmentMap {
    fn from(map: HashMap<String, String>) -> Self {
        AssignmentMap(map)
    }
}

use crate::assignments::AssignmentMap;
use crate::capture::EventCapture;
use http_body_util::BodyExt;
use hyper::body::{Bytes, Incoming};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
use hyper::service::service_fn;
use hyper::{Method, Request, StatusCode};
use shared::http::{make_empty_response, run_http_service};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

pub fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    write!(tmp, "{}", s).expect("write file");

    tmp
}

pub fn assignments(pairs: &[(&str, &str)]) -> AssignmentMap {
    pairs
        .iter()
        .map(|(project, assignee)| (project.to_string(), assignee.to_string()))
        .collect::<HashMap<_, _>>()
        .into()
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Stand-in for the Sentry API. Records every request and answers all of
/// them with a fixed status.
pub struct MockTracker {
    pub url: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTracker {
    pub async fn start(status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let service = service_fn(move |req: Request<Incoming>| {
            let recorded = recorded.clone();
            async move {
                let (parts, body) = req.into_parts();
                let header = |name: HeaderName| {
                    parts
                        .headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from)
                };
                let body = body
                    .collect()
                    .await
                    .map(|collected| collected.to_bytes())
                    .unwrap_or_else(|_| Bytes::new());

                recorded.lock().unwrap().push(RecordedRequest {
                    method: parts.method.clone(),
                    path: parts.uri.path().to_string(),
                    authorization: header(AUTHORIZATION),
                    content_type: header(CONTENT_TYPE),
                    body,
                });

                Ok::<_, std::io::Error>(make_empty_response::<std::io::Error>(status))
            }
        });
        tokio::spawn(run_http_service(listener, service));

        MockTracker {
            url: Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap(),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Keeps every captured message in memory.
#[derive(Default)]
pub struct RecordingCapture {
    messages: Mutex<Vec<String>>,
}

impl RecordingCapture {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl EventCapture for RecordingCapture {
    fn capture_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

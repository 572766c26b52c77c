use crate::assignments::AssignmentMap;
use crate::capture::EventCapture;
use crate::errors::RelayError;
use crate::protocol::{IssueNotification, TestEvent};
use crate::tracker::TrackerClient;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{ALLOW, HeaderValue, LOCATION};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::http::{make_empty_response, make_error_response};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type RelayResponse = Response<BoxBody<Bytes, RelayError>>;

/// Methods accepted on every route, as advertised in `Allow`.
const ALLOWED_METHODS: &str = "OPTIONS, POST";

#[derive(Clone, Copy, Debug, PartialEq)]
enum Route {
    Events,
    Fire,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/events" => Some(Route::Events),
            "/fire" => Some(Route::Fire),
            _ => None,
        }
    }
}

/// Serves `POST /events` (Sentry webhooks) and `POST /fire` (test events).
///
/// All state is immutable after construction and shared between connections.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<Inner>,
}

struct Inner {
    assignments: AssignmentMap,
    tracker: TrackerClient,
    capture: Arc<dyn EventCapture>,
}

impl RelayService {
    pub fn new(
        assignments: AssignmentMap,
        tracker: TrackerClient,
        capture: Arc<dyn EventCapture>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                assignments,
                tracker,
                capture,
            }),
        }
    }

    pub async fn route<B>(&self, req: Request<B>) -> RelayResponse
    where
        B: Body,
        B::Error: Display,
    {
        let path = req.uri().path();
        let Some(route) = Route::from_path(path) else {
            // A POST to a known route with a trailing slash is sent to the route
            if req.method() == Method::POST
                && let Some(target) = path.strip_suffix('/')
                && Route::from_path(target).is_some()
            {
                return redirect(target, req.uri().query());
            }

            tracing::warn!(method = %req.method(), path = %path, "No route matched");
            return make_error_response(StatusCode::NOT_FOUND);
        };

        if req.method() == Method::OPTIONS {
            return with_allow(make_empty_response(StatusCode::OK));
        }
        if req.method() != Method::POST {
            return with_allow(make_error_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        match route {
            Route::Events => self.handle_events(req.into_body()).await,
            Route::Fire => self.handle_fire(req.into_body()).await,
        }
    }

    /// Assigns the issue from a Sentry webhook to its project's default
    /// assignee.
    ///
    /// The answer is 200 in every case. Sentry treats any other status as an
    /// undelivered webhook.
    async fn handle_events<B>(&self, body: B) -> RelayResponse
    where
        B: Body,
        B::Error: Display,
    {
        let ok = || make_empty_response(StatusCode::OK);

        let notification: IssueNotification = match deserialize_body(body).await {
            Ok(notification) => notification,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode webhook body");
                return ok();
            }
        };

        let Some(assignee) = self.inner.assignments.lookup(&notification.project) else {
            tracing::error!(
                project = %notification.project,
                issue = %notification.id,
                "no default assignee for project"
            );
            return ok();
        };

        match self.inner.tracker.assign(&notification.id, assignee).await {
            Ok(()) => tracing::info!(
                project = %notification.project,
                issue = %notification.id,
                assignee = %assignee,
                "assigned issue"
            ),
            Err(e) => tracing::error!(
                project = %notification.project,
                issue = %notification.id,
                assignee = %assignee,
                error = %e,
                "failed to assign issue"
            ),
        }

        ok()
    }

    /// Forwards the culprit of a test event to Sentry.
    async fn handle_fire<B>(&self, body: B) -> RelayResponse
    where
        B: Body,
        B::Error: Display,
    {
        let event: TestEvent = match deserialize_body(body).await {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "failed to decode test event");
                return make_empty_response(StatusCode::BAD_REQUEST);
            }
        };

        tracing::info!(culprit = %event.culprit, "sending test event");
        self.inner.capture.capture_message(&event.culprit);

        make_empty_response(StatusCode::OK)
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = RelayResponse;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.route(req).await) })
    }
}

fn with_allow(mut response: RelayResponse) -> RelayResponse {
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// 307 to `path`, keeping the query string so the body is replayed as-is.
fn redirect(path: &str, query: Option<&str>) -> RelayResponse {
    let location = match query {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    match HeaderValue::from_str(&location) {
        Ok(location) => {
            let mut response = make_empty_response(StatusCode::TEMPORARY_REDIRECT);
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(_) => make_error_response(StatusCode::NOT_FOUND),
    }
}

/// Decodes the first JSON value of a request body.
///
/// Anything after that value is ignored, and a `null` body decodes to
/// `T::default()`.
async fn deserialize_body<T, B>(body: B) -> Result<T, RelayError>
where
    T: DeserializeOwned + Default,
    B: Body,
    B::Error: Display,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| RelayError::RequestBodyError(e.to_string()))?
        .to_bytes();

    let first = serde_json::Deserializer::from_slice(&bytes)
        .into_iter::<Option<T>>()
        .next()
        .ok_or(RelayError::EmptyBody)??;
    Ok(first.unwrap_or_default())
}

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const MIN_ACCEPT_BACKOFF: Duration = Duration::from_millis(5);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AcceptAction {
    /// The failure belongs to a single connection; accept the next one.
    Retry,
    /// Resource exhaustion (e.g. out of file descriptors); wait, then retry.
    Backoff,
    /// The listener itself is unusable.
    Fatal,
}

fn classify_accept_error(error: &io::Error) -> AcceptAction {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => AcceptAction::Retry,
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported => {
            AcceptAction::Fatal
        }
        _ => AcceptAction::Backoff,
    }
}

/// Doubles the previous delay, starting at 5ms and capped at 1s.
fn next_backoff(previous: Option<Duration>) -> Duration {
    match previous {
        None => MIN_ACCEPT_BACKOFF,
        Some(delay) => (delay * 2).min(MAX_ACCEPT_BACKOFF),
    }
}

/// Serves `service` on an already bound listener.
///
/// Every accepted connection is handled on its own task, so a slow request
/// never holds up other callers. Accept errors that only affect one
/// connection or come from temporary resource exhaustion are logged and
/// retried; the function returns only when the listener itself fails.
pub async fn run_http_service<S, E>(listener: TcpListener, service: S) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<io::Error> + std::error::Error + Send + Sync + 'static,
{
    let service_arc = Arc::new(service);
    let mut backoff = None;

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => {
                backoff = None;
                accepted
            }
            Err(e) => match classify_accept_error(&e) {
                AcceptAction::Retry => {
                    tracing::debug!(error = %e, "failed to accept connection");
                    continue;
                }
                AcceptAction::Backoff => {
                    let delay = next_backoff(backoff);
                    backoff = Some(delay);
                    tracing::warn!(error = %e, delay = ?delay, "accept failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                AcceptAction::Fatal => return Err(e.into()),
            },
        };
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %e, "connection closed with error");
            }
        });
    }
}

/// A response with the given status and no body.
pub fn make_empty_response<E>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let mut response = Response::new(Empty::new().map_err(|e| match e {}).boxed());
    *response.status_mut() = status_code;
    response
}

/// A response whose body is the canonical reason phrase of the status.
pub fn make_error_response<E>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    let mut response = Response::new(Full::new(message.into()).map_err(|e| match e {}).boxed());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::service::service_fn;

    #[test]
    fn accept_errors() {
        for kind in [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
        ] {
            assert_eq!(
                classify_accept_error(&io::Error::from(kind)),
                AcceptAction::Retry,
                "{kind:?}"
            );
        }

        // EMFILE / ENFILE: out of file descriptors
        for errno in [23, 24] {
            assert_eq!(
                classify_accept_error(&io::Error::from_raw_os_error(errno)),
                AcceptAction::Backoff,
                "errno {errno}"
            );
        }
        assert_eq!(
            classify_accept_error(&io::Error::from(io::ErrorKind::OutOfMemory)),
            AcceptAction::Backoff
        );

        assert_eq!(
            classify_accept_error(&io::Error::from(io::ErrorKind::InvalidInput)),
            AcceptAction::Fatal
        );
    }

    #[test]
    fn backoff_doubles_up_to_a_second() {
        let mut delay = next_backoff(None);
        assert_eq!(delay, Duration::from_millis(5));

        delay = next_backoff(Some(delay));
        assert_eq!(delay, Duration::from_millis(10));

        for _ in 0..20 {
            delay = next_backoff(Some(delay));
        }
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn serves_each_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let service = service_fn(|req: Request<Incoming>| async move {
            let response = match req.uri().path() {
                "/empty" => make_empty_response::<std::io::Error>(StatusCode::NO_CONTENT),
                _ => make_error_response(StatusCode::NOT_FOUND),
            };
            Ok::<_, std::io::Error>(response)
        });
        tokio::spawn(run_http_service(listener, service));

        let client = reqwest::Client::new();
        let empty = client
            .get(format!("http://{addr}/empty"))
            .send()
            .await
            .unwrap();
        assert_eq!(empty.status(), 204);
        assert!(empty.bytes().await.unwrap().is_empty());

        let missing = client
            .get(format!("http://{addr}/missing"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
        assert_eq!(missing.text().await.unwrap(), "Not Found");
    }
}

//! The RPC facade: HTTP requests in, streamed command output back.
//!
//! Any path is a call: the final path segment names the command and the
//! repeated `q` query parameter carries the ordered argument list, so
//! `GET /run?q=-l&q=base&q=--&q=true` is `run -l base -- true`. The
//! response body streams the command's output as it is produced; handler
//! failures become a single `Error: <message>` line on the same stream —
//! errors are textual here, not structured.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::{Uri, header};
use axum::response::{IntoResponse, Response};
use gantry::{CommandIo, Engine, OutputStream};
use gantry_common::GantryError;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;

/// Query key carrying the argument list, one value per argument.
const ARG_QUERY_KEY: &str = "q";

/// Build the router: every request is a dispatch call.
pub fn app(engine: Arc<Engine>) -> Router {
    Router::new()
        .fallback(dispatch_call)
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Derive `(command, args)` from a request URI.
fn call_from_uri(uri: &Uri) -> (String, Vec<String>) {
    let command = uri
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let args = Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| {
            pairs
                .into_iter()
                .filter(|(key, _)| key == ARG_QUERY_KEY)
                .map(|(_, value)| value)
                .collect()
        })
        .unwrap_or_default();
    (command, args)
}

async fn dispatch_call(State(engine): State<Arc<Engine>>, request: Request) -> Response {
    let (command, args) = call_from_uri(request.uri());
    tracing::info!(command = %command, args = ?args, "rpc call");

    // The request body is dropped here: stdin relay is disabled, so the
    // caller's input is discarded at the boundary.
    drop(request);

    let (output, rx) = OutputStream::channel(64);
    let mut io = CommandIo::new(None, output);
    tokio::spawn(async move {
        match engine.dispatch(&command, &mut io, &args).await {
            Ok(()) => {}
            Err(err @ GantryError::NoSuchCommand { .. }) => {
                // A dispatch miss is a textual response, not a failure:
                // the shared message followed by the command summary.
                let _ = io.output.write_str(format!("{err}\n\n")).await;
                let _ = engine.write_usage(&io.output).await;
            }
            Err(err) => {
                tracing::debug!(command = %command, error = %err, "command failed");
                let _ = io.output.write_str(format!("Error: {err}\n")).await;
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

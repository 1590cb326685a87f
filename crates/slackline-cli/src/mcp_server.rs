//! Stdio tool server.
//!
//! JSON-RPC 2.0 over stdin/stdout, one object per line. `tools/call`
//! requests run concurrently; responses are serialized through a single
//! writer task so lines never interleave. Logs go to stderr.

use std::sync::Arc;

use serde_json::{json, Value};
use slackline_core::Config;
use slackline_slack::Gateway;
use slackline_tools::envelope::to_tool_result;
use slackline_tools::{ToolContext, ToolRegistry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub struct ServerState {
    gateway: Arc<dyn Gateway>,
    config: Arc<Config>,
    registry: ToolRegistry,
    shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(gateway: Arc<dyn Gateway>, config: Arc<Config>) -> Self {
        Self {
            gateway,
            config,
            registry: ToolRegistry::builtin(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Serve until stdin closes or Ctrl-C. In-flight calls are cancelled on exit.
pub async fn serve(gateway: Arc<dyn Gateway>, config: Arc<Config>) -> anyhow::Result<()> {
    let state = Arc::new(ServerState::new(gateway, config));
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = rx.recv().await {
            let mut line = response.to_string();
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                warn!(error = %e, "stdout write failed");
                break;
            }
            if let Err(e) = stdout.flush().await {
                warn!(error = %e, "stdout flush failed");
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    info!(tools = ?state.registry.names(), "tool server ready");

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            read = stdin.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            debug!("stdin closed");
            break;
        }

        let request = match parse_line(&buf) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(response) => {
                let _ = tx.send(response);
                continue;
            }
        };

        let state = Arc::clone(&state);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = handle_request(&state, &request).await {
                let _ = tx.send(response);
            }
        });
    }

    state.shutdown.cancel();
    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Decode one input line. Blank lines are skipped; undecodable ones become
/// a parse-error response.
fn parse_line(bytes: &[u8]) -> Result<Option<Value>, Value> {
    let parse_error = |detail: String| {
        error_response(Value::Null, PARSE_ERROR, format!("Parse error: {detail}"))
    };
    let line = std::str::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| parse_error(e.to_string()))
}

/// Answer one request. `None` for notifications.
pub async fn handle_request(state: &ServerState, request: &Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    debug!(method, "request");

    let result = match method {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": "slackline",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
        "notifications/initialized" | "notifications/cancelled" => return None,
        "ping" => json!({}),
        "tools/list" => json!({ "tools": state.registry.definitions() }),
        "tools/call" => {
            let params = request.get("params").cloned().unwrap_or_else(|| json!({}));
            let name = params.get("name").and_then(Value::as_str).unwrap_or("");
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));

            let cancel = state.shutdown.child_token();
            let ctx = ToolContext {
                gateway: state.gateway.as_ref(),
                config: &state.config,
                cancel: &cancel,
            };
            let Some(outcome) = state.registry.dispatch(name, ctx, &arguments).await else {
                return id.map(|id| {
                    error_response(id, INVALID_PARAMS, format!("Unknown tool: {name}"))
                });
            };
            if let Err(e) = &outcome {
                debug!(tool = name, code = %e.code, "tool call failed");
            }
            let result = to_tool_result(&outcome);
            json!({
                "content": [{ "type": "text", "text": result.content }],
                "isError": result.is_error,
            })
        }
        _ => {
            return id.map(|id| {
                error_response(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
            });
        }
    };

    // A request without an id is a notification and gets no reply.
    id.map(|id| json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

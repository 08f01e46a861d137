//! MCP JSON-RPC server loop.
//!
//! Reads requests with [`FrameReader`], answers protocol methods inline and
//! runs each `tools/call` on its own task so a long `poll_inbox` never blocks
//! other requests. All responses funnel through one channel to the writer.

use crate::coordinator::Coordinator;
use crate::framing::{FrameReader, write_line};
use crate::tools::tool_definitions;
use serde_json::{Value, json};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// JSON-RPC parse error
pub const ERR_PARSE: i64 = -32700;

/// JSON-RPC invalid request
pub const ERR_INVALID_REQUEST: i64 = -32600;

/// JSON-RPC method not found
pub const ERR_METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC invalid params
pub const ERR_INVALID_PARAMS: i64 = -32602;

/// Protocol version answered when the client does not name one
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "atc-mcp";

const RESPONSE_CHANNEL_CAPACITY: usize = 256;

pub struct McpServer {
    coordinator: Arc<Coordinator>,
}

impl McpServer {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    /// Serve until `input` reaches EOF, then flush every outstanding response.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> anyhow::Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::channel::<Value>(RESPONSE_CHANNEL_CAPACITY);
        let mut frames = spawn_reader(input);

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let raw = match frame {
                        Some(Ok(raw)) => raw,
                        None => {
                            info!("Input closed, shutting down");
                            break;
                        }
                        Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                            warn!("Malformed frame: {e}");
                            let response = error_response(Value::Null, ERR_PARSE, &format!("Parse error: {e}"));
                            send_now(&mut output, &response).await?;
                            continue;
                        }
                        Some(Err(e)) => return Err(e.into()),
                    };
                    if let Some(response) = self.handle_message(&raw, &tx) {
                        send_now(&mut output, &response).await?;
                    }
                }
                Some(response) = rx.recv() => {
                    send_now(&mut output, &response).await?;
                }
            }
        }

        // Tool tasks still hold senders; wait for their answers.
        drop(tx);
        while let Some(response) = rx.recv().await {
            send_now(&mut output, &response).await?;
        }
        Ok(())
    }

    /// Handle one raw message. Returns an immediate response, if any;
    /// `tools/call` answers arrive later on `tx`.
    fn handle_message(&self, raw: &str, tx: &mpsc::Sender<Value>) -> Option<Value> {
        let msg: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse request: {e}");
                return Some(error_response(
                    Value::Null,
                    ERR_PARSE,
                    &format!("Parse error: {e}"),
                ));
            }
        };
        let id = msg.get("id").cloned();
        let Some(method) = msg.get("method").and_then(Value::as_str) else {
            if msg.get("result").is_some() || msg.get("error").is_some() {
                debug!("Ignoring client response {msg}");
                return None;
            }
            return Some(error_response(
                id.unwrap_or(Value::Null),
                ERR_INVALID_REQUEST,
                "Request has no method",
            ));
        };
        let Some(id) = id else {
            debug!("Notification {method}");
            return None;
        };

        match method {
            "initialize" => Some(success_response(id, initialize_result(&msg))),
            "ping" => Some(success_response(id, json!({}))),
            "tools/list" => Some(success_response(id, json!({"tools": tool_definitions()}))),
            "tools/call" => self.start_tool_call(id, &msg, tx),
            other => Some(error_response(
                id,
                ERR_METHOD_NOT_FOUND,
                &format!("Method not found: {other}"),
            )),
        }
    }

    fn start_tool_call(&self, id: Value, msg: &Value, tx: &mpsc::Sender<Value>) -> Option<Value> {
        let params = msg.get("params").cloned().unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str).map(String::from) else {
            return Some(error_response(
                id,
                ERR_INVALID_PARAMS,
                "tools/call requires params.name",
            ));
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let coordinator = Arc::clone(&self.coordinator);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = match coordinator.call_tool(&name, &arguments).await {
                Ok(value) => tool_success(&value),
                Err(e) => {
                    warn!("Tool {name} failed: {e}");
                    tool_error(&e.to_string())
                }
            };
            if tx.send(success_response(id, result)).await.is_err() {
                debug!("Response for {name} dropped: writer closed");
            }
        });
        None
    }
}

/// Read frames on a separate task; `read_line` is not cancel-safe under `select!`.
/// The channel closes at EOF or after the first unrecoverable read error.
fn spawn_reader<R>(input: R) -> mpsc::Receiver<io::Result<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (frame_tx, frame_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut reader = FrameReader::new(input);
        loop {
            let frame = match reader.next_message().await {
                Ok(Some(raw)) => Ok(raw),
                Ok(None) => break,
                Err(e) => {
                    let fatal = e.kind() != io::ErrorKind::InvalidData;
                    if frame_tx.send(Err(e)).await.is_err() || fatal {
                        break;
                    }
                    continue;
                }
            };
            if frame_tx.send(frame).await.is_err() {
                break;
            }
        }
    });
    frame_rx
}

async fn send_now<W: AsyncWrite + Unpin>(output: &mut W, response: &Value) -> io::Result<()> {
    write_line(output, &response.to_string()).await
}

fn initialize_result(msg: &Value) -> Value {
    let version = msg
        .pointer("/params/protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
    })
}

/// Tool result carrying `value` as pretty-printed JSON text.
pub fn tool_success(value: &Value) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({"content": [{"type": "text", "text": text}]})
}

/// Tool result flagged as an application error; not a JSON-RPC error.
pub fn tool_error(message: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": message}],
        "isError": true
    })
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

pub fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message}
    })
}

//! End-to-end tests driving the MCP server over an in-memory stream.

use agent_team_coord_core::TeamMember;
use agent_team_coord_core::TeamStore;
use agent_team_coord_core::health::HealthThresholds;
use agent_team_coord_core::schema::BackendKind;
use agent_team_coord_core::spawn::mock_runner::MockRunner;
use agent_team_coord_core::spawn::{
    MarkdownConfigRenderer, PassthroughModelResolver, SpawnSettings, Spawner,
};
use atc_mcp::framing::encode_content_length;
use atc_mcp::server::{ERR_METHOD_NOT_FOUND, ERR_PARSE};
use atc_mcp::tools::TOOL_NAMES;
use atc_mcp::{Coordinator, McpServer};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

struct Client {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    next_id: i64,
}

impl Client {
    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn notify(&mut self, method: &str) {
        let msg = json!({"jsonrpc": "2.0", "method": method});
        self.send_raw(format!("{msg}\n").as_bytes()).await;
    }

    async fn start(&mut self, method: &str, params: Value) -> i64 {
        self.next_id += 1;
        let msg = json!({"jsonrpc": "2.0", "id": self.next_id, "method": method, "params": params});
        self.send_raw(format!("{msg}\n").as_bytes()).await;
        self.next_id
    }

    async fn read_response(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("server closed output");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.start(method, params).await;
        let resp = self.read_response().await;
        assert_eq!(resp["id"], id);
        resp
    }

    /// Call a tool and return its `result` object.
    async fn call(&mut self, tool: &str, arguments: Value) -> Value {
        let resp = self
            .request("tools/call", json!({"name": tool, "arguments": arguments}))
            .await;
        resp["result"].clone()
    }
}

/// Parse the JSON text payload of a successful tool result.
fn payload(result: &Value) -> Value {
    assert!(result.get("isError").is_none(), "tool failed: {result}");
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

struct Harness {
    _temp: TempDir,
    store: TeamStore,
    client: Client,
    server: JoinHandle<anyhow::Result<()>>,
}

fn start_server() -> Harness {
    let temp = TempDir::new().unwrap();
    let store = TeamStore::new(temp.path().join("teams"));
    let spawner = Spawner::new(
        store.clone(),
        Arc::new(MockRunner::new()),
        Arc::new(MarkdownConfigRenderer),
        Arc::new(PassthroughModelResolver::new(Some("openai/gpt-5".to_string()))),
        SpawnSettings::new(temp.path().join("project")),
    );
    let server = McpServer::new(Coordinator::new(spawner, HealthThresholds::default()));

    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let server = tokio::spawn(async move { server.run(server_read, server_write).await });

    let (client_read, client_write) = tokio::io::split(client_end);
    Harness {
        _temp: temp,
        store,
        client: Client {
            writer: client_write,
            lines: BufReader::new(client_read).lines(),
            next_id: 0,
        },
        server,
    }
}

async fn team_with(h: &mut Harness, members: &[&str]) {
    let created = h.client.call("team_create", json!({"team_name": "t1"})).await;
    assert_eq!(payload(&created)["lead_agent_id"], "team-lead@t1");
    for name in members {
        h.store
            .add_member("t1", TeamMember::new("t1", name, BackendKind::Tmux))
            .unwrap();
    }
}

#[tokio::test]
async fn test_plain_send_reaches_only_recipient() {
    let mut h = start_server();
    let init = h
        .client
        .request("initialize", json!({"protocolVersion": "2024-11-05"}))
        .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "atc-mcp");
    h.client.notify("notifications/initialized").await;

    team_with(&mut h, &["alice", "bob"]).await;
    let sent = h
        .client
        .call(
            "send_message",
            json!({
                "team_name": "t1",
                "type": "message",
                "recipient": "bob",
                "content": "hello bob",
                "summary": "greeting",
                "sender": "alice"
            }),
        )
        .await;
    assert_eq!(payload(&sent)["recipients"], json!(["bob"]));

    let bob = payload(
        &h.client
            .call("read_inbox", json!({"team_name": "t1", "agent_name": "bob"}))
            .await,
    );
    let bob = bob.as_array().unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0]["text"], "hello bob");
    assert_eq!(bob[0]["from"], "team-lead@t1");
    assert_eq!(bob[0]["summary"], "greeting");

    let alice = payload(
        &h.client
            .call("read_inbox", json!({"team_name": "t1", "agent_name": "alice"}))
            .await,
    );
    assert_eq!(alice, json!([]));
}

#[tokio::test]
async fn test_tools_list_and_ping() {
    let mut h = start_server();
    let resp = h.client.request("tools/list", json!({})).await;
    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, TOOL_NAMES);

    let pong = h.client.request("ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test]
async fn test_protocol_errors_keep_server_running() {
    let mut h = start_server();
    let resp = h.client.request("prompts/list", json!({})).await;
    assert_eq!(resp["error"]["code"], ERR_METHOD_NOT_FOUND);

    h.client.send_raw(&encode_content_length("{\"broken\":")).await;
    let resp = h.client.read_response().await;
    assert_eq!(resp["error"]["code"], ERR_PARSE);
    assert_eq!(resp["id"], Value::Null);

    let pong = h.client.request("ping", json!({})).await;
    assert!(pong.get("error").is_none());
}

#[tokio::test]
async fn test_tool_failure_is_error_result() {
    let mut h = start_server();
    let result = h
        .client
        .call("task_get", json!({"team_name": "nope", "task_id": "1"}))
        .await;
    assert_eq!(result["isError"], true);
    assert!(!result["content"][0]["text"].as_str().unwrap().is_empty());

    let result = h.client.call("no_such_tool", json!({})).await;
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("no_such_tool"));
}

#[tokio::test]
async fn test_poll_does_not_block_other_calls() {
    let mut h = start_server();
    team_with(&mut h, &["alice"]).await;

    let poll_id = h
        .client
        .start(
            "tools/call",
            json!({
                "name": "poll_inbox",
                "arguments": {"team_name": "t1", "agent_name": "alice", "since": 0, "timeout_ms": 10000}
            }),
        )
        .await;
    let send_id = h
        .client
        .start(
            "tools/call",
            json!({
                "name": "send_message",
                "arguments": {"team_name": "t1", "recipient": "alice", "content": "wake up"}
            }),
        )
        .await;

    let mut poll_result = None;
    for _ in 0..2 {
        let resp = h.client.read_response().await;
        if resp["id"] == poll_id {
            poll_result = Some(resp["result"].clone());
        } else {
            assert_eq!(resp["id"], send_id);
        }
    }
    let messages = payload(&poll_result.unwrap());
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["text"], "wake up");
}

#[tokio::test]
async fn test_eof_flushes_pending_responses() {
    let mut h = start_server();
    h.client
        .start("tools/call", json!({"name": "server_status", "arguments": {}}))
        .await;
    h.client.writer.shutdown().await.unwrap();

    let resp = h.client.read_response().await;
    let status = payload(&resp["result"]);
    assert_eq!(status["status"], "ok");
    assert!(status["agent_binary"].is_null());

    h.server.await.unwrap().unwrap();
    assert!(h.client.lines.next_line().await.unwrap().is_none());
}

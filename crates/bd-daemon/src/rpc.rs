//! RPC surface (§4.6): a local Unix-domain socket, length-prefixed JSON
//! framing, and a small closed set of operations plus an opaque
//! daemon-admin catch-all.
//!
//! Every mutating operation that succeeds publishes a [`MutationEvent`] on
//! the broadcast channel; if the channel is full the event is dropped and
//! [`MutationBroadcast::dropped_count`] is bumped rather than blocking the
//! RPC handler (§4.5 "Backpressure").

use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beads_core::dependency::Dependency;
use beads_core::enums::DependencyType;
use beads_core::filter::{IssueFilter, WorkFilter};
use beads_core::issue::IssueBuilder;
use beads_storage::{IssueUpdates, Storage};
use chrono::Utc;

use crate::context::WorkspaceContext;
use crate::error::{DaemonError, Result};

/// Maximum frame size accepted from a peer, guarding against a malformed
/// or hostile length prefix causing an unbounded allocation.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Capacity of the mutation broadcast channel (§4.5 "Backpressure").
const BROADCAST_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Reads one length-prefixed JSON frame: a 4-byte big-endian length
/// followed by that many bytes of JSON.
pub fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(DaemonError::Framing(format!("frame of {len} bytes exceeds limit")));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

/// Writes one length-prefixed JSON frame.
pub fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| DaemonError::Framing("payload too large".into()))?;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// One RPC request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub op: String,
    #[serde(default)]
    pub args: Value,
}

/// One RPC response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self { success: true, error: None, data }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, error: Some(message.into()), data: Value::Null }
    }
}

// ---------------------------------------------------------------------------
// Mutation broadcast
// ---------------------------------------------------------------------------

/// An event published after a successful mutating RPC operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    pub kind: String,
    pub issue_id: String,
}

/// The publishing half of the mutation broadcast channel plus its
/// drop-counter, shared between every connection handler.
#[derive(Clone)]
pub struct MutationBroadcast {
    tx: SyncSender<MutationEvent>,
    dropped: Arc<AtomicU64>,
}

impl MutationBroadcast {
    /// Creates the channel, returning the publishing handle and the
    /// consumer end the event loop reads from.
    pub fn new() -> (Self, Receiver<MutationEvent>) {
        let (tx, rx) = sync_channel(BROADCAST_CAPACITY);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Publishes an event, dropping it (and bumping the counter) instead
    /// of blocking if the channel is full.
    pub fn publish(&self, event: MutationEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Returns the drop count since daemon start.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Takes the current drop count and resets it to zero, for the
    /// dropped-events sweep (§4.5) to detect "something was dropped since
    /// I last checked" without double-counting.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The RPC server: binds the workspace's Unix socket and dispatches
/// incoming requests against a [`WorkspaceContext`], publishing a
/// [`MutationEvent`] on every successful mutation.
pub struct RpcServer {
    listener: UnixListener,
    ctx: WorkspaceContext,
    broadcast: MutationBroadcast,
    ready: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
}

impl RpcServer {
    /// Binds the socket at `ctx.socket_path()`, removing a stale socket
    /// file left by a prior crashed daemon first.
    pub fn bind(ctx: WorkspaceContext, broadcast: MutationBroadcast) -> Result<Self> {
        let path = ctx.socket_path();
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path).map_err(|source| DaemonError::SocketBind { path, source })?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            ctx,
            broadcast,
            ready: Arc::new(AtomicBool::new(true)),
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Whether the server is ready to accept connections.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Signals the accept loop to stop after its current poll.
    pub fn request_stop(&self) {
        self.stopping.store(false, Ordering::SeqCst);
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Runs the accept loop until [`Self::request_stop`] is called.
    ///
    /// Each connection is handled on its own thread; the underlying store
    /// serializes writers internally, so concurrent handlers are safe.
    pub fn run(&self) {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return;
            }
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    let ctx = self.ctx.clone();
                    let broadcast = self.broadcast.clone();
                    thread::spawn(move || handle_connection(stream, ctx, broadcast));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(25));
                }
                Err(_) => {
                    thread::sleep(Duration::from_millis(25));
                }
            }
        }
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.ctx.socket_path());
    }
}

fn handle_connection(mut stream: UnixStream, ctx: WorkspaceContext, broadcast: MutationBroadcast) {
    loop {
        let frame = match read_frame(&mut stream) {
            Ok(f) => f,
            Err(_) => return,
        };
        let request: Request = match serde_json::from_slice(&frame) {
            Ok(r) => r,
            Err(e) => {
                let _ = write_frame(&mut stream, &serde_json::to_vec(&Response::err(e.to_string())).unwrap_or_default());
                continue;
            }
        };
        let response = dispatch(&ctx, &broadcast, &request);
        let Ok(bytes) = serde_json::to_vec(&response) else { return };
        if write_frame(&mut stream, &bytes).is_err() {
            return;
        }
    }
}

/// Resolves `raw_id` through the partial-ID resolver against every known
/// issue ID. Every operation that accepts a caller-supplied ID routes
/// through here (§4.6 "Partial-ID resolution").
fn resolve_id(ctx: &WorkspaceContext, raw_id: &str) -> std::result::Result<String, String> {
    let issues = ctx.store.list_all_issues().map_err(|e| e.to_string())?;
    let ids: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
    beads_query::resolve_partial_id(ids, raw_id).map_err(|e| e.to_string())
}

fn dispatch(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, request: &Request) -> Response {
    match request.op.as_str() {
        "show" => op_show(ctx, &request.args),
        "list" => op_list(ctx, &request.args),
        "search" => op_search(ctx, &request.args),
        "create" => op_create(ctx, broadcast, &request.args),
        "update" => op_update(ctx, broadcast, &request.args),
        "delete" => op_delete(ctx, broadcast, &request.args),
        "ready-work" => op_ready_work(ctx, &request.args),
        "resolve-partial-id" => op_resolve_partial_id(ctx, &request.args),
        "add-dependency" => op_add_dependency(ctx, broadcast, &request.args),
        "remove-dependency" => op_remove_dependency(ctx, broadcast, &request.args),
        "add-label" => op_add_label(ctx, broadcast, &request.args),
        "remove-label" => op_remove_label(ctx, broadcast, &request.args),
        "status" => op_status(ctx, broadcast),
        "stop" => Response::ok(Value::Null),
        other => op_admin(ctx, other, &request.args),
    }
}

fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn op_show(ctx: &WorkspaceContext, args: &Value) -> Response {
    let Some(raw_id) = arg_str(args, "id") else {
        return Response::err("missing 'id'");
    };
    let id = match resolve_id(ctx, &raw_id) {
        Ok(id) => id,
        Err(e) => return Response::err(e),
    };
    match ctx.store.get_issue(&id) {
        Ok(issue) => Response::ok(serde_json::to_value(issue).unwrap_or(Value::Null)),
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_list(ctx: &WorkspaceContext, args: &Value) -> Response {
    let filter: IssueFilter = args
        .get("filter")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    match ctx.store.search_issues("", &filter) {
        Ok(issues) => Response::ok(serde_json::to_value(issues).unwrap_or(Value::Null)),
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_search(ctx: &WorkspaceContext, args: &Value) -> Response {
    let query = arg_str(args, "query").unwrap_or_default();
    let filter: IssueFilter = args
        .get("filter")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    match ctx.store.search_issues(&query, &filter) {
        Ok(issues) => Response::ok(serde_json::to_value(issues).unwrap_or(Value::Null)),
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_create(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let Some(title) = arg_str(args, "title") else {
        return Response::err("missing 'title'");
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    let mut builder = IssueBuilder::new(title);
    if let Some(id) = arg_str(args, "id") {
        builder = builder.id(id);
    }
    if let Some(description) = arg_str(args, "description") {
        builder = builder.description(description);
    }
    let issue = builder.created_by(&actor).build();
    let id = issue.id.clone();
    match ctx.store.create_issue(&issue, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "created".into(), issue_id: id.clone() });
            Response::ok(serde_json::json!({ "id": id }))
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_update(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let Some(raw_id) = arg_str(args, "id") else {
        return Response::err("missing 'id'");
    };
    let id = match resolve_id(ctx, &raw_id) {
        Ok(id) => id,
        Err(e) => return Response::err(e),
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    let updates: IssueUpdates = match args.get("updates").and_then(|v| serde_json::from_value(v.clone()).ok()) {
        Some(u) => u,
        None => return Response::err("missing or invalid 'updates'"),
    };
    match ctx.store.update_issue(&id, &updates, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "updated".into(), issue_id: id.clone() });
            Response::ok(serde_json::json!({ "id": id }))
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_delete(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let Some(raw_id) = arg_str(args, "id") else {
        return Response::err("missing 'id'");
    };
    let id = match resolve_id(ctx, &raw_id) {
        Ok(id) => id,
        Err(e) => return Response::err(e),
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    let reason = arg_str(args, "reason");
    let flags = beads_sync::DeleteFlags {
        force: args.get("force").and_then(Value::as_bool).unwrap_or(false),
        dry_run: args.get("dry_run").and_then(Value::as_bool).unwrap_or(false),
        cascade: args.get("cascade").and_then(Value::as_bool).unwrap_or(false),
        hard: args.get("hard").and_then(Value::as_bool).unwrap_or(false),
    };
    match beads_sync::single_delete(ctx.store.as_ref(), &ctx.journal_path, &id, &actor, reason.as_deref(), flags) {
        Ok(outcome) => {
            if !outcome.dry_run {
                for tombstoned_id in &outcome.tombstoned {
                    broadcast.publish(MutationEvent { kind: "deleted".into(), issue_id: tombstoned_id.clone() });
                }
            }
            Response::ok(serde_json::json!({
                "tombstoned": outcome.tombstoned,
                "rewritten": outcome.rewritten,
                "dry_run": outcome.dry_run,
            }))
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_ready_work(ctx: &WorkspaceContext, args: &Value) -> Response {
    let filter: WorkFilter = args
        .get("filter")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    match ctx.store.get_ready_work(&filter) {
        Ok(issues) => Response::ok(serde_json::to_value(issues).unwrap_or(Value::Null)),
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_resolve_partial_id(ctx: &WorkspaceContext, args: &Value) -> Response {
    let Some(raw_id) = arg_str(args, "id") else {
        return Response::err("missing 'id'");
    };
    match resolve_id(ctx, &raw_id) {
        Ok(id) => Response::ok(serde_json::json!({ "id": id })),
        Err(e) => Response::err(e),
    }
}

fn op_add_dependency(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let (Some(issue_id), Some(depends_on_id)) = (arg_str(args, "issue_id"), arg_str(args, "depends_on_id")) else {
        return Response::err("missing 'issue_id' or 'depends_on_id'");
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    let dep_type: DependencyType = arg_str(args, "type").map(DependencyType::from).unwrap_or(DependencyType::Blocks);
    let dep = Dependency {
        issue_id: issue_id.clone(),
        depends_on_id,
        dep_type,
        created_at: Utc::now(),
        created_by: actor.clone(),
        metadata: String::new(),
        thread_id: String::new(),
    };
    match ctx.store.add_dependency(&dep, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "dependency_added".into(), issue_id: issue_id.clone() });
            Response::ok(Value::Null)
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_remove_dependency(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let (Some(issue_id), Some(depends_on_id)) = (arg_str(args, "issue_id"), arg_str(args, "depends_on_id")) else {
        return Response::err("missing 'issue_id' or 'depends_on_id'");
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    match ctx.store.remove_dependency(&issue_id, &depends_on_id, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "dependency_removed".into(), issue_id: issue_id.clone() });
            Response::ok(Value::Null)
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_add_label(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let (Some(raw_id), Some(label)) = (arg_str(args, "id"), arg_str(args, "label")) else {
        return Response::err("missing 'id' or 'label'");
    };
    let id = match resolve_id(ctx, &raw_id) {
        Ok(id) => id,
        Err(e) => return Response::err(e),
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    match ctx.store.add_label(&id, &label, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "label_added".into(), issue_id: id.clone() });
            Response::ok(Value::Null)
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_remove_label(ctx: &WorkspaceContext, broadcast: &MutationBroadcast, args: &Value) -> Response {
    let (Some(raw_id), Some(label)) = (arg_str(args, "id"), arg_str(args, "label")) else {
        return Response::err("missing 'id' or 'label'");
    };
    let id = match resolve_id(ctx, &raw_id) {
        Ok(id) => id,
        Err(e) => return Response::err(e),
    };
    let actor = arg_str(args, "actor").unwrap_or_else(|| "daemon".to_string());
    match ctx.store.remove_label(&id, &label, &actor) {
        Ok(()) => {
            broadcast.publish(MutationEvent { kind: "label_removed".into(), issue_id: id.clone() });
            Response::ok(Value::Null)
        }
        Err(e) => Response::err(e.to_string()),
    }
}

fn op_status(ctx: &WorkspaceContext, broadcast: &MutationBroadcast) -> Response {
    let stats = match ctx.store.get_statistics() {
        Ok(s) => s,
        Err(e) => return Response::err(e.to_string()),
    };
    Response::ok(serde_json::json!({
        "total_issues": stats.total_issues,
        "open_issues": stats.open_issues,
        "dropped_events": broadcast.dropped_count(),
    }))
}

/// Opaque catch-all for daemon-only admin operations (§4.6). The data
/// payload is handed back verbatim as `{"op": ..., "args": ...}` so a
/// privileged caller can extend the admin surface without the framing
/// layer knowing its shape.
fn op_admin(_ctx: &WorkspaceContext, op: &str, args: &Value) -> Response {
    let mut data = HashMap::new();
    data.insert("op".to_string(), Value::String(op.to_string()));
    data.insert("args".to_string(), args.clone());
    Response {
        success: false,
        error: Some(format!("unsupported admin operation: {op}")),
        data: serde_json::to_value(data).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let payload = b"{\"op\":\"status\"}".to_vec();
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).unwrap();
        let mut cursor = Cursor::new(buf);
        let read_back = read_frame(&mut cursor).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn broadcast_drops_past_capacity_without_blocking() {
        let (tx, _rx) = MutationBroadcast::new();
        for i in 0..(BROADCAST_CAPACITY + 10) {
            tx.publish(MutationEvent { kind: "created".into(), issue_id: format!("bd-{i}") });
        }
        assert!(tx.dropped_count() > 0);
    }

    #[test]
    fn take_dropped_resets_counter() {
        let (tx, _rx) = MutationBroadcast::new();
        for i in 0..(BROADCAST_CAPACITY + 5) {
            tx.publish(MutationEvent { kind: "created".into(), issue_id: format!("bd-{i}") });
        }
        let first = tx.take_dropped();
        assert!(first > 0);
        assert_eq!(tx.take_dropped(), 0);
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The flow execution engine.
//!
//! One engine serves every instance. It is constructed with its
//! collaborators (storage, adapter source, HTTP client) injected — no
//! ambient global state. Inbound events enter through
//! [`FlowEngine::handle_inbound_event`]; webhooks start flows directly via
//! [`FlowEngine::start_flow`].
//!
//! Failure semantics: send and HTTP errors inside a node are logged and the
//! session continues; flow definition errors (missing node, undecodable
//! graph) stop that session without touching the rest of the process.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use courier_core::{AdapterSource, CourierError, MediaKind};
use courier_storage::queries::{flows, instances, sessions};
use courier_storage::{Database, FlowRecord, FlowSessionRecord};

use crate::condition::evaluate;
use crate::model::{FlowDefinition, FlowNode, InboundEvent, NodeKind, TriggerPolicy};
use crate::template::substitute;

/// Hard ceiling on nodes executed per inbound event, so a cyclic graph
/// cannot wedge a worker.
const MAX_STEPS: usize = 100;

/// Variable set by a TRANSFER node before the session closes.
const TRANSFER_VARIABLE: &str = "transferred_to";

pub struct FlowEngine {
    db: Database,
    adapters: Arc<dyn AdapterSource>,
    http: reqwest::Client,
}

/// What one node execution asks the loop to do next.
enum Step {
    Continue(Option<String>),
    Wait,
    End,
    Switch(String),
}

/// Mutable state of one engine run.
struct Run {
    session_id: String,
    instance_id: String,
    remote_party: String,
    def: FlowDefinition,
    vars: HashMap<String, String>,
}

impl FlowEngine {
    pub fn new(db: Database, adapters: Arc<dyn AdapterSource>, http: reqwest::Client) -> Self {
        Self { db, adapters, http }
    }

    /// Entry point for inbound messages. Returns whether a flow handled the
    /// event, so the caller can fall back to other integrations when not.
    pub async fn handle_inbound_event(
        &self,
        instance_id: &str,
        remote_party: &str,
        event: &InboundEvent,
    ) -> Result<bool, CourierError> {
        let Some(instance) = instances::get(&self.db, instance_id).await? else {
            return Ok(false);
        };

        if let Some(session) = sessions::active_for(&self.db, instance_id, remote_party).await? {
            if session.waiting_input {
                return self.resume(session, event).await;
            }
        }

        let candidates = flows::candidates_for(&self.db, &instance.tenant_id, instance_id).await?;
        for flow in candidates {
            if trigger_matches(&flow, event) {
                tracing::debug!(flow_id = %flow.id, %remote_party, "flow triggered");
                sessions::deactivate_for(&self.db, instance_id, remote_party).await?;
                return self
                    .start(&flow, instance_id, remote_party, HashMap::new())
                    .await;
            }
        }
        Ok(false)
    }

    /// Start a flow for a conversation regardless of its trigger policy.
    /// This is the WEBHOOK entry; any prior active session is force-closed.
    pub async fn start_flow(
        &self,
        flow_id: &str,
        instance_id: &str,
        remote_party: &str,
        variables: HashMap<String, String>,
    ) -> Result<bool, CourierError> {
        let Some(flow) = flows::get(&self.db, flow_id).await? else {
            return Ok(false);
        };
        if !flow.enabled {
            return Ok(false);
        }
        sessions::deactivate_for(&self.db, instance_id, remote_party).await?;
        self.start(&flow, instance_id, remote_party, variables).await
    }

    async fn start(
        &self,
        flow: &FlowRecord,
        instance_id: &str,
        remote_party: &str,
        vars: HashMap<String, String>,
    ) -> Result<bool, CourierError> {
        let def: FlowDefinition = match serde_json::from_str(&flow.definition) {
            Ok(def) => def,
            Err(error) => {
                tracing::warn!(flow_id = %flow.id, %error, "undecodable flow definition");
                return Ok(false);
            }
        };
        let Some(start) = def.start_node() else {
            tracing::warn!(flow_id = %flow.id, "flow has no START node");
            return Ok(false);
        };
        let start_id = start.id.clone();

        let session = FlowSessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            flow_id: flow.id.clone(),
            instance_id: instance_id.to_string(),
            remote_party: remote_party.to_string(),
            current_node: Some(start_id.clone()),
            variables: serde_json::to_string(&vars).unwrap_or_else(|_| "{}".to_string()),
            waiting_input: false,
            active: true,
            started_at: String::new(),
            last_activity_at: String::new(),
            completed_at: None,
        };
        sessions::insert(&self.db, &session).await?;

        let run = Run {
            session_id: session.id,
            instance_id: instance_id.to_string(),
            remote_party: remote_party.to_string(),
            def,
            vars,
        };
        self.run_from(run, start_id).await?;
        Ok(true)
    }

    /// Resume a session paused at a waiting node: capture the event into
    /// variables, route off the produced handle, and keep executing.
    async fn resume(
        &self,
        session: FlowSessionRecord,
        event: &InboundEvent,
    ) -> Result<bool, CourierError> {
        let Some(flow) = flows::get(&self.db, &session.flow_id).await? else {
            sessions::complete(&self.db, &session.id).await?;
            return Ok(false);
        };
        let def: FlowDefinition = match serde_json::from_str(&flow.definition) {
            Ok(def) => def,
            Err(error) => {
                tracing::warn!(flow_id = %flow.id, %error, "undecodable flow definition");
                sessions::complete(&self.db, &session.id).await?;
                return Ok(false);
            }
        };
        let Some(node_id) = session.current_node.clone() else {
            sessions::complete(&self.db, &session.id).await?;
            return Ok(false);
        };
        let Some(node) = def.node(&node_id).cloned() else {
            tracing::warn!(flow_id = %flow.id, %node_id, "waiting node vanished from flow");
            sessions::complete(&self.db, &session.id).await?;
            return Ok(false);
        };

        let mut vars: HashMap<String, String> =
            serde_json::from_str(&session.variables).unwrap_or_default();
        let handle = capture_input(&node.kind, event, &mut vars);

        let mut run = Run {
            session_id: session.id,
            instance_id: session.instance_id,
            remote_party: session.remote_party,
            def,
            vars,
        };
        match resolve_next(&run.def, &node_id, handle.as_deref(), &run.vars) {
            Some(next) => self.run_from(run, next).await?,
            None => self.finish(&mut run, &node_id).await?,
        }
        Ok(true)
    }

    /// The node loop. Stops on wait, end, missing node, or the step ceiling.
    async fn run_from(&self, mut run: Run, start_at: String) -> Result<(), CourierError> {
        let mut current = start_at;
        for _ in 0..MAX_STEPS {
            let Some(node) = run.def.node(&current).cloned() else {
                tracing::warn!(node_id = %current, "edge points at a missing node");
                return self.finish(&mut run, &current).await;
            };

            match self.exec(&run.instance_id, &run.remote_party, &node, &mut run.vars).await {
                Step::Wait => {
                    let vars_json =
                        serde_json::to_string(&run.vars).unwrap_or_else(|_| "{}".to_string());
                    sessions::save_progress(&self.db, &run.session_id, Some(&current), &vars_json, true)
                        .await?;
                    return Ok(());
                }
                Step::End => return self.finish(&mut run, &current).await,
                Step::Switch(flow_id) => {
                    let Some(next_flow) = flows::get(&self.db, &flow_id).await? else {
                        tracing::warn!(%flow_id, "GO_TO_FLOW target missing");
                        return self.finish(&mut run, &current).await;
                    };
                    if !next_flow.enabled {
                        return self.finish(&mut run, &current).await;
                    }
                    let def: FlowDefinition = match serde_json::from_str(&next_flow.definition) {
                        Ok(def) => def,
                        Err(error) => {
                            tracing::warn!(%flow_id, %error, "undecodable flow definition");
                            return self.finish(&mut run, &current).await;
                        }
                    };
                    let Some(start) = def.start_node() else {
                        tracing::warn!(%flow_id, "flow has no START node");
                        return self.finish(&mut run, &current).await;
                    };
                    let start_id = start.id.clone();

                    // Close this session and open one in the target flow,
                    // carrying the variable bindings across.
                    self.finish(&mut run, &current).await?;
                    let session = FlowSessionRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        flow_id: next_flow.id.clone(),
                        instance_id: run.instance_id.clone(),
                        remote_party: run.remote_party.clone(),
                        current_node: Some(start_id.clone()),
                        variables: serde_json::to_string(&run.vars)
                            .unwrap_or_else(|_| "{}".to_string()),
                        waiting_input: false,
                        active: true,
                        started_at: String::new(),
                        last_activity_at: String::new(),
                        completed_at: None,
                    };
                    sessions::insert(&self.db, &session).await?;
                    run.session_id = session.id;
                    run.def = def;
                    current = start_id;
                }
                Step::Continue(handle) => {
                    match resolve_next(&run.def, &current, handle.as_deref(), &run.vars) {
                        Some(next) => current = next,
                        None => return self.finish(&mut run, &current).await,
                    }
                }
            }
        }
        tracing::warn!(session_id = %run.session_id, "step ceiling reached, closing session");
        self.finish(&mut run, &current).await
    }

    /// Persist final variables and close the session.
    async fn finish(&self, run: &mut Run, at_node: &str) -> Result<(), CourierError> {
        let vars_json = serde_json::to_string(&run.vars).unwrap_or_else(|_| "{}".to_string());
        sessions::save_progress(&self.db, &run.session_id, Some(at_node), &vars_json, false).await?;
        sessions::complete(&self.db, &run.session_id).await?;
        Ok(())
    }

    /// Execute one node's side effect. Send and HTTP failures are logged
    /// and treated as a no-op continue; retry belongs to the dispatch layer.
    async fn exec(
        &self,
        instance_id: &str,
        remote_party: &str,
        node: &FlowNode,
        vars: &mut HashMap<String, String>,
    ) -> Step {
        match &node.kind {
            NodeKind::Start => Step::Continue(None),
            NodeKind::End => Step::End,

            NodeKind::Message { text, await_reply, .. } => {
                let body = substitute(text, vars);
                self.send_text(instance_id, remote_party, &body).await;
                if *await_reply {
                    Step::Wait
                } else {
                    Step::Continue(None)
                }
            }

            NodeKind::Image { url, caption } => {
                self.send_media(instance_id, remote_party, MediaKind::Image, url, caption.as_deref(), None, vars)
                    .await;
                Step::Continue(None)
            }
            NodeKind::Audio { url } => {
                self.send_media(instance_id, remote_party, MediaKind::Audio, url, None, None, vars)
                    .await;
                Step::Continue(None)
            }
            NodeKind::Video { url, caption } => {
                self.send_media(instance_id, remote_party, MediaKind::Video, url, caption.as_deref(), None, vars)
                    .await;
                Step::Continue(None)
            }
            NodeKind::Document { url, caption, filename } => {
                self.send_media(
                    instance_id,
                    remote_party,
                    MediaKind::Document,
                    url,
                    caption.as_deref(),
                    filename.as_deref(),
                    vars,
                )
                .await;
                Step::Continue(None)
            }

            NodeKind::Buttons { text, buttons, .. } => {
                let mut body = substitute(text, vars);
                for choice in buttons {
                    body.push_str(&format!("\n• {}", choice.label));
                }
                self.send_text(instance_id, remote_party, &body).await;
                Step::Wait
            }
            NodeKind::List { text, items, .. } => {
                let mut body = substitute(text, vars);
                for (idx, item) in items.iter().enumerate() {
                    body.push_str(&format!("\n{}. {}", idx + 1, item.label));
                }
                self.send_text(instance_id, remote_party, &body).await;
                Step::Wait
            }

            NodeKind::Condition { condition } => {
                let branch = if evaluate(condition, vars) { "true" } else { "false" };
                Step::Continue(Some(branch.to_string()))
            }

            NodeKind::Delay { seconds } => {
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
                Step::Continue(None)
            }

            NodeKind::SetVariable { name, value } => {
                vars.insert(name.clone(), substitute(value, vars));
                Step::Continue(None)
            }

            NodeKind::HttpRequest { method, url, body, save_as } => {
                self.http_request(method, url, body.as_deref(), save_as.as_deref(), vars)
                    .await;
                Step::Continue(None)
            }

            NodeKind::Transfer { to } => {
                vars.insert(TRANSFER_VARIABLE.to_string(), substitute(to, vars));
                tracing::info!(%instance_id, %remote_party, "conversation transferred");
                Step::End
            }

            NodeKind::GoToFlow { flow_id } => Step::Switch(flow_id.clone()),
        }
    }

    async fn send_text(&self, instance_id: &str, to: &str, body: &str) {
        let Some(adapter) = self.adapters.adapter_for(instance_id) else {
            tracing::warn!(%instance_id, "no adapter bound, dropping flow send");
            return;
        };
        if let Err(error) = adapter.send_text(to, body).await {
            tracing::warn!(%instance_id, %to, %error, "flow text send failed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_media(
        &self,
        instance_id: &str,
        to: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
        filename: Option<&str>,
        vars: &HashMap<String, String>,
    ) {
        let Some(adapter) = self.adapters.adapter_for(instance_id) else {
            tracing::warn!(%instance_id, "no adapter bound, dropping flow send");
            return;
        };
        let url = substitute(url, vars);
        let caption = caption.map(|c| substitute(c, vars));
        if let Err(error) = adapter
            .send_media(to, kind, &url, caption.as_deref(), filename)
            .await
        {
            tracing::warn!(%instance_id, %to, %error, "flow media send failed");
        }
    }

    /// Best-effort outbound HTTP. Not retried; the response body is only
    /// captured when the node asks for it.
    async fn http_request(
        &self,
        method: &str,
        url: &str,
        body: Option<&str>,
        save_as: Option<&str>,
        vars: &mut HashMap<String, String>,
    ) {
        let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let url = substitute(url, vars);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request
                .header("content-type", "application/json")
                .body(substitute(body, vars));
        }

        match request.send().await {
            Ok(response) => {
                if let Some(name) = save_as {
                    match response.text().await {
                        Ok(text) => {
                            vars.insert(name.to_string(), text);
                        }
                        Err(error) => {
                            tracing::warn!(%url, %error, "flow HTTP response unreadable");
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%url, %error, "flow HTTP request failed");
            }
        }
    }
}

/// Capture the event into session variables at a waiting node and produce
/// the output handle used for edge routing.
fn capture_input(
    kind: &NodeKind,
    event: &InboundEvent,
    vars: &mut HashMap<String, String>,
) -> Option<String> {
    let captured = event.captured_text().map(str::to_string);
    let save_as = match kind {
        NodeKind::Message { save_as, .. }
        | NodeKind::Buttons { save_as, .. }
        | NodeKind::List { save_as, .. } => save_as.as_deref(),
        _ => None,
    };
    if let (Some(name), Some(value)) = (save_as, captured.as_deref()) {
        vars.insert(name.to_string(), value.to_string());
    }
    captured
}

/// Pick the next node: prefer the edge whose handle matches the produced
/// output; unmatched selections fall through to the default (handle-less)
/// edge, then to the first eligible edge. Condition-gated edges only count
/// when their condition passes.
fn resolve_next(
    def: &FlowDefinition,
    node_id: &str,
    handle: Option<&str>,
    vars: &HashMap<String, String>,
) -> Option<String> {
    let eligible: Vec<_> = def
        .edges_from(node_id)
        .filter(|e| e.condition.as_ref().is_none_or(|c| evaluate(c, vars)))
        .collect();

    if let Some(handle) = handle {
        if let Some(edge) = eligible
            .iter()
            .find(|e| e.source_handle.as_deref() == Some(handle))
        {
            return Some(edge.target.clone());
        }
    }
    eligible
        .iter()
        .find(|e| e.source_handle.is_none())
        .or_else(|| eligible.first())
        .map(|e| e.target.clone())
}

/// Evaluate a stored flow's trigger against an inbound event.
fn trigger_matches(flow: &FlowRecord, event: &InboundEvent) -> bool {
    let Ok(policy) = TriggerPolicy::from_str(&flow.trigger_kind) else {
        tracing::warn!(flow_id = %flow.id, trigger = %flow.trigger_kind, "unknown trigger policy");
        return false;
    };

    match policy {
        TriggerPolicy::All => matches!(event, InboundEvent::Text { .. }),
        TriggerPolicy::Keyword => {
            let InboundEvent::Text { body } = event else {
                return false;
            };
            let normalized = body.trim().to_lowercase();
            let keywords: Vec<String> =
                serde_json::from_str(&flow.trigger_keywords).unwrap_or_default();
            keywords.iter().any(|kw| {
                let kw = kw.trim().to_lowercase();
                !kw.is_empty()
                    && (normalized == kw || normalized.starts_with(&format!("{kw} ")))
            })
        }
        TriggerPolicy::ButtonReply => match event {
            InboundEvent::ButtonReply { id, .. } => {
                flow.trigger_value.as_deref().is_none_or(|v| v == id)
            }
            _ => false,
        },
        TriggerPolicy::ListReply => match event {
            InboundEvent::ListReply { id, .. } => {
                flow.trigger_value.as_deref().is_none_or(|v| v == id)
            }
            _ => false,
        },
        // Webhook flows only start through `start_flow`.
        TriggerPolicy::Webhook => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_core::{ChannelAdapter, ChannelKind, GroupInfo, OutboundContent, SendReceipt};
    use courier_storage::Instance;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct RecordingAdapter {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingAdapter {
        fn new() -> Arc<Self> {
            Arc::new(Self { sent: Mutex::new(Vec::new()) })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelAdapter for RecordingAdapter {
        fn channel(&self) -> ChannelKind {
            ChannelKind::Bridge
        }

        async fn send_text(&self, _to: &str, body: &str) -> Result<SendReceipt, CourierError> {
            self.sent.lock().unwrap().push(body.to_string());
            Ok(SendReceipt { external_message_id: "ext-1".to_string() })
        }

        async fn send_media(
            &self,
            _to: &str,
            kind: MediaKind,
            url: &str,
            _caption: Option<&str>,
            _filename: Option<&str>,
        ) -> Result<SendReceipt, CourierError> {
            self.sent.lock().unwrap().push(format!("{kind}:{url}"));
            Ok(SendReceipt { external_message_id: "ext-1".to_string() })
        }

        async fn send_template(
            &self,
            _to: &str,
            name: &str,
            _language: &str,
            _components: Option<&serde_json::Value>,
        ) -> Result<SendReceipt, CourierError> {
            self.sent.lock().unwrap().push(format!("template:{name}"));
            Ok(SendReceipt { external_message_id: "ext-1".to_string() })
        }

        async fn get_groups(&self) -> Result<Vec<GroupInfo>, CourierError> {
            Ok(Vec::new())
        }
    }

    struct SingleAdapter(Arc<RecordingAdapter>);

    impl AdapterSource for SingleAdapter {
        fn adapter_for(&self, _instance_id: &str) -> Option<Arc<dyn ChannelAdapter>> {
            Some(self.0.clone())
        }
    }

    async fn setup() -> (FlowEngine, Arc<RecordingAdapter>, Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        instances::create(
            &db,
            &Instance {
                id: "i1".to_string(),
                tenant_id: "tenant-1".to_string(),
                name: "test".to_string(),
                channel: "BRIDGE".to_string(),
                connectivity: "CONNECTED".to_string(),
                created_at: String::new(),
                updated_at: String::new(),
                deleted_at: None,
            },
        )
        .await
        .unwrap();

        let adapter = RecordingAdapter::new();
        let engine = FlowEngine::new(
            db.clone(),
            Arc::new(SingleAdapter(adapter.clone())),
            reqwest::Client::new(),
        );
        (engine, adapter, db, dir)
    }

    async fn store_flow(db: &Database, id: &str, trigger_kind: &str, keywords: &str, def: serde_json::Value) {
        flows::insert(
            db,
            &FlowRecord {
                id: id.to_string(),
                tenant_id: "tenant-1".to_string(),
                instance_id: None,
                name: format!("flow {id}"),
                trigger_kind: trigger_kind.to_string(),
                trigger_keywords: keywords.to_string(),
                trigger_value: None,
                definition: def.to_string(),
                enabled: true,
                created_at: String::new(),
                updated_at: String::new(),
            },
        )
        .await
        .unwrap();
    }

    fn text(body: &str) -> InboundEvent {
        InboundEvent::Text { body: body.to_string() }
    }

    #[tokio::test]
    async fn greeting_flow_substitutes_and_completes() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "set", "type": "SET_VARIABLE", "data": {"name": "name", "value": "Ana"}},
                    {"id": "msg", "type": "MESSAGE", "data": {"text": "Hi {{name}}"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "set"},
                    {"source": "set", "target": "msg"},
                    {"source": "msg", "target": "end"}
                ]
            }),
        )
        .await;

        let handled = engine.handle_inbound_event("i1", "+111", &text("hello")).await.unwrap();
        assert!(handled);
        assert_eq!(adapter.sent(), vec!["Hi Ana"]);
        assert!(
            sessions::active_for(&db, "i1", "+111").await.unwrap().is_none(),
            "session must end inactive"
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn keyword_trigger_word_prefix_semantics() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "KEYWORD",
            r#"["help"]"#,
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "msg", "type": "MESSAGE", "data": {"text": "support here"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "msg"},
                    {"source": "msg", "target": "end"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+1", &text("  HELP  ")).await.unwrap());
        assert!(engine.handle_inbound_event("i1", "+2", &text("help me please")).await.unwrap());
        assert!(
            !engine.handle_inbound_event("i1", "+3", &text("helpful")).await.unwrap(),
            "keyword must match whole words, not substrings"
        );
        assert_eq!(adapter.sent().len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unmatched_button_reply_takes_default_edge() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "ask", "type": "BUTTONS", "data": {
                        "text": "Proceed?",
                        "buttons": [{"id": "yes", "label": "Yes"}, {"id": "no", "label": "No"}],
                        "save_as": "answer"
                    }},
                    {"id": "msg_a", "type": "MESSAGE", "data": {"text": "branch A"}},
                    {"id": "msg_b", "type": "MESSAGE", "data": {"text": "branch B"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "ask"},
                    {"source": "ask", "target": "msg_a", "source_handle": "yes"},
                    {"source": "ask", "target": "msg_b"},
                    {"source": "msg_a", "target": "end"},
                    {"source": "msg_b", "target": "end"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+111", &text("menu")).await.unwrap());
        let session = sessions::active_for(&db, "i1", "+111").await.unwrap().unwrap();
        assert!(session.waiting_input);
        assert_eq!(session.current_node.as_deref(), Some("ask"));

        // "no" matches no handle, so routing falls to the default edge.
        let reply = InboundEvent::ButtonReply { id: "no".to_string(), title: None };
        assert!(engine.handle_inbound_event("i1", "+111", &reply).await.unwrap());

        let sent = adapter.sent();
        assert_eq!(sent.last().unwrap(), "branch B");
        // The captured selection landed in the session variables.
        assert!(sessions::active_for(&db, "i1", "+111").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn condition_routes_on_true_handle() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "set", "type": "SET_VARIABLE", "data": {"name": "plan", "value": "pro"}},
                    {"id": "cond", "type": "CONDITION", "data": {"variable": "plan", "op": "equals", "value": "PRO"}},
                    {"id": "yes", "type": "MESSAGE", "data": {"text": "premium support"}},
                    {"id": "no", "type": "MESSAGE", "data": {"text": "basic support"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "set"},
                    {"source": "set", "target": "cond"},
                    {"source": "cond", "target": "yes", "source_handle": "true"},
                    {"source": "cond", "target": "no", "source_handle": "false"},
                    {"source": "yes", "target": "end"},
                    {"source": "no", "target": "end"}
                ]
            }),
        )
        .await;

        engine.handle_inbound_event("i1", "+111", &text("go")).await.unwrap();
        assert_eq!(adapter.sent(), vec!["premium support"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn new_trigger_force_closes_waiting_session() {
        let (engine, _adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "waiter",
            "KEYWORD",
            r#"["order"]"#,
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "ask", "type": "MESSAGE", "data": {"text": "what item?", "await_reply": true, "save_as": "item"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "ask"},
                    {"source": "ask", "target": "end"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+111", &text("order")).await.unwrap());
        let first = sessions::active_for(&db, "i1", "+111").await.unwrap().unwrap();
        assert!(first.waiting_input);

        // The waiting MESSAGE node consumes the next event as its reply and
        // the flow runs to END; a fresh keyword then starts a new session.
        assert!(engine.handle_inbound_event("i1", "+111", &text("pizza")).await.unwrap());
        assert!(sessions::active_for(&db, "i1", "+111").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn http_failure_does_not_abort_the_session() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "hook", "type": "HTTP_REQUEST", "data": {
                        "method": "POST",
                        // Discard port: connection refused immediately.
                        "url": "http://127.0.0.1:9/notify",
                        "save_as": "response"
                    }},
                    {"id": "msg", "type": "MESSAGE", "data": {"text": "done"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "hook"},
                    {"source": "hook", "target": "msg"},
                    {"source": "msg", "target": "end"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+111", &text("go")).await.unwrap());
        assert_eq!(adapter.sent(), vec!["done"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transfer_records_target_and_closes() {
        let (engine, _adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "handoff", "type": "TRANSFER", "data": {"to": "support-queue"}}
                ],
                "edges": [
                    {"source": "start", "target": "handoff"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+111", &text("agent")).await.unwrap());
        assert!(sessions::active_for(&db, "i1", "+111").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cyclic_graph_hits_the_step_ceiling() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "loop", "type": "SET_VARIABLE", "data": {"name": "x", "value": "1"}}
                ],
                "edges": [
                    {"source": "start", "target": "loop"},
                    {"source": "loop", "target": "loop"}
                ]
            }),
        )
        .await;

        // Terminates despite the cycle and leaves no active session behind.
        assert!(engine.handle_inbound_event("i1", "+111", &text("go")).await.unwrap());
        assert!(sessions::active_for(&db, "i1", "+111").await.unwrap().is_none());
        assert!(adapter.sent().is_empty());

        // The closed session records the node that was executing when the
        // ceiling tripped, not the graph's first node.
        let stored: Option<String> = db
            .connection()
            .call(|conn| {
                conn.query_row(
                    "SELECT current_node FROM flow_sessions WHERE instance_id = 'i1'",
                    [],
                    |row| row.get(0),
                )
                .map_err(Into::into)
            })
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("loop"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn go_to_flow_switches_and_carries_variables() {
        let (engine, adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "second",
            "WEBHOOK",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "msg", "type": "MESSAGE", "data": {"text": "welcome back {{name}}"}},
                    {"id": "end", "type": "END"}
                ],
                "edges": [
                    {"source": "start", "target": "msg"},
                    {"source": "msg", "target": "end"}
                ]
            }),
        )
        .await;
        store_flow(
            &db,
            "first",
            "ALL",
            "[]",
            serde_json::json!({
                "nodes": [
                    {"id": "start", "type": "START"},
                    {"id": "set", "type": "SET_VARIABLE", "data": {"name": "name", "value": "Ana"}},
                    {"id": "jump", "type": "GO_TO_FLOW", "data": {"flow_id": "second"}}
                ],
                "edges": [
                    {"source": "start", "target": "set"},
                    {"source": "set", "target": "jump"}
                ]
            }),
        )
        .await;

        assert!(engine.handle_inbound_event("i1", "+111", &text("hi")).await.unwrap());
        assert_eq!(adapter.sent(), vec!["welcome back Ana"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_matching_trigger_declines_the_event() {
        let (engine, _adapter, db, _dir) = setup().await;
        store_flow(
            &db,
            "f1",
            "KEYWORD",
            r#"["order"]"#,
            serde_json::json!({"nodes": [], "edges": []}),
        )
        .await;

        assert!(!engine.handle_inbound_event("i1", "+111", &text("unrelated")).await.unwrap());
        assert!(!engine
            .handle_inbound_event("unknown-instance", "+111", &text("order"))
            .await
            .unwrap());

        db.close().await.unwrap();
    }
}

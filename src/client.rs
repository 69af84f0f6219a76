use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::ModelSettings;
use crate::conversation::{Role, Turn};
use crate::error::PaneError;

const SYSTEM_PROMPT: &str = "You are the assistant inside TermiFlow, a terminal dashboard. \
Answer concisely. When the user asks about their Jira or GitHub issues, call the matching tool \
and summarise its result in plain language.";

// ── Reply types ───────────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as sent by the model (currently unused by tools)
    pub arguments: String,
}

/// One part of a model reply. Closed: every consumer matches both arms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPart {
    Text(String),
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelReply {
    pub parts: Vec<ReplyPart>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ModelReply {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![ReplyPart::Text(text.into())], ..Default::default() }
    }
}

/// A tool advertised to the model. Tools take no arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
}

// ── Service contract ──────────────────────────────────────────────────────────

/// Opaque request/response conversation service.
///
/// `history` already ends with the newest user turn (or with tool turns when
/// resuming after a tool call). The returned future owns its inputs.
pub trait ModelService: Send + Sync {
    fn send_turn(
        &self,
        history: Vec<Turn>,
        tools: Vec<ToolDeclaration>,
    ) -> BoxFuture<'static, Result<ModelReply, PaneError>>;
}

// ── SSE delta types for accumulation ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageStats>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageStats {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds `data: {...}` SSE lines into one reply. Network chunks may split a
/// line, or a UTF-8 sequence inside it; bytes after the last newline are held
/// back until the next `feed`.
#[derive(Default)]
pub struct StreamAccumulator {
    text: String,
    pending: Vec<PendingToolCall>,
    input_tokens: u32,
    output_tokens: u32,
    leftover: Vec<u8>,
}

impl StreamAccumulator {
    pub fn feed(&mut self, raw: &[u8]) {
        self.leftover.extend_from_slice(raw);
        let Some(end) = self.leftover.iter().rposition(|&b| b == b'\n') else {
            return;
        };
        let complete: Vec<u8> = self.leftover.drain(..=end).collect();
        for line in String::from_utf8_lossy(&complete).lines() {
            self.parse_line(line);
        }
    }

    fn parse_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line == "data: [DONE]" {
            return;
        }
        let Some(json_str) = line.strip_prefix("data:").map(str::trim_start) else {
            return;
        };
        match serde_json::from_str::<StreamChunk>(json_str) {
            Ok(chunk) => self.apply(chunk),
            Err(e) => trace!(error = %e, "skipping unparseable stream line"),
        }
    }

    fn apply(&mut self, chunk: StreamChunk) {
        if let Some(usage) = chunk.usage {
            self.input_tokens = usage.prompt_tokens.unwrap_or(0);
            self.output_tokens = usage.completion_tokens.unwrap_or(0);
        }
        for choice in chunk.choices.unwrap_or_default() {
            let Some(delta) = choice.delta else { continue };
            if let Some(text) = delta.content {
                self.text.push_str(&text);
            }
            for (pos, tc) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                let idx = tc.index.unwrap_or(pos);
                while self.pending.len() <= idx {
                    self.pending.push(PendingToolCall::default());
                }
                let entry = &mut self.pending[idx];
                if let Some(id) = tc.id {
                    entry.id = id;
                }
                if let Some(func) = tc.function {
                    if let Some(name) = func.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(args) = func.arguments {
                        entry.arguments.push_str(&args);
                    }
                }
            }
        }
    }

    pub fn finish(mut self) -> ModelReply {
        if !self.leftover.is_empty() {
            let rest = std::mem::take(&mut self.leftover);
            self.parse_line(&String::from_utf8_lossy(&rest));
        }
        let mut parts = Vec::new();
        if !self.text.is_empty() {
            parts.push(ReplyPart::Text(self.text));
        }
        for (i, p) in self.pending.into_iter().enumerate() {
            if p.name.is_empty() {
                continue;
            }
            // Some providers omit ids; the wire format needs one to pair results
            let id = if p.id.is_empty() { format!("call_{i}") } else { p.id };
            parts.push(ReplyPart::ToolCall(ToolCall { id, name: p.name, arguments: p.arguments }));
        }
        ModelReply { parts, input_tokens: self.input_tokens, output_tokens: self.output_tokens }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
}

impl Client {
    pub fn new(http: reqwest::Client, endpoint: String, model: String) -> Self {
        Self { http, endpoint, model, api_key: None }
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    /// Build a client from resolved settings. A key is required unless the
    /// endpoint is on this machine (e.g. Ollama).
    pub fn from_settings(http: reqwest::Client, settings: &ModelSettings) -> Result<Self, PaneError> {
        let mut client = Self::new(http, settings.endpoint.clone(), settings.model.clone());
        match &settings.api_key {
            Some(key) if !key.trim().is_empty() => client.set_api_key(key.clone()),
            _ if is_local_endpoint(&settings.endpoint) => {}
            _ => {
                return Err(PaneError::ConfigMissing(
                    "GEMINI_API_KEY environment variable not set (or [model] api_key in config)"
                        .to_string(),
                ));
            }
        }
        Ok(client)
    }

    /// Stream one chat completion and fold it into a reply.
    pub async fn chat(&self, history: &[Turn], tools: &[ToolDeclaration]) -> Result<ModelReply, PaneError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "stream_options": {"include_usage": true},
            "messages": build_messages(SYSTEM_PROMPT, history),
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(
                tools.iter().map(|t| serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": {"type": "object", "properties": {}},
                    }
                })).collect::<Vec<_>>()
            );
            body["tool_choice"] = serde_json::json!("auto");
        }

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        debug!(%url, model = %self.model, turns = history.len(), "model send");

        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, "model request rejected");
            return Err(PaneError::protocol(format!("API error {status}: {}", text.trim())));
        }

        let mut acc = StreamAccumulator::default();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            acc.feed(&chunk?);
        }

        let reply = acc.finish();
        if reply.parts.is_empty() {
            return Err(PaneError::protocol("empty response"));
        }
        debug!(
            parts = reply.parts.len(),
            input_tokens = reply.input_tokens,
            output_tokens = reply.output_tokens,
            "model replied"
        );
        Ok(reply)
    }
}

impl ModelService for Client {
    fn send_turn(
        &self,
        history: Vec<Turn>,
        tools: Vec<ToolDeclaration>,
    ) -> BoxFuture<'static, Result<ModelReply, PaneError>> {
        let client = self.clone();
        async move { client.chat(&history, &tools).await }.boxed()
    }
}

fn is_local_endpoint(endpoint: &str) -> bool {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]")
}

// ── Build the messages array for the API ──────────────────────────────────────

/// Conversation → OpenAI-compatible messages.
///
/// System turns are local notes and are not sent. A run of consecutive tool
/// turns becomes one assistant `tool_calls` message followed by one `tool`
/// message per result. Agent text spoken just before the run is folded into
/// that assistant message, since both came from the same reply.
pub fn build_messages(system: &str, history: &[Turn]) -> Vec<Value> {
    let mut out = Vec::new();

    if !system.is_empty() {
        out.push(serde_json::json!({"role": "system", "content": system}));
    }

    let mut lead_text: Option<&str> = None;
    let mut i = 0;
    while i < history.len() {
        let turn = &history[i];
        match turn.role {
            Role::User => out.push(serde_json::json!({"role": "user", "content": turn.content})),
            Role::Agent => {
                let next_is_call = history
                    .get(i + 1)
                    .is_some_and(|t| t.role == Role::Tool && t.call.is_some());
                if next_is_call {
                    lead_text = Some(turn.content.as_str());
                } else {
                    out.push(serde_json::json!({"role": "assistant", "content": turn.content}));
                }
            }
            Role::System => {}
            Role::Tool => {
                let run: Vec<&Turn> = history[i..]
                    .iter()
                    .take_while(|t| t.role == Role::Tool)
                    .filter(|t| t.call.is_some())
                    .collect();
                let consumed = history[i..].iter().take_while(|t| t.role == Role::Tool).count();
                if !run.is_empty() {
                    let calls: Vec<Value> = run
                        .iter()
                        .filter_map(|t| t.call.as_ref())
                        .map(|c| serde_json::json!({
                            "id": c.id,
                            "type": "function",
                            "function": {"name": c.name, "arguments": c.arguments},
                        }))
                        .collect();
                    out.push(serde_json::json!({
                        "role": "assistant",
                        "content": lead_text.take(),
                        "tool_calls": calls,
                    }));
                    for t in &run {
                        if let Some(call) = &t.call {
                            out.push(serde_json::json!({
                                "role": "tool",
                                "tool_call_id": call.id,
                                "content": t.content,
                            }));
                        }
                    }
                }
                i += consumed;
                continue;
            }
        }
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments: "{}".to_string() }
    }

    #[test]
    fn test_accumulates_text_across_split_chunks() {
        let mut acc = StreamAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi");
        acc.feed(b"ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(acc.finish().parts, vec![ReplyPart::Text("Hello".to_string())]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks_survives() {
        let mut acc = StreamAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3");
        acc.feed(b"\xA9\"}}]}\n\n");
        assert_eq!(acc.finish().parts, vec![ReplyPart::Text("caf\u{e9}".to_string())]);
    }

    #[test]
    fn test_unterminated_last_line_is_parsed_on_finish() {
        let mut acc = StreamAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}");
        assert_eq!(acc.finish().parts, vec![ReplyPart::Text("tail".to_string())]);
    }

    #[test]
    fn test_accumulates_tool_call_deltas() {
        let mut acc = StreamAccumulator::default();
        acc.feed(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",",
            "\"function\":{\"name\":\"get_jira_\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,",
            "\"function\":{\"name\":\"issues\",\"arguments\":\"{}\"}}]}}]}\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n",
        ).as_bytes());
        let reply = acc.finish();
        assert_eq!(reply.parts, vec![ReplyPart::ToolCall(call("c1", "get_jira_issues"))]);
        assert_eq!(reply.input_tokens, 12);
        assert_eq!(reply.output_tokens, 3);
    }

    #[test]
    fn test_missing_tool_call_id_is_synthesised() {
        let mut acc = StreamAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"function\":{\"name\":\"get_github_issues\"}}]}}]}\n");
        let reply = acc.finish();
        match &reply.parts[0] {
            ReplyPart::ToolCall(c) => assert_eq!(c.id, "call_0"),
            ReplyPart::Text(t) => panic!("unexpected text {t}"),
        }
    }

    #[test]
    fn test_build_messages_groups_tool_turns_and_skips_system() {
        let history = vec![
            Turn::user("what's open?"),
            Turn::system("Error: earlier failure"),
            Turn::tool(call("a", "get_jira_issues"), "{\"issues\":[]}"),
            Turn::tool(call("b", "get_github_issues"), "{\"issues\":[]}"),
        ];
        let msgs = build_messages("sys", &history);
        let roles: Vec<&str> = msgs.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "tool"]);
        assert_eq!(msgs[2]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(msgs[3]["tool_call_id"], "a");
        assert_eq!(msgs[4]["tool_call_id"], "b");
    }

    #[test]
    fn test_build_messages_folds_agent_text_into_tool_calls() {
        let history = vec![
            Turn::user("anything on github?"),
            Turn::agent("Let me check."),
            Turn::tool(call("a", "get_github_issues"), "{\"issues\":[]}"),
            Turn::agent("Nothing open."),
        ];
        let msgs = build_messages("", &history);
        let roles: Vec<&str> = msgs.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
        assert_eq!(msgs[1]["content"], "Let me check.");
        assert_eq!(msgs[1]["tool_calls"][0]["id"], "a");
        assert_eq!(msgs[3]["content"], "Nothing open.");
    }

    #[test]
    fn test_from_settings_requires_key_for_remote_endpoint() {
        let remote = ModelSettings {
            endpoint: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
        };
        assert!(matches!(
            Client::from_settings(reqwest::Client::new(), &remote),
            Err(PaneError::ConfigMissing(_))
        ));

        let local = ModelSettings { endpoint: "http://localhost:11434/v1".to_string(), ..remote };
        assert!(Client::from_settings(reqwest::Client::new(), &local).is_ok());
    }

    #[tokio::test]
    async fn test_chat_round_trip_against_mock_server() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"You have \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"2 issues.\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = Client::new(reqwest::Client::new(), server.uri(), "m".to_string());
        client.set_api_key("k".to_string());
        let reply = client.chat(&[Turn::user("hi")], &[]).await.unwrap();
        assert_eq!(reply, ModelReply::text("You have 2 issues."));
    }

    #[tokio::test]
    async fn test_chat_error_status_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = Client::new(reqwest::Client::new(), server.uri(), "m".to_string());
        let err = client.chat(&[Turn::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, PaneError::Protocol(ref t) if t.contains("429") && t.contains("slow down")));
    }
}

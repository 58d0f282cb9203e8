//! Accumulates a single provider turn's streamed output into the pieces
//! needed to continue the loop: the assistant's text, and a finalized list
//! of tool calls (some arrive whole, some arrive as argument deltas keyed
//! by id and must be stitched back together).

use codesm_core::ToolCall;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    partial_arguments: String,
}

/// Collects one turn's `Text`/`ToolCall`/`ToolCallDelta` chunks and produces
/// the assistant message content plus the finalized tool calls once the
/// provider's stream for this turn ends.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    finalized: Vec<ToolCall>,
    pending: HashMap<String, PendingCall>,
    pending_order: Vec<String>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// A whole tool call for `id` always supersedes any deltas already
    /// accumulated for it: some providers stream argument fragments and then
    /// still emit a terminating whole call for the same id, and finalizing
    /// both would execute the call twice.
    pub fn push_tool_call(&mut self, id: String, name: String, arguments: Value) {
        if self.pending.remove(&id).is_some() {
            self.pending_order.retain(|pending_id| pending_id != &id);
        }
        self.finalized.push(ToolCall { id, name, arguments });
    }

    pub fn push_tool_call_delta(&mut self, id: String, name: Option<&str>, partial_arguments: &str) {
        if !self.pending.contains_key(&id) {
            self.pending_order.push(id.clone());
            self.pending.insert(id.clone(), PendingCall::default());
        }

        let entry = self.pending.get_mut(&id).expect("just inserted");
        if let Some(name) = name {
            if entry.name.is_empty() {
                entry.name = name.to_string();
            }
        }
        entry.partial_arguments.push_str(partial_arguments);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Finalizes any deltas still pending (the provider never emitted a
    /// terminating `ToolCall` for them) and returns every tool call for this
    /// turn, in the order the provider first introduced each id.
    pub fn finish(mut self) -> (String, Vec<ToolCall>) {
        for id in std::mem::take(&mut self.pending_order) {
            if let Some(pending) = self.pending.remove(&id) {
                let arguments = serde_json::from_str(&pending.partial_arguments).unwrap_or_else(|_| Value::Object(Default::default()));
                self.finalized.push(ToolCall { id, name: pending.name, arguments });
            }
        }
        (self.text, self.finalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizes_deltas_left_pending_at_end_of_stream() {
        let mut acc = TurnAccumulator::new();
        acc.push_tool_call_delta("1".to_string(), Some("read"), "{\"path\":");
        acc.push_tool_call_delta("1".to_string(), None, "\"a.rs\"}");

        let (_, calls) = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read");
        assert_eq!(calls[0].arguments, serde_json::json!({"path": "a.rs"}));
    }

    #[test]
    fn whole_tool_calls_pass_through_untouched() {
        let mut acc = TurnAccumulator::new();
        acc.push_tool_call("1".to_string(), "grep".to_string(), serde_json::json!({"pattern": "x"}));

        let (_, calls) = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "grep");
    }

    #[test]
    fn malformed_delta_json_falls_back_to_an_empty_object() {
        let mut acc = TurnAccumulator::new();
        acc.push_tool_call_delta("1".to_string(), Some("bash"), "{not json");

        let (_, calls) = acc.finish();
        assert_eq!(calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn a_terminating_tool_call_supersedes_deltas_for_the_same_id() {
        let mut acc = TurnAccumulator::new();
        acc.push_tool_call_delta("1".to_string(), Some("read"), "{\"path\":");
        acc.push_tool_call_delta("1".to_string(), None, "\"a.rs\"}");
        acc.push_tool_call("1".to_string(), "read".to_string(), serde_json::json!({"path": "a.rs"}));

        let (_, calls) = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read");
    }

    #[test]
    fn text_and_tool_calls_accumulate_independently() {
        let mut acc = TurnAccumulator::new();
        acc.push_text("let me check that");
        acc.push_tool_call("1".to_string(), "read".to_string(), serde_json::json!({}));

        assert_eq!(acc.text(), "let me check that");
        let (text, calls) = acc.finish();
        assert_eq!(text, "let me check that");
        assert_eq!(calls.len(), 1);
    }
}

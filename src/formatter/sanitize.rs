//! Transcript repair for vendors that require strict call/result pairing.

use std::collections::HashSet;

use tracing::warn;

use crate::message::{ContentBlock, Msg, Role, ToolResultBlock};

const MISSING_RESULT: &str =
    "Error: missing tool result in transcript; inserted synthetic error result";

/// Ensure every tool call is answered before the conversation moves on.
///
/// Calls left without a result get a synthetic error result, inserted before
/// the next message that is not a tool result. Results that answer no open
/// call are dropped, and messages left empty by that are removed.
pub fn sanitize_tool_pairs(msgs: &[Msg]) -> Vec<Msg> {
    let mut out = Vec::with_capacity(msgs.len());
    let mut open: Vec<(String, String)> = Vec::new();
    let mut answered: HashSet<String> = HashSet::new();

    for msg in msgs {
        let mut content = Vec::with_capacity(msg.content.len());
        let mut dropped = false;
        for block in &msg.content {
            if let ContentBlock::ToolResult(result) = block {
                match open.iter().position(|(id, _)| *id == result.id) {
                    Some(index) if !answered.contains(&result.id) => {
                        open.remove(index);
                        answered.insert(result.id.clone());
                        content.push(block.clone());
                    }
                    _ => {
                        warn!(tool_call_id = %result.id, "Dropping tool result without matching call");
                        dropped = true;
                    }
                }
            } else {
                content.push(block.clone());
            }
        }

        let only_results = content
            .iter()
            .all(|block| matches!(block, ContentBlock::ToolResult(_)));
        if !only_results {
            flush_open(&mut open, &mut out);
        }

        for tool_use in msg.tool_uses() {
            open.push((tool_use.id.clone(), tool_use.name.clone()));
        }

        if content.is_empty() && dropped {
            continue;
        }
        let mut next = msg.clone();
        next.content = content;
        out.push(next);
    }
    flush_open(&mut open, &mut out);
    out
}

fn flush_open(open: &mut Vec<(String, String)>, out: &mut Vec<Msg>) {
    if open.is_empty() {
        return;
    }
    let results = open
        .drain(..)
        .map(|(id, name)| ContentBlock::ToolResult(ToolResultBlock::text(id, name, MISSING_RESULT)))
        .collect();
    out.push(Msg::new("system", Role::Tool, results));
}

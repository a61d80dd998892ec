//! Synthesis prompt assembly.

use orchestrator_core::{ChatMessage, RoutePlan, TurnRequest};
use orchestrator_graph::BlackboardState;

/// Reply sent when the synthesis call hard-fails. The only user-visible
/// failure mode in the pipeline.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't put a proper answer together just now. Give me another try in a moment.";

/// Artifact kinds treated as binary output, which gates the critic loop.
pub const BINARY_ARTIFACT_KINDS: &[&str] = &["binary", "audio", "image", "file"];

/// Assemble the synthesis conversation: a system prompt carrying the
/// blackboard's retrieved context, then history, then the user message.
#[must_use]
pub fn build_messages(
    turn: &TurnRequest,
    plan: &RoutePlan,
    board: &BlackboardState,
) -> Vec<ChatMessage> {
    let mut system = format!(
        "You are a conversational assistant replying in a {} exchange. \
         Ground your reply in the retrieved context below; when it is silent, \
         say what you do not know instead of guessing.",
        plan.kind
    );

    if !board.artifacts.is_empty() {
        system.push_str("\n\nRetrieved context:\n");
        for artifact in &board.artifacts {
            system.push_str(&format!(
                "- [{} | confidence {:.2}] {}\n",
                artifact.source_agent, artifact.confidence, artifact.content
            ));
        }
    }

    if !board.unresolved_questions.is_empty() {
        system.push_str("\nOpen questions the retrieval could not answer:\n");
        for question in &board.unresolved_questions {
            system.push_str(&format!("- {question}\n"));
        }
    }

    if let Some(reply_context) = &turn.reply_context {
        system.push_str(&format!("\nThe user is replying to:\n{reply_context}\n"));
    }

    let mut messages = vec![ChatMessage::system(system)];
    messages.extend(turn.history.iter().cloned());
    messages.push(ChatMessage::user(&turn.user_text));
    messages
}

/// Total prompt length in characters, the resolver's long-prompt signal.
#[must_use]
pub fn prompt_chars(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| m.content.len()).sum()
}

/// Short digest of the stored artifacts for the critic's grounding check.
#[must_use]
pub fn context_digest(board: &BlackboardState) -> String {
    board
        .artifacts
        .iter()
        .map(|a| format!("[{}] {}", a.source_agent, truncate(&a.content, 240)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the blackboard holds binary output artifacts.
#[must_use]
pub fn has_binary_output(board: &BlackboardState) -> bool {
    board
        .artifacts
        .iter()
        .any(|a| BINARY_ARTIFACT_KINDS.contains(&a.kind.as_str()))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

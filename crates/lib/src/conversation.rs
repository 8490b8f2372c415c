//! Client-side conversation state: transcript, draft, staged attachments,
//! and the submission phase machine.
//!
//! The controller owns all mutable chat state and performs no I/O. A
//! submission is split into `begin_submit` (guarded, builds the wire
//! history) and `complete_submit` (records the reply or the apology), so a
//! front end performs the relay call between the two halves.

use crate::attachment::{render_content, AttachedFile};
use serde::{Deserialize, Serialize};

/// Maximum draft length in characters; longer input is truncated on update.
pub const MAX_DRAFT_CHARS: usize = 4000;

/// Appended as the assistant reply when the relay call fails.
pub const SUBMIT_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Attachment metadata kept in the transcript (name and MIME type only;
/// the payload is folded into the message content or dropped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    pub media_type: String,
}

/// A single transcript message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentMeta>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<AttachmentMeta>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            attachments,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

/// One {role, content} pair as sent to the relay. Attachment payloads and
/// metadata never travel in this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.clone(),
            content: m.content.clone(),
        }
    }
}

/// Submission phase: at most one relay call may be in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitPhase {
    #[default]
    Idle,
    Submitting,
}

/// Owns the transcript and draft state; all mutation goes through these
/// methods, so the §Idle/Submitting invariants hold by construction.
#[derive(Debug, Default)]
pub struct ChatController {
    transcript: Vec<Message>,
    draft: String,
    staged: Vec<AttachedFile>,
    phase: SubmitPhase,
}

impl ChatController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn staged(&self) -> &[AttachedFile] {
        &self.staged
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == SubmitPhase::Submitting
    }

    /// True when `begin_submit` would proceed: something to send and no
    /// submission in flight.
    pub fn can_submit(&self) -> bool {
        (!self.draft.trim().is_empty() || !self.staged.is_empty()) && !self.is_submitting()
    }

    /// Set the draft text, truncated to MAX_DRAFT_CHARS characters.
    pub fn update_draft(&mut self, text: &str) {
        self.draft = clamp_draft(text);
    }

    /// Set the draft to a suggestion without submitting.
    pub fn select_suggestion(&mut self, text: &str) {
        self.update_draft(text);
    }

    /// Append already-read files to the staged list, preserving order.
    pub fn stage_files(&mut self, files: Vec<AttachedFile>) {
        self.staged.extend(files);
    }

    /// Remove one staged attachment by index; out-of-range indices are ignored.
    pub fn remove_file(&mut self, index: usize) {
        if index < self.staged.len() {
            self.staged.remove(index);
        }
    }

    /// Reset transcript, draft, staged attachments, and phase. Idempotent.
    /// Any in-flight submission result is discarded by `complete_submit`.
    pub fn start_new(&mut self) {
        self.transcript.clear();
        self.draft.clear();
        self.staged.clear();
        self.phase = SubmitPhase::Idle;
    }

    /// First half of submit. Returns `None` without any state change when
    /// blocked: a submission is already in flight, or there is neither
    /// trimmed input nor a staged attachment.
    ///
    /// Otherwise: builds the outgoing content from the trimmed draft and the
    /// rendered attachment blocks, appends the user message (metadata only),
    /// clears the draft and staged files, enters Submitting, and returns the
    /// full history to send to the relay.
    pub fn begin_submit(&mut self) -> Option<Vec<WireMessage>> {
        if !self.can_submit() {
            return None;
        }

        let content = render_content(&self.draft, &self.staged);
        let attachments = self
            .staged
            .iter()
            .map(|f| AttachmentMeta {
                name: f.name.clone(),
                media_type: f.media_type.clone(),
            })
            .collect();
        self.transcript.push(Message::user(content, attachments));
        self.draft.clear();
        self.staged.clear();
        self.phase = SubmitPhase::Submitting;

        Some(self.transcript.iter().map(WireMessage::from).collect())
    }

    /// Second half of submit: append the assistant reply, or the fixed
    /// apology when the relay call failed, and return to Idle. A completion
    /// arriving while Idle (e.g. after `start_new`) is discarded.
    pub fn complete_submit(&mut self, outcome: Result<String, impl std::fmt::Display>) {
        if self.phase != SubmitPhase::Submitting {
            log::debug!("discarding completion for a submission that was reset");
            return;
        }
        match outcome {
            Ok(reply) => self.transcript.push(Message::assistant(reply)),
            Err(e) => {
                log::warn!("relay call failed: {}", e);
                self.transcript.push(Message::assistant(SUBMIT_ERROR_REPLY));
            }
        }
        self.phase = SubmitPhase::Idle;
    }
}

fn clamp_draft(text: &str) -> String {
    if text.chars().count() <= MAX_DRAFT_CHARS {
        text.to_string()
    } else {
        text.chars().take(MAX_DRAFT_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staged_text_file(name: &str, content: &str) -> AttachedFile {
        AttachedFile {
            name: name.to_string(),
            media_type: "text/plain".to_string(),
            size: content.len() as u64,
            content: content.to_string(),
        }
    }

    #[test]
    fn submit_appends_one_user_and_one_assistant_message() {
        let mut c = ChatController::new();
        c.update_draft("Plan a training deck");
        let wire = c.begin_submit().expect("submission should proceed");
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[0].content, "Plan a training deck");
        assert!(c.is_submitting());

        c.complete_submit(Ok::<_, String>("Sure, what topics?".to_string()));
        assert!(!c.is_submitting());
        let t = c.transcript();
        assert_eq!(t.len(), 2);
        assert_eq!((t[0].role.as_str(), t[0].content.as_str()), ("user", "Plan a training deck"));
        assert_eq!(
            (t[1].role.as_str(), t[1].content.as_str()),
            ("assistant", "Sure, what topics?")
        );
    }

    #[test]
    fn empty_submit_is_rejected_without_state_change() {
        let mut c = ChatController::new();
        c.update_draft("   ");
        assert!(c.begin_submit().is_none());
        assert!(c.transcript().is_empty());
        assert_eq!(c.draft(), "   ");
        assert!(!c.is_submitting());
    }

    #[test]
    fn submit_while_submitting_is_a_no_op() {
        let mut c = ChatController::new();
        c.update_draft("first");
        c.begin_submit().expect("first submission");

        c.update_draft("second");
        assert!(c.begin_submit().is_none());
        assert_eq!(c.transcript().len(), 1);
        assert_eq!(c.draft(), "second");
    }

    #[test]
    fn failed_submit_appends_the_apology() {
        let mut c = ChatController::new();
        c.update_draft("hello");
        c.begin_submit().expect("submission");
        c.complete_submit(Err::<String, _>("connection refused"));
        let t = c.transcript();
        assert_eq!(t.len(), 2);
        assert_eq!(t[1].content, SUBMIT_ERROR_REPLY);
        assert!(!c.is_submitting());
    }

    #[test]
    fn attachment_only_submit_renders_the_labeled_block() {
        let mut c = ChatController::new();
        c.stage_files(vec![staged_text_file("notes.txt", "Q3 results")]);
        let wire = c.begin_submit().expect("submission");
        assert_eq!(wire[0].content, "[Attached file: notes.txt]\n```\nQ3 results\n```");
        assert!(c.staged().is_empty());

        let meta = &c.transcript()[0].attachments;
        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].name, "notes.txt");
        assert_eq!(meta[0].media_type, "text/plain");
    }

    #[test]
    fn staged_files_keep_append_order_and_remove_by_index() {
        let mut c = ChatController::new();
        c.stage_files(vec![
            staged_text_file("a.txt", "1"),
            staged_text_file("b.txt", "2"),
        ]);
        c.stage_files(vec![staged_text_file("c.txt", "3")]);
        c.remove_file(1);
        c.remove_file(99);
        let names: Vec<&str> = c.staged().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "c.txt"]);

        let wire = c.begin_submit().expect("submission");
        let a = wire[0].content.find("a.txt").unwrap();
        let c_pos = wire[0].content.find("c.txt").unwrap();
        assert!(a < c_pos);
    }

    #[test]
    fn start_new_resets_everything_and_is_idempotent() {
        let mut c = ChatController::new();
        c.update_draft("text");
        c.stage_files(vec![staged_text_file("a.txt", "1")]);
        c.begin_submit().expect("submission");

        c.start_new();
        c.start_new();
        assert!(c.transcript().is_empty());
        assert_eq!(c.draft(), "");
        assert!(c.staged().is_empty());
        assert!(!c.is_submitting());
    }

    #[test]
    fn completion_after_start_new_is_discarded() {
        let mut c = ChatController::new();
        c.update_draft("hello");
        c.begin_submit().expect("submission");
        c.start_new();
        c.complete_submit(Ok::<_, String>("stale reply".to_string()));
        assert!(c.transcript().is_empty());
    }

    #[test]
    fn draft_is_clamped_to_the_character_limit() {
        let mut c = ChatController::new();
        c.update_draft(&"x".repeat(MAX_DRAFT_CHARS + 100));
        assert_eq!(c.draft().chars().count(), MAX_DRAFT_CHARS);
    }

    #[test]
    fn select_suggestion_sets_the_draft_without_submitting() {
        let mut c = ChatController::new();
        c.select_suggestion("Create a sales pitch deck");
        assert_eq!(c.draft(), "Create a sales pitch deck");
        assert!(c.transcript().is_empty());
        assert!(!c.is_submitting());
    }

    #[test]
    fn wire_history_carries_roles_and_content_only() {
        let mut c = ChatController::new();
        c.update_draft("see attachment");
        c.stage_files(vec![staged_text_file("data.csv", "a,b")]);
        c.begin_submit().expect("submission");
        c.complete_submit(Ok::<_, String>("Got it".to_string()));

        c.update_draft("next question");
        let wire = c.begin_submit().expect("second submission");
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "user");
        assert!(wire[0].content.contains("data.csv"));
        assert_eq!(wire[1].role, "assistant");
        assert_eq!(wire[2].content, "next question");
    }
}

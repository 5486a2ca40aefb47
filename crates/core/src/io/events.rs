use tokio::sync::mpsc;

use crate::types::{ResponsePart, TurnState};

/// Status event emitted while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Non-terminal progress notification.
    Working { progress_text: String },
    /// Exactly one per turn, last.
    Terminal {
        state: TurnState,
        narrative: String,
        parts: Vec<ResponsePart>,
    },
}

impl AgentEvent {
    pub fn working(progress_text: impl Into<String>) -> Self {
        Self::Working { progress_text: progress_text.into() }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}

/// Event channel sender. The agent pushes status updates here.
pub type EventSender = mpsc::Sender<AgentEvent>;
/// Event channel receiver, drained by the host.
pub type EventReceiver = mpsc::Receiver<AgentEvent>;

/// Create an event channel with the given buffer size.
pub fn channel(buffer: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer)
}

/// Send an event, ignoring a host that stopped listening.
pub async fn emit(tx: &EventSender, event: AgentEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("event receiver dropped; event discarded");
    }
}

/// Drain every event currently buffered.
pub fn drain(rx: &mut EventReceiver) -> Vec<AgentEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

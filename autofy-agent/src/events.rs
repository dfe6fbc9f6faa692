use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Workflow node the agent is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Loading,
    Analyzing,
    Scrolling,
    Reporting,
    Finished,
    Aborted,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Loading => "loading",
            Stage::Analyzing => "analyzing",
            Stage::Scrolling => "scrolling",
            Stage::Reporting => "reporting",
            Stage::Finished => "finished",
            Stage::Aborted => "aborted",
        }
    }
}

/// Progress update for whoever is watching the run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    pub stage: Stage,
    pub message: String,
    /// Summaries collected so far.
    pub summaries: usize,
}

/// Optional event channel. Every event is also logged.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<AgentEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, stage: Stage, summaries: usize, message: impl Into<String>) {
        let message = message.into();
        info!(target: "agent", stage = stage.label(), summaries, "{message}");
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(AgentEvent {
                stage,
                message,
                summaries,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_to_channel_and_survives_closed_receiver() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = EventSink::new(tx);
        sink.emit(Stage::Scrolling, 2, "scrolling down");

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.stage, Stage::Scrolling);
        assert_eq!(ev.summaries, 2);
        assert_eq!(ev.message, "scrolling down");

        drop(rx);
        sink.emit(Stage::Finished, 2, "done");
        EventSink::default().emit(Stage::Finished, 0, "no channel");
    }
}

use crate::analysis::PageAnalysis;
use crate::capture::{capture_page, truncate_chars};
use crate::events::{AgentEvent, EventSink, Stage};
use crate::output::{
    HistoryRow, append_history, combine_notes, fallback_report, raw_notes, write_text,
};
use crate::pacing::Pacer;
use crate::prompts::{ANALYST_SYSTEM, EDITOR_SYSTEM, analysis_prompt, report_prompt};
use crate::retry::{RetryPolicy, call_with_retry};
use crate::router::{Route, RouteLimits, route};
use crate::state::{AgentState, RunOutcome, RunStatus, Status};
use autofy_common::{AutofyError, Result};
use autofy_config::{AgentConfig, AutofyConfig, OutputConfig};
use autofy_drivers::BrowserSession;
use autofy_llm::structured::complete_structured;
use autofy_llm::traits::{LlmClient, LlmRequest, Part};
use autofy_runtime::{Cancellation, sleep_or_cancel};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Planner,
    Init,
    Analyze,
    Scroll,
    Aggregate,
    Abort,
}

/// Drives one research run over a browser session.
pub struct ResearchAgent {
    llm: Arc<dyn LlmClient + Send + Sync>,
    agent: AgentConfig,
    output: OutputConfig,
    limits: RouteLimits,
    retry: RetryPolicy,
    pacer: Pacer,
    nav_settle: Duration,
    temperature: f32,
    events: EventSink,
    cancel: Cancellation,
}

impl ResearchAgent {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>, config: &AutofyConfig) -> Self {
        Self {
            llm,
            agent: config.agent.clone(),
            output: config.output.clone(),
            limits: RouteLimits::from_config(&config.agent),
            retry: RetryPolicy::from_config(&config.retry),
            pacer: Pacer::from_secs(config.agent.pacing_secs),
            nav_settle: Duration::from_millis(config.browser.settle_ms),
            temperature: autofy_llm::configured_temperature(&config.llm),
            events: EventSink::default(),
            cancel: Cancellation::new(),
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Research `task`, starting at `url` or at a web search result when
    /// `url` is `None`. The browser is left open; closing it is the
    /// caller's job.
    pub async fn run(
        &self,
        browser: &dyn BrowserSession,
        task: &str,
        url: Option<String>,
    ) -> Result<RunOutcome> {
        let mut state = AgentState::new(task, url);
        let mut node = Node::Planner;
        info!(target: "agent", task = %state.task, url = ?state.url, "run started");

        loop {
            if self.cancel.is_cancelled() {
                return Err(AutofyError::Cancelled);
            }
            node = match node {
                Node::Planner => self.plan(browser, &mut state).await?,
                Node::Init => self.init(browser, &state).await?,
                Node::Analyze => {
                    self.analyze(browser, &mut state).await?;
                    let decision = route(&state, &self.limits);
                    self.emit(Stage::Analyzing, &state, decision.reason);
                    match decision.route {
                        Route::Scroll => Node::Scroll,
                        Route::Aggregate => Node::Aggregate,
                    }
                }
                Node::Scroll => {
                    self.scroll(browser, &state).await?;
                    Node::Analyze
                }
                Node::Aggregate => return self.aggregate(&state).await,
                Node::Abort => return Ok(self.abort(&state)),
            };
        }
    }

    fn emit(&self, stage: Stage, state: &AgentState, message: impl Into<String>) {
        self.events.emit(stage, state.scroll_count(), message);
    }

    /// Await `fut` unless the run is cancelled first.
    async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            out = fut => Ok(out),
            _ = self.cancel.cancelled() => Err(AutofyError::Cancelled),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        if sleep_or_cancel(duration, &self.cancel).await {
            Ok(())
        } else {
            Err(AutofyError::Cancelled)
        }
    }

    async fn plan(&self, browser: &dyn BrowserSession, state: &mut AgentState) -> Result<Node> {
        if state.url.is_some() {
            return Ok(Node::Init);
        }
        if let Some(url) = self.agent.default_url.as_deref().filter(|u| !u.trim().is_empty()) {
            state.url = Some(url.to_string());
            self.emit(Stage::Planning, state, format!("using default target {url}"));
            return Ok(Node::Init);
        }

        self.emit(Stage::Planning, state, "no URL given, searching the web");
        let timeout = Duration::from_secs(self.agent.search_timeout_secs);
        let found = self
            .guard(browser.search_first_result(&self.agent.search_url, &state.task, timeout))
            .await?;
        match found {
            Ok(Some(url)) => {
                self.emit(Stage::Planning, state, format!("found target {url}"));
                state.url = Some(url);
                Ok(Node::Init)
            }
            Ok(None) => {
                warn!(target: "agent.planner", "search returned no usable result");
                state.status = Status::Aborted;
                Ok(Node::Abort)
            }
            Err(e) => {
                warn!(target: "agent.planner", error = %format!("{e:#}"), "search failed");
                state.status = Status::Aborted;
                Ok(Node::Abort)
            }
        }
    }

    async fn init(&self, browser: &dyn BrowserSession, state: &AgentState) -> Result<Node> {
        let Some(url) = state.url.as_deref() else {
            return Ok(Node::Aggregate);
        };
        self.emit(Stage::Loading, state, format!("opening {url}"));
        if let Err(e) = self.guard(browser.navigate(url)).await? {
            warn!(
                target: "agent.init",
                error = %format!("{e:#}"),
                "navigation did not finish cleanly, continuing with what loaded"
            );
        }
        self.pause(self.nav_settle).await?;
        Ok(Node::Analyze)
    }

    async fn analyze(&self, browser: &dyn BrowserSession, state: &mut AgentState) -> Result<()> {
        state.passes += 1;
        self.emit(
            Stage::Analyzing,
            state,
            format!("capturing viewport (pass {})", state.passes),
        );

        let settle = Duration::from_millis(self.agent.capture_settle_ms);
        let context = match self
            .guard(capture_page(browser, settle, self.agent.text_limit))
            .await?
        {
            Ok(context) => context,
            Err(e) => {
                warn!(target: "agent.capture", error = %format!("{e:#}"), "capture failed");
                state.status = Status::Done;
                return Ok(());
            }
        };
        self.save_screenshot(state.passes, &context.screenshot_png);

        let request = LlmRequest::new(vec![
            Part::text(analysis_prompt(
                &state.task,
                &context.text,
                state.scroll_count(),
            )),
            Part::png(context.screenshot_png),
        ])
        .with_system(ANALYST_SYSTEM)
        .with_temperature(self.temperature);

        self.pacer.wait(&self.cancel).await?;
        let llm: &dyn LlmClient = self.llm.as_ref();
        let analysis = call_with_retry(&self.retry, &self.cancel, "analyze", || {
            complete_structured::<PageAnalysis>(llm, request.clone())
        })
        .await?;

        match analysis {
            Some(a) => {
                let verdict = if a.should_scroll { "scrolling" } else { "stopping" };
                self.emit(
                    Stage::Analyzing,
                    state,
                    format!("model: {verdict} | {}", truncate_chars(&a.summary, 60)),
                );
                state.status = if a.should_scroll {
                    Status::ScrollRequired
                } else {
                    Status::Done
                };
                state.summaries.push(a.summary);
            }
            None => {
                warn!(target: "agent.analyze", url = %context.url, "analysis gave up");
                state.status = Status::Done;
            }
        }
        Ok(())
    }

    async fn scroll(&self, browser: &dyn BrowserSession, state: &AgentState) -> Result<()> {
        self.emit(Stage::Scrolling, state, "scrolling down");
        if let Err(e) = self.guard(browser.scroll(&self.agent.scroll)).await? {
            warn!(target: "agent.scroll", error = %format!("{e:#}"), "scroll failed");
        }
        self.pause(Duration::from_millis(self.agent.scroll_settle_ms))
            .await
    }

    async fn aggregate(&self, state: &AgentState) -> Result<RunOutcome> {
        self.emit(Stage::Reporting, state, "compiling final report");
        let combined = combine_notes(&state.summaries);

        if let Some(path) = &self.output.raw_notes_path {
            if let Err(e) = write_text(path, &raw_notes(&state.task, &combined)) {
                warn!(target: "agent.output", path = %path.display(), error = %e, "raw notes backup failed");
            }
        }

        let request = LlmRequest::from_text(report_prompt(&state.task, &combined))
            .with_system(EDITOR_SYSTEM)
            .with_temperature(self.temperature);

        self.pacer.wait(&self.cancel).await?;
        let llm = &self.llm;
        let report = call_with_retry(&self.retry, &self.cancel, "report", || async {
            llm.complete(&request).await.map(|r| r.text)
        })
        .await?;

        let (report, status) = match report {
            Some(text) if !text.trim().is_empty() => (text, RunStatus::Success),
            _ => {
                warn!(target: "agent.output", "report generation failed, saving raw notes as the report");
                (fallback_report(&combined), RunStatus::ReportFallback)
            }
        };

        let report_path = self.output.report_path.clone();
        write_text(&report_path, &report).map_err(|source| AutofyError::Output {
            path: report_path.clone(),
            source,
        })?;
        self.record_history(state, &combined, status);

        self.emit(
            Stage::Finished,
            state,
            format!("saved {} ({status})", report_path.display()),
        );
        Ok(RunOutcome {
            report,
            report_path,
            url: state.url.clone(),
            summaries: state.scroll_count(),
            status,
        })
    }

    fn abort(&self, state: &AgentState) -> RunOutcome {
        self.record_history(state, "", RunStatus::Aborted);
        self.emit(Stage::Aborted, state, "no target page found, nothing to research");
        RunOutcome {
            report: String::new(),
            report_path: self.output.report_path.clone(),
            url: None,
            summaries: 0,
            status: RunStatus::Aborted,
        }
    }

    fn record_history(&self, state: &AgentState, combined: &str, status: RunStatus) {
        let Some(path) = &self.output.history_path else {
            return;
        };
        let row = HistoryRow {
            target_url: state.url.clone().unwrap_or_default(),
            task: state.task.clone(),
            combined: combined.to_string(),
            status,
        };
        if let Err(e) = append_history(path, &row, self.output.history_report_chars) {
            warn!(target: "agent.output", error = %format!("{e:#}"), "could not log history");
        }
    }

    fn save_screenshot(&self, pass: usize, png: &[u8]) {
        let Some(dir) = &self.output.screenshot_dir else {
            return;
        };
        let path = dir.join(format!("step-{pass}.png"));
        let res = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, png));
        if let Err(e) = res {
            warn!(target: "agent.output", path = %path.display(), error = %e, "could not save screenshot");
        }
    }
}

use crate::cli::{RunArgs, normalize_inputs};
use crate::{load_config, start_logging};
use anyhow::Result;
use autofy_agent::{AgentEvent, ResearchAgent, RunStatus};
use autofy_common::AutofyError;
use autofy_config::AutofyConfig;
use autofy_drivers::AutofyDriver;
use autofy_llm::build_llm_client;
use autofy_runtime::{AutofyHandle, AutofyRuntime, Cancellation};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const EXIT_FAILURE: u8 = 1;
const EXIT_ABORTED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

pub fn execute(args: RunArgs) -> ExitCode {
    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    match start_logging(&config.logging) {
        Ok(path) => println!("Logging to {}", path.display()),
        Err(e) => eprintln!("Logging disabled: {e:#}"),
    }

    let (url, task) = if args.needs_prompt() {
        match prompt_inputs(&args) {
            Ok(inputs) => inputs,
            Err(e) => {
                eprintln!("Could not read input: {e}");
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    } else {
        normalize_inputs(args.url.clone(), args.task.clone())
    };

    let runtime = match AutofyRuntime::build("autofy", None) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Could not start runtime: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    runtime.cancel_on_ctrl_c();

    let code = runtime.block_on(research(config, task, url, runtime.handle()));
    runtime.shutdown(Duration::from_secs(2));
    code
}

fn prompt_inputs(args: &RunArgs) -> io::Result<(Option<String>, String)> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    read_inputs(args, &mut stdin.lock(), &mut stdout.lock())
}

/// Ask for the URL and then the task. A blank URL answer keeps `--url` when
/// one was passed.
fn read_inputs(
    args: &RunArgs,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<(Option<String>, String)> {
    let answer = ask(input, output, "1. Enter URL:")?;
    let url = if answer.is_empty() { args.url.clone() } else { Some(answer) };
    let task = ask(input, output, "2. Enter Task:")?;
    Ok(normalize_inputs(url, Some(task)))
}

fn ask(input: &mut impl BufRead, output: &mut impl Write, label: &str) -> io::Result<String> {
    write!(output, "{label} ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn research(
    config: AutofyConfig,
    task: String,
    url: Option<String>,
    handle: AutofyHandle,
) -> ExitCode {
    let cancel = handle.cancellation();
    info!(
        provider = config.llm.provider_name(),
        model = config.llm.model(),
        "starting research"
    );
    println!("Task: {task}");
    match &url {
        Some(u) => println!("Target: {u}"),
        None => println!("Target: (web search)"),
    }

    let llm = match build_llm_client(&config.llm).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not create model client");
            eprintln!("Model setup failed: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let driver = match start_browser(&config, &cancel).await {
        Ok(d) => d,
        Err(_) if cancel.is_cancelled() => {
            eprintln!("Interrupted.");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "browser start failed");
            eprintln!("Browser start failed: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = handle.spawn(render_events(rx));

    let page = driver.page();
    let agent = ResearchAgent::new(llm, &config)
        .with_events(tx)
        .with_cancellation(cancel);
    let result = agent.run(&page, &task, url).await;
    drop(agent);
    let _ = printer.await;

    if let Err(e) = driver.close().await {
        warn!(error = %e, "browser did not close cleanly");
    }

    match result {
        Ok(outcome) => match outcome.status {
            RunStatus::Success | RunStatus::ReportFallback => {
                println!(
                    "Report saved to {} ({} notes, {})",
                    outcome.report_path.display(),
                    outcome.summaries,
                    outcome.status
                );
                ExitCode::SUCCESS
            }
            RunStatus::Aborted => {
                eprintln!("No target page found; nothing was researched.");
                ExitCode::from(EXIT_ABORTED)
            }
        },
        Err(AutofyError::Cancelled) => {
            eprintln!("Interrupted.");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("Run failed: {e}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn start_browser(config: &AutofyConfig, cancel: &Cancellation) -> Result<AutofyDriver> {
    tokio::select! {
        driver = AutofyDriver::new(&config.browser) => driver,
        _ = cancel.cancelled() => Err(AutofyError::Cancelled.into()),
    }
}

async fn render_events(mut rx: mpsc::UnboundedReceiver<AgentEvent>) {
    while let Some(ev) = rx.recv().await {
        println!("[{:>9}] {}", ev.stage.label(), ev.message);
    }
}

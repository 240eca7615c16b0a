//! Terminal front end for the interview orchestrator.
//!
//! Reads one answer per stdin line, prints what the interviewer says and
//! finishes with the calibrated feedback. Transcripts are kept in memory.

mod cli;

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use clap::Parser;
use cli::Cli;
use interview_core::{
    Command,
    feedback::Feedback,
    llm_client::{LLMClient, OpenAICompatibleClient},
    persistence::{MemoryStore, SessionStore},
    prompts::{PromptLibrary, load_prompt_dir},
    runtime::{SessionHandle, spawn_session},
    session::{InterviewSession, TurnPhase},
    transcript::MessageRole,
};
use std::sync::Arc;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let api_key = cli.resolve_api_key().with_context(|| {
        format!(
            "No API key: pass --api-key or set {}",
            cli.provider.key_var()
        )
    })?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(cli.provider.api_base());
    let llm: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        cli.model.clone(),
    ));

    let mut prompts = PromptLibrary::builtin();
    if let Some(path) = &cli.prompts {
        prompts = prompts.with_overrides(load_prompt_dir(path)?);
    }

    let config = cli.session_config();
    let session_id = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let session = InterviewSession::new(
        session_id,
        config.clone(),
        llm,
        store.clone() as Arc<dyn SessionStore>,
        Arc::new(prompts),
        command_tx,
    );
    info!(%session_id, role = %config.role, level = %config.level, "Starting interview");

    let (handle, driver) = spawn_session(session);
    std::thread::spawn(move || forward_stdin(handle));

    while let Some(command) = command_rx.recv().await {
        match command {
            Command::SpeakText { text, .. } => println!("\nInterviewer: {text}"),
            Command::TranscriptAppended(message) if message.role == MessageRole::User => {
                debug!(content = %message.content, "Answer recorded");
            }
            Command::TranscriptAppended(_) => {}
            Command::PhaseChanged(TurnPhase::AwaitingInput) => {
                eprint!("> ");
            }
            Command::PhaseChanged(phase) => debug!(%phase, "Phase changed"),
            Command::SessionComplete { feedback, reason } => {
                println!("\nInterview finished ({reason}).");
                print_feedback(&feedback);
            }
        }
    }

    let report = driver.await.context("Interview driver failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.transcript)?);
    }
    if let Some(stored) = store.get(session_id) {
        debug!(saves = stored.transcript_saves, "Transcript persisted");
    }
    Ok(())
}

/// Feeds stdin lines to the session. End of input ends the interview.
///
/// Runs on a plain thread: a blocking stdin read would otherwise keep the
/// runtime from shutting down once the interview is over.
fn forward_stdin(handle: SessionHandle) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                if handle.submit_utterance(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
    let _ = handle.end();
}

fn print_feedback(feedback: &Feedback) {
    println!("Overall score:       {}", feedback.overall_score);
    println!("Technical:           {}", feedback.technical_score);
    println!("Communication:       {}", feedback.communication_score);
    println!("Problem solving:     {}", feedback.problem_solving_score);
    println!("\n{}", feedback.overall_assessment);

    let sections = [
        ("Strengths", &feedback.strengths),
        ("Weaknesses", &feedback.weaknesses),
        ("Opportunities", &feedback.opportunities),
        ("Threats", &feedback.threats),
        ("Recommendations", &feedback.recommendations),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("\n{title}:");
        for item in items {
            println!("  - {item}");
        }
    }
    println!("\n{}", feedback.swot_analysis);
}

//! Launch Control CLI
//!
//! Drives a product idea from brainstorm to launch using external commands
//! for subagent work and deploys.

use std::path::PathBuf;

use launch_control::{
    OrchestratorConfig, PhaseSequencer, ProcessToolExecutor, RunOutcome, RunState, ToolBridge,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let state_dir = PathBuf::from(".launch-control");
    let resuming = RunState::file_path(&state_dir).exists();

    if args.len() < 2 && !resuming {
        eprintln!("Usage: {} <product idea>", args[0]);
        eprintln!("       {} resolve <clarification-id> <answer>", args[0]);
        eprintln!("\nDrives the idea through all twelve phases to a deployed product.");
        eprintln!("\nEnvironment variables:");
        eprintln!("  LAUNCH_SUBAGENT_CMD     Shell command receiving the task prompt on stdin (required)");
        eprintln!("  LAUNCH_DEPLOY_CMD       Shell command that deploys and prints the URL (required)");
        eprintln!("  LAUNCH_SEARCH_CMD       Shell command receiving a search query on stdin");
        eprintln!("  LAUNCH_PRODUCTION_URL   Production URL used for sanity checks");
        eprintln!("  LAUNCH_CONFIG           Path to a TOML configuration file");
        std::process::exit(1);
    }

    if args.len() >= 2 && args[1] == "resolve" && !resuming {
        eprintln!(
            "No persisted run found under {}; nothing to resolve.",
            state_dir.display()
        );
        std::process::exit(1);
    }

    let subagent_cmd = require_env("LAUNCH_SUBAGENT_CMD");
    let deploy_cmd = require_env("LAUNCH_DEPLOY_CMD");

    let mut executor = ProcessToolExecutor::new(subagent_cmd, deploy_cmd);
    if let Ok(cmd) = std::env::var("LAUNCH_SEARCH_CMD") {
        executor = executor.with_search_cmd(cmd);
    }
    if let Ok(url) = std::env::var("LAUNCH_PRODUCTION_URL") {
        executor = executor.with_production_url(url);
    }

    let config = match std::env::var("LAUNCH_CONFIG") {
        Ok(path) => load_config(&path),
        Err(_) => OrchestratorConfig::default(),
    };

    let bridge = ToolBridge::new(Box::new(executor))
        .with_log_file(state_dir.join("tool-calls.jsonl"));

    let mut sequencer = if resuming {
        tracing::info!("resuming persisted run from {}", state_dir.display());
        match PhaseSequencer::resume(&state_dir, bridge, config) {
            Ok(seq) => seq,
            Err(e) => {
                eprintln!("Failed to resume run: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let idea = args[1..].join(" ");
        tracing::info!(idea = %idea, "starting run");
        PhaseSequencer::new(idea, bridge)
            .with_config(config)
            .with_state_dir(state_dir.clone())
    };

    if args.len() >= 2 && args[1] == "resolve" {
        if args.len() < 4 {
            eprintln!("Usage: {} resolve <clarification-id> <answer>", args[0]);
            std::process::exit(1);
        }
        let id = &args[2];
        let answer = args[3..].join(" ");
        if let Err(e) = sequencer.resolve_clarification(id, &answer) {
            eprintln!("Failed to resolve clarification {}: {}", id, e);
            std::process::exit(1);
        }
        tracing::info!(clarification_id = %id, "clarification resolved, resuming");
    }

    match sequencer.run().await {
        Ok(RunOutcome::Launched) => {
            println!("\n{}", "=".repeat(60));
            println!("Launched");
            println!("{}", "=".repeat(60));
            println!();
            if let Some(url) = &sequencer.state().production_url {
                println!("Production URL: {}", url);
            }
            println!("Artifacts: {}", state_dir.join("artifacts").display());
            println!("Tool log:  {}", state_dir.join("tool-calls.jsonl").display());
        }
        Ok(RunOutcome::Suspended { clarification_id }) => {
            let question = sequencer
                .state()
                .clarifications
                .requests()
                .iter()
                .find(|r| r.id == clarification_id)
                .map(|r| r.question.clone())
                .unwrap_or_default();
            eprintln!("\nRun suspended on clarification {}:", clarification_id);
            eprintln!("  {}", question);
            eprintln!("\nState is persisted under {}; rerun after resolving.", state_dir.display());
            std::process::exit(2);
        }
        Ok(RunOutcome::Aborted {
            clarification_id,
            attempts,
        }) => {
            eprintln!(
                "\nRun aborted: clarification {} stayed unresolved across {} attempts.",
                clarification_id, attempts
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn require_env(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) => value,
        Err(_) => {
            eprintln!("{} must be set", name);
            std::process::exit(1);
        }
    }
}

fn load_config(path: &str) -> OrchestratorConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Failed to read config {}: {}", path, e);
            std::process::exit(1);
        }
    };
    match toml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse config {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

//! `armdeck` – launcher for the robot-arm demo server.
//!
//! This binary is the entry point for the demo stack.  It:
//!
//! 1. Checks for `~/.armdeck/config.toml`; writes the defaults on first run.
//! 2. Probes the configured policy checkpoints and reports which skills are
//!    backed by a real model (in practice: none, the behavior is scripted).
//! 3. Boots the HTTP + WebSocket demo console and streams the mock arm.
//! 4. Intercepts **Ctrl-C** for a clean exit.

mod config;

use std::sync::Arc;

use armdeck_engine::make_engine;
use armdeck_hal::{FrameSourceConfig, make_frame_source};
use armdeck_server::{BehaviorScript, ConnectionManager, Coordinator, DemoServer, ServerContext};
use armdeck_skills::{GraspSkill, SearchSkill, Skill};
use colored::Colorize;
use tracing::warn;

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set ARMDECK_LOG_FORMAT=json to emit newline-delimited JSON logs
    // suitable for log aggregators.  The launcher's user-facing output still
    // uses println! for UX consistency.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("ARMDECK_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "  ✓ Ctrl-C received – shutting down.".green());
        std::process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Configuration vault ───────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    // ── Skill preflight ───────────────────────────────────────────────────
    // Neither skill ships with a trained policy; report what the server will
    // actually run so nobody mistakes the scripted behavior for inference.
    println!();
    preflight_skill(&mut SearchSkill::new(cfg.search_policy_path.clone()));
    preflight_skill(&mut GraspSkill::new(cfg.grasp_policy_path.clone()));

    // ── Frame source ──────────────────────────────────────────────────────
    let source = match make_frame_source(&FrameSourceConfig {
        use_mock: cfg.use_mock,
        static_image_path: cfg.static_image_path.clone(),
    }) {
        Ok(source) => source,
        Err(e) => {
            println!("\n{}: {}", "Frame source error".red().bold(), e);
            std::process::exit(1);
        }
    };
    println!(
        "\n  Frame source: {} ({} fps)",
        source.id().bold(),
        cfg.fps
    );
    println!(
        "  Chat engine:  {} ({})",
        cfg.llm.provider.to_string().bold(),
        cfg.llm.model_name
    );

    // ── Demo server ───────────────────────────────────────────────────────
    let manager = Arc::new(ConnectionManager::new());
    let coordinator = Coordinator::new(
        Arc::clone(&manager),
        source,
        cfg.fps,
        BehaviorScript::default(),
    );
    let ctx = Arc::new(ServerContext {
        manager,
        coordinator,
        engine: Arc::from(make_engine(&cfg.llm)),
    });

    println!(
        "\n  Open {} in a browser.\n",
        format!("http://localhost:{}", cfg.port).bold().cyan()
    );

    if let Err(e) = DemoServer::new(ctx).with_port(cfg.port).run().await {
        println!("{}: {}", "Server error".red().bold(), e);
        std::process::exit(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Skill preflight
// ─────────────────────────────────────────────────────────────────────────────

fn preflight_skill(skill: &mut dyn Skill) {
    match skill.load() {
        Ok(()) => println!(
            "  Skill {}: {}",
            skill.id().bold(),
            "policy checkpoint found".green()
        ),
        Err(e) => {
            println!(
                "  Skill {}: {} (scripted fallback will run)",
                skill.id().bold(),
                "no policy".yellow()
            );
            warn!(skill = skill.id(), error = %e, "policy checkpoint unavailable");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"                          __        __  "#.bold().cyan());
    println!("{}", r#"  ___ _ ______ _  ___/ /__ ____/ /__"#.bold().cyan());
    println!("{}", r#" / _ `/ __/  ' \/ _  / -_) __/  '_/ "#.bold().cyan());
    println!("{}", r#" \_,_/_/ /_/_/_/\_,_/\__/\__/_/\_\  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "armdeck".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  SO-100 arm demo console");
    println!();
}

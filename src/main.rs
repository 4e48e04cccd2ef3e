use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use planc::codegen::{generate, SceneIdRegistry};
use planc::errors::{find_coded_error, CodedError, ErrorEnvelope, ErrorEnvelopeBody};
use planc::fallback::build_fallback;
use planc::pipeline::{Pipeline, PipelineConfig};
use planc::render::Quality;
use planc::schema::RawPlan;
use planc::validator::validate;

#[derive(Debug, Parser)]
#[command(name = "planc")]
#[command(about = "Plan Compiler: natural language to rendered Manim scenes")]
struct Cli {
    /// Emit machine-readable JSON error envelopes on stdout.
    #[arg(long = "agent-json", global = true)]
    agent_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Full pipeline: plan, generate, render, locate the video.
    Run {
        /// Free-text animation request.
        text: Vec<String>,
        #[arg(long, default_value = "medium")]
        quality: String,
        #[arg(long = "timeout-secs", default_value_t = 600)]
        timeout_secs: u64,
        /// Working directory for outputs/ and media/.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Validate a raw plan file and report the normalized result.
    Check {
        plan: PathBuf,
    },
    /// Validate a raw plan file and write the generated scene script.
    Gen {
        plan: PathBuf,
        #[arg(short = 'o', long = "output", default_value = "outputs/scenes")]
        output: PathBuf,
    },
    /// Print the offline fallback plan for a request, as JSON.
    Fallback {
        text: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let agent_json = cli.agent_json;

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if agent_json {
                let envelope = envelope_for(&error);
                match serde_json::to_string(&envelope) {
                    Ok(body) => println!("{body}"),
                    Err(_) => eprintln!("error: {error:#}"),
                }
            } else {
                eprintln!("error: {error:#}");
            }
            match find_coded_error(&error) {
                Some(coded) if coded.code == planc::errors::USAGE => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            text,
            quality,
            timeout_secs,
            root,
        } => run_pipeline(&text.join(" "), &quality, timeout_secs, root),
        Commands::Check { plan } => run_check(&plan),
        Commands::Gen { plan, output } => run_gen(&plan, &output),
        Commands::Fallback { text } => run_fallback(&text.join(" ")),
    }
}

fn run_pipeline(text: &str, quality: &str, timeout_secs: u64, root: PathBuf) -> Result<()> {
    if text.trim().is_empty() {
        return Err(anyhow!(CodedError::usage("no request text given")));
    }
    let mut config = PipelineConfig::new(root);
    config.quality = Quality::from_keyword(quality)?;
    config.render_timeout = Duration::from_secs(timeout_secs);

    let pipeline = Pipeline::from_env(config)?;
    let outcome = pipeline.run(text)?;

    if outcome.used_fallback {
        eprintln!("planned via offline template");
    }
    eprintln!("plan:   {}", outcome.plan_path.display());
    eprintln!("script: {}", outcome.script_path.display());
    println!("Wrote {}", outcome.video_path.display());
    Ok(())
}

fn run_check(plan_path: &Path) -> Result<()> {
    let raw = load_raw_plan(plan_path)?;
    let plan = validate(&raw).map_err(|failure| anyhow!(failure.to_coded()))?;

    println!(
        "OK: {} ({} objects, {} actions)",
        plan.title,
        plan.objects.len(),
        plan.actions.len()
    );
    Ok(())
}

fn run_gen(plan_path: &Path, output_dir: &Path) -> Result<()> {
    let raw = load_raw_plan(plan_path)?;
    let plan = validate(&raw).map_err(|failure| anyhow!(failure.to_coded()))?;

    let registry = SceneIdRegistry::new();
    let generated = generate(&plan, &registry)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let script_path = output_dir.join(format!("{}.py", generated.scene_id));
    std::fs::write(&script_path, &generated.source)
        .with_context(|| format!("failed to write {}", script_path.display()))?;

    println!("Wrote {}", script_path.display());
    Ok(())
}

fn run_fallback(text: &str) -> Result<()> {
    let raw = build_fallback(&[], text);
    let plan = validate(&raw).map_err(|failure| anyhow!(failure.to_coded()))?;
    let body = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
    println!("{body}");
    Ok(())
}

fn load_raw_plan(path: &Path) -> Result<RawPlan> {
    let body = std::fs::read_to_string(path).map_err(|error| {
        anyhow!(CodedError::usage(format!(
            "cannot read plan file {}: {error}",
            path.display()
        )))
    })?;
    serde_json::from_str::<RawPlan>(&body).map_err(|error| {
        anyhow!(CodedError::schema_violation(format!(
            "plan file {} is not a JSON plan: {error}",
            path.display()
        )))
    })
}

fn envelope_for(error: &anyhow::Error) -> ErrorEnvelope {
    match find_coded_error(error) {
        Some(coded) => coded.envelope(),
        None => ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: "INTERNAL".to_owned(),
                message: format!("{error:#}"),
                details: None,
            },
        },
    }
}

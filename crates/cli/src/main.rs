//! Thin job runner: read a JobSpec from a JSON file (or stdin), run it
//! through the engine, print the JobResult as JSON.
//!
//! Exit codes: 0 success, 2 validation error, 3 engine unavailable.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use prospect_common::types::JobSpec;
use prospect_common::EngineError;
use prospect_engine::Engine;

const EXIT_VALIDATION: u8 = 2;
const EXIT_UNAVAILABLE: u8 = 3;

struct Args {
    spec_path: String,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut spec_path = None;
    let mut config_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().ok_or("--config requires a path")?;
                config_path = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                return Err(usage());
            }
            _ if spec_path.is_none() => spec_path = Some(arg),
            other => return Err(format!("unexpected argument: {other}\n{}", usage())),
        }
    }

    Ok(Args {
        spec_path: spec_path.ok_or_else(usage)?,
        config_path,
    })
}

fn usage() -> String {
    "usage: prospect <jobspec.json|-> [--config engine.toml]".to_string()
}

fn read_spec(path: &str) -> Result<JobSpec, String> {
    let content = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("failed to read {path}: {e}"))?
    };

    let mut spec: JobSpec =
        serde_json::from_str(&content).map_err(|e| format!("invalid job spec: {e}"))?;
    if spec.id.trim().is_empty() {
        spec.id = uuid::Uuid::new_v4().to_string();
    }
    Ok(spec)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    let spec = match read_spec(&args.spec_path) {
        Ok(spec) => spec,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    let config = match prospect_engine::config::load_config(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_UNAVAILABLE);
        }
    };

    let engine = match Engine::from_config(config).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_UNAVAILABLE);
        }
    };

    match engine.run_job(spec).await {
        Ok(result) => {
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("failed to serialize result: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e @ EngineError::Validation(_)) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_VALIDATION)
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_UNAVAILABLE)
        }
    }
}

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use pvpilot::board::position::Position;
use pvpilot::engine::resource::EngineResource;
use pvpilot::options::Options;
use pvpilot::search::root::{self, NullReporter, SearchContext, SearchParams, StopReason};
use pvpilot::search::timeman::Clock;

#[derive(Parser, Debug)]
#[command(name = "pvpilot-bench", version, about = "Run the standard search scenarios against an evaluator")]
struct Args {
    /// Path to the evaluator binary
    #[arg(long, default_value = "stockfish")]
    engine: String,

    /// Iteration count for the fixed-depth scenario
    #[arg(long, default_value_t = 3)]
    depth: u32,

    /// FEN string or 'startpos'
    #[arg(long, default_value = "startpos")]
    fen: String,

    /// Write a JSON report here
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScenarioResult {
    name: String,
    bestmove: Option<String>,
    score_cp: i32,
    nodes: u64,
    iterations: u32,
    stop: String,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct BenchReport {
    engine_path: String,
    scenarios: Vec<ScenarioResult>,
    total_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let pos = if args.fen == "startpos" {
        Position::startpos()
    } else {
        Position::from_fen(&args.fen).map_err(|e| anyhow::anyhow!(e))?
    };

    let mut opts = Options::default();
    opts.set("ENGINE_PATH", &args.engine);
    let resource = EngineResource::new(opts.engine_params());

    let scenarios: Vec<(String, SearchParams)> = vec![
        (
            format!("depth {}", args.depth),
            SearchParams { max_iters: args.depth, ..Default::default() },
        ),
        (
            "movetime 10000".to_string(),
            SearchParams { movetime: Some(10_000), ..Default::default() },
        ),
        (
            "nodes 2000000".to_string(),
            SearchParams { max_nodes: Some(2_000_000), ..Default::default() },
        ),
        (
            "wtime 60000 winc 1000 btime 60000 binc 1000".to_string(),
            SearchParams {
                clock: Some(Clock::new(60_000, 60_000, 1_000, 1_000)),
                ..Default::default()
            },
        ),
    ];

    let bar = ProgressBar::new(scenarios.len() as u64);
    bar.set_style(ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")?);

    let started = Instant::now();
    let mut results = Vec::with_capacity(scenarios.len());
    for (name, params) in scenarios {
        bar.set_message(name.clone());
        let t0 = Instant::now();
        let mut ctx = SearchContext::new(opts.search_config());
        let mut lease = resource.acquire();
        let res = root::search(&mut ctx, &mut lease, &pos, &params, &mut NullReporter);
        drop(lease);
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        bar.println(format!(
            "go {name}: bestmove={} score_cp={} nodes={} iterations={} elapsed={}ms",
            res.bestmove.as_deref().unwrap_or("(none)"),
            res.score_cp,
            res.nodes,
            res.iterations,
            elapsed_ms
        ));
        results.push(ScenarioResult {
            name,
            bestmove: res.bestmove,
            score_cp: res.score_cp,
            nodes: res.nodes,
            iterations: res.iterations,
            stop: stop_name(res.stop).to_string(),
            elapsed_ms,
        });
        bar.inc(1);
    }
    bar.finish_and_clear();
    resource.shutdown();

    let report = BenchReport {
        engine_path: args.engine,
        scenarios: results,
        total_ms: started.elapsed().as_millis() as u64,
    };
    println!("Time taken: {:.2} seconds", report.total_ms as f64 / 1000.0);

    if let Some(path) = args.report {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn stop_name(stop: StopReason) -> &'static str {
    match stop {
        StopReason::IterationLimit => "iterations",
        StopReason::NodeLimit => "nodes",
        StopReason::Deadline => "deadline",
        StopReason::Cancelled => "cancelled",
        StopReason::EvaluatorError => "evaluator-error",
    }
}

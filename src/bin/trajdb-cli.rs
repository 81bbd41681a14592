//! trajdb 命令行
//!
//! `serve` answers JSON requests read from stdin, one per line, writing one
//! JSON response per line to stdout. `index` writes the postings and grid
//! snapshots for a data directory.

use anyhow::{bail, Context};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use trajdb::index::write_index_snapshots;
use trajdb::{telemetry, EngineConfig, QueryEngine};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let guards = telemetry::init_stderr_logging();
    let code = match run() {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "fatal");
            eprintln!("❌ Error: {:#}", e);
            1
        }
    };
    // flush pending log lines before exiting
    drop(guards);
    std::process::exit(code);
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("--version") | Some("-v") => {
            println!("trajdb v{}", VERSION);
        }
        Some("--help") | Some("-h") => {
            print_help();
        }
        Some("serve") if args.len() == 3 => {
            let config = load_config(Path::new(&args[2]))?;
            serve(config)?;
        }
        Some("index") if args.len() == 3 => {
            let config = load_config(Path::new(&args[2]))?;
            build_snapshots(&config)?;
        }
        _ => {
            print_help();
            bail!("invalid arguments");
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"
trajdb v{} - trajectory similarity query engine

用法:
  trajdb-cli serve <config.json>   answer JSON requests from stdin, one per line
  trajdb-cli index <config.json>   write postings and grid snapshots
  trajdb-cli --version             显示版本信息
  trajdb-cli --help                显示此帮助信息

配置示例:
  {{"dataDir": "./data", "dataset": "full", "queryTypes": ["PathQ", "RangeQ", "TopK"],
   "similarityMeasure": "DTW", "preferredIndex": "levi", "gridCellSize": 100.0}}

请求示例:
  {{"queryType": "PathQ", "trajectory": {{"edges": [1000, 1002]}}}}
  {{"queryType": "RangeQ", "window": {{"minLat": 30.0, "minLng": 120.0, "maxLat": 30.01, "maxLng": 120.01}}}}
  {{"queryType": "TopK", "trajectory": {{"raw": [{{"lat": 30.0, "lng": 120.0}}, {{"lat": 30.001, "lng": 120.0}}]}}, "k": 5}}

环境变量:
  TRAJDB_LOG_LEVEL   TRACE | DEBUG | INFO | WARN | ERROR (默认 INFO)
"#,
        VERSION
    );
}

fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let mut config: EngineConfig = serde_json::from_str(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;

    // a relative data dir is taken relative to the config file
    if config.data_dir.is_relative() {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
        config.data_dir = base.join(&config.data_dir);
    }
    Ok(config)
}

fn serve(config: EngineConfig) -> anyhow::Result<()> {
    let engine = QueryEngine::open(config).context("engine startup failed")?;
    tracing::info!(handlers = ?engine.manager().query_types(), "serving requests from stdin");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut served = 0usize;

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        writeln!(out, "{}", engine.dispatch_json(line)).context("writing response")?;
        out.flush()?;
        served += 1;
    }

    tracing::info!(served, "stdin closed");
    Ok(())
}

fn build_snapshots(config: &EngineConfig) -> anyhow::Result<()> {
    config.validate()?;
    let report = write_index_snapshots(&config.paths(), config.grid_cell_size)
        .context("writing index snapshots")?;
    println!(
        "✅ {} trajectories, {} edge tokens, {} vertex tokens, {} grid cells ({} ms)",
        report.trajectories,
        report.edge_tokens,
        report.vertex_tokens,
        report.grid_cells,
        report.elapsed_ms
    );
    Ok(())
}

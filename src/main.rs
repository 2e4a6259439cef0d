use anyhow::Result;
use clap::Parser;
use pvpilot::options::Options;
use pvpilot::uci::{UciEngine, ENGINE_AUTHOR, ENGINE_NAME};

#[derive(Parser, Debug)]
#[command(author, version, about = "UCI engine that steers an external evaluator by tracing PVs", long_about = None)]
struct Args {
    /// Path to the evaluator binary (overrides the ENGINE_PATH option)
    #[arg(long)]
    engine: Option<String>,

    /// Commands to run in order instead of reading stdin (batch mode)
    #[arg(trailing_var_arg = true)]
    commands: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut opts = Options::default();
    if let Some(path) = args.engine {
        opts.set("ENGINE_PATH", &path);
    }

    println!("{} {} by {}", ENGINE_NAME, env!("CARGO_PKG_VERSION"), ENGINE_AUTHOR);

    let mut engine = UciEngine::new(opts);
    if args.commands.is_empty() {
        engine.run_loop();
    } else {
        for command in &args.commands {
            if !engine.handle_command(command) {
                break;
            }
        }
        engine.wait_active();
        engine.shutdown();
    }
    Ok(())
}

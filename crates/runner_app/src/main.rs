use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use runner_app::{logging, Console, LogDestination, RunnerConfig, Tab};
use runner_engine::{FileStore, ReqwestNavigator};
use runner_logging::runner_info;

/// Walks a list of untagged URLs page by page, one full page load per URL.
#[derive(Debug, Parser)]
#[command(name = "nav-runner", version)]
struct Cli {
    /// RON config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Page to load first, usually carrying the debug parameter.
    #[arg(long)]
    start_url: Option<String>,
    /// Directory of the durable store.
    #[arg(long)]
    store_dir: Option<PathBuf>,
    /// Delay between navigations in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,
    /// Query parameter that carries the debug token.
    #[arg(long)]
    debug_param: Option<String>,
    #[arg(long, value_enum)]
    log: Option<LogDestination>,
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut RunnerConfig) {
        if let Some(dir) = &self.store_dir {
            config.store_dir = dir.clone();
        }
        if let Some(delay) = self.delay_ms {
            config.step_delay_ms = delay;
        }
        if let Some(param) = &self.debug_param {
            config.debug_param = param.clone();
        }
        if let Some(log) = self.log {
            config.log = log;
        }
        config.verbose |= self.verbose;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = RunnerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    logging::initialize(config.log, config.verbose);
    runner_info!("Starting nav-runner with store {:?}", config.store_dir);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let console = Console::stdout();
    let mut tab = Tab::new(
        ReqwestNavigator::new(config.navigate()),
        runtime,
        FileStore::open(&config.store_dir),
        config.controller(),
        console.clone(),
    );

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    console.line("nav-runner ready; type `help` for commands");
    if let Some(url) = &cli.start_url {
        tab.open(url, Instant::now());
    }
    runner_app::run(tab, rx, &console);
    Ok(())
}

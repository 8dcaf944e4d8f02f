use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use registry_node::{
    FileStorage, HostContext, LogEventSink, MemoryStorage, RegistryConfig, RegistryHost, Storage,
    Value,
};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Registry CLI Arguments
#[derive(Parser)]
#[clap(name = "registry-cli")]
#[clap(about = "Run a script of registry invocations through the reference host")]
struct Args {
    /// JSON-lines script, `-` for stdin
    #[clap(long, default_value = "-")]
    script: String,

    /// Persist state to this file instead of keeping it in memory
    #[clap(long)]
    state: Option<PathBuf>,

    /// Path to registry configuration file
    #[clap(long, default_value = "config/registry.yaml")]
    config: PathBuf,

    /// Caller identity for lines that do not name one
    #[clap(long, default_value = "cli")]
    caller: String,
}

/// One line of the script
#[derive(Debug, Deserialize)]
struct Invocation {
    op: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    caller: Option<String>,
    timestamp: Option<u64>,
    height: Option<u64>,
    /// Hex, with or without `0x`
    block_hash: Option<String>,
}

/// Host context defaults carried from line to line
struct Clock {
    height: u64,
    timestamp: u64,
    caller: String,
}

impl Clock {
    fn context(&mut self, line: &Invocation) -> Result<HostContext> {
        self.height = line.height.unwrap_or(self.height + 1);
        self.timestamp = line.timestamp.unwrap_or(self.timestamp + 1);
        let block_hash = match &line.block_hash {
            Some(h) => hex::decode(h.strip_prefix("0x").unwrap_or(h))
                .with_context(|| format!("Invalid block_hash {:?}", h))?,
            None => self.height.to_le_bytes().to_vec(),
        };
        let caller = line.caller.as_deref().unwrap_or(&self.caller);

        Ok(HostContext {
            height: self.height,
            timestamp: self.timestamp,
            block_hash,
            caller: caller.as_bytes().to_vec(),
        })
    }
}

async fn run<S: Storage>(
    host: RegistryHost<S>,
    script: Box<dyn AsyncBufRead + Unpin>,
    caller: String,
) -> Result<()> {
    let mut clock = Clock {
        height: 0,
        timestamp: 0,
        caller,
    };
    let mut stdout = tokio::io::stdout();
    let mut lines = script.lines();
    let mut line_no = 0usize;
    let (mut ok, mut failed) = (0usize, 0usize);

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let invocation: Invocation = serde_json::from_str(line)
            .with_context(|| format!("Line {}: malformed invocation", line_no))?;
        let ctx = clock.context(&invocation)?;
        let args = invocation
            .args
            .iter()
            .map(Value::from_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Line {}: {}", line_no, e))?;

        let output = match host.invoke(&invocation.op, &args, &ctx).await {
            Ok(values) => {
                ok += 1;
                let values: Vec<_> = values.iter().map(Value::to_json).collect();
                json!({ "op": invocation.op, "ok": values })
            }
            Err(e) => {
                failed += 1;
                json!({ "op": invocation.op, "error": e.to_string() })
            }
        };
        stdout.write_all(format!("{}\n", output).as_bytes()).await?;
    }
    stdout.flush().await?;

    let stats = host.with_store(|store| store.get_stats()).await?;
    info!(
        "Script finished: {} succeeded, {} failed, {} entries ({} bytes) in store",
        ok, failed, stats.num_entries, stats.total_size
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = if args.config.exists() {
        RegistryConfig::from_file(&args.config)?
    } else {
        info!("Config file not found, using defaults");
        RegistryConfig::default()
    };

    let script: Box<dyn AsyncBufRead + Unpin> = if args.script == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&args.script)
            .await
            .with_context(|| format!("Failed to open script {}", args.script))?;
        Box::new(BufReader::new(file))
    };

    let events = Arc::new(LogEventSink);
    match &args.state {
        Some(path) => {
            let store = FileStorage::open(path)
                .with_context(|| format!("Failed to open state {}", path.display()))?;
            info!("Using state file {:?}", path);
            run(RegistryHost::new(store, config, events), script, args.caller).await
        }
        None => {
            warn!("No --state given, changes are kept in memory only");
            run(RegistryHost::new(MemoryStorage::new(), config, events), script, args.caller).await
        }
    }
}

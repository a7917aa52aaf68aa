//! neoindex CLI — sync a NEO chain projection from a node.
//!
//! Usage:
//! ```bash
//! neoindex run --rpc http://seed1.neo.org:10332 --db ./neoindex.db
//! neoindex run --rpc http://localhost:10332 --to 100000
//! neoindex info
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context as _};

use neoindex_core::{Store, SyncError, Updaters};
use neoindex_node::{NeoRpcClient, SyncBuilder, SyncLoop};
use neoindex_storage::SqliteStorage;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "info" => {
            cmd_info();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("neoindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("neoindex {}", env!("CARGO_PKG_VERSION"));
    println!("Fork-safe NEO block sync with asset and contract extraction\n");
    println!("USAGE:");
    println!("    neoindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    run      Sync blocks from a node into the projection");
    println!("    info     Show NeoIndex configuration info");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("RUN OPTIONS:");
    println!("    --rpc <URL>          Node JSON-RPC endpoint (default http://localhost:10332)");
    println!("    --db <PATH>          SQLite database path (default: in-memory)");
    println!("    --to <BLOCK>         Stop after this block commits");
    println!("    --poll-ms <MS>       Poll interval at the chain tip");
    println!("    --max-fork-depth <N> Deepest fork resolved before giving up");
    println!("    --blacklist <HASH>   Exclude a contract from token classification (repeatable)");
}

fn cmd_info() {
    println!("NeoIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default poll interval: 15s at the chain tip");
    println!(
        "  Default max fork depth: {} blocks",
        neoindex_core::DEFAULT_MAX_FORK_DEPTH
    );
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Extraction: native assets, contracts, NEP5 token classification");
}

fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    let mut builder = SyncBuilder::new();
    let mut db_path: Option<String> = None;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .with_context(|| format!("{name} requires a value"))
        };
        match flag.as_str() {
            "--rpc" => builder = builder.rpc_endpoint(value("--rpc")?),
            "--db" => db_path = Some(value("--db")?),
            "--to" => {
                let to: u64 = value("--to")?.parse().context("--to must be a block index")?;
                builder = builder.to_block(to);
            }
            "--poll-ms" => {
                let ms: u64 = value("--poll-ms")?
                    .parse()
                    .context("--poll-ms must be milliseconds")?;
                builder = builder.poll_interval_ms(ms);
            }
            "--max-fork-depth" => {
                let depth: u64 = value("--max-fork-depth")?
                    .parse()
                    .context("--max-fork-depth must be a block count")?;
                builder = builder.max_fork_depth(depth);
            }
            "--blacklist" => builder = builder.blacklist_contract(value("--blacklist")?),
            other => bail!("unknown option: {other}"),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neoindex=info,warn".into()),
        )
        .init();

    let config = builder.build_config();

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(async move {
        let client = Arc::new(NeoRpcClient::new(config.rpc_endpoint.clone()));

        let mut updaters = Updaters::in_memory();
        let store: Arc<dyn Store> = match &db_path {
            Some(path) => {
                let storage = Arc::new(
                    SqliteStorage::open(path)
                        .await
                        .with_context(|| format!("failed to open database {path:?}"))?,
                );
                // The same database carries the processed-index cursor.
                updaters.processed = storage.clone();
                storage
            }
            None => {
                tracing::warn!("no --db given, projection is in-memory only");
                Arc::new(neoindex_storage::MemoryStore::new())
            }
        };

        SyncLoop::new(store, client, updaters, config)
            .run()
            .await
            .map_err(|err: SyncError| anyhow::anyhow!(err))
    })
}

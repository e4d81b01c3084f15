//! Introspection CLI (§6.3, §10.5): open a database and run one operation
//! against it. Not a REPL — each invocation opens, acts, and closes.

use clap::{Parser, Subcommand};
use hgraph_store::sexpr::SexprCodec;
use hgraph_store::{Store, StoreConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "store-cli", about = "Inspect a hypergraph store")]
struct Args {
    /// `hgraph://` or `hgraphd://` URI of the database to open.
    uri: String,

    #[command(subcommand)]
    command: Operation,
}

#[derive(Subcommand)]
enum Operation {
    /// Print record counts per key family.
    Stats,
    /// Zero the operational mutation counter.
    ClearStats,
    /// Dump every key/value pair under a literal key prefix.
    DumpRange {
        /// Raw key prefix, e.g. `n@` or `a@`.
        prefix: String,
    },
    /// Scan for value records whose key atom no longer exists.
    Check,
}

fn main() -> hgraph_store::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = StoreConfig {
        create_if_missing: false,
        ..StoreConfig::default()
    };

    let store = Store::open(&args.uri, SexprCodec, config)?;

    match args.command {
        Operation::Stats => {
            let stats = store.stats()?;
            println!("{stats:#?}");
        }
        Operation::ClearStats => {
            store.clear_stats();
            println!("cleared");
        }
        Operation::DumpRange { prefix } => {
            dump_range(&store, prefix.as_bytes())?;
        }
        Operation::Check => {
            let dangling = store.check()?;
            if dangling.is_empty() {
                println!("no dangling value records found");
            } else {
                for entry in &dangling {
                    println!("{}", String::from_utf8_lossy(&entry.key));
                }
                println!("{} dangling value record(s)", dangling.len());
            }
        }
    }

    store.close()
}

fn dump_range(store: &Store<SexprCodec>, prefix: &[u8]) -> hgraph_store::Result<()> {
    for (key, value) in store.scan_raw_prefix(prefix)? {
        println!(
            "{} = {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }
    Ok(())
}

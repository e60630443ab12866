// src/main.rs
//
// Command-line front end for the tracker library:
//
// - parses the legacy direction flags into a query,
// - reads from the configured roster (or a generated demo chain),
// - prints matches and progress as they stream in,
// - aborts the run cooperatively on Ctrl-C.

use std::sync::Arc;

use clap::Parser;

use tracker::{
    BlockHash, ChainBuilder, Direction, HttpLedgerClient, InMemoryLedger, InstanceId,
    Instruction, InstructionKind, InstructionMatch, LedgerPort, MetricsRegistry, QueryEngine,
    QueryOutcome, QueryRequest, TrackerConfig, TxResult, run_prometheus_http_server,
};

/// Track every instruction that touched an instance on a skip-chain ledger.
#[derive(Parser, Debug)]
#[command(name = "tracker", version)]
struct Cli {
    /// Hex-encoded instance identifier to track.
    #[arg(long)]
    instance: String,

    /// Maximum number of instructions to return.
    #[arg(long)]
    bound: Option<i64>,

    /// Hex-encoded hash of the block to start from.
    #[arg(long)]
    from: Option<String>,

    /// Walk towards the chain head.
    #[arg(long, conflicts_with = "backward")]
    forward: bool,

    /// Walk towards genesis (the default for block starts).
    #[arg(long)]
    backward: bool,

    /// Ignore --from and walk forward from the first block.
    #[arg(long)]
    from_first_block: bool,

    /// Query a generated in-memory chain instead of the roster.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tracker=info".to_string()),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let cfg = TrackerConfig::from_env().map_err(|e| e.to_string())?;

    let target = InstanceId::from_hex(&cli.instance)
        .map_err(|e| format!("invalid --instance: {e}"))?;

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );
    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    let mut start_block = cli
        .from
        .as_deref()
        .map(BlockHash::from_hex)
        .transpose()
        .map_err(|e| format!("invalid --from: {e}"))?;

    let direction = if cli.forward {
        Some(Direction::Forward)
    } else if cli.backward {
        Some(Direction::Backward)
    } else {
        None
    };

    if cli.demo {
        let ledger = Arc::new(demo_ledger(target));
        if start_block.is_none() {
            start_block = ledger.head_hash();
        }
        let request = QueryRequest {
            target,
            result_bound: cli.bound,
            start_block,
            direction,
            start_from_genesis: cli.from_first_block,
        };
        let engine = QueryEngine::new(ledger, cfg.query.clone()).with_metrics(metrics.query.clone());
        return track(&engine, request).await;
    }

    let client = HttpLedgerClient::new(
        cfg.ledger.roster.clone(),
        cfg.ledger.genesis,
        cfg.ledger.timeout,
    )
    .map_err(|e| format!("failed to create ledger client: {e}"))?;

    let request = QueryRequest {
        target,
        result_bound: cli.bound,
        start_block,
        direction,
        start_from_genesis: cli.from_first_block,
    };
    let engine =
        QueryEngine::new(Arc::new(client), cfg.query.clone()).with_metrics(metrics.query.clone());
    track(&engine, request).await
}

/// Runs one query, printing results as they arrive.
async fn track<P>(engine: &QueryEngine<P>, request: QueryRequest) -> Result<(), String>
where
    P: LedgerPort + 'static,
{
    let query = request
        .into_query(engine.config())
        .map_err(|e| e.to_string())?;
    let bound = query.result_bound;
    let mut handle = engine.start_query(query).map_err(|e| e.to_string())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut matches_open = true;
    let mut progress_open = true;
    let mut abort_sent = false;

    while matches_open || progress_open {
        tokio::select! {
            m = handle.matches.recv(), if matches_open => match m {
                Some(m) => println!("{}", describe(&m)),
                None => matches_open = false,
            },
            p = handle.progress.recv(), if progress_open => match p {
                Some(p) => tracing::info!(
                    "{}% of instances found: {}/{} ({} of {} blocks seen)",
                    p.percent,
                    p.matches_found,
                    bound,
                    p.blocks_seen,
                    p.total_blocks.map_or_else(|| "?".to_string(), |n| n.to_string())
                ),
                None => progress_open = false,
            },
            _ = &mut ctrl_c, if !abort_sent => {
                tracing::warn!("abort requested, stopping at the next block");
                handle.abort();
                abort_sent = true;
            }
        }
    }

    match handle.outcome.await {
        Ok(QueryOutcome::Failed { error, stats }) => Err(format!(
            "query failed after {} blocks ({} matches kept): {error}",
            stats.blocks_seen, stats.matches_found
        )),
        Ok(outcome) => {
            let stats = outcome.stats();
            println!(
                "{}: {} matches in {} blocks",
                outcome.label(),
                stats.matches_found,
                stats.blocks_seen
            );
            Ok(())
        }
        Err(_) => Err("query task ended without an outcome".to_string()),
    }
}

fn describe(m: &InstructionMatch) -> String {
    let status = if m.accepted { "accepted" } else { "rejected" };
    let detail = match &m.instruction.kind {
        InstructionKind::Invoke { command, .. } => format!(":{command}"),
        _ => String::new(),
    };
    format!(
        "block {} {} tx {} instruction {}: {} {}{} ({status})",
        m.block_index(),
        m.block_hash(),
        m.tx_index,
        m.instruction_index,
        m.instruction.kind.label(),
        m.instruction.kind.contract_id(),
        detail,
    )
}

/// 64-block chain where `target` is spawned at block 1, then invoked every
/// seventh block, with one rejected attempt.
fn demo_ledger(target: InstanceId) -> InMemoryLedger {
    let other = InstanceId(tracker::Hash256::compute(b"demo-other-instance"));
    let mut builder = ChainBuilder::new(4, 3);

    for index in 0..64u64 {
        let mut txs = vec![TxResult {
            accepted: true,
            instructions: vec![Instruction {
                instance_id: other,
                kind: InstructionKind::Invoke {
                    contract_id: "value".to_string(),
                    command: "update".to_string(),
                    args: vec![],
                },
            }],
        }];

        let kind = match index {
            1 => Some(InstructionKind::Spawn {
                contract_id: "coin".to_string(),
                args: vec![],
            }),
            i if i > 1 && i % 7 == 0 => Some(InstructionKind::Invoke {
                contract_id: "coin".to_string(),
                command: if i == 42 { "burn" } else { "transfer" }.to_string(),
                args: vec![],
            }),
            _ => None,
        };
        if let Some(kind) = kind {
            txs.push(TxResult {
                accepted: index != 42,
                instructions: vec![Instruction {
                    instance_id: target,
                    kind,
                }],
            });
        }

        builder.push(txs);
    }

    builder.build()
}

//! End-to-end query behaviour against an in-memory chain of blocks 0..=10
//! where instance X is touched at blocks 3, 7 and 9.

use std::sync::Arc;

use tracker::{
    AbortController, BlockHash, ChainBuilder, CompletionReason, HASH_LEN, Hash256,
    InMemoryLedger, InstanceId, Instruction, InstructionKind, Query, QueryConfig, QueryEngine,
    QueryError, QueryOutcome, QueryRequest, Step, TxResult,
};

const HITS: [u64; 3] = [3, 7, 9];

fn x() -> InstanceId {
    InstanceId(Hash256([0x58; HASH_LEN]))
}

fn other() -> InstanceId {
    InstanceId(Hash256([0x11; HASH_LEN]))
}

fn touch(instance: InstanceId, accepted: bool) -> TxResult {
    TxResult {
        accepted,
        instructions: vec![Instruction {
            instance_id: instance,
            kind: InstructionKind::Invoke {
                contract_id: "coin".to_string(),
                command: "transfer".to_string(),
                args: vec![],
            },
        }],
    }
}

fn chain() -> InMemoryLedger {
    let mut builder = ChainBuilder::new(4, 3);
    for index in 0..=10u64 {
        let mut txs = vec![touch(other(), true)];
        if HITS.contains(&index) {
            // block 7's hit is a rejected transaction; it still counts
            txs.push(touch(x(), index != 7));
        }
        builder.push(txs);
    }
    builder.build()
}

fn hash_of(ledger: &InMemoryLedger, index: u64) -> BlockHash {
    ledger.block(index).expect("block exists").hash
}

fn engine(ledger: &Arc<InMemoryLedger>) -> QueryEngine<InMemoryLedger> {
    QueryEngine::new(Arc::clone(ledger), QueryConfig::default())
}

#[tokio::test]
async fn scenario_a_backward_bound_reached_stops_early() {
    let ledger = Arc::new(chain());
    let query = Query::backward_from(x(), 3, hash_of(&ledger, 10));

    let report = engine(&ledger).run_to_end(query).await.unwrap();

    let blocks: Vec<u64> = report.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![9, 7, 3]);
    assert!(!report.matches[1].accepted);

    let percents: Vec<u8> = report
        .progress
        .iter()
        .filter(|p| p.matches_found > 0)
        .map(|p| p.percent)
        .collect();
    assert_eq!(percents.first(), Some(&33));
    assert_eq!(percents.last(), Some(&100));
    let distinct: Vec<u8> = {
        let mut d = percents.clone();
        d.dedup();
        d
    };
    assert_eq!(distinct, vec![33, 67, 100]);

    assert!(matches!(
        report.outcome,
        QueryOutcome::Completed {
            reason: CompletionReason::BoundReached,
            ..
        }
    ));
    assert_eq!(ledger.fetched_indices(), vec![10, 9, 8, 7, 6, 5, 4, 3]);
}

#[tokio::test]
async fn scenario_b_end_of_chain_is_partial_success() {
    let ledger = Arc::new(chain());
    let query = Query::backward_from(x(), 100, hash_of(&ledger, 10));

    let report = engine(&ledger).run_to_end(query).await.unwrap();

    let blocks: Vec<u64> = report.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![9, 7, 3]);
    match report.outcome {
        QueryOutcome::Completed { reason, stats } => {
            assert_eq!(reason, CompletionReason::EndOfChain);
            assert_eq!(stats.matches_found, 3);
            assert_eq!(stats.blocks_seen, 11);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.progress.last().unwrap().percent, 3);
}

#[tokio::test]
async fn scenario_c_abort_after_block_nine_keeps_prefix() {
    let ledger = Arc::new(chain());
    let engine = engine(&ledger);
    let mut run = engine
        .prepare(Query::backward_from(x(), 3, hash_of(&ledger, 10)))
        .unwrap();
    let abort: AbortController = run.abort_controller();

    let mut matches = Vec::new();
    let mut outcome = None;
    while let Some(step) = run.next_step().await {
        match step {
            Step::Match(m) => matches.push(m.block_index()),
            Step::Progress(p) => {
                // block 10 then block 9 have been processed
                if p.blocks_seen == 2 {
                    abort.abort();
                }
            }
            Step::Done(o) => outcome = Some(o),
        }
    }

    assert_eq!(matches, vec![9]);
    match outcome {
        Some(QueryOutcome::Aborted { stats }) => {
            assert_eq!(stats.blocks_seen, 2);
            assert_eq!(stats.matches_found, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    // block 8 (and so block 7) was never requested
    assert_eq!(ledger.fetched_indices(), vec![10, 9]);
}

#[tokio::test]
async fn scenario_d_from_genesis_ignores_start_block() {
    let ledger = Arc::new(chain());
    let request = QueryRequest {
        target: x(),
        result_bound: Some(2),
        start_block: Some(hash_of(&ledger, 10)),
        direction: None,
        start_from_genesis: true,
    };
    let engine = engine(&ledger);
    let query = request.into_query(engine.config()).unwrap();

    let report = engine.run_to_end(query).await.unwrap();

    let blocks: Vec<u64> = report.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![3, 7]);
    assert_eq!(ledger.fetched_indices(), (0..=7).collect::<Vec<u64>>());
}

#[tokio::test]
async fn scenario_e_zero_bound_fails_without_requests() {
    let ledger = Arc::new(chain());
    let engine = engine(&ledger);

    let err = engine
        .start_query(Query::backward_from(x(), 0, hash_of(&ledger, 10)))
        .err()
        .expect("zero bound is rejected");
    assert!(matches!(err, QueryError::InvalidQuery(_)));

    let err = engine
        .run_to_end(Query::from_genesis(x(), 0))
        .await
        .expect_err("zero bound is rejected");
    assert!(matches!(err, QueryError::InvalidQuery(_)));

    assert_eq!(ledger.requests(), 0);
}

#[tokio::test]
async fn unknown_instance_completes_with_no_matches() {
    let ledger = Arc::new(chain());
    let query = Query::from_genesis(InstanceId(Hash256([0xFF; HASH_LEN])), 5);

    let report = engine(&ledger).run_to_end(query).await.unwrap();

    assert!(report.matches.is_empty());
    assert!(report.outcome.is_completed());
    assert_eq!(report.outcome.stats().blocks_seen, 11);
}

#[tokio::test]
async fn traversal_is_monotonic_and_deterministic() {
    let ledger = Arc::new(chain());
    let engine = engine(&ledger);

    let forward = engine
        .run_to_end(Query::forward_from(x(), 10, hash_of(&ledger, 2)))
        .await
        .unwrap();
    let again = engine
        .run_to_end(Query::forward_from(x(), 10, hash_of(&ledger, 2)))
        .await
        .unwrap();

    let blocks: Vec<u64> = forward.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![3, 7, 9]);
    assert_eq!(forward.matches, again.matches);
    assert_eq!(forward.outcome, again.outcome);

    let seen: Vec<u64> = forward.progress.iter().map(|p| p.blocks_seen).collect();
    assert_eq!(seen, (1..=9).collect::<Vec<u64>>());

    // blocks 2..=10 requested twice, once per run, in increasing order
    let fetched = ledger.fetched_indices();
    assert_eq!(&fetched[..9], &(2..=10).collect::<Vec<u64>>()[..]);
    assert_eq!(&fetched[9..], &fetched[..9]);
}

#[tokio::test]
async fn abort_prefix_matches_uninterrupted_run() {
    let ledger = Arc::new(chain());
    let engine = engine(&ledger);
    let full = engine
        .run_to_end(Query::from_genesis(x(), 10))
        .await
        .unwrap();

    for stop_after in 1..=11u64 {
        let mut run = engine.prepare(Query::from_genesis(x(), 10)).unwrap();
        let abort = run.abort_controller();
        let mut prefix = Vec::new();
        while let Some(step) = run.next_step().await {
            match step {
                Step::Match(m) => prefix.push(m),
                Step::Progress(p) if p.blocks_seen == stop_after => abort.abort(),
                _ => {}
            }
        }
        let k = full
            .matches
            .iter()
            .filter(|m| m.block_index() < stop_after)
            .count();
        assert_eq!(prefix, full.matches[..k].to_vec(), "stop after {stop_after}");
    }
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let ledger = Arc::new(chain());
    let engine = engine(&ledger);

    let a = engine
        .start_query(Query::backward_from(x(), 3, hash_of(&ledger, 10)))
        .unwrap();
    let b = engine.start_query(Query::from_genesis(x(), 2)).unwrap();
    b.abort();
    let (a, b) = tokio::join!(a.collect(), b.collect());

    let blocks: Vec<u64> = a.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![9, 7, 3]);
    assert!(a.outcome.is_completed());
    assert!(matches!(b.outcome, QueryOutcome::Aborted { .. }));
}

#[tokio::test]
async fn failure_mid_walk_keeps_emitted_matches() {
    let ledger = Arc::new(chain().fail_at(5));
    let report = engine(&ledger)
        .run_to_end(Query::backward_from(x(), 3, hash_of(&ledger, 10)))
        .await
        .unwrap();

    let blocks: Vec<u64> = report.matches.iter().map(|m| m.block_index()).collect();
    assert_eq!(blocks, vec![9, 7]);
    assert!(matches!(report.outcome, QueryOutcome::Failed { .. }));
}

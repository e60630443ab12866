use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use tracker::{
    BlockHash, CompletionReason, Direction, InstanceId, InstructionKind, InstructionMatch,
    QueryId, QueryOutcome, QueryProgress, QueryRequest,
};

use crate::state::SharedState;

/// Request body for `POST /queries`.
///
/// Direction uses the display layer's two flags: `backward` picks the
/// direction from `start_block`, `from_first_block` walks forward from
/// genesis instead.
#[derive(Debug, Deserialize)]
pub struct StartQueryRequest {
    /// Hex-encoded instance identifier.
    pub instance_id: String,
    /// Maximum number of instructions to return; server default if absent.
    pub result_bound: Option<i64>,
    /// Hex-encoded hash of the block to start from.
    pub start_block: Option<String>,
    pub backward: Option<bool>,
    #[serde(default)]
    pub from_first_block: bool,
}

impl StartQueryRequest {
    fn into_request(self) -> Result<QueryRequest, String> {
        let target = InstanceId::from_hex(&self.instance_id)
            .map_err(|e| format!("instance_id: {e}"))?;
        let start_block = self
            .start_block
            .as_deref()
            .map(BlockHash::from_hex)
            .transpose()
            .map_err(|e| format!("start_block: {e}"))?;
        let direction = self.backward.map(|backward| {
            if backward {
                Direction::Backward
            } else {
                Direction::Forward
            }
        });

        Ok(QueryRequest {
            target,
            result_bound: self.result_bound,
            start_block,
            direction,
            start_from_genesis: self.from_first_block,
        })
    }
}

/// Response body for `POST /queries`.
#[derive(Debug, Serialize)]
pub struct StartQueryResponse {
    pub query_id: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ArgumentView {
    pub name: String,
    /// Hex-encoded value.
    pub value: String,
}

/// JSON view of one matching instruction.
#[derive(Clone, Debug, Serialize)]
pub struct MatchView {
    pub block_index: u64,
    pub block_hash: String,
    pub tx_index: usize,
    pub instruction_index: usize,
    pub accepted: bool,
    pub kind: &'static str,
    pub contract_id: String,
    pub command: Option<String>,
    pub args: Vec<ArgumentView>,
}

impl From<&InstructionMatch> for MatchView {
    fn from(m: &InstructionMatch) -> Self {
        let kind = &m.instruction.kind;
        let (command, args) = match kind {
            InstructionKind::Spawn { args, .. } => (None, args.as_slice()),
            InstructionKind::Invoke { command, args, .. } => (Some(command.clone()), args.as_slice()),
            InstructionKind::Delete { .. } => (None, &[][..]),
        };
        MatchView {
            block_index: m.block_index(),
            block_hash: m.block_hash().to_hex(),
            tx_index: m.tx_index,
            instruction_index: m.instruction_index,
            accepted: m.accepted,
            kind: kind.label(),
            contract_id: kind.contract_id().to_string(),
            command,
            args: args
                .iter()
                .map(|a| ArgumentView {
                    name: a.name.clone(),
                    value: hex::encode(&a.value),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub blocks_seen: u64,
    pub matches_found: usize,
    pub percent: u8,
    /// Chain length when the query started, if known.
    pub total_blocks: Option<u64>,
}

impl From<&QueryProgress> for ProgressView {
    fn from(p: &QueryProgress) -> Self {
        ProgressView {
            blocks_seen: p.blocks_seen,
            matches_found: p.matches_found,
            percent: p.percent,
            total_blocks: p.total_blocks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutcomeView {
    /// `completed`, `aborted`, or `failed`.
    pub status: &'static str,
    /// `bound_reached` or `end_of_chain` for completed queries.
    pub reason: Option<&'static str>,
    pub error: Option<String>,
    pub blocks_seen: u64,
    pub matches_found: usize,
}

impl From<&QueryOutcome> for OutcomeView {
    fn from(o: &QueryOutcome) -> Self {
        let stats = o.stats();
        let (reason, error) = match o {
            QueryOutcome::Completed { reason, .. } => (
                Some(match reason {
                    CompletionReason::BoundReached => "bound_reached",
                    CompletionReason::EndOfChain => "end_of_chain",
                }),
                None,
            ),
            QueryOutcome::Aborted { .. } => (None, None),
            QueryOutcome::Failed { error, .. } => (None, Some(error.to_string())),
        };
        OutcomeView {
            status: o.label(),
            reason,
            error,
            blocks_seen: stats.blocks_seen,
            matches_found: stats.matches_found,
        }
    }
}

/// Response body for `GET /queries/{id}`.
#[derive(Debug, Serialize)]
pub struct QueryStatusResponse {
    pub query_id: u64,
    pub matches: Vec<MatchView>,
    pub progress: Option<ProgressView>,
    /// `null` while the query is running.
    pub outcome: Option<OutcomeView>,
}

/// `POST /queries`
///
/// Validates the query and starts it in the background. Invalid input is
/// rejected before any ledger request.
pub async fn start_query(
    State(state): State<SharedState>,
    Json(body): Json<StartQueryRequest>,
) -> Result<(StatusCode, Json<StartQueryResponse>), (StatusCode, String)> {
    let request = body.into_request().map_err(as_bad_request)?;
    let query = request
        .into_query(state.engine.config())
        .map_err(|e| as_bad_request(e.to_string()))?;
    let handle = state
        .engine
        .start_query(query)
        .map_err(|e| as_bad_request(e.to_string()))?;

    let id = state.track(handle).await;
    tracing::info!(query = %id, "query accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartQueryResponse { query_id: id.0 }),
    ))
}

/// `GET /queries/{id}`
///
/// Returns the matches collected so far, the latest progress snapshot, and
/// the outcome once the query has ended. Finished queries past the
/// retention limit are gone and answer 404.
pub async fn query_status(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<QueryStatusResponse>, (StatusCode, String)> {
    let queries = state.queries.lock().await;
    let entry = queries.get(&QueryId(id)).ok_or_else(|| not_found(id))?;

    Ok(Json(QueryStatusResponse {
        query_id: id,
        matches: entry.matches.clone(),
        progress: entry.progress.as_ref().map(ProgressView::from),
        outcome: entry.outcome.as_ref().map(OutcomeView::from),
    }))
}

/// `POST /queries/{id}/abort`
///
/// Idempotent; aborting a finished query is accepted and changes nothing.
pub async fn abort_query(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let queries = state.queries.lock().await;
    let entry = queries.get(&QueryId(id)).ok_or_else(|| not_found(id))?;
    entry.controller.abort();
    tracing::info!(query = id, "abort requested");
    Ok(StatusCode::ACCEPTED)
}

fn as_bad_request(msg: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg)
}

fn not_found(id: u64) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("unknown query {id}"))
}

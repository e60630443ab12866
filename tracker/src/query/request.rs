//! Query shape and validation.
//!
//! Internally a query has one of two starting points: a given block walked
//! in a chosen direction, or genesis walked forward. External callers speak
//! the legacy boundary shape ([`QueryRequest`]: a start hash, a direction
//! and a separate "from first block" flag), which is parsed into [`Query`]
//! and rejected when contradictory.

use crate::types::{BlockHash, Direction, InstanceId};

use super::config::QueryConfig;
use super::error::QueryError;

/// Where a query starts walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStart {
    /// Start at `hash` and walk in `direction`.
    Block {
        hash: BlockHash,
        direction: Direction,
    },
    /// Start at index 0 and walk forward.
    Genesis,
}

/// A validated-shape query, immutable for the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// Instance whose instructions are collected.
    pub target: InstanceId,
    /// Maximum number of matches to return.
    pub result_bound: usize,
    pub start: QueryStart,
}

impl Query {
    pub fn backward_from(target: InstanceId, result_bound: usize, hash: BlockHash) -> Self {
        Self {
            target,
            result_bound,
            start: QueryStart::Block {
                hash,
                direction: Direction::Backward,
            },
        }
    }

    pub fn forward_from(target: InstanceId, result_bound: usize, hash: BlockHash) -> Self {
        Self {
            target,
            result_bound,
            start: QueryStart::Block {
                hash,
                direction: Direction::Forward,
            },
        }
    }

    pub fn from_genesis(target: InstanceId, result_bound: usize) -> Self {
        Self {
            target,
            result_bound,
            start: QueryStart::Genesis,
        }
    }

    /// Direction the run walks in.
    pub fn direction(&self) -> Direction {
        match self.start {
            QueryStart::Block { direction, .. } => direction,
            QueryStart::Genesis => Direction::Forward,
        }
    }

    /// Checks the bound against `cfg`. Runs only start after this passes.
    pub fn validate(&self, cfg: &QueryConfig) -> Result<(), QueryError> {
        if self.result_bound == 0 {
            return Err(QueryError::InvalidQuery(
                "result bound must be positive".to_string(),
            ));
        }
        if self.result_bound > cfg.max_result_bound {
            return Err(QueryError::InvalidQuery(format!(
                "result bound {} exceeds maximum {}",
                self.result_bound, cfg.max_result_bound
            )));
        }
        Ok(())
    }
}

/// Query as received at the boundary (HTTP body, CLI flags).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    pub target: InstanceId,
    /// Signed so that non-positive input can be reported, not wrapped.
    pub result_bound: Option<i64>,
    pub start_block: Option<BlockHash>,
    /// Defaults to [`Direction::Backward`] for block starts.
    pub direction: Option<Direction>,
    /// Overrides `start_block`: walk forward from genesis.
    pub start_from_genesis: bool,
}

impl QueryRequest {
    /// Parses the boundary shape into a [`Query`] and validates it.
    pub fn into_query(self, cfg: &QueryConfig) -> Result<Query, QueryError> {
        let result_bound = match self.result_bound {
            None => cfg.default_result_bound,
            Some(bound) if bound <= 0 => {
                return Err(QueryError::InvalidQuery(format!(
                    "result bound must be positive, got {bound}"
                )));
            }
            Some(bound) => usize::try_from(bound).map_err(|_| {
                QueryError::InvalidQuery(format!("result bound {bound} is out of range"))
            })?,
        };

        let start = if self.start_from_genesis {
            if self.direction == Some(Direction::Backward) {
                return Err(QueryError::InvalidQuery(
                    "a query from the first block can only walk forward".to_string(),
                ));
            }
            QueryStart::Genesis
        } else {
            let hash = self.start_block.ok_or_else(|| {
                QueryError::InvalidQuery("a start block is required".to_string())
            })?;
            QueryStart::Block {
                hash,
                direction: self.direction.unwrap_or(Direction::Backward),
            }
        };

        let query = Query {
            target: self.target,
            result_bound,
            start,
        };
        query.validate(cfg)?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256};

    fn target() -> InstanceId {
        InstanceId(Hash256([1u8; HASH_LEN]))
    }

    fn start() -> BlockHash {
        BlockHash(Hash256([2u8; HASH_LEN]))
    }

    fn request() -> QueryRequest {
        QueryRequest {
            target: target(),
            result_bound: Some(5),
            start_block: Some(start()),
            direction: None,
            start_from_genesis: false,
        }
    }

    #[test]
    fn block_start_defaults_to_backward() {
        let query = request().into_query(&QueryConfig::default()).unwrap();
        assert_eq!(query, Query::backward_from(target(), 5, start()));
        assert_eq!(query.direction(), Direction::Backward);
    }

    #[test]
    fn genesis_flag_ignores_start_block_and_walks_forward() {
        let req = QueryRequest {
            start_from_genesis: true,
            direction: Some(Direction::Forward),
            ..request()
        };
        let query = req.into_query(&QueryConfig::default()).unwrap();
        assert_eq!(query.start, QueryStart::Genesis);
        assert_eq!(query.direction(), Direction::Forward);
    }

    #[test]
    fn contradictory_or_missing_inputs_are_rejected() {
        let cfg = QueryConfig::default();

        let backward_genesis = QueryRequest {
            start_from_genesis: true,
            direction: Some(Direction::Backward),
            ..request()
        };
        assert!(matches!(
            backward_genesis.into_query(&cfg),
            Err(QueryError::InvalidQuery(_))
        ));

        let no_start = QueryRequest {
            start_block: None,
            ..request()
        };
        assert!(no_start.into_query(&cfg).is_err());

        for bound in [0, -3] {
            let req = QueryRequest {
                result_bound: Some(bound),
                ..request()
            };
            assert!(req.into_query(&cfg).is_err());
        }

        let too_big = QueryRequest {
            result_bound: Some(cfg.max_result_bound as i64 + 1),
            ..request()
        };
        assert!(too_big.into_query(&cfg).is_err());
    }

    #[test]
    fn missing_bound_uses_configured_default() {
        let cfg = QueryConfig {
            default_result_bound: 50,
            ..QueryConfig::default()
        };
        let req = QueryRequest {
            result_bound: None,
            ..request()
        };
        assert_eq!(req.into_query(&cfg).unwrap().result_bound, 50);
    }
}

//! Reciprocal rank fusion over the vector and lexical branches.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use compass_domain::Predicate;
use compass_storage::index::{BranchHit, SearchIndex};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	Hybrid,
	VectorOnly,
	LexicalOnly,
}
impl SearchMode {
	pub fn select(has_vector: bool, has_text: bool) -> Result<Self> {
		match (has_vector, has_text) {
			(true, true) => Ok(Self::Hybrid),
			(true, false) => Ok(Self::VectorOnly),
			(false, true) => Ok(Self::LexicalOnly),
			(false, false) => Err(Error::InvalidQuery {
				message: "a query vector or query text is required.".to_string(),
			}),
		}
	}
}

/// One fused result before hydration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedHit {
	pub id: i64,
	pub score: f64,
	pub vector_rank: Option<u32>,
	pub lexical_rank: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct RankParams {
	/// Candidates requested from each branch.
	pub window: u32,
	pub rrf_k: u32,
	pub top: usize,
	pub timeout: Duration,
}
impl RankParams {
	pub fn from_config(cfg: &compass_config::Search, top: usize) -> Self {
		Self {
			window: cfg.fusion_window,
			rrf_k: cfg.rrf_k,
			top,
			timeout: Duration::from_millis(cfg.store_timeout_ms),
		}
	}
}

pub fn rrf_term(k: u32, rank: u32) -> f64 {
	1.0 / (f64::from(k) + f64::from(rank))
}

/// Sums `1 / (k + rank)` per id across both branches and keeps the best `top`.
///
/// Ties keep first-seen order: vector branch order, then lexical-only ids in lexical order. An id
/// listed twice within one branch keeps its first rank.
pub fn fuse(vector: &[BranchHit], lexical: &[BranchHit], k: u32, top: usize) -> Vec<RankedHit> {
	let mut fused: Vec<RankedHit> = Vec::with_capacity(vector.len() + lexical.len());
	let mut positions: HashMap<i64, usize> = HashMap::with_capacity(fused.capacity());

	for hit in vector {
		let pos = *positions.entry(hit.id).or_insert_with(|| {
			fused.push(RankedHit { id: hit.id, score: 0.0, vector_rank: None, lexical_rank: None });

			fused.len() - 1
		});
		let entry = &mut fused[pos];

		if entry.vector_rank.is_none() {
			entry.vector_rank = Some(hit.rank);
			entry.score += rrf_term(k, hit.rank);
		}
	}
	for hit in lexical {
		let pos = *positions.entry(hit.id).or_insert_with(|| {
			fused.push(RankedHit { id: hit.id, score: 0.0, vector_rank: None, lexical_rank: None });

			fused.len() - 1
		});
		let entry = &mut fused[pos];

		if entry.lexical_rank.is_none() {
			entry.lexical_rank = Some(hit.rank);
			entry.score += rrf_term(k, hit.rank);
		}
	}

	// Stable, so equal scores stay in first-seen order.
	fused.sort_by(|a, b| b.score.total_cmp(&a.score));
	fused.truncate(top);

	fused
}

/// Runs whichever branches have input and fuses them.
pub async fn rank(
	index: &dyn SearchIndex,
	vector: Option<&[f32]>,
	text: Option<&str>,
	predicate: &Predicate,
	params: &RankParams,
) -> Result<(SearchMode, Vec<RankedHit>)> {
	let mode = SearchMode::select(vector.is_some(), text.is_some())?;
	let hits = match (vector, text) {
		(Some(vector), Some(text)) => {
			let (vector_hits, lexical_hits) = tokio::try_join!(
				crate::store_call(
					"vector_ranks",
					params.timeout,
					index.vector_ranks(vector, predicate, params.window),
				),
				crate::store_call(
					"lexical_ranks",
					params.timeout,
					index.lexical_ranks(text, predicate, params.window),
				),
			)?;

			fuse(&vector_hits, &lexical_hits, params.rrf_k, params.top)
		},
		(Some(vector), None) => {
			let hits = crate::store_call(
				"vector_ranks",
				params.timeout,
				index.vector_ranks(vector, predicate, params.window),
			)
			.await?;

			single_branch(&hits, params.top, |hit| RankedHit {
				id: hit.id,
				score: rrf_term(params.rrf_k, hit.rank),
				vector_rank: Some(hit.rank),
				lexical_rank: None,
			})
		},
		(None, Some(text)) => {
			let hits = crate::store_call(
				"lexical_ranks",
				params.timeout,
				index.lexical_ranks(text, predicate, params.window),
			)
			.await?;

			single_branch(&hits, params.top, |hit| RankedHit {
				id: hit.id,
				score: rrf_term(params.rrf_k, hit.rank),
				vector_rank: None,
				lexical_rank: Some(hit.rank),
			})
		},
		(None, None) => Vec::new(),
	};

	tracing::debug!(?mode, hits = hits.len(), "Ranked candidates.");

	Ok((mode, hits))
}

/// Keeps the branch's own order; the score is that branch's fusion term alone.
fn single_branch<F>(hits: &[BranchHit], top: usize, to_ranked: F) -> Vec<RankedHit>
where
	F: Fn(&BranchHit) -> RankedHit,
{
	hits.iter().take(top).map(to_ranked).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hits(ids: &[i64]) -> Vec<BranchHit> {
		ids.iter()
			.enumerate()
			.map(|(idx, id)| BranchHit { id: *id, rank: idx as u32 + 1 })
			.collect()
	}

	#[test]
	fn ids_in_both_branches_outrank_single_branch_ids() {
		let fused = fuse(&hits(&[1, 2, 3]), &hits(&[3, 4, 1]), 60, 10);
		let ids = fused.iter().map(|hit| hit.id).collect::<Vec<_>>();

		assert_eq!(ids, vec![1, 3, 2, 4]);
		assert_eq!(fused[0].vector_rank, Some(1));
		assert_eq!(fused[0].lexical_rank, Some(3));
		assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
	}

	#[test]
	fn equal_scores_keep_vector_order_first() {
		let fused = fuse(&hits(&[7]), &hits(&[8]), 60, 10);

		assert_eq!(fused.iter().map(|hit| hit.id).collect::<Vec<_>>(), vec![7, 8]);
	}

	#[test]
	fn improving_a_rank_never_lowers_the_score() {
		let worse = fuse(&hits(&[1, 2, 3, 4]), &hits(&[9, 4]), 60, 10);
		let better = fuse(&hits(&[4, 1, 2, 3]), &hits(&[9, 4]), 60, 10);
		let score = |fused: &[RankedHit]| {
			fused.iter().find(|hit| hit.id == 4).map(|hit| hit.score).unwrap_or_default()
		};

		assert!(score(&better) > score(&worse));
	}

	#[test]
	fn duplicate_ids_within_a_branch_count_once() {
		let vector = vec![BranchHit { id: 5, rank: 1 }, BranchHit { id: 5, rank: 2 }];
		let fused = fuse(&vector, &[], 60, 10);

		assert_eq!(fused.len(), 1);
		assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
	}

	#[test]
	fn fusion_truncates_to_top() {
		assert_eq!(fuse(&hits(&[1, 2, 3]), &hits(&[4, 5, 6]), 60, 2).len(), 2);
	}

	#[test]
	fn modes_follow_available_inputs() {
		assert_eq!(SearchMode::select(true, true).expect("Hybrid."), SearchMode::Hybrid);
		assert_eq!(SearchMode::select(true, false).expect("Vector."), SearchMode::VectorOnly);
		assert_eq!(SearchMode::select(false, true).expect("Lexical."), SearchMode::LexicalOnly);
		assert!(matches!(SearchMode::select(false, false), Err(Error::InvalidQuery { .. })));
	}
}

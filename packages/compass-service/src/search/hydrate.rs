use std::{collections::HashMap, time::Duration};

use compass_domain::SearchableRecord;
use compass_storage::{index::CompanyStore, models::Company};

use crate::{Result, search::ranking::RankedHit};

/// Loads the companies behind `hits`, in hit order.
pub async fn hydrate(
	store: &dyn CompanyStore,
	hits: &[RankedHit],
	timeout: Duration,
) -> Result<Vec<(RankedHit, Company)>> {
	if hits.is_empty() {
		return Ok(Vec::new());
	}

	let ids = hits.iter().map(|hit| hit.id).collect::<Vec<_>>();
	let records = crate::store_call("fetch_by_ids", timeout, store.fetch_by_ids(&ids)).await?;

	Ok(restore_order(hits, records))
}

/// Pairs each hit with its record. Hits whose record is gone are dropped.
pub fn restore_order<R>(hits: &[RankedHit], records: Vec<R>) -> Vec<(RankedHit, R)>
where
	R: SearchableRecord,
{
	let mut by_id =
		records.into_iter().map(|record| (record.id(), record)).collect::<HashMap<_, _>>();
	let mut ordered = Vec::with_capacity(hits.len());

	for hit in hits {
		match by_id.remove(&hit.id) {
			Some(record) => ordered.push((*hit, record)),
			None => tracing::debug!(id = hit.id, "Ranked record disappeared before hydration."),
		}
	}

	ordered
}

//! Store seams used by the ranking pipeline.

use std::{future::Future, pin::Pin};

use compass_domain::Predicate;

use crate::{
	Result,
	db::Db,
	models::{Company, NewCompany},
	queries,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One id at its 1-based position in a single retrieval branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchHit {
	pub id: i64,
	pub rank: u32,
}

/// Answers the two ranking branches. Both branches must honor `predicate` and return at most
/// `limit` hits ordered by ascending rank.
pub trait SearchIndex
where
	Self: Send + Sync,
{
	fn vector_ranks<'a>(
		&'a self,
		vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>>;

	fn lexical_ranks<'a>(
		&'a self,
		text: &'a str,
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>>;

	/// Makes a freshly stored company searchable. A no-op for indexes that read the record table.
	fn index_company<'a>(
		&'a self,
		company: &'a Company,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<()>>;

	fn remove_company<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<()>>;
}

/// The system of record for companies.
pub trait CompanyStore
where
	Self: Send + Sync,
{
	fn insert<'a>(
		&'a self,
		company: &'a NewCompany,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<Company>>;

	/// Returns `false` when no company had this id.
	fn delete<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>>;

	fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Company>>>;

	/// Unordered; unknown ids are skipped.
	fn fetch_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Company>>>;
}

impl SearchIndex for Db {
	fn vector_ranks<'a>(
		&'a self,
		vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(queries::vector_ranks::<_, Company>(
			&self.pool,
			self.distance,
			vector,
			predicate,
			limit,
		))
	}

	fn lexical_ranks<'a>(
		&'a self,
		text: &'a str,
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(queries::lexical_ranks::<_, Company>(&self.pool, text, predicate, limit))
	}

	fn index_company<'a>(
		&'a self,
		_company: &'a Company,
		_embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}

	fn remove_company<'a>(&'a self, _id: i64) -> BoxFuture<'a, Result<()>> {
		Box::pin(async { Ok(()) })
	}
}

impl CompanyStore for Db {
	fn insert<'a>(
		&'a self,
		company: &'a NewCompany,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<Company>> {
		Box::pin(queries::insert_company(&self.pool, company, embedding))
	}

	fn delete<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		Box::pin(queries::delete_company(&self.pool, id))
	}

	fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Company>>> {
		Box::pin(queries::list_companies(&self.pool))
	}

	fn fetch_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Company>>> {
		Box::pin(queries::fetch_by_ids::<_, Company>(&self.pool, ids))
	}
}

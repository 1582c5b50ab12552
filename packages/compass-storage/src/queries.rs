use sqlx::{FromRow, PgExecutor, Postgres, QueryBuilder, postgres::PgRow};

use compass_domain::{Predicate, SearchableRecord};

use crate::{
	Result,
	db::Distance,
	index::BranchHit,
	models::{Company, NewCompany},
	predicate,
};

const COMPANY_COLUMNS: &str =
	"id, name, description, industry, size, location, tags, content, created_at";

pub async fn insert_company<'e, E>(
	executor: E,
	company: &NewCompany,
	embedding: Option<&[f32]>,
) -> Result<Company>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
INSERT INTO companies (name, description, industry, size, location, tags, content, embedding)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8::text::vector)
RETURNING {COMPANY_COLUMNS}"
	);
	let row = sqlx::query_as::<_, Company>(&sql)
		.bind(&company.name)
		.bind(&company.description)
		.bind(&company.industry)
		.bind(&company.size)
		.bind(&company.location)
		.bind(&company.tags)
		.bind(company.render_content())
		.bind(embedding.map(crate::vector_to_pg))
		.fetch_one(executor)
		.await?;

	Ok(row)
}

pub async fn delete_company<'e, E>(executor: E, id: i64) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result =
		sqlx::query("DELETE FROM companies WHERE id = $1").bind(id).execute(executor).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn list_companies<'e, E>(executor: E) -> Result<Vec<Company>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY id ASC");
	let rows = sqlx::query_as::<_, Company>(&sql).fetch_all(executor).await?;

	Ok(rows)
}

/// Loads the records for `ids` in no particular order. Unknown ids are skipped.
pub async fn fetch_by_ids<'e, E, R>(executor: E, ids: &[i64]) -> Result<Vec<R>>
where
	E: PgExecutor<'e>,
	R: SearchableRecord + for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, R>(R::HYDRATE_SQL).bind(ids).fetch_all(executor).await?;

	Ok(rows)
}

/// Ranks records with a non-null embedding by ascending distance to `vector`.
///
/// The nearest `limit` rows are selected first with `ORDER BY distance LIMIT`, which the HNSW index
/// can serve, and only that set is ranked.
pub async fn vector_ranks<'e, E, R>(
	executor: E,
	distance: Distance,
	vector: &[f32],
	predicate: &Predicate,
	limit: u32,
) -> Result<Vec<BranchHit>>
where
	E: PgExecutor<'e>,
	R: SearchableRecord,
{
	let mut builder = QueryBuilder::<Postgres>::new(
		"SELECT id, RANK() OVER (ORDER BY distance) AS rank FROM (SELECT ",
	);

	builder
		.push(R::ID_FIELD)
		.push(" AS id, ")
		.push(R::EMBEDDING_FIELD)
		.push(" ")
		.push(distance.operator())
		.push(" ")
		.push_bind(crate::vector_to_pg(vector))
		.push("::text::vector AS distance FROM ")
		.push(R::TABLE)
		.push(" WHERE ")
		.push(R::EMBEDDING_FIELD)
		.push(" IS NOT NULL");

	predicate::push_sql(&mut builder, predicate);

	builder
		.push(" ORDER BY distance ASC LIMIT ")
		.push_bind(i64::from(limit))
		.push(") AS nearest ORDER BY rank ASC, id ASC");

	fetch_hits(executor, builder).await
}

/// Ranks records whose text field matches `text` under English full-text search.
pub async fn lexical_ranks<'e, E, R>(
	executor: E,
	text: &str,
	predicate: &Predicate,
	limit: u32,
) -> Result<Vec<BranchHit>>
where
	E: PgExecutor<'e>,
	R: SearchableRecord,
{
	let mut builder = QueryBuilder::<Postgres>::new("SELECT ");

	builder
		.push(R::ID_FIELD)
		.push(" AS id, RANK() OVER (ORDER BY ts_rank_cd(to_tsvector('english', ")
		.push(R::TEXT_FIELD)
		.push("), tsq) DESC) AS rank FROM ")
		.push(R::TABLE)
		.push(", plainto_tsquery('english', ")
		.push_bind(text.to_string())
		.push(") AS tsq WHERE to_tsvector('english', ")
		.push(R::TEXT_FIELD)
		.push(") @@ tsq");

	predicate::push_sql(&mut builder, predicate);

	builder.push(" ORDER BY rank ASC, id ASC LIMIT ").push_bind(i64::from(limit));

	fetch_hits(executor, builder).await
}

async fn fetch_hits<'e, E>(
	executor: E,
	mut builder: QueryBuilder<'_, Postgres>,
) -> Result<Vec<BranchHit>>
where
	E: PgExecutor<'e>,
{
	let rows: Vec<(i64, i64)> = builder.build_query_as().fetch_all(executor).await?;

	Ok(rows.into_iter().map(|(id, rank)| BranchHit { id, rank: rank as u32 }).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_to_pg_renders_literal() {
		assert_eq!(crate::vector_to_pg(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
		assert_eq!(crate::vector_to_pg(&[]), "[]");
	}

	#[test]
	fn company_columns_match_hydrate_sql() {
		for column in COMPANY_COLUMNS.split(", ") {
			assert!(Company::HYDRATE_SQL.contains(column), "{column} missing from hydrate SQL.");
		}
	}
}

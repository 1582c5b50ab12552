use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Error, Result, schema};

const SCHEMA_LOCK_ID: i64 = 4_102_017;

/// Vector distance metric used by the vector branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
	Cosine,
	L2,
	InnerProduct,
}
impl Distance {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw {
			"cosine" => Ok(Self::Cosine),
			"l2" => Ok(Self::L2),
			"inner_product" => Ok(Self::InnerProduct),
			other => Err(Error::InvalidArgument(format!("unknown distance metric '{other}'"))),
		}
	}

	/// pgvector operator. Smaller is closer for all three.
	pub fn operator(&self) -> &'static str {
		match self {
			Self::Cosine => "<=>",
			Self::L2 => "<->",
			Self::InnerProduct => "<#>",
		}
	}

	pub fn index_ops(&self) -> &'static str {
		match self {
			Self::Cosine => "vector_cosine_ops",
			Self::L2 => "vector_l2_ops",
			Self::InnerProduct => "vector_ip_ops",
		}
	}
}

pub struct Db {
	pub pool: PgPool,
	pub distance: Distance,
}
impl Db {
	pub async fn connect(cfg: &compass_config::Postgres) -> Result<Self> {
		let distance = Distance::parse(&cfg.distance)?;
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool, distance })
	}

	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim, self.distance);
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distance_maps_to_pgvector_operators() {
		assert_eq!(Distance::parse("cosine").map(|d| d.operator()).ok(), Some("<=>"));
		assert_eq!(Distance::parse("l2").map(|d| d.operator()).ok(), Some("<->"));
		assert_eq!(Distance::parse("inner_product").map(|d| d.operator()).ok(), Some("<#>"));
		assert!(Distance::parse("hamming").is_err());
	}
}

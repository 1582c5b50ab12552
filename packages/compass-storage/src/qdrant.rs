pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Document, Filter,
		Modifier, PointStruct, Query, QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpsertPointsBuilder, Vector, VectorParamsBuilder,
		VectorsConfigBuilder, point_id::PointIdOptions,
	},
};
use serde_json::Value;

use compass_domain::Predicate;

use crate::{
	Error, Result,
	index::{BoxFuture, BranchHit, SearchIndex},
	models::Company,
	predicate,
};

/// Company points keyed by company id, with a dense vector and a BM25 sparse vector per point.
pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &compass_config::Qdrant, vector_dim: u32) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).api_key(cfg.api_key.clone()).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim })
	}

	/// Creates the collection with cosine dense vectors and IDF-weighted BM25 when it is missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
		);

		let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

		sparse_vectors_config.add_named_vector_params(
			BM25_VECTOR_NAME,
			SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
		);

		let builder = CreateCollectionBuilder::new(self.collection.clone())
			.vectors_config(vectors_config)
			.sparse_vectors_config(sparse_vectors_config);

		self.client.create_collection(builder).await?;

		tracing::info!(collection = %self.collection, "Created Qdrant collection.");

		Ok(())
	}

	/// Companies without an embedding get only the BM25 vector, so the lexical branch still finds
	/// them and the dense branch never does.
	pub async fn upsert_company(&self, company: &Company, embedding: Option<&[f32]>) -> Result<()> {
		let vectors = point_vectors(company, embedding, self.vector_dim)?;
		let mut payload = Payload::new();

		payload.insert("id", Value::from(company.id));
		payload.insert("name", company.name.clone());
		payload.insert("description", company.description.clone());
		payload.insert("industry", company.industry.clone());
		payload.insert("size", company.size.clone());
		payload.insert("location", company.location.clone());
		payload.insert("tags", Value::from(company.tags.clone()));
		payload.insert("content", company.content.clone());

		let point = PointStruct::new(company.id as u64, vectors, payload);
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn delete_company(&self, id: i64) -> Result<()> {
		let filter = Filter::must([Condition::matches("id", id)]);
		let delete = DeletePointsBuilder::new(self.collection.clone()).points(filter).wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}

	async fn ranked_query(
		&self,
		query: Query,
		using: &str,
		predicate: &Predicate,
		limit: u32,
	) -> Result<Vec<BranchHit>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(query)
			.using(using)
			.with_payload(false)
			.limit(u64::from(limit));

		if let Some(filter) = predicate::to_qdrant_filter(predicate)? {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(collect_hits(&response.result))
	}
}

impl SearchIndex for QdrantStore {
	fn vector_ranks<'a>(
		&'a self,
		vector: &'a [f32],
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(async move {
			let query = Query::new_nearest(vector.to_vec());

			self.ranked_query(query, DENSE_VECTOR_NAME, predicate, limit).await
		})
	}

	fn lexical_ranks<'a>(
		&'a self,
		text: &'a str,
		predicate: &'a Predicate,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<BranchHit>>> {
		Box::pin(async move {
			let query = Query::new_nearest(Document::new(text.to_string(), BM25_MODEL));

			self.ranked_query(query, BM25_VECTOR_NAME, predicate, limit).await
		})
	}

	fn index_company<'a>(
		&'a self,
		company: &'a Company,
		embedding: Option<&'a [f32]>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_company(company, embedding))
	}

	fn remove_company<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_company(id))
	}
}

fn point_vectors(
	company: &Company,
	embedding: Option<&[f32]>,
	vector_dim: u32,
) -> Result<HashMap<String, Vector>> {
	let mut vectors = HashMap::new();

	vectors.insert(
		BM25_VECTOR_NAME.to_string(),
		Vector::from(Document::new(company.content.clone(), BM25_MODEL)),
	);

	if let Some(embedding) = embedding {
		if embedding.len() != vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"embedding has {} dimensions, collection expects {vector_dim}",
				embedding.len(),
			)));
		}

		vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(embedding.to_vec()));
	}

	Ok(vectors)
}

fn collect_hits(points: &[ScoredPoint]) -> Vec<BranchHit> {
	let mut hits = Vec::with_capacity(points.len());

	for point in points {
		let id = match point.id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
			Some(PointIdOptions::Num(num)) => *num as i64,
			other => {
				tracing::warn!(point_id = ?other, "Qdrant point has a non-numeric id.");

				continue;
			},
		};

		hits.push(BranchHit { id, rank: hits.len() as u32 + 1 });
	}

	hits
}

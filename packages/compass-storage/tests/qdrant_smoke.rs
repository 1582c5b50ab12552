use serde_json::json;

use compass_config::{Postgres, Qdrant};
use compass_domain::{FilterSpec, Predicate, filter};
use compass_storage::{
	Error,
	db::Db,
	index::{CompanyStore, SearchIndex},
	models::{Company, NewCompany},
	qdrant::QdrantStore,
};

const DIM: u32 = 3;

fn company(name: &str, description: &str, industry: &str, tags: &[&str]) -> NewCompany {
	NewCompany {
		name: name.to_string(),
		description: description.to_string(),
		industry: industry.to_string(),
		size: "51-200".to_string(),
		location: "Oslo".to_string(),
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
	}
}

fn test_env() -> Option<(String, String)> {
	let Some(base_dsn) = compass_testkit::env_dsn() else {
		eprintln!("Skipping Qdrant tests; set COMPASS_PG_DSN to run them.");

		return None;
	};
	let Some(qdrant_url) = compass_testkit::env_qdrant_url() else {
		eprintln!("Skipping Qdrant tests; set COMPASS_QDRANT_URL to run them.");

		return None;
	};

	Some((base_dsn, qdrant_url))
}

async fn index_fixture(dsn: String, qdrant_url: String, collection: String) {
	let db = Db::connect(&Postgres { dsn, pool_max_conns: 2, distance: "cosine".to_string() })
		.await
		.expect("Failed to connect to Postgres.");

	db.ensure_schema(DIM).await.expect("Failed to ensure schema.");

	let store = QdrantStore::new(&Qdrant { url: qdrant_url, collection, api_key: None }, DIM)
		.expect("Failed to build Qdrant client.");

	store.ensure_collection().await.expect("Failed to create collection.");
	store.ensure_collection().await.expect("Existing collection must be kept.");

	let rows: [(NewCompany, Option<[f32; 3]>); 3] = [
		(
			company("Acme", "AI software for logistics.", "Technology", &["ai"]),
			Some([1.0, 0.0, 0.0]),
		),
		(company("Borealis", "Banking platform.", "Finance", &["banking"]), Some([0.0, 1.0, 0.0])),
		(company("Cobalt", "Robotics hardware for warehouses.", "Technology", &["robotics"]), None),
	];
	let mut stored = Vec::new();

	// Cobalt is stored without an embedding, as after a degraded add.
	for (new_company, embedding) in &rows {
		let embedding = embedding.as_ref().map(|vector| vector.as_slice());
		let row = db.insert(new_company, embedding).await.expect("Failed to insert company.");

		store.index_company(&row, embedding).await.expect("Failed to index company.");
		stored.push(row);
	}

	let [acme, borealis, cobalt] = [&stored[0], &stored[1], &stored[2]];
	let dense = store
		.vector_ranks(&[0.9, 0.1, 0.0], &Predicate::all(), 10)
		.await
		.expect("Vector ranks failed.")
		.iter()
		.map(|hit| hit.id)
		.collect::<Vec<_>>();

	assert_eq!(dense, vec![acme.id, borealis.id]);

	let lexical = store
		.lexical_ranks("robotics warehouses", &Predicate::all(), 10)
		.await
		.expect("Lexical ranks failed.");

	assert_eq!(lexical[0].id, cobalt.id);
	assert_eq!(lexical[0].rank, 1);

	let technology_ai = filter::build::<Company>(&[
		FilterSpec::new("industry", "=", json!("Technology")),
		FilterSpec::new("tags", "&&", json!(["ai", "banking"])),
	])
	.expect("Filters must build.");
	let filtered = store
		.vector_ranks(&[0.0, 1.0, 0.0], &technology_ai, 10)
		.await
		.expect("Filtered vector ranks failed.");

	assert_eq!(filtered.iter().map(|hit| hit.id).collect::<Vec<_>>(), vec![acme.id]);

	let text_range = filter::build::<Company>(&[FilterSpec::new("name", ">", json!("B"))])
		.expect("Filters must build.");
	let err = store
		.lexical_ranks("software", &text_range, 10)
		.await
		.expect_err("Expected unsupported text range.");

	assert!(matches!(err, Error::UnsupportedFilter(_)), "Unexpected error: {err}.");

	store.remove_company(cobalt.id).await.expect("Failed to remove company.");

	let lexical = store
		.lexical_ranks("robotics warehouses", &Predicate::all(), 10)
		.await
		.expect("Lexical ranks failed.");

	assert!(lexical.iter().all(|hit| hit.id != cobalt.id));
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set COMPASS_PG_DSN and COMPASS_QDRANT_URL to run."]
async fn unembedded_companies_stay_lexically_searchable_in_qdrant() {
	let Some((base_dsn, qdrant_url)) = test_env() else {
		return;
	};

	compass_testkit::with_test_db(&base_dsn, |test_db| {
		let dsn = test_db.dsn().to_string();
		let collection = test_db.collection_name("compass_companies");

		async move {
			index_fixture(dsn, qdrant_url, collection).await;

			Ok(())
		}
	})
	.await
	.expect("Failed to run against the test database.");
}

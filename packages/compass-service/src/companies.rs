use serde::{Deserialize, Serialize};

use compass_storage::models::{Company, NewCompany};

use crate::{CompassService, Error, Result, ResultSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCompanyResponse {
	pub id: i64,
	/// False when the company was stored without an embedding and is only lexically searchable.
	pub embedded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCompanyResponse {
	pub id: i64,
	pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
	pub loaded: usize,
	pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyListResponse {
	pub items: Vec<Company>,
	pub source: ResultSource,
}

impl CompassService {
	/// Embeds and stores a company, then drops every cached listing and search result.
	pub async fn add_company(&self, company: NewCompany) -> Result<AddCompanyResponse> {
		validate_new_company(&company)?;

		let embedding = match self.embed(&company.render_content()).await {
			Ok(embedding) => Some(embedding),
			Err(err @ Error::Embedding { .. }) if self.cfg.search.degrade_to_lexical => {
				tracing::warn!(
					company = %company.name,
					error = %err,
					"Storing company without an embedding."
				);

				None
			},
			Err(err) => return Err(err),
		};
		let stored = self.store_company(&company, embedding.as_deref()).await;

		self.cache.invalidate_mutations().await;

		let id = stored?;

		tracing::info!(company_id = id, embedded = embedding.is_some(), "Company added.");

		Ok(AddCompanyResponse { id, embedded: embedding.is_some() })
	}

	/// Stores a batch of companies and invalidates the caches once at the end.
	///
	/// Records that fail validation or that no embedding provider could embed are skipped. A store
	/// failure aborts the import; companies stored before it stay stored.
	pub async fn import_companies(&self, companies: Vec<NewCompany>) -> Result<ImportReport> {
		let mut report = ImportReport::default();
		let mut outcome = Ok(());

		for company in companies {
			if let Err(err) = validate_new_company(&company) {
				tracing::warn!(company = %company.name, error = %err, "Skipping invalid company.");

				report.skipped += 1;

				continue;
			}

			let embedding = match self.embed(&company.render_content()).await {
				Ok(embedding) => embedding,
				Err(err @ (Error::Embedding { .. } | Error::InvalidQuery { .. })) => {
					tracing::warn!(
						company = %company.name,
						error = %err,
						"Skipping company without an embedding."
					);

					report.skipped += 1;

					continue;
				},
				Err(err) => {
					outcome = Err(err);

					break;
				},
			};

			match self.store_company(&company, Some(&embedding)).await {
				Ok(_) => report.loaded += 1,
				Err(err) => {
					outcome = Err(err);

					break;
				},
			}
		}

		if report.loaded > 0 {
			self.cache.invalidate_mutations().await;
		}

		outcome?;

		tracing::info!(loaded = report.loaded, skipped = report.skipped, "Import finished.");

		Ok(report)
	}

	/// Inserts the row and mirrors it into the active search backend.
	///
	/// When indexing fails the row is deleted again, so a retried add cannot leave an unindexed
	/// duplicate behind.
	async fn store_company(&self, company: &NewCompany, embedding: Option<&[f32]>) -> Result<i64> {
		let timeout = self.store_timeout();
		let stored =
			crate::store_call("insert_company", timeout, self.companies.insert(company, embedding))
				.await?;
		let indexing = self.index.index_company(&stored, embedding);

		if let Err(err) = crate::store_call("index_company", timeout, indexing).await {
			let rollback = self.companies.delete(stored.id);

			if let Err(rollback_err) = crate::store_call("remove_row", timeout, rollback).await {
				tracing::warn!(
					company_id = stored.id,
					error = %rollback_err,
					"Failed to remove a company that could not be indexed."
				);
			}

			return Err(err);
		}

		Ok(stored.id)
	}

	pub async fn delete_company(&self, id: i64) -> Result<DeleteCompanyResponse> {
		let timeout = self.store_timeout();
		let deleted =
			crate::store_call("delete_company", timeout, self.companies.delete(id)).await?;

		if !deleted {
			return Err(Error::NotFound { message: format!("company {id} does not exist.") });
		}

		let removed =
			crate::store_call("remove_company", timeout, self.index.remove_company(id)).await;

		self.cache.invalidate_mutations().await;

		removed?;

		tracing::info!(company_id = id, "Company deleted.");

		Ok(DeleteCompanyResponse { id, deleted })
	}

	/// Every company in id order.
	pub async fn list_companies(&self) -> Result<CompanyListResponse> {
		let key = self.cache.list_key();
		let (items, source) = self
			.cache
			.get_or_compute(&key, || {
				crate::store_call("list_companies", self.store_timeout(), self.companies.list())
			})
			.await?;

		Ok(CompanyListResponse { items, source })
	}
}

fn validate_new_company(company: &NewCompany) -> Result<()> {
	let fields = [
		("name", &company.name),
		("description", &company.description),
		("industry", &company.industry),
		("size", &company.size),
		("location", &company.location),
	];

	for (field, value) in fields {
		if value.trim().is_empty() {
			return Err(Error::InvalidRequest { message: format!("{field} must be non-empty.") });
		}
	}
	if company.tags.iter().any(|tag| tag.trim().is_empty()) {
		return Err(Error::InvalidRequest { message: "tags must not contain blanks.".to_string() });
	}

	Ok(())
}

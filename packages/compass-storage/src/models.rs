use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use compass_domain::{FieldDef, FieldKind, FieldValue, SearchableRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
	pub id: i64,
	pub name: String,
	pub description: String,
	pub industry: String,
	pub size: String,
	pub location: String,
	pub tags: Vec<String>,
	pub content: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl SearchableRecord for Company {
	const EMBEDDING_FIELD: &'static str = "embedding";
	const FIELDS: &'static [FieldDef] = &[
		FieldDef { name: "id", kind: FieldKind::Integer },
		FieldDef { name: "name", kind: FieldKind::Text },
		FieldDef { name: "industry", kind: FieldKind::Text },
		FieldDef { name: "size", kind: FieldKind::Text },
		FieldDef { name: "location", kind: FieldKind::Text },
		FieldDef { name: "tags", kind: FieldKind::TextArray },
	];
	const HYDRATE_SQL: &'static str = "\
SELECT id, name, description, industry, size, location, tags, content, created_at
FROM companies
WHERE id = ANY($1)";
	const ID_FIELD: &'static str = "id";
	const TABLE: &'static str = "companies";
	const TEXT_FIELD: &'static str = "content";

	fn id(&self) -> i64 {
		self.id
	}

	fn field_value(&self, name: &str) -> Option<FieldValue<'_>> {
		let value = match name {
			"id" => FieldValue::Integer(self.id),
			"name" => FieldValue::Text(&self.name),
			"industry" => FieldValue::Text(&self.industry),
			"size" => FieldValue::Text(&self.size),
			"location" => FieldValue::Text(&self.location),
			"tags" => FieldValue::TextArray(&self.tags),
			_ => return None,
		};

		Some(value)
	}
}

/// A company as submitted by a caller, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
	pub name: String,
	pub description: String,
	pub industry: String,
	pub size: String,
	pub location: String,
	#[serde(default)]
	pub tags: Vec<String>,
}
impl NewCompany {
	/// Text indexed by the lexical branch and sent to embedding providers.
	pub fn render_content(&self) -> String {
		format!(
			"Company: {}\nDescription: {}\nIndustry: {}\nSize: {}\nLocation: {}",
			self.name, self.description, self.industry, self.size, self.location
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn content_lists_every_descriptive_field() {
		let company = NewCompany {
			name: "Acme".to_string(),
			description: "Rockets".to_string(),
			industry: "Aerospace".to_string(),
			size: "51-200".to_string(),
			location: "San Francisco".to_string(),
			tags: Vec::new(),
		};

		assert_eq!(
			company.render_content(),
			"Company: Acme\nDescription: Rockets\nIndustry: Aerospace\nSize: 51-200\nLocation: San Francisco"
		);
	}

	#[test]
	fn every_allowlisted_field_is_readable() {
		let company = Company {
			id: 7,
			name: "Acme".to_string(),
			description: String::new(),
			industry: "Aerospace".to_string(),
			size: "51-200".to_string(),
			location: "San Francisco".to_string(),
			tags: vec!["space".to_string()],
			content: String::new(),
			created_at: OffsetDateTime::UNIX_EPOCH,
		};

		for field in Company::FIELDS {
			assert!(company.field_value(field.name).is_some(), "{} is not readable.", field.name);
		}

		assert!(company.field_value("description").is_none());
	}
}

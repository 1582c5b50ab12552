/// Storage type of a filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Text,
	Integer,
	TextArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
	/// Name accepted in filter specs. Always identical to the column name.
	pub name: &'static str,
	pub kind: FieldKind,
}

/// A borrowed view of one field of a record, used for in-memory predicate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
	Null,
	Text(&'a str),
	Integer(i64),
	TextArray(&'a [String]),
}

/// A record type that can be ranked by the hybrid search pipeline.
///
/// The associated constants describe where the record lives and which of its fields callers may
/// filter on. Field and table names are only ever taken from these constants when SQL is rendered,
/// so they must be static identifiers and never user input.
pub trait SearchableRecord {
	const TABLE: &'static str;
	const ID_FIELD: &'static str;
	/// Column fed to the lexical branch.
	const TEXT_FIELD: &'static str;
	/// Nullable vector column fed to the vector branch.
	const EMBEDDING_FIELD: &'static str;
	/// Filter allow-list.
	const FIELDS: &'static [FieldDef];
	/// Query returning full records for the ids bound as `$1` (a `bigint[]`). Order does not
	/// matter; callers restore the requested order. Types with sub-entities join them here.
	const HYDRATE_SQL: &'static str;

	fn id(&self) -> i64;

	/// Returns `None` when `name` is not in [`Self::FIELDS`].
	fn field_value(&self, name: &str) -> Option<FieldValue<'_>>;

	fn field(name: &str) -> Option<&'static FieldDef> {
		Self::FIELDS.iter().find(|field| field.name == name)
	}
}

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{FieldDef, FieldKind, FieldValue, SearchableRecord};

const MAX_FILTERS: usize = 32;
const MAX_LIST_ITEMS: usize = 128;
const MAX_STRING_BYTES: usize = 512;

/// A caller-supplied filter condition, validated by [`build`] before it reaches any store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
	pub field: String,
	pub operator: String,
	pub value: Value,
}
impl FilterSpec {
	pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
		Self { field: field.into(), operator: operator.into(), value }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("filters[{index}]: {message}")]
pub struct FilterError {
	pub index: usize,
	pub message: String,
}
impl FilterError {
	fn new(index: usize, message: impl Into<String>) -> Self {
		Self { index, message: message.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
	Eq,
	Neq,
	Lt,
	Gt,
	Lte,
	Gte,
	In,
	Overlaps,
}
impl FilterOperator {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"=" | "==" => Some(Self::Eq),
			"!=" | "<>" => Some(Self::Neq),
			"<" => Some(Self::Lt),
			">" => Some(Self::Gt),
			"<=" => Some(Self::Lte),
			">=" => Some(Self::Gte),
			"in" => Some(Self::In),
			"&&" => Some(Self::Overlaps),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Eq => "=",
			Self::Neq => "!=",
			Self::Lt => "<",
			Self::Gt => ">",
			Self::Lte => "<=",
			Self::Gte => ">=",
			Self::In => "IN",
			Self::Overlaps => "&&",
		}
	}

	fn compare_op(self) -> Option<CompareOp> {
		match self {
			Self::Eq => Some(CompareOp::Eq),
			Self::Neq => Some(CompareOp::Neq),
			Self::Lt => Some(CompareOp::Lt),
			Self::Gt => Some(CompareOp::Gt),
			Self::Lte => Some(CompareOp::Lte),
			Self::Gte => Some(CompareOp::Gte),
			Self::In | Self::Overlaps => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Neq,
	Lt,
	Gt,
	Lte,
	Gte,
}
impl CompareOp {
	/// SQL spelling of the operator.
	pub fn as_sql(&self) -> &'static str {
		match self {
			Self::Eq => "=",
			Self::Neq => "<>",
			Self::Lt => "<",
			Self::Gt => ">",
			Self::Lte => "<=",
			Self::Gte => ">=",
		}
	}

	fn holds(&self, ordering: Ordering) -> bool {
		match self {
			Self::Eq => ordering == Ordering::Equal,
			Self::Neq => ordering != Ordering::Equal,
			Self::Lt => ordering == Ordering::Less,
			Self::Gt => ordering == Ordering::Greater,
			Self::Lte => ordering != Ordering::Greater,
			Self::Gte => ordering != Ordering::Less,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
	Text(String),
	Integer(i64),
}
impl Scalar {
	fn compare(&self, value: FieldValue<'_>) -> Option<Ordering> {
		match (value, self) {
			(FieldValue::Text(actual), Self::Text(expected)) => Some(actual.cmp(expected.as_str())),
			(FieldValue::Integer(actual), Self::Integer(expected)) => Some(actual.cmp(expected)),
			_ => None,
		}
	}
}

/// One validated condition. Field definitions always come from a record's allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
	Compare { field: &'static FieldDef, op: CompareOp, value: Scalar },
	In { field: &'static FieldDef, values: Vec<Scalar> },
	Overlaps { field: &'static FieldDef, values: Vec<String> },
}
impl Clause {
	pub fn field(&self) -> &'static FieldDef {
		match self {
			Self::Compare { field, .. } | Self::In { field, .. } | Self::Overlaps { field, .. } =>
				field,
		}
	}

	/// Null fields never match, mirroring SQL three-valued logic.
	pub fn matches(&self, value: FieldValue<'_>) -> bool {
		match self {
			Self::Compare { op, value: expected, .. } =>
				expected.compare(value).map(|ordering| op.holds(ordering)).unwrap_or(false),
			Self::In { values, .. } =>
				values.iter().any(|expected| expected.compare(value) == Some(Ordering::Equal)),
			Self::Overlaps { values, .. } => match value {
				FieldValue::TextArray(actual) => actual.iter().any(|item| values.contains(item)),
				_ => false,
			},
		}
	}
}

/// A conjunction of validated clauses. The empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
	clauses: Vec<Clause>,
}
impl Predicate {
	pub fn all() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.clauses.is_empty()
	}

	pub fn clauses(&self) -> &[Clause] {
		&self.clauses
	}

	pub fn evaluate<R>(&self, record: &R) -> bool
	where
		R: SearchableRecord,
	{
		self.clauses.iter().all(|clause| {
			let value = record.field_value(clause.field().name);

			value.map(|value| clause.matches(value)).unwrap_or(false)
		})
	}
}

/// Validates `specs` against the allow-list of `R` and conjoins them.
///
/// Any unknown field, unknown operator, or value that does not fit the field kind fails the whole
/// build. Nothing is ever passed through unvalidated.
pub fn build<R>(specs: &[FilterSpec]) -> Result<Predicate, FilterError>
where
	R: SearchableRecord,
{
	if specs.len() > MAX_FILTERS {
		return Err(FilterError::new(
			MAX_FILTERS,
			format!("at most {MAX_FILTERS} filters are allowed."),
		));
	}

	let mut clauses = Vec::with_capacity(specs.len());

	for (index, spec) in specs.iter().enumerate() {
		clauses.push(build_clause::<R>(index, spec)?);
	}

	Ok(Predicate { clauses })
}

fn build_clause<R>(index: usize, spec: &FilterSpec) -> Result<Clause, FilterError>
where
	R: SearchableRecord,
{
	let name = spec.field.trim().to_ascii_lowercase();
	let Some(field) = R::field(&name) else {
		let allowed = R::FIELDS.iter().map(|field| field.name).collect::<Vec<_>>().join(", ");

		return Err(FilterError::new(
			index,
			format!("field '{name}' is not in allowlist: {allowed}."),
		));
	};
	let Some(operator) = FilterOperator::parse(&spec.operator) else {
		return Err(FilterError::new(
			index,
			format!("operator '{}' is not supported.", spec.operator.trim()),
		));
	};

	match (field.kind, operator) {
		(FieldKind::Text | FieldKind::Integer, FilterOperator::In) => {
			let values = parse_list(index, field, &spec.value)?
				.iter()
				.map(|item| parse_scalar(index, field, item))
				.collect::<Result<Vec<_>, _>>()?;

			Ok(Clause::In { field, values })
		},
		(FieldKind::Text | FieldKind::Integer, op) => match op.compare_op() {
			Some(op) => {
				let value = parse_scalar(index, field, &spec.value)?;

				Ok(Clause::Compare { field, op, value })
			},
			None => Err(unsupported(index, field, operator)),
		},
		(FieldKind::TextArray, FilterOperator::Overlaps) => {
			let values = parse_list(index, field, &spec.value)?
				.iter()
				.map(|item| match parse_scalar(index, field, item)? {
					Scalar::Text(text) => Ok(text),
					Scalar::Integer(_) => Err(FilterError::new(
						index,
						format!("field '{}' only accepts string items.", field.name),
					)),
				})
				.collect::<Result<Vec<_>, _>>()?;

			Ok(Clause::Overlaps { field, values })
		},
		(FieldKind::TextArray, _) => Err(unsupported(index, field, operator)),
	}
}

fn unsupported(index: usize, field: &FieldDef, operator: FilterOperator) -> FilterError {
	FilterError::new(
		index,
		format!("operator '{}' is not supported for field '{}'.", operator.as_str(), field.name),
	)
}

fn parse_list<'a>(
	index: usize,
	field: &FieldDef,
	value: &'a Value,
) -> Result<&'a Vec<Value>, FilterError> {
	let Some(items) = value.as_array() else {
		return Err(FilterError::new(
			index,
			format!("field '{}' requires a list value for this operator.", field.name),
		));
	};

	if items.is_empty() {
		return Err(FilterError::new(index, "list value must be non-empty."));
	}
	if items.len() > MAX_LIST_ITEMS {
		return Err(FilterError::new(
			index,
			format!("list value must have at most {MAX_LIST_ITEMS} items."),
		));
	}

	Ok(items)
}

fn parse_scalar(index: usize, field: &FieldDef, value: &Value) -> Result<Scalar, FilterError> {
	match (field.kind, value) {
		(FieldKind::Text | FieldKind::TextArray, Value::String(text)) => {
			if text.len() > MAX_STRING_BYTES {
				return Err(FilterError::new(
					index,
					format!("string value must be at most {MAX_STRING_BYTES} bytes."),
				));
			}

			Ok(Scalar::Text(text.clone()))
		},
		(FieldKind::Integer, _) => value.as_i64().map(Scalar::Integer).ok_or_else(|| {
			FilterError::new(index, format!("field '{}' requires an integer value.", field.name))
		}),
		(FieldKind::Text | FieldKind::TextArray, _) => Err(FilterError::new(
			index,
			format!("field '{}' requires a string value.", field.name),
		)),
	}
}

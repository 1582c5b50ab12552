//! Renders validated predicates for each backend.
//!
//! Field names come from the record allow-list. Every literal is bound as a parameter on the
//! Postgres side and carried as a typed match value on the Qdrant side.

use qdrant_client::qdrant::{Condition, Filter, Range};
use sqlx::{Postgres, QueryBuilder};

use compass_domain::{Clause, CompareOp, FieldKind, Predicate, Scalar};

use crate::{Error, Result};

/// Appends ` AND <clause>` for each clause in `predicate`.
pub fn push_sql(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
	for clause in predicate.clauses() {
		builder.push(" AND ");

		match clause {
			Clause::Compare { field, op, value } => {
				builder.push(field.name).push(" ").push(op.as_sql()).push(" ");

				match value {
					Scalar::Text(text) => builder.push_bind(text.clone()),
					Scalar::Integer(number) => builder.push_bind(*number),
				};
			},
			Clause::In { field, values } => {
				builder.push(field.name).push(" = ANY(");

				match field.kind {
					FieldKind::Integer => builder.push_bind(integers(values)),
					FieldKind::Text | FieldKind::TextArray => builder.push_bind(texts(values)),
				};

				builder.push(")");
			},
			Clause::Overlaps { field, values } => {
				builder.push(field.name).push(" && ").push_bind(values.clone()).push("::text[]");
			},
		}
	}
}

/// Builds the Qdrant payload filter for `predicate`, or `None` when it matches everything.
///
/// Qdrant range conditions are numeric only, so ordering comparisons on text fields are rejected.
pub fn to_qdrant_filter(predicate: &Predicate) -> Result<Option<Filter>> {
	if predicate.is_empty() {
		return Ok(None);
	}

	let mut must = Vec::new();
	let mut must_not = Vec::new();

	for clause in predicate.clauses() {
		match clause {
			Clause::Compare { field, op: CompareOp::Eq, value } =>
				must.push(match_scalar(field.name, value)),
			Clause::Compare { field, op: CompareOp::Neq, value } =>
				must_not.push(match_scalar(field.name, value)),
			Clause::Compare { field, op, value: Scalar::Integer(number) } =>
				must.push(Condition::range(field.name, integer_range(*op, *number))),
			Clause::Compare { field, op, value: Scalar::Text(_) } => {
				return Err(Error::UnsupportedFilter(format!(
					"operator '{}' on text field '{}' is not supported by the qdrant backend.",
					op.as_sql(),
					field.name
				)));
			},
			Clause::In { field, values } => match field.kind {
				FieldKind::Integer => must.push(Condition::matches(field.name, integers(values))),
				FieldKind::Text | FieldKind::TextArray =>
					must.push(Condition::matches(field.name, texts(values))),
			},
			Clause::Overlaps { field, values } =>
				must.push(Condition::matches(field.name, values.clone())),
		}
	}

	Ok(Some(Filter { must, must_not, ..Default::default() }))
}

fn match_scalar(field: &str, value: &Scalar) -> Condition {
	match value {
		Scalar::Text(text) => Condition::matches(field, text.clone()),
		Scalar::Integer(number) => Condition::matches(field, *number),
	}
}

fn integer_range(op: CompareOp, number: i64) -> Range {
	let bound = Some(number as f64);

	match op {
		CompareOp::Lt => Range { lt: bound, ..Default::default() },
		CompareOp::Gt => Range { gt: bound, ..Default::default() },
		CompareOp::Lte => Range { lte: bound, ..Default::default() },
		CompareOp::Gte => Range { gte: bound, ..Default::default() },
		CompareOp::Eq | CompareOp::Neq => Range { gte: bound, lte: bound, ..Default::default() },
	}
}

fn integers(values: &[Scalar]) -> Vec<i64> {
	values
		.iter()
		.filter_map(|value| match value {
			Scalar::Integer(number) => Some(*number),
			Scalar::Text(_) => None,
		})
		.collect()
}

fn texts(values: &[Scalar]) -> Vec<String> {
	values
		.iter()
		.filter_map(|value| match value {
			Scalar::Text(text) => Some(text.clone()),
			Scalar::Integer(_) => None,
		})
		.collect()
}

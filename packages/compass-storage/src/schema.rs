use crate::db::Distance;

pub fn render_schema(vector_dim: u32, distance: Distance) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded
		.replace("<VECTOR_DIM>", &vector_dim.to_string())
		.replace("<VECTOR_OPS>", distance.index_ops())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_companies.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_companies.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_dimension_and_operator_class() {
		let sql = render_schema(768, Distance::L2);

		assert!(sql.contains("embedding vector(768)"));
		assert!(sql.contains("hnsw (embedding vector_l2_ops)"));
		assert!(!sql.contains("\\ir "));
		assert!(!sql.contains('<'));
	}
}

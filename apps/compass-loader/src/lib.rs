//! Bulk import of a company dataset into the configured stores.

use std::{
	fs,
	path::{Path, PathBuf},
};

use clap::Parser;
use color_eyre::eyre;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use compass_service::{CompassService, NewCompany};

#[derive(Debug, Parser)]
#[command(
	version = compass_cli::VERSION,
	rename_all = "kebab",
	styles = compass_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON file shaped like `{"companies": [...]}`.
	#[arg(long, short = 'i', value_name = "FILE")]
	pub input: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CompanyFile {
	companies: Vec<NewCompany>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = compass_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let companies = load_input(&args.input)?;

	tracing::info!(
		input = %args.input.display(),
		count = companies.len(),
		"Loaded company dataset."
	);

	let service = CompassService::connect(config).await?;
	let report = service.import_companies(companies).await?;
	let json = serde_json::to_string_pretty(&report)?;

	println!("{json}");

	Ok(())
}

fn load_input(path: &Path) -> color_eyre::Result<Vec<NewCompany>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read {}: {err}.", path.display()))?;

	parse_input(&raw)
}

fn parse_input(raw: &str) -> color_eyre::Result<Vec<NewCompany>> {
	let file: CompanyFile = serde_json::from_str(raw)?;

	if file.companies.is_empty() {
		return Err(eyre::eyre!("Input must include at least one company."));
	}

	Ok(file.companies)
}

use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = compass_loader::Args::parse();

	compass_loader::run(args).await
}

use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = tutor_prompt::Args::parse();

	tutor_prompt::run(args).await
}

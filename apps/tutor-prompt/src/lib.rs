use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tutor_service::{Cancellation, ConversationId, PromptRequest, TutorService};

/// Builds the bounded prompt for one learner message and prints it as JSON.
#[derive(Debug, Parser)]
#[command(
	version = tutor_cli::VERSION,
	rename_all = "kebab",
	styles = tutor_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Conversation whose history is included. A fresh conversation is used when omitted.
	#[arg(long, value_name = "UUID")]
	pub conversation_id: Option<Uuid>,
	/// Also bootstrap the database schema before querying.
	#[arg(long)]
	pub ensure_schema: bool,
	/// Print chat messages instead of the full bundle.
	#[arg(long)]
	pub messages: bool,
	/// The learner's message.
	#[arg(required = true, num_args = 1.., value_name = "MESSAGE")]
	pub message: Vec<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tutor_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	if args.ensure_schema {
		let db = tutor_storage::db::Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;
		db.pool.close().await;
	}

	let service = TutorService::connect(config).await?;
	let conversation_id = args.conversation_id.map(ConversationId::from).unwrap_or_default();
	let request = PromptRequest { conversation_id, message: args.message.join(" ") };
	let cancel = Cancellation::new();
	let on_interrupt = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupted. Cancelling request.");

			on_interrupt.cancel();
		}
	});

	let bundle = match service.build_prompt(request, &cancel).await {
		Ok(bundle) => bundle,
		Err(err) => {
			if err.is_retrieval_failure() {
				tracing::error!(
					error = %err,
					"Evidence retrieval failed. The request can be retried."
				);
			}

			return Err(err.into());
		},
	};
	let output = if args.messages {
		serde_json::to_string_pretty(&bundle.payload.messages())?
	} else {
		serde_json::to_string_pretty(&bundle)?
	};

	println!("{output}");

	Ok(())
}

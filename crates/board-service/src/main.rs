//! Main entry point for the production board service.
//!
//! Loads the configuration, builds the board from the configured order
//! backend and storage, loads the production list, keeps it refreshed after
//! transitions and serves the board API. With the API disabled it logs the
//! board of every listed order and exits.

use board_config::Config;
use board_core::ProductionBoard;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the board service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started production board");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.board.id);

	let board = Arc::new(factory_registry::build_board_from_config(config.clone())?);

	if let Err(e) = board.load_orders().await {
		tracing::warn!(error = %e, "Failed to load production list, starting empty");
	}
	board.spawn_list_refresh();

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => server::start_server(api_config, Arc::clone(&board)).await?,
		None => {
			tracing::info!("API disabled, reporting boards only");
			report_boards(&board).await?;
		},
	}

	tracing::info!("Stopped production board");
	Ok(())
}

/// Logs the stage states of every listed order.
async fn report_boards(board: &ProductionBoard) -> Result<(), Box<dyn std::error::Error>> {
	for order in board.orders().await? {
		let view = board.view(&order);
		let stages: Vec<String> = view
			.stages
			.iter()
			.map(|stage| format!("{}={}", stage.card_id, stage.state))
			.collect();
		tracing::info!(
			order_id = %board_types::truncate_id(&order.id),
			status = order.status.as_deref().unwrap_or("-"),
			"{}",
			stages.join(" ")
		);
	}
	Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex as AsyncMutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mw_controlplane::config::Config;
use mw_controlplane::configproxy::ConfigProxy;
use mw_controlplane::http::{self, AppState};
use mw_controlplane::mtls::MtlsManager;
use mw_controlplane::plugins::{DuplicateDetector, PluginCatalogue};
use mw_controlplane::reconciler::Reconciler;
use mw_controlplane::staticconfig::StaticConfigEditor;
use mw_controlplane::store::Store;

#[derive(Parser, Debug)]
#[command(about = "Control plane for a reverse proxy: reconciliation, config merging, and mTLS lifecycle", long_about = None)]
struct Args {
	/// Path to the YAML configuration file.
	#[arg(short, long, value_name = "file")]
	config: Option<PathBuf>,

	/// Overrides the listen address from the config file.
	#[arg(long, value_name = "addr")]
	listen_addr: Option<std::net::SocketAddr>,

	/// Overrides the tracing filter directive (e.g. "info", "mw_controlplane=debug").
	#[arg(long, value_name = "filter")]
	log_filter: Option<String>,

	/// Emit structured JSON logs instead of the human-readable format.
	#[arg(long)]
	log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let mut config = match &args.config {
		Some(path) => Config::from_yaml_file(path)?,
		None => Config::default(),
	};
	if let Some(addr) = args.listen_addr {
		config.listen_addr = addr;
	}
	if let Some(filter) = &args.log_filter {
		config.log_filter = Some(filter.clone());
	}

	mw_core::telemetry::init(config.log_filter.as_deref().unwrap_or("info"), args.log_json);
	info!(?config, "starting mw-controlplane");

	let config = Arc::new(config);
	let shutdown = mw_core::Shutdown::new();

	let store = Arc::new(AsyncMutex::new(Store::open(&config.db_path)?));
	let http_client = reqwest::Client::builder().build()?;

	let mtls = Arc::new(MtlsManager::new(config.ca_base_path.clone()));
	let static_config = Arc::new(StaticConfigEditor::new(config.static_config_path.clone()));
	let catalogue = Arc::new(PluginCatalogue::new(
		http_client.clone(),
		config.plugin_catalogue_url.clone(),
		config.remote_catalogue_deadline(),
		config.plugin_catalogue_cache_ttl(),
	));
	let duplicates = Arc::new(DuplicateDetector::new(http_client.clone()));
	let config_proxy = Arc::new(ConfigProxy::new(
		store.clone(),
		http_client.clone(),
		config.merged_config_cache_ttl(),
		config.merged_config_grace(),
		config.merged_config_deadline(),
	));

	let reconciler = Reconciler::new(store.clone(), http_client.clone(), config.reconcile_interval(), config.datasource_deadline());
	let reconciler_trigger = shutdown.trigger();
	let reconciler_task = tokio::spawn(reconciler.run(reconciler_trigger));

	let state = AppState {
		store,
		config_proxy,
		mtls,
		static_config,
		catalogue,
		duplicates,
		http: http_client,
		config: config.clone(),
	};

	let app = http::router(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive());

	let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
	info!(addr = %config.listen_addr, "listening");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown.wait())
		.await?;

	reconciler_task.await?;
	Ok(())
}

//! Process-wide shutdown signaling shared by the reconciler loop and the HTTP server.

use tokio_util::sync::CancellationToken;

pub struct Shutdown {
	token: CancellationToken,
}

impl Shutdown {
	pub fn new() -> Self {
		Shutdown {
			token: CancellationToken::new(),
		}
	}

	/// Returns a clone of the underlying token. Every holder can both wait on
	/// it (`cancelled()`) and trigger it (`cancel()`); the reconciler loop and
	/// the HTTP server each hold one.
	pub fn trigger(&self) -> ShutdownTrigger {
		ShutdownTrigger {
			token: self.token.clone(),
		}
	}

	/// Completes once a shutdown has been triggered or the process receives SIGINT/SIGTERM.
	pub async fn wait(self) {
		imp::wait(&self.token).await;
		self.token.cancel();
	}
}

impl Default for Shutdown {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
	token: CancellationToken,
}

impl ShutdownTrigger {
	pub async fn shutdown_now(&self) {
		self.token.cancel();
	}

	/// Resolves once shutdown has been triggered by any holder, including the
	/// top-level signal watcher. Used by the reconciler to interrupt its loop
	/// between cycles and at the next suspension point.
	pub async fn cancelled(&self) {
		self.token.cancelled().await
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

#[cfg(unix)]
mod imp {
	use tokio::signal::unix::{SignalKind, signal};
	use tokio_util::sync::CancellationToken;
	use tracing::info;

	pub(super) async fn wait(token: &CancellationToken) {
		tokio::select! {
			_ = watch(SignalKind::interrupt(), "SIGINT") => {}
			_ = watch(SignalKind::terminate(), "SIGTERM") => {}
			_ = token.cancelled() => { info!("received explicit shutdown signal") }
		};
	}

	async fn watch(kind: SignalKind, name: &'static str) {
		signal(kind)
			.expect("failed to register signal handler")
			.recv()
			.await;
		info!("received signal {name}, starting shutdown");
	}
}

#[cfg(not(unix))]
mod imp {
	use tokio_util::sync::CancellationToken;
	use tracing::info;

	pub(super) async fn wait(token: &CancellationToken) {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {}
			_ = token.cancelled() => { info!("received explicit shutdown signal") }
		};
	}
}

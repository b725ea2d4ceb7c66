//! C4: the merge engine. Produces the single JSON document the proxy's HTTP
//! provider polls, behind a bounded-staleness cache with single-flight refresh.

mod merge;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::warn;

use crate::datasource::{self, DataSourceError};
use crate::store::{Store, StoreError};

#[derive(Debug, Error, Clone)]
pub enum ConfigProxyError {
	#[error("no active data source configured")]
	NoActiveDataSource,
	#[error(transparent)]
	DataSource(#[from] DataSourceError),
	#[error("persistence failure: {0}")]
	Store(String),
}

impl From<StoreError> for ConfigProxyError {
	fn from(e: StoreError) -> Self {
		ConfigProxyError::Store(e.to_string())
	}
}

pub type ConfigProxyResult<T> = Result<T, ConfigProxyError>;

type ComputeResult = Result<Arc<Value>, ConfigProxyError>;

enum CacheState {
	Empty,
	Ready { value: Arc<Value>, fetched_at: Instant },
	Pending { rx: watch::Receiver<Option<ComputeResult>> },
}

/// Status surfaced by `GET /traefik-config/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatus {
	pub cached: bool,
	pub age_secs: Option<u64>,
	pub ttl_secs: u64,
	pub serving_stale: bool,
}

pub struct ConfigProxy {
	store: Arc<AsyncMutex<Store>>,
	http: reqwest::Client,
	state: AsyncMutex<CacheState>,
	last_good: AsyncMutex<Option<(Arc<Value>, Instant)>>,
	ttl: Duration,
	grace: Duration,
	fetch_deadline: Duration,
	serving_stale: std::sync::atomic::AtomicBool,
}

impl ConfigProxy {
	pub fn new(store: Arc<AsyncMutex<Store>>, http: reqwest::Client, ttl: Duration, grace: Duration, fetch_deadline: Duration) -> Self {
		ConfigProxy {
			store,
			http,
			state: AsyncMutex::new(CacheState::Empty),
			last_good: AsyncMutex::new(None),
			ttl,
			grace,
			fetch_deadline,
			serving_stale: std::sync::atomic::AtomicBool::new(false),
		}
	}

	/// Invalidates the cache immediately. The next caller becomes the
	/// single-flight leader for a fresh recompute.
	pub async fn invalidate(&self) {
		let mut state = self.state.lock().await;
		*state = CacheState::Empty;
	}

	pub async fn status(&self) -> CacheStatus {
		let state = self.state.lock().await;
		match &*state {
			CacheState::Ready { fetched_at, .. } => CacheStatus {
				cached: true,
				age_secs: Some(fetched_at.elapsed().as_secs()),
				ttl_secs: self.ttl.as_secs(),
				serving_stale: self.serving_stale.load(std::sync::atomic::Ordering::Relaxed),
			},
			_ => CacheStatus { cached: false, age_secs: None, ttl_secs: self.ttl.as_secs(), serving_stale: false },
		}
	}

	/// `get_merged`: returns the cached document if fresh, otherwise becomes
	/// (or awaits) the single in-flight recompute. All concurrent callers
	/// during a miss observe the same result or the same error.
	pub async fn get_merged(&self) -> ConfigProxyResult<Arc<Value>> {
		loop {
			let mut guard = self.state.lock().await;
			match &*guard {
				CacheState::Ready { value, fetched_at } if fetched_at.elapsed() < self.ttl => {
					return Ok(value.clone());
				}
				CacheState::Pending { rx } => {
					let mut rx = rx.clone();
					drop(guard);
					let _ = rx.changed().await;
					if let Some(result) = rx.borrow().clone() {
						return result;
					}
					// Leader dropped without publishing (panic) — retry as leader.
					continue;
				}
				_ => {
					let (tx, rx) = watch::channel(None);
					*guard = CacheState::Pending { rx };
					drop(guard);

					let computed = self.compute().await;
					let published = self.publish(computed).await;
					let _ = tx.send(Some(published.clone()));
					return published;
				}
			}
		}
	}

	async fn publish(&self, computed: ConfigProxyResult<Value>) -> ComputeResult {
		let mut state = self.state.lock().await;
		match computed {
			Ok(doc) => {
				let value = Arc::new(doc);
				*state = CacheState::Ready { value: value.clone(), fetched_at: Instant::now() };
				*self.last_good.lock().await = Some((value.clone(), Instant::now()));
				self.serving_stale.store(false, std::sync::atomic::Ordering::Relaxed);
				Ok(value)
			}
			Err(e) => {
				let last_good = self.last_good.lock().await;
				if let Some((value, at)) = last_good.as_ref() {
					if at.elapsed() < self.grace {
						warn!(error = %e, "merge failed, serving last-good document within grace window");
						*state = CacheState::Ready { value: value.clone(), fetched_at: *at };
						self.serving_stale.store(true, std::sync::atomic::Ordering::Relaxed);
						return Ok(value.clone());
					}
				}
				*state = CacheState::Empty;
				Err(e)
			}
		}
	}

	async fn compute(&self) -> ConfigProxyResult<Value> {
		let (active_cfg, overlays) = {
			let store = self.store.lock().await;
			let active_cfg = crate::store::DataSourceConfigRepo::active(store.conn())?;
			let active_cfg = active_cfg.ok_or(ConfigProxyError::NoActiveDataSource)?;
			let overlays = merge::Overlays::load(store.conn())?;
			(active_cfg, overlays)
		};

		let client = datasource::build(&active_cfg, self.http.clone());
		let inventory = client.fetch(self.fetch_deadline).await?;

		Ok(merge::build_document(&inventory, &overlays))
	}
}

//! C3: the long-running loop that pulls the active data source's inventory,
//! diffs it against the local store, and advances each resource's lifecycle.

mod fingerprint;

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use mw_core::ShutdownTrigger;

use crate::datasource::{self, DataSource, InventoryRouter};
use crate::model::{DataSourceType, Resource, ResourceStatus, SourceType, TemplateKind, clamp_priority};
use crate::store::{MiddlewaresRepo, ResourcesRepo, Store};

use fingerprint::fingerprint_of_router;

fn datasource_type_to_source_type(t: DataSourceType) -> SourceType {
	match t {
		DataSourceType::RouterCentric => SourceType::RouterCentric,
		DataSourceType::TraefikNative => SourceType::TraefikNative,
	}
}

pub struct Reconciler {
	store: Arc<AsyncMutex<Store>>,
	http: reqwest::Client,
	interval: std::time::Duration,
	fetch_deadline: std::time::Duration,
}

/// Summary of one completed cycle, surfaced for logging and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
	pub inserted: usize,
	pub updated: usize,
	pub disabled: usize,
	pub reactivated: usize,
	pub unchanged: usize,
	pub skipped_tombstoned: usize,
}

impl Reconciler {
	pub fn new(
		store: Arc<AsyncMutex<Store>>,
		http: reqwest::Client,
		interval: std::time::Duration,
		fetch_deadline: std::time::Duration,
	) -> Self {
		Reconciler { store, http, interval, fetch_deadline }
	}

	/// Runs the cooperative loop until `shutdown` fires. Never overlaps a
	/// cycle with itself: if a cycle runs long, the next tick is skipped
	/// rather than queued, per the backpressure policy in §5.
	pub async fn run(self, shutdown: ShutdownTrigger) {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					match self.run_cycle().await {
						Ok(report) => debug!(?report, "reconciliation cycle completed"),
						Err(e) => warn!(error = %e, "reconciliation cycle aborted, will retry next tick"),
					}
				}
				_ = shutdown.cancelled() => {
					info!("reconciler shutting down after completing in-flight cycle");
					break;
				}
			}
		}
	}

	/// Runs exactly one cycle: fetch, diff, commit. Any data-source error
	/// aborts cleanly without touching the store.
	pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
		let active_cfg = {
			let store = self.store.lock().await;
			crate::store::DataSourceConfigRepo::active(store.conn())?
		};
		let Some(active_cfg) = active_cfg else {
			debug!("no active data source configured, skipping cycle");
			return Ok(CycleReport::default());
		};

		let client: Box<dyn DataSource> = datasource::build(&active_cfg, self.http.clone());
		let inventory = client.fetch(self.fetch_deadline).await?;

		let source_type = datasource_type_to_source_type(active_cfg.type_);
		let mut report = CycleReport::default();

		let mut store = self.store.lock().await;
		store.with_transaction(|tx| {
			let local = ResourcesRepo::list_by_source_type(tx, source_type.as_str())?;
			let mut local_by_upstream_id: std::collections::HashMap<String, Resource> =
				local.into_iter().map(|r| (r.id.clone(), r)).collect();

			for router in &inventory.routers {
				match local_by_upstream_id.remove(&router.upstream_id) {
					None => {
						if MiddlewaresRepo::is_tombstoned(tx, &router.upstream_id, TemplateKind::Resource)? {
							report.skipped_tombstoned += 1;
							continue;
						}
						let resource = new_resource_from_router(router, source_type.clone());
						ResourcesRepo::insert(tx, &resource)?;
						report.inserted += 1;
					}
					Some(mut existing) => {
						if existing.source_type == SourceType::Manual {
							// Upstream/manual id collision: the operator-owned local row
							// wins; the reconciler never touches it (Open Question (a)).
							continue;
						}
						let fingerprint = fingerprint_of_router(router);
						match existing.status {
							ResourceStatus::Active => {
								if existing.upstream_fingerprint.as_deref() == Some(fingerprint.as_str()) {
									report.unchanged += 1;
								} else {
									apply_upstream_fields(&mut existing, router, fingerprint);
									ResourcesRepo::update(tx, &existing)?;
									report.updated += 1;
								}
							}
							ResourceStatus::Disabled => {
								existing.status = ResourceStatus::Active;
								apply_upstream_fields(&mut existing, router, fingerprint);
								ResourcesRepo::update(tx, &existing)?;
								report.reactivated += 1;
							}
						}
					}
				}
			}

			// Anything left in `local_by_upstream_id` was not seen this cycle.
			for (_, mut existing) in local_by_upstream_id {
				if existing.status == ResourceStatus::Active {
					existing.status = ResourceStatus::Disabled;
					ResourcesRepo::update(tx, &existing)?;
					report.disabled += 1;
				}
				// already disabled: no-op, operator may delete.
			}

			Ok(())
		})?;

		Ok(report)
	}
}

fn new_resource_from_router(router: &InventoryRouter, source_type: SourceType) -> Resource {
	let priority = router.priority.map(clamp_priority).unwrap_or(crate::model::DEFAULT_PRIORITY);
	let fingerprint = fingerprint_of_router(router);
	Resource {
		id: router.upstream_id.clone(),
		upstream_router_id: Some(router.upstream_id.clone()),
		host: router.host.clone(),
		service_id: router.service_id.clone(),
		org: None,
		site: None,
		status: ResourceStatus::Active,
		source_type,
		router_priority: priority,
		priority_manual: false,
		http_entrypoints: router.entrypoints.join(","),
		tls_sans: router.tls_sans.join(","),
		tcp: crate::model::TcpBlock {
			enabled: matches!(router.protocol, crate::datasource::RouterProtocol::Tcp),
			entrypoints: router.entrypoints.join(","),
			sni_rule: String::new(),
		},
		custom_headers: None,
		mtls_enabled: false,
		tls_hardening_enabled: false,
		secure_headers_enabled: false,
		mtls_overlay: Default::default(),
		upstream_fingerprint: Some(fingerprint),
	}
}

/// Applies upstream-derived fields onto `existing`, preserving every
/// operator-owned field untouched (priority when manual, overlays, flags),
/// and stamps the resource with the fingerprint that produced this update so
/// the next cycle can short-circuit on an unchanged upstream router.
fn apply_upstream_fields(existing: &mut Resource, router: &InventoryRouter, fingerprint: String) {
	existing.host = router.host.clone();
	existing.service_id = router.service_id.clone();
	existing.http_entrypoints = router.entrypoints.join(",");
	existing.tls_sans = router.tls_sans.join(",");
	existing.tcp.enabled = matches!(router.protocol, crate::datasource::RouterProtocol::Tcp);
	if !existing.tcp.enabled {
		// keep any operator-set entrypoints/SNI untouched when TCP stays off
	} else if existing.tcp.entrypoints.is_empty() {
		existing.tcp.entrypoints = router.entrypoints.join(",");
	}
	if !existing.priority_manual {
		if let Some(p) = router.priority {
			existing.router_priority = clamp_priority(p);
		}
	}
	existing.upstream_fingerprint = Some(fingerprint);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{DataSourceConfig, DataSourceType};
	use crate::store::DataSourceConfigRepo;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	async fn setup(server: &MockServer) -> Arc<AsyncMutex<Store>> {
		let store = Store::open_in_memory().unwrap();
		let cfg = DataSourceConfig {
			name: "primary".into(),
			type_: DataSourceType::RouterCentric,
			url: server.uri(),
			basic_auth_user: None,
			basic_auth_password: None,
			active: true,
		};
		DataSourceConfigRepo::upsert(store.conn(), &cfg).unwrap();
		Arc::new(AsyncMutex::new(store))
	}

	fn reconciler(store: Arc<AsyncMutex<Store>>) -> Reconciler {
		Reconciler::new(store, reqwest::Client::new(), std::time::Duration::from_secs(30), std::time::Duration::from_secs(5))
	}

	#[tokio::test]
	async fn reconcile_insert_creates_active_resource() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"id": "r1", "host": "a.example", "serviceId": "s1", "entrypoints": "web,websecure"}
			])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/middlewares")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let store = setup(&server).await;
		let r = reconciler(store.clone());
		let report = r.run_cycle().await.unwrap();
		assert_eq!(report.inserted, 1);

		let guard = store.lock().await;
		let resource = ResourcesRepo::get(guard.conn(), "r1").unwrap();
		assert_eq!(resource.status, ResourceStatus::Active);
		assert_eq!(resource.source_type, SourceType::RouterCentric);
		assert_eq!(resource.router_priority, 200);
	}

	#[tokio::test]
	async fn reconcile_disable_preserves_manual_priority() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/middlewares")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let store = setup(&server).await;
		{
			let guard = store.lock().await;
			let mut resource = new_resource_from_router(
				&InventoryRouter {
					upstream_id: "r1".into(),
					host: "a.example".into(),
					entrypoints: vec!["web".into()],
					tls_enabled: false,
					tls_sans: vec![],
					protocol: crate::datasource::RouterProtocol::Http,
					service_id: "s1".into(),
					priority: Some(200),
					middlewares: vec![],
					raw_spec: None,
				},
				SourceType::RouterCentric,
			);
			resource.router_priority = 750;
			resource.priority_manual = true;
			ResourcesRepo::insert(guard.conn(), &resource).unwrap();
		}

		let r = reconciler(store.clone());
		let report = r.run_cycle().await.unwrap();
		assert_eq!(report.disabled, 1);

		let guard = store.lock().await;
		let resource = ResourcesRepo::get(guard.conn(), "r1").unwrap();
		assert_eq!(resource.status, ResourceStatus::Disabled);
		assert_eq!(resource.router_priority, 750);
		assert!(resource.priority_manual);
	}

	#[tokio::test]
	async fn reconcile_reactivates_and_preserves_overlays() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"id": "r1", "host": "a.example", "serviceId": "s1", "entrypoints": "web"}
			])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/middlewares")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let store = setup(&server).await;
		{
			let guard = store.lock().await;
			let mut resource = new_resource_from_router(
				&InventoryRouter {
					upstream_id: "r1".into(),
					host: "a.example".into(),
					entrypoints: vec!["web".into()],
					tls_enabled: false,
					tls_sans: vec![],
					protocol: crate::datasource::RouterProtocol::Http,
					service_id: "s1".into(),
					priority: Some(200),
					middlewares: vec![],
					raw_spec: None,
				},
				SourceType::RouterCentric,
			);
			resource.status = ResourceStatus::Disabled;
			resource.secure_headers_enabled = true;
			ResourcesRepo::insert(guard.conn(), &resource).unwrap();
		}

		let r = reconciler(store.clone());
		let report = r.run_cycle().await.unwrap();
		assert_eq!(report.reactivated, 1);

		let guard = store.lock().await;
		let resource = ResourcesRepo::get(guard.conn(), "r1").unwrap();
		assert_eq!(resource.status, ResourceStatus::Active);
		assert!(resource.secure_headers_enabled);
	}

	/// A second cycle over an identical inventory must short-circuit on the
	/// persisted fingerprint rather than re-writing the row.
	#[tokio::test]
	async fn reconcile_repeat_cycle_is_unchanged() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"id": "r1", "host": "a.example", "serviceId": "s1", "entrypoints": "web"}
			])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/middlewares")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let store = setup(&server).await;
		let r = reconciler(store.clone());
		let first = r.run_cycle().await.unwrap();
		assert_eq!(first.inserted, 1);

		let second = r.run_cycle().await.unwrap();
		assert_eq!(second.unchanged, 1);
		assert_eq!(second.updated, 0);

		let guard = store.lock().await;
		let resource = ResourcesRepo::get(guard.conn(), "r1").unwrap();
		assert!(resource.upstream_fingerprint.is_some());
	}

	/// A router whose only change is its middleware references must still be
	/// detected as `updated`, since the fingerprint tuple covers them even
	/// though none of `host`/`service_id`/`entrypoints`/`tls_sans` changed.
	#[tokio::test]
	async fn reconcile_detects_middleware_only_change() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"id": "r1", "host": "a.example", "serviceId": "s1", "entrypoints": "web", "middlewares": [{"name": "auth", "provider": "docker"}]}
			])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/middlewares")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let store = setup(&server).await;
		let r = reconciler(store.clone());
		let first = r.run_cycle().await.unwrap();
		assert_eq!(first.inserted, 1);
		let fingerprint_before = {
			let guard = store.lock().await;
			ResourcesRepo::get(guard.conn(), "r1").unwrap().upstream_fingerprint
		};

		Mock::given(method("GET"))
			.and(path("/api/routers"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"id": "r1", "host": "a.example", "serviceId": "s1", "entrypoints": "web", "middlewares": [{"name": "auth", "provider": "docker"}, {"name": "ratelimit", "provider": "docker"}]}
			])))
			.with_priority(1)
			.mount(&server)
			.await;

		let second = r.run_cycle().await.unwrap();
		assert_eq!(second.updated, 1);
		assert_eq!(second.unchanged, 0);

		let guard = store.lock().await;
		let resource = ResourcesRepo::get(guard.conn(), "r1").unwrap();
		assert_ne!(resource.upstream_fingerprint, fingerprint_before);
	}
}

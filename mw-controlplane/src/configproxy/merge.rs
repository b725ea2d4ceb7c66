//! The merge algorithm itself (§4.4): composes the wire document from a
//! freshly pulled `Inventory` plus the operator overlays loaded from the store.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde_json::{Map, Value, json};

use crate::datasource::{Inventory, InventoryRouter, MiddlewareRef, RouterProtocol};
use crate::model::{
	Middleware, MtlsConfig, MtlsOverlay, Resource, ResourceExternalMiddleware, ResourceMiddleware, SecurityConfig,
	Service, ServiceType,
};
use crate::store::{AttachmentsRepo, MiddlewaresRepo, MtlsRepo, ResourcesRepo, SecurityRepo, ServicesRepo, StoreResult};

const MTLS_TLS_OPTIONS_NAME: &str = "mtls";
const HARDENED_TLS_OPTIONS_NAME: &str = "hardened";
const SECURE_HEADERS_MIDDLEWARE: &str = "secure-headers";
const DEFAULT_MTLS_REJECT_CODE: u16 = 403;

/// Everything the merge step needs from the store, loaded once per cycle.
pub struct Overlays {
	pub resources: Vec<Resource>,
	pub middlewares: HashMap<String, Middleware>,
	pub services: HashMap<String, Service>,
	pub internal_attachments: HashMap<String, Vec<ResourceMiddleware>>,
	pub external_attachments: HashMap<String, Vec<ResourceExternalMiddleware>>,
	pub service_overrides: HashMap<String, String>,
	pub mtls: MtlsConfig,
	pub security: SecurityConfig,
}

impl Overlays {
	pub fn load(conn: &Connection) -> StoreResult<Overlays> {
		let resources = ResourcesRepo::list_active(conn)?;
		let resource_ids: Vec<String> = resources.iter().map(|r| r.id.clone()).collect();

		let middlewares = MiddlewaresRepo::list(conn)?.into_iter().map(|m| (m.id.clone(), m)).collect();
		let services = ServicesRepo::list(conn)?.into_iter().map(|s| (s.id.clone(), s)).collect();
		let internal_attachments = AttachmentsRepo::list_internal_for_many(conn, &resource_ids)?;
		let external_attachments = AttachmentsRepo::list_external_for_many(conn, &resource_ids)?;
		let service_overrides = AttachmentsRepo::list_service_overrides_for_many(conn, &resource_ids)?;
		let mtls = MtlsRepo::get_config(conn)?;
		let security = SecurityRepo::get(conn)?;

		Ok(Overlays {
			resources,
			middlewares,
			services,
			internal_attachments,
			external_attachments,
			service_overrides,
			mtls,
			security,
		})
	}
}

fn service_type_key(t: ServiceType) -> &'static str {
	match t {
		ServiceType::LoadBalancer => "loadBalancer",
		ServiceType::Weighted => "weighted",
		ServiceType::Mirroring => "mirroring",
		ServiceType::Failover => "failover",
	}
}

fn mtls_middleware_name(resource_id: &str) -> String {
	format!("{resource_id}-mtls-auth")
}

fn mtls_overlay_config(overlay: &MtlsOverlay) -> Value {
	json!({
		"rules": overlay.rules.clone().unwrap_or(Value::Null),
		"headerMapping": overlay.header_mapping.clone().unwrap_or(Value::Null),
		"rejectMessage": overlay.reject_message.clone().unwrap_or_default(),
		"rejectStatusCode": overlay.reject_code.unwrap_or(DEFAULT_MTLS_REJECT_CODE),
		"refreshIntervalSecs": overlay.refresh_interval_secs,
		"externalDataRef": overlay.external_data_ref,
	})
}

/// Builds the ordered, de-duplicated list of middleware references for one
/// resource per the total order in §4.4 step 3: mTLS (if any) first, then
/// internal attachments by priority desc / id asc, then external attachments
/// identically ordered, then the secure-headers reference.
fn middleware_refs_for(resource: &Resource, overlays: &Overlays) -> Vec<String> {
	let mut seen: HashSet<String> = HashSet::new();
	let mut refs = Vec::new();

	if resource.mtls_enabled {
		let name = mtls_middleware_name(&resource.id);
		if seen.insert(name.clone()) {
			refs.push(name);
		}
	}

	if let Some(attachments) = overlays.internal_attachments.get(&resource.id) {
		for att in attachments {
			if let Some(mw) = overlays.middlewares.get(&att.middleware_id) {
				if seen.insert(mw.name.clone()) {
					refs.push(mw.name.clone());
				}
			}
		}
	}

	if let Some(attachments) = overlays.external_attachments.get(&resource.id) {
		for att in attachments {
			let canonical = MiddlewareRef { name: att.middleware_name.clone(), provider: att.provider.clone() }.canonical();
			if seen.insert(canonical.clone()) {
				refs.push(canonical);
			}
		}
	}

	if resource.secure_headers_enabled && overlays.security.secure_headers_enabled {
		if seen.insert(SECURE_HEADERS_MIDDLEWARE.to_string()) {
			refs.push(SECURE_HEADERS_MIDDLEWARE.to_string());
		}
	}

	refs
}

fn resource_tls_options(resource: &Resource) -> Option<&'static str> {
	if resource.mtls_enabled {
		Some(MTLS_TLS_OPTIONS_NAME)
	} else if resource.tls_hardening_enabled {
		Some(HARDENED_TLS_OPTIONS_NAME)
	} else {
		None
	}
}

fn router_entrypoints(resource: &Resource, upstream: Option<&InventoryRouter>) -> Vec<String> {
	if !resource.http_entrypoints.is_empty() {
		resource.http_entrypoints.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
	} else if let Some(u) = upstream {
		u.entrypoints.clone()
	} else {
		Vec::new()
	}
}

fn router_rule(resource: &Resource, upstream: Option<&InventoryRouter>) -> String {
	if let Some(u) = upstream {
		if let Some(rule) = u.raw_spec.as_ref().and_then(|s| s.get("rule")).and_then(|r| r.as_str()) {
			if !rule.is_empty() {
				return rule.to_string();
			}
		}
	}
	format!("Host(`{}`)", resource.host)
}

fn sni_rule(resource: &Resource) -> String {
	if resource.tcp.sni_rule.is_empty() {
		format!("HostSNI(`{}`)", resource.host)
	} else {
		resource.tcp.sni_rule.clone()
	}
}

/// Builds the merged document. Deterministic for fixed inputs: resources are
/// walked in the order the store returns them (`id ASC`), attachments in
/// priority/id order, and JSON objects are assembled key-by-key in a fixed
/// sequence so repeated calls with unchanged inputs serialize identically.
pub fn build_document(inventory: &Inventory, overlays: &Overlays) -> Value {
	let upstream_by_id: HashMap<&str, &InventoryRouter> = inventory.routers.iter().map(|r| (r.upstream_id.as_str(), r)).collect();

	let mut http_routers = Map::new();
	let mut tcp_routers = Map::new();
	let mut http_services = Map::new();
	let mut http_middlewares = Map::new();
	let mut tls_options = Map::new();

	for resource in &overlays.resources {
		let upstream = upstream_by_id.get(resource.id.as_str()).copied();
		let service_id = overlays.service_overrides.get(&resource.id).cloned().unwrap_or_else(|| resource.service_id.clone());

		let mut router = json!({
			"rule": router_rule(resource, upstream),
			"service": service_id,
			"entryPoints": router_entrypoints(resource, upstream),
			"middlewares": middleware_refs_for(resource, overlays),
		});
		if let Some(opts) = resource_tls_options(resource) {
			router["tls"] = json!({"options": opts});
		}
		if let Some(headers) = &resource.custom_headers {
			router["headers"] = headers.clone();
		}
		http_routers.insert(resource.id.clone(), router);

		if resource.tcp.enabled {
			let tcp_entrypoints: Vec<String> = if resource.tcp.entrypoints.is_empty() {
				router_entrypoints(resource, upstream)
			} else {
				resource.tcp.entrypoints.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
			};
			let mut tcp_router = json!({
				"rule": sni_rule(resource),
				"service": service_id,
				"entryPoints": tcp_entrypoints,
			});
			if let Some(opts) = resource_tls_options(resource) {
				tcp_router["tls"] = json!({"options": opts, "passthrough": false});
			}
			tcp_routers.insert(format!("{}-tcp", resource.id), tcp_router);
		}

		if resource.mtls_enabled {
			let name = mtls_middleware_name(&resource.id);
			http_middlewares.entry(name).or_insert_with(|| json!({"forwardAuth": mtls_overlay_config(&resource.mtls_overlay)}));
		}
	}

	// Every operator-owned middleware/service is a first-class entry,
	// independent of whether any resource currently references it.
	for mw in overlays.middlewares.values() {
		let mut entry = Map::new();
		entry.insert(mw.type_.clone(), mw.config.clone());
		http_middlewares.insert(mw.name.clone(), Value::Object(entry));
	}
	for svc in overlays.services.values() {
		let mut entry = Map::new();
		entry.insert(service_type_key(svc.type_).to_string(), svc.config.clone());
		http_services.insert(svc.name.clone(), Value::Object(entry));
	}

	if overlays.security.secure_headers_enabled {
		let h = &overlays.security.headers;
		http_middlewares.insert(
			SECURE_HEADERS_MIDDLEWARE.to_string(),
			json!({"headers": {
				"frameDeny": h.frame_deny,
				"contentTypeNosniff": h.content_type_nosniff,
				"browserXssFilter": h.browser_xss_filter,
				"forceSTSHeader": h.force_sts_header,
				"stsSeconds": h.sts_seconds,
				"stsIncludeSubdomains": h.sts_include_subdomains,
				"stsPreload": h.sts_preload,
				"customFrameOptionsValue": h.custom_frame_options_value,
				"referrerPolicy": h.referrer_policy,
			}}),
		);
	}

	if overlays.security.tls_hardening_enabled {
		tls_options.insert(
			HARDENED_TLS_OPTIONS_NAME.to_string(),
			json!({"minVersion": "VersionTLS12", "cipherSuites": [
				"TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
				"TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
			]}),
		);
	}
	if overlays.mtls.enabled && overlays.mtls.has_ca {
		tls_options.insert(
			MTLS_TLS_OPTIONS_NAME.to_string(),
			json!({"clientAuth": {
				"caFiles": [overlays.mtls.ca_cert_path.clone().unwrap_or_default()],
				"clientAuthType": "RequireAndVerifyClientCert",
			}}),
		);
	}

	let mut tls = Map::new();
	if !tls_options.is_empty() {
		tls.insert("options".to_string(), Value::Object(tls_options));
	}

	let mut doc = Map::new();
	doc.insert("http".to_string(), json!({"routers": http_routers, "services": http_services, "middlewares": http_middlewares}));
	doc.insert("tcp".to_string(), json!({"routers": tcp_routers}));
	if !tls.is_empty() {
		doc.insert("tls".to_string(), Value::Object(tls));
	}
	Value::Object(doc)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{ResourceStatus, SourceType, TcpBlock};

	fn base_resource(id: &str) -> Resource {
		Resource {
			id: id.to_string(),
			upstream_router_id: None,
			host: "a.example".into(),
			service_id: "s1".into(),
			org: None,
			site: None,
			status: ResourceStatus::Active,
			source_type: SourceType::Manual,
			router_priority: 200,
			priority_manual: false,
			http_entrypoints: "web".into(),
			tls_sans: String::new(),
			tcp: TcpBlock::default(),
			custom_headers: None,
			mtls_enabled: false,
			tls_hardening_enabled: false,
			secure_headers_enabled: false,
			mtls_overlay: Default::default(),
			upstream_fingerprint: None,
		}
	}

	fn mw(id: &str, name: &str, priority: i64) -> (Middleware, ResourceMiddleware) {
		(
			Middleware { id: id.to_string(), name: name.to_string(), type_: "headers".into(), config: json!({}) },
			ResourceMiddleware { id: priority, resource_id: "r1".into(), middleware_id: id.to_string(), priority },
		)
	}

	#[test]
	fn priority_ordering_matches_desc_then_id_asc() {
		let mut overlays = Overlays {
			resources: vec![base_resource("r1")],
			middlewares: HashMap::new(),
			services: HashMap::new(),
			internal_attachments: HashMap::new(),
			external_attachments: HashMap::new(),
			service_overrides: HashMap::new(),
			mtls: MtlsConfig::default(),
			security: SecurityConfig::default(),
		};
		let (ma, att_a) = mw("a", "m_a", 100);
		let (mb, mut att_b) = mw("b", "m_b", 300);
		att_b.id = 2;
		let (mc, mut att_c) = mw("c", "m_c", 300);
		att_c.id = 3;
		let mut att_a = att_a;
		att_a.id = 1;

		overlays.middlewares.insert("a".into(), ma);
		overlays.middlewares.insert("b".into(), mb);
		overlays.middlewares.insert("c".into(), mc);
		overlays.internal_attachments.insert("r1".into(), vec![att_b, att_c, att_a]);

		let refs = middleware_refs_for(&overlays.resources[0], &overlays);
		assert_eq!(refs, vec!["m_b", "m_c", "m_a"]);
	}

	#[test]
	fn mtls_enabled_injects_reference_at_head_and_sets_tls_options() {
		let mut r = base_resource("r1");
		r.mtls_enabled = true;
		let overlays = Overlays {
			resources: vec![r],
			middlewares: HashMap::new(),
			services: HashMap::new(),
			internal_attachments: HashMap::new(),
			external_attachments: HashMap::new(),
			service_overrides: HashMap::new(),
			mtls: MtlsConfig { enabled: true, has_ca: true, ca_cert_path: Some("/certs/ca.crt".into()), ..MtlsConfig::default() },
			security: SecurityConfig::default(),
		};
		let inv = Inventory::default();
		let doc = build_document(&inv, &overlays);
		let router = &doc["http"]["routers"]["r1"];
		assert_eq!(router["middlewares"][0], json!("r1-mtls-auth"));
		assert_eq!(router["tls"]["options"], json!("mtls"));
		assert_eq!(doc["tls"]["options"]["mtls"]["clientAuth"]["caFiles"][0], json!("/certs/ca.crt"));
	}

	#[test]
	fn merge_is_deterministic_across_calls() {
		let overlays = Overlays {
			resources: vec![base_resource("r1"), base_resource("r2")],
			middlewares: HashMap::new(),
			services: HashMap::new(),
			internal_attachments: HashMap::new(),
			external_attachments: HashMap::new(),
			service_overrides: HashMap::new(),
			mtls: MtlsConfig::default(),
			security: SecurityConfig::default(),
		};
		let inv = Inventory::default();
		let a = build_document(&inv, &overlays);
		let b = build_document(&inv, &overlays);
		assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
	}
}

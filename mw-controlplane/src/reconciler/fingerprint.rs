//! Canonical change-detection hash: a digest over the tuple of
//! non-operator-owned router fields, used to short-circuit no-op cycles and
//! in test assertions about reconciliation determinism.

use sha2::{Digest, Sha256};

use crate::datasource::InventoryRouter;

/// Hashes `(host, service id, entrypoints, TLS SANs, TCP enabled, sorted
/// middleware refs)` into a stable hex digest. Two routers with identical
/// upstream-derived fields always produce the same digest, independent of
/// middleware-reference ordering.
pub fn fingerprint_of_router(router: &InventoryRouter) -> String {
	let mut middleware_names: Vec<String> = router.middlewares.iter().map(|m| m.canonical()).collect();
	middleware_names.sort();

	let mut entrypoints = router.entrypoints.clone();
	entrypoints.sort();
	let mut tls_sans = router.tls_sans.clone();
	tls_sans.sort();

	let canonical = serde_json::json!({
		"host": router.host,
		"service_id": router.service_id,
		"entrypoints": entrypoints,
		"tls_sans": tls_sans,
		"protocol": format!("{:?}", router.protocol),
		"middlewares": middleware_names,
	});
	let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

	let mut hasher = Sha256::new();
	hasher.update(&bytes);
	let digest = hasher.finalize();
	digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::datasource::{MiddlewareRef, RouterProtocol};

	fn router(mw_order: Vec<&str>) -> InventoryRouter {
		InventoryRouter {
			upstream_id: "r1".into(),
			host: "a.example".into(),
			entrypoints: vec!["web".into(), "websecure".into()],
			tls_enabled: false,
			tls_sans: vec![],
			protocol: RouterProtocol::Http,
			service_id: "s1".into(),
			priority: Some(200),
			middlewares: mw_order
				.into_iter()
				.map(|n| {
					let (name, provider) = n.split_once('@').unwrap();
					MiddlewareRef { name: name.into(), provider: provider.into() }
				})
				.collect(),
			raw_spec: None,
		}
	}

	#[test]
	fn fingerprint_ignores_middleware_order() {
		let a = fingerprint_of_router(&router(vec!["foo@docker", "bar@docker"]));
		let b = fingerprint_of_router(&router(vec!["bar@docker", "foo@docker"]));
		assert_eq!(a, b);
	}

	#[test]
	fn fingerprint_changes_with_host() {
		let mut r = router(vec![]);
		let a = fingerprint_of_router(&r);
		r.host = "b.example".into();
		let b = fingerprint_of_router(&r);
		assert_ne!(a, b);
	}
}

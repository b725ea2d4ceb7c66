//! C5: the in-process mTLS certificate authority. Owns the on-disk CA
//! directory and the `mtls_clients`/`mtls_config` tables; the proxy only ever
//! reads the CA certificate the files this module writes.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{Duration as ChronoDuration, Utc};
use rcgen::{
	BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
	KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::model::{MtlsClient, MtlsConfig};
use crate::store::{MtlsRepo, StoreError};

const CA_CERT_FILE: &str = "ca.crt";
const CA_KEY_FILE: &str = "ca.key";

#[derive(Debug, Error)]
pub enum MtlsError {
	#[error("already exists: {0}")]
	AlreadyExists(String),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("no CA has been generated")]
	NoCa,
	#[error("invalid name: {0}")]
	InvalidName(String),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
	#[error("filesystem error: {0}")]
	Io(#[from] std::io::Error),
	#[error("crypto error: {0}")]
	Crypto(String),
}

pub type MtlsResult<T> = Result<T, MtlsError>;

fn valid_name(name: &str) -> bool {
	!name.is_empty()
		&& name.len() <= 64
		&& name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// A simple password-derived keystream XOR, used only to keep the raw PEM
/// private key out of the clear at rest. The `.p12` bundle (encrypted with
/// the caller-supplied password via real PKCS#12 crypto) is the artifact
/// meant for actual key transport; this is defense for the DB copy.
fn keystream_xor(data: &[u8], password: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(data.len());
	let mut counter: u64 = 0;
	let mut block: Vec<u8> = Vec::new();
	for (i, byte) in data.iter().enumerate() {
		if i % 32 == 0 {
			let mut hasher = Sha256::new();
			hasher.update(password.as_bytes());
			hasher.update(counter.to_be_bytes());
			block = hasher.finalize().to_vec();
			counter += 1;
		}
		out.push(byte ^ block[i % 32]);
	}
	out
}

fn hash_password(password: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(password.as_bytes());
	hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Owns the on-disk CA directory; all mutating operations go through a DB
/// transaction so a row never outlives (or precedes) the file it describes.
pub struct MtlsManager {
	base_path: PathBuf,
}

impl MtlsManager {
	pub fn new(base_path: impl Into<PathBuf>) -> Self {
		MtlsManager { base_path: base_path.into() }
	}

	fn ca_cert_path(&self) -> PathBuf {
		self.base_path.join(CA_CERT_FILE)
	}

	fn ca_key_path(&self) -> PathBuf {
		self.base_path.join(CA_KEY_FILE)
	}

	pub fn generate_ca(&self, conn: &Connection, subject: &str, validity_days: i64) -> MtlsResult<MtlsConfig> {
		let mut cfg = MtlsRepo::get_config(conn)?;
		if cfg.has_ca {
			return Err(MtlsError::AlreadyExists("a CA already exists; delete it first".into()));
		}

		let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(|e| MtlsError::Crypto(e.to_string()))?;

		let mut params = CertificateParams::default();
		let mut dn = DistinguishedName::new();
		dn.push(DnType::CommonName, subject);
		params.distinguished_name = dn;
		params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
		let not_before = Utc::now();
		let not_after = not_before + ChronoDuration::days(validity_days);
		params.not_before = not_before.into();
		params.not_after = not_after.into();

		let cert = params.self_signed(&key_pair).map_err(|e| MtlsError::Crypto(e.to_string()))?;

		fs::create_dir_all(&self.base_path)?;
		write_atomic(&self.ca_cert_path(), cert.pem().as_bytes())?;
		write_atomic_private_key(&self.ca_key_path(), key_pair.serialize_pem().as_bytes())?;

		cfg.enabled = false;
		cfg.has_ca = true;
		cfg.ca_subject = Some(subject.to_string());
		cfg.ca_expiry = Some(not_after);
		cfg.ca_cert_path = Some(self.ca_cert_path().to_string_lossy().into_owned());
		cfg.certs_base_path = self.base_path.to_string_lossy().into_owned();
		MtlsRepo::save_config(conn, &cfg)?;
		Ok(cfg)
	}

	pub fn delete_ca(&self, conn: &Connection) -> MtlsResult<()> {
		let mut cfg = MtlsRepo::get_config(conn)?;
		if !cfg.has_ca {
			return Err(MtlsError::NoCa);
		}
		MtlsRepo::delete_all_clients(conn)?;
		cfg.has_ca = false;
		cfg.enabled = false;
		cfg.ca_subject = None;
		cfg.ca_expiry = None;
		cfg.ca_cert_path = None;
		MtlsRepo::save_config(conn, &cfg)?;

		if self.base_path.exists() {
			fs::remove_dir_all(&self.base_path)?;
		}
		Ok(())
	}

	pub fn enable(&self, conn: &Connection) -> MtlsResult<MtlsConfig> {
		let mut cfg = MtlsRepo::get_config(conn)?;
		if !cfg.has_ca {
			return Err(MtlsError::NoCa);
		}
		cfg.enabled = true;
		MtlsRepo::save_config(conn, &cfg)?;
		Ok(cfg)
	}

	pub fn disable(&self, conn: &Connection) -> MtlsResult<MtlsConfig> {
		let mut cfg = MtlsRepo::get_config(conn)?;
		cfg.enabled = false;
		MtlsRepo::save_config(conn, &cfg)?;
		Ok(cfg)
	}

	pub fn issue_client(&self, conn: &Connection, name: &str, validity_days: i64, p12_password: &str) -> MtlsResult<MtlsClient> {
		if !valid_name(name) {
			return Err(MtlsError::InvalidName(format!("'{name}' must match ^[a-z0-9-]{{1,64}}$")));
		}
		let cfg = MtlsRepo::get_config(conn)?;
		if !cfg.has_ca {
			return Err(MtlsError::NoCa);
		}
		if MtlsRepo::name_exists(conn, name)? {
			return Err(MtlsError::AlreadyExists(name.to_string()));
		}

		let ca_key_pem = fs::read_to_string(self.ca_key_path())?;
		let ca_key_pair = KeyPair::from_pem(&ca_key_pem).map_err(|e| MtlsError::Crypto(e.to_string()))?;

		// Reconstruct the CA's params from the persisted subject/expiry rather
		// than re-parsing ca.crt: the DN and key are what `signed_by` needs to
		// chain correctly, and both are reproduced exactly from the DB record.
		let mut ca_params = CertificateParams::default();
		let mut ca_dn = DistinguishedName::new();
		ca_dn.push(DnType::CommonName, cfg.ca_subject.clone().unwrap_or_default());
		ca_params.distinguished_name = ca_dn;
		ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
		if let Some(expiry) = cfg.ca_expiry {
			ca_params.not_after = expiry.into();
		}
		let ca_cert = ca_params.self_signed(&ca_key_pair).map_err(|e| MtlsError::Crypto(e.to_string()))?;

		let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).map_err(|e| MtlsError::Crypto(e.to_string()))?;
		let mut params = CertificateParams::default();
		let mut dn = DistinguishedName::new();
		dn.push(DnType::CommonName, name);
		params.distinguished_name = dn;
		params.is_ca = IsCa::NoCa;
		params.key_usages = vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
		params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
		let not_before = Utc::now();
		let not_after = not_before + ChronoDuration::days(validity_days);
		params.not_before = not_before.into();
		params.not_after = not_after.into();

		let cert = params.signed_by(&key_pair, &ca_cert, &ca_key_pair).map_err(|e| MtlsError::Crypto(e.to_string()))?;
		let cert_pem = cert.pem();
		let key_pem = key_pair.serialize_pem();

		let p12_bundle = package_p12(cert.der(), &key_pair.serialize_der(), ca_cert.der(), p12_password, name)?;
		let encrypted_key_pem = keystream_xor(key_pem.as_bytes(), p12_password);

		let client = MtlsClient {
			id: uuid::Uuid::new_v4().to_string(),
			name: name.to_string(),
			subject: name.to_string(),
			expiry: not_after,
			revoked: false,
			revoked_at: None,
			cert_pem,
			encrypted_key_pem: base64_encode(&encrypted_key_pem),
			p12_bundle,
			p12_password_hash: hash_password(p12_password),
		};
		MtlsRepo::insert_client(conn, &client)?;
		Ok(client)
	}

	pub fn revoke(&self, conn: &Connection, id: &str) -> MtlsResult<()> {
		MtlsRepo::get_client(conn, id)?;
		MtlsRepo::revoke_client(conn, id, Utc::now())?;
		Ok(())
	}

	pub fn delete(&self, conn: &Connection, id: &str) -> MtlsResult<()> {
		MtlsRepo::get_client(conn, id)?;
		MtlsRepo::delete_client(conn, id)?;
		Ok(())
	}

	pub fn export_p12(&self, conn: &Connection, id: &str) -> MtlsResult<(Vec<u8>, String)> {
		let client = MtlsRepo::get_client(conn, id)?;
		let filename = format!("{}.p12", client.name);
		Ok((client.p12_bundle, filename))
	}
}

fn base64_encode(data: &[u8]) -> String {
	use base64::Engine;
	base64::engine::general_purpose::STANDARD.encode(data)
}

fn package_p12(cert_der: &[u8], key_der: &[u8], ca_der: &[u8], password: &str, name: &str) -> MtlsResult<Vec<u8>> {
	let pfx = p12::PFX::new(cert_der, key_der, Some(ca_der), password, name)
		.ok_or_else(|| MtlsError::Crypto("failed to assemble PKCS#12 bundle".into()))?;
	Ok(pfx.to_der())
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let tmp = path.with_extension("tmp");
	{
		let mut f = fs::File::create(&tmp)?;
		f.write_all(contents)?;
		f.sync_all()?;
	}
	fs::rename(&tmp, path)?;
	Ok(())
}

/// Writes the CA private key with owner-only permissions.
fn write_atomic_private_key(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	write_atomic(path, contents)?;
	let mut perms = fs::metadata(path)?.permissions();
	perms.set_mode(0o600);
	fs::set_permissions(path, perms)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::Store;

	fn tmp_dir(label: &str) -> PathBuf {
		let mut dir = std::env::temp_dir();
		dir.push(format!("mw-mtls-test-{label}-{}", uuid::Uuid::new_v4()));
		dir
	}

	#[test]
	fn generate_ca_then_issue_client_round_trips() {
		let store = Store::open_in_memory().unwrap();
		let base = tmp_dir("issue");
		let mgr = MtlsManager::new(&base);

		let cfg = mgr.generate_ca(store.conn(), "test-ca", 3650).unwrap();
		assert!(cfg.has_ca);
		assert!(base.join(CA_CERT_FILE).exists());
		assert!(base.join(CA_KEY_FILE).exists());

		let client = mgr.issue_client(store.conn(), "client-one", 365, "hunter2").unwrap();
		assert_eq!(client.name, "client-one");
		assert!(!client.p12_bundle.is_empty());
		assert!(!client.revoked);

		let err = mgr.issue_client(store.conn(), "client-one", 365, "hunter2").unwrap_err();
		assert!(matches!(err, MtlsError::AlreadyExists(_)));

		let _ = fs::remove_dir_all(&base);
	}

	#[test]
	fn generate_ca_twice_fails() {
		let store = Store::open_in_memory().unwrap();
		let base = tmp_dir("twice");
		let mgr = MtlsManager::new(&base);
		mgr.generate_ca(store.conn(), "first", 30).unwrap();
		let err = mgr.generate_ca(store.conn(), "second", 30).unwrap_err();
		assert!(matches!(err, MtlsError::AlreadyExists(_)));
		let _ = fs::remove_dir_all(&base);
	}

	#[test]
	fn issue_client_rejects_invalid_name() {
		let store = Store::open_in_memory().unwrap();
		let base = tmp_dir("invalid-name");
		let mgr = MtlsManager::new(&base);
		mgr.generate_ca(store.conn(), "ca", 30).unwrap();
		let err = mgr.issue_client(store.conn(), "Not_Valid", 30, "pw").unwrap_err();
		assert!(matches!(err, MtlsError::InvalidName(_)));
		let _ = fs::remove_dir_all(&base);
	}

	#[test]
	fn delete_ca_cascades_to_clients_and_removes_directory() {
		let store = Store::open_in_memory().unwrap();
		let base = tmp_dir("delete-ca");
		let mgr = MtlsManager::new(&base);
		mgr.generate_ca(store.conn(), "ca", 30).unwrap();
		mgr.issue_client(store.conn(), "c1", 30, "pw").unwrap();
		mgr.enable(store.conn()).unwrap();

		mgr.delete_ca(store.conn()).unwrap();
		let cfg = MtlsRepo::get_config(store.conn()).unwrap();
		assert!(!cfg.has_ca);
		assert!(!cfg.enabled);
		assert!(MtlsRepo::list_clients(store.conn()).unwrap().is_empty());
		assert!(!base.exists());
	}

	#[test]
	fn revoke_is_idempotent() {
		let store = Store::open_in_memory().unwrap();
		let base = tmp_dir("revoke");
		let mgr = MtlsManager::new(&base);
		mgr.generate_ca(store.conn(), "ca", 30).unwrap();
		let client = mgr.issue_client(store.conn(), "c1", 30, "pw").unwrap();
		mgr.revoke(store.conn(), &client.id).unwrap();
		mgr.revoke(store.conn(), &client.id).unwrap();
		let reloaded = MtlsRepo::get_client(store.conn(), &client.id).unwrap();
		assert!(reloaded.revoked);
		let _ = fs::remove_dir_all(&base);
	}
}

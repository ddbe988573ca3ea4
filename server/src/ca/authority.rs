//! X.509 issuer. Generates a long-lived RSA root on first boot and signs
//! short-lived leaf certificates from PKCS#10 CSRs, binding the subject
//! common name to the authenticated user id.

use rand::Rng;
use rcgen::{
	BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
	DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use rcgen::string::Ia5String;
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use std::net::IpAddr;
use std::path::Path;
use time::{Duration as TimeDuration, OffsetDateTime};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;

use crate::prelude::*;
use crate::settings::Opts;

const ROOT_COMMON_NAME: &str = "NSL Router CA";
const ROOT_ORGANIZATION: &str = "NSL";
const ROOT_ORG_UNIT: &str = "Mesh PKI";
const ROOT_VALIDITY_DAYS: i64 = 3650;

/// A signed leaf certificate and its expiry (unix seconds).
#[derive(Debug)]
pub struct IssuedCertificate {
	pub certificate_pem: String,
	pub not_after: i64,
}

/// The in-process issuer. Built once before the server accepts requests
/// and read-only afterwards.
pub struct CertificateAuthority {
	issuer: Issuer<'static, KeyPair>,
	cert_pem: String,
	server_domain: Box<str>,
	validity_hours: u32,
}

impl std::fmt::Debug for CertificateAuthority {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CertificateAuthority")
			.field("server_domain", &self.server_domain)
			.field("validity_hours", &self.validity_hours)
			.finish_non_exhaustive()
	}
}

impl CertificateAuthority {
	/// Load the root from disk, or generate and persist a fresh one when
	/// either file is missing. Parse failures of existing material are
	/// fatal at startup.
	pub async fn init(opts: &Opts) -> ClResult<Self> {
		let cert_exists = tokio::fs::try_exists(&opts.ca_cert_path).await.unwrap_or(false);
		let key_exists = tokio::fs::try_exists(&opts.ca_key_path).await.unwrap_or(false);

		let (issuer, cert_pem) = if cert_exists && key_exists {
			let cert_pem = tokio::fs::read_to_string(&opts.ca_cert_path).await?;
			let key_pem = tokio::fs::read_to_string(&opts.ca_key_path).await?;
			let key = KeyPair::from_pem(&key_pem)
				.map_err(|e| Error::CryptoError(format!("CA key unreadable: {}", e)))?;
			let issuer = Issuer::from_ca_cert_pem(&cert_pem, key)
				.map_err(|e| Error::CryptoError(format!("CA certificate unreadable: {}", e)))?;
			info!("Loaded CA certificate from {}", opts.ca_cert_path.display());
			(issuer, cert_pem)
		} else {
			info!("CA material missing, generating a new root certificate");
			let (issuer, cert_pem, key_pem) = Self::generate_root().await?;
			persist_root(&opts.ca_cert_path, &cert_pem, &opts.ca_key_path, &key_pem).await?;
			info!("Persisted new CA root to {}", opts.ca_cert_path.display());
			(issuer, cert_pem)
		};

		Ok(Self {
			issuer,
			cert_pem,
			server_domain: opts.server_domain.clone(),
			validity_hours: opts.cert_validity_hours,
		})
	}

	async fn generate_root() -> ClResult<(Issuer<'static, KeyPair>, String, String)> {
		// RSA-2048 keygen is CPU-heavy; keep it off the runtime threads
		let key_pem = tokio::task::spawn_blocking(|| -> ClResult<String> {
			let mut rng = rand::thread_rng();
			let key = RsaPrivateKey::new(&mut rng, 2048)
				.map_err(|e| Error::CryptoError(format!("RSA key generation failed: {}", e)))?;
			let pem = key
				.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
				.map_err(|e| Error::CryptoError(format!("PKCS#8 encoding failed: {}", e)))?;
			Ok(pem.to_string())
		})
		.await??;

		let key = KeyPair::from_pem(&key_pem)
			.map_err(|e| Error::CryptoError(format!("generated CA key unusable: {}", e)))?;

		let mut dn = DistinguishedName::new();
		dn.push(DnType::CommonName, ROOT_COMMON_NAME);
		dn.push(DnType::OrganizationName, ROOT_ORGANIZATION);
		dn.push(DnType::OrganizationalUnitName, ROOT_ORG_UNIT);

		let mut params = CertificateParams::default();
		params.distinguished_name = dn;
		params.serial_number = Some(SerialNumber::from_slice(&[1]));
		params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
		params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
		let now = OffsetDateTime::now_utc();
		params.not_before = now;
		params.not_after = now + TimeDuration::days(ROOT_VALIDITY_DAYS);

		let cert = params.self_signed(&key)?;
		let cert_pem = cert.pem();
		let issuer = Issuer::from_ca_cert_pem(&cert_pem, key)
			.map_err(|e| Error::CryptoError(format!("generated CA unusable: {}", e)))?;
		Ok((issuer, cert_pem, key_pem))
	}

	/// The root certificate, PEM-encoded.
	pub fn ca_certificate_pem(&self) -> &str {
		&self.cert_pem
	}

	/// Sign a leaf certificate from a PEM CSR for the authenticated user.
	/// CPU-bound, runs to completion.
	pub fn sign_csr(
		&self,
		csr_pem: &str,
		user_id: &str,
		public_ip: Option<&str>,
	) -> ClResult<IssuedCertificate> {
		let pem_block = pem::parse(csr_pem)
			.map_err(|_| Error::CryptoError("Invalid CSR: not valid PEM".into()))?;
		let (_, csr) = X509CertificationRequest::from_der(pem_block.contents())
			.map_err(|_| Error::CryptoError("Invalid CSR".into()))?;
		csr.verify_signature()
			.map_err(|_| Error::CryptoError("Invalid CSR signature".into()))?;

		let common_name = csr
			.certification_request_info
			.subject
			.iter_common_name()
			.next()
			.and_then(|cn| cn.as_str().ok())
			.ok_or_else(|| Error::CryptoError("CSR subject has no common name".into()))?;
		if common_name != user_id {
			return Err(Error::CryptoError(format!(
				"CSR common name '{}' does not match user id '{}'",
				common_name, user_id
			)));
		}

		let mut csr_params = CertificateSigningRequestParams::from_pem(csr_pem)
			.map_err(|_| Error::CryptoError("Invalid CSR".into()))?;
		let params = &mut csr_params.params;

		// Leading zero byte keeps the DER serial integer positive
		let mut serial = vec![0u8];
		let tail: [u8; 15] = rand::thread_rng().r#gen();
		serial.extend_from_slice(&tail);
		params.serial_number = Some(SerialNumber::from_slice(&serial));

		let now = OffsetDateTime::now_utc();
		let not_after = now + TimeDuration::hours(i64::from(self.validity_hours));
		params.not_before = now;
		params.not_after = not_after;

		params.is_ca = IsCa::ExplicitNoCa;
		params.key_usages =
			vec![KeyUsagePurpose::DigitalSignature, KeyUsagePurpose::KeyEncipherment];
		params.extended_key_usages =
			vec![ExtendedKeyUsagePurpose::ServerAuth, ExtendedKeyUsagePurpose::ClientAuth];
		params.use_authority_key_identifier_extension = true;

		let mut sans = Vec::new();
		if !self.server_domain.is_empty() {
			sans.push(SanType::DnsName(
				Ia5String::try_from(format!("*.{}", self.server_domain))
					.map_err(|e| Error::CryptoError(format!("invalid SAN domain: {}", e)))?,
			));
		}
		sans.push(SanType::DnsName(
			Ia5String::try_from("*.nip.io".to_string())
				.map_err(|e| Error::CryptoError(format!("invalid SAN domain: {}", e)))?,
		));
		if let Some(ip) = public_ip.filter(|ip| !ip.is_empty()) {
			let addr: IpAddr = ip
				.parse()
				.map_err(|_| Error::CryptoError(format!("invalid public ip '{}'", ip)))?;
			sans.push(SanType::IpAddress(addr));
		}
		params.subject_alt_names = sans;

		let cert = csr_params.signed_by(&self.issuer)?;
		Ok(IssuedCertificate {
			certificate_pem: cert.pem(),
			not_after: not_after.unix_timestamp(),
		})
	}
}

async fn persist_root(
	cert_path: &Path,
	cert_pem: &str,
	key_path: &Path,
	key_pem: &str,
) -> ClResult<()> {
	for path in [cert_path, key_path] {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
	}
	tokio::fs::write(cert_path, cert_pem).await?;
	tokio::fs::write(key_path, key_pem).await?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		tokio::fs::set_permissions(cert_path, std::fs::Permissions::from_mode(0o644)).await?;
		tokio::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600)).await?;
	}
	Ok(())
}


// vim: ts=4

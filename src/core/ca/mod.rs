//! Node-scoped certificate issuance from a root CA.
//!
//! A rendered CSR document is turned into a fresh key pair and CSR, then
//! signed by the root CA under a fixed trust profile. The signer does not pin
//! hosts: the leaf keeps whatever subject and SANs the CSR carries.

mod profile;
mod request;

pub use profile::{not_after, parse_duration, SigningProfile};
pub use request::{CertificateRequest, KeyRequest, SubjectName};

use rcgen::{
    Certificate, CertificateParams, CertificateSigningRequestParams, IsCa, KeyPair, SerialNumber,
    SignatureAlgorithm, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, PKCS_RSA_SHA256,
};
use rustls_pki_types::PrivateKeyDer;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{Error, Result};
use crate::node::RootCa;
use crate::utils::io;

/// Key, CSR and certificate produced for one node, all PEM encoded.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub key: Vec<u8>,
    pub csr: Vec<u8>,
    pub certificate: Vec<u8>,
    /// Hex SHA-256 over the certificate DER.
    pub fingerprint: String,
}

/// Signs node certificates with a root CA. Holds only PEM text, so one issuer
/// is shared read-only by every worker of a fan-out.
#[derive(Debug, Clone)]
pub struct CertificateAuthorityIssuer {
    ca_cert_pem: String,
    ca_key_pem: String,
    profile: SigningProfile,
}

impl CertificateAuthorityIssuer {
    /// Read the root CA triple and select `profile` from its signing config.
    pub fn load(root: &RootCa, profile: &str) -> Result<Self> {
        let ca_cert_pem = read_ca_file(&root.cert_path)?;
        let ca_key_pem = read_ca_file(&root.key_path)?;
        let config = read_ca_file(&root.config_path)?;

        let profile = SigningProfile::from_config(&config, profile)
            .map_err(|e| e.with_hint(format!("signing config: {}", root.config_path.display())))?;

        Self::from_pem(ca_cert_pem, ca_key_pem, profile)
    }

    /// Build an issuer from PEM text. The CA certificate and key are parsed
    /// once here so a bad CA surfaces before any node is processed.
    pub fn from_pem(ca_cert_pem: String, ca_key_pem: String, profile: SigningProfile) -> Result<Self> {
        let issuer = Self {
            ca_cert_pem,
            ca_key_pem,
            profile,
        };
        issuer.signer()?;
        Ok(issuer)
    }

    pub fn profile(&self) -> &SigningProfile {
        &self.profile
    }

    fn signer(&self) -> Result<(Certificate, KeyPair)> {
        let key = ca_key_pair(&self.ca_key_pem)
            .map_err(|e| Error::cert_signing_failed(format!("invalid CA key: {}", e), None))?;
        let params = CertificateParams::from_ca_cert_pem(&self.ca_cert_pem)
            .map_err(|e| Error::cert_signing_failed(format!("invalid CA certificate: {}", e), None))?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| Error::cert_signing_failed(format!("CA reconstruction failed: {}", e), None))?;
        Ok((cert, key))
    }

    /// Issue a certificate for one rendered CSR document.
    pub fn issue(&self, document: &[u8]) -> Result<IssuedCertificate> {
        let request = CertificateRequest::parse(document)?;
        let (key_pair, csr_pem) = request.generate()?;

        let mut csr = CertificateSigningRequestParams::from_pem(&csr_pem)
            .map_err(|e| Error::cert_request_invalid(format!("generated CSR unreadable: {}", e)))?;

        let now = time::OffsetDateTime::now_utc();
        // Backdated to tolerate clock skew between the signer and the nodes.
        csr.params.not_before = now - time::Duration::minutes(5);
        csr.params.not_after = not_after(now, self.profile.validity)?;
        csr.params.serial_number = Some(random_serial());
        csr.params.is_ca = IsCa::ExplicitNoCa;
        csr.params.key_usages = self.profile.key_usages.clone();
        csr.params.extended_key_usages = self.profile.extended_key_usages.clone();
        csr.params.use_authority_key_identifier_extension = true;

        let (issuer, issuer_key) = self.signer()?;
        let cert = csr
            .signed_by(&issuer, &issuer_key)
            .map_err(|e| Error::cert_signing_failed(e.to_string(), None))?;

        Ok(IssuedCertificate {
            key: key_pair.serialize_pem().into_bytes(),
            csr: csr_pem.into_bytes(),
            certificate: cert.pem().into_bytes(),
            fingerprint: fingerprint(cert.der()),
        })
    }
}

/// Parse the CA key from PKCS#8, SEC1 (`EC PRIVATE KEY`) or PKCS#1
/// (`RSA PRIVATE KEY`) PEM.
fn ca_key_pair(pem: &str) -> std::result::Result<KeyPair, String> {
    let mut reader = pem.as_bytes();
    let der = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "no private key in PEM".to_string())?;

    // SEC1 and PKCS#1 do not name the signature algorithm; try each one the
    // key type allows.
    let candidates: Vec<&'static SignatureAlgorithm> = match &der {
        PrivateKeyDer::Pkcs8(_) => return KeyPair::from_pem(pem).map_err(|e| e.to_string()),
        PrivateKeyDer::Sec1(_) => vec![&PKCS_ECDSA_P256_SHA256, &PKCS_ECDSA_P384_SHA384],
        PrivateKeyDer::Pkcs1(_) => vec![&PKCS_RSA_SHA256],
        _ => Vec::new(),
    };

    let mut last_error = "unsupported key encoding".to_string();
    for algorithm in candidates {
        match KeyPair::from_der_and_sign_algo(&der, algorithm) {
            Ok(key) => return Ok(key),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(last_error)
}

fn read_ca_file(path: &Path) -> Result<String> {
    io::read_file(path, "read root CA").map_err(|e| {
        let problem = e
            .details
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unreadable")
            .to_string();
        Error::cert_signing_failed(problem, Some(path.display().to_string()))
    })
}

fn random_serial() -> SerialNumber {
    SerialNumber::from(random_serial_bytes())
}

fn random_serial_bytes() -> Vec<u8> {
    let mut bytes = *uuid::Uuid::new_v4().as_bytes();
    // Keep the DER integer positive.
    bytes[0] &= 0x7f;
    bytes.to_vec()
}

fn fingerprint(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

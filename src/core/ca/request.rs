//! CSR request documents: the JSON a CSR template renders into.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, KeyPair, RsaKeySize, SignatureAlgorithm,
    PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, PKCS_ED25519, PKCS_RSA_SHA256,
};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Key/subject request for one node's certificate.
///
/// Shape: `{"CN": "...", "hosts": [...], "key": {"algo": "ecdsa", "size": 256},
/// "names": [{"C": "...", "ST": "...", "L": "...", "O": "...", "OU": "..."}]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateRequest {
    #[serde(rename = "CN", default)]
    pub common_name: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub key: Option<KeyRequest>,
    #[serde(default)]
    pub names: Vec<SubjectName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyRequest {
    pub algo: String,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectName {
    #[serde(rename = "C", default)]
    pub country: String,
    #[serde(rename = "ST", default)]
    pub state: String,
    #[serde(rename = "L", default)]
    pub locality: String,
    #[serde(rename = "O", default)]
    pub organization: String,
    #[serde(rename = "OU", default)]
    pub organizational_unit: String,
}

impl CertificateRequest {
    /// Parse and validate a rendered CSR document.
    pub fn parse(document: &[u8]) -> Result<Self> {
        let request: CertificateRequest = serde_json::from_slice(document)
            .map_err(|e| Error::cert_request_invalid(e.to_string()))?;

        if request.common_name.is_empty() && request.hosts.is_empty() {
            return Err(Error::cert_request_invalid(
                "request has neither a common name nor hosts",
            ));
        }

        request.algorithm()?;
        Ok(request)
    }

    /// Signature algorithm for the requested key. Defaults to ECDSA P-256.
    pub fn algorithm(&self) -> Result<&'static SignatureAlgorithm> {
        let Some(key) = &self.key else {
            return Ok(&PKCS_ECDSA_P256_SHA256);
        };

        match (key.algo.to_ascii_lowercase().as_str(), key.size) {
            ("ecdsa", 256) => Ok(&PKCS_ECDSA_P256_SHA256),
            ("ecdsa", 384) => Ok(&PKCS_ECDSA_P384_SHA384),
            ("ecdsa", size) => Err(Error::cert_request_invalid(format!(
                "unsupported ecdsa key size {}",
                size
            ))),
            ("ed25519", _) => Ok(&PKCS_ED25519),
            ("rsa", _) => self.rsa_key_size().map(|_| &PKCS_RSA_SHA256),
            (algo, _) => Err(Error::cert_request_invalid(format!(
                "unknown key algorithm '{}'",
                algo
            ))),
        }
    }

    /// An absent size means 2048 bits.
    fn rsa_key_size(&self) -> Result<RsaKeySize> {
        match self.key.as_ref().map_or(0, |key| key.size) {
            0 | 2048 => Ok(RsaKeySize::_2048),
            3072 => Ok(RsaKeySize::_3072),
            4096 => Ok(RsaKeySize::_4096),
            size => Err(Error::cert_request_invalid(format!(
                "unsupported rsa key size {}",
                size
            ))),
        }
    }

    fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        if !self.common_name.is_empty() {
            dn.push(DnType::CommonName, self.common_name.as_str());
        }
        for name in &self.names {
            let fields = [
                (DnType::CountryName, &name.country),
                (DnType::StateOrProvinceName, &name.state),
                (DnType::LocalityName, &name.locality),
                (DnType::OrganizationName, &name.organization),
                (DnType::OrganizationalUnitName, &name.organizational_unit),
            ];
            for (ty, value) in fields {
                if !value.is_empty() {
                    dn.push(ty, value.as_str());
                }
            }
        }
        dn
    }

    /// Generate a fresh key pair and a PEM-encoded CSR for this request.
    pub fn generate(&self) -> Result<(KeyPair, String)> {
        let algorithm = self.algorithm()?;

        let mut params = CertificateParams::new(self.hosts.clone()).map_err(|e| {
            Error::cert_request_invalid(format!("invalid hosts {:?}: {}", self.hosts, e))
        })?;
        params.distinguished_name = self.distinguished_name();

        let generated = if std::ptr::eq(algorithm, &PKCS_RSA_SHA256) {
            KeyPair::generate_rsa_for(algorithm, self.rsa_key_size()?)
        } else {
            KeyPair::generate_for(algorithm)
        };
        let key_pair = generated
            .map_err(|e| Error::cert_request_invalid(format!("key generation failed: {}", e)))?;

        let csr_pem = params
            .serialize_request(&key_pair)
            .and_then(|csr| csr.pem())
            .map_err(|e| Error::cert_request_invalid(format!("CSR encoding failed: {}", e)))?;

        Ok((key_pair, csr_pem))
    }
}

//! Secure element abstraction and a directory-backed implementation

use crate::config::CertificateRequest;
use anyhow::{anyhow, bail, Context, Result};
use rcgen::{CertificateParams, DnType, DnValue};
use rumqttc::tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Client certificate chain plus the private key it certifies
pub struct DeviceCertificate {
    common_name: String,
    validity_years: u8,
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl DeviceCertificate {
    pub fn new(
        common_name: String,
        validity_years: u8,
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Self {
        Self {
            common_name,
            validity_years,
            chain,
            key,
        }
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn validity_years(&self) -> u8 {
        self.validity_years
    }

    /// Certificates presented during the handshake
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.chain, self.key)
    }
}

impl fmt::Debug for DeviceCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCertificate")
            .field("common_name", &self.common_name)
            .field("validity_years", &self.validity_years)
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Crypto element holding the device key and certificate material
pub trait SecureElement {
    /// Detect the element. Failure is fatal at boot.
    fn begin(&mut self) -> Result<()>;

    /// Hardware serial number
    fn serial_number(&self) -> Result<String>;

    /// Rebuild the self-signed certificate for the key in `request.key_slot`.
    ///
    /// The certificate must name the element serial as its common name and
    /// span `request.validity_years`.
    fn reconstruct_certificate(&self, request: &CertificateRequest) -> Result<DeviceCertificate>;
}

/// A directory standing in for the crypto element.
///
/// ```text
/// <dir>/serial            element serial number
/// <dir>/slot<N>.key.pem   private key in key slot N
/// <dir>/slot<M>.cert.pem  stored certificate in slot M
/// ```
pub struct FileSecureElement {
    dir: PathBuf,
    present: bool,
}

impl FileSecureElement {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            present: false,
        }
    }

    fn slot_path(&self, slot: u8, kind: &str) -> PathBuf {
        self.dir.join(format!("slot{}.{}.pem", slot, kind))
    }

    fn ensure_present(&self) -> Result<()> {
        if !self.present {
            bail!("Secure element not initialized");
        }
        Ok(())
    }
}

impl SecureElement for FileSecureElement {
    fn begin(&mut self) -> Result<()> {
        if !self.dir.join("serial").is_file() {
            bail!("No secure element present at {}", self.dir.display());
        }
        self.present = true;
        Ok(())
    }

    fn serial_number(&self) -> Result<String> {
        self.ensure_present()?;
        let path = self.dir.join("serial");
        let serial = fs::read_to_string(&path)
            .with_context(|| format!("read serial {}", path.display()))?;
        let serial = serial.trim();
        if serial.is_empty() {
            bail!("Secure element serial number is empty");
        }
        Ok(serial.to_string())
    }

    fn reconstruct_certificate(&self, request: &CertificateRequest) -> Result<DeviceCertificate> {
        self.ensure_present()?;
        let common_name = self.serial_number()?;

        let key = read_private_key(&self.slot_path(request.key_slot, "key"))?;
        let cert_path = self.slot_path(request.storage_slot, "cert");
        let chain = read_certificates(&cert_path)?;

        let params = CertificateParams::from_ca_cert_der(&chain[0])
            .with_context(|| format!("parse certificate slot {}", cert_path.display()))?;

        let subject = subject_common_name(&params)?;
        if subject != common_name {
            bail!(
                "Stored certificate is for {}, secure element serial is {}",
                subject,
                common_name
            );
        }

        let years = params.not_after.year() - params.not_before.year();
        if years != i32::from(request.validity_years) {
            bail!(
                "Stored certificate is valid for {} years, expected {}",
                years,
                request.validity_years
            );
        }

        Ok(DeviceCertificate::new(
            common_name,
            request.validity_years,
            chain,
            key,
        ))
    }
}

fn subject_common_name(params: &CertificateParams) -> Result<String> {
    match params.distinguished_name.get(&DnType::CommonName) {
        Some(DnValue::Utf8String(cn)) => Ok(cn.clone()),
        Some(DnValue::PrintableString(cn)) => Ok(cn.as_str().to_string()),
        Some(other) => bail!("Unsupported common name encoding: {:?}", other),
        None => bail!("Stored certificate has no common name"),
    }
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("open key slot {}", path.display()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("read key slot {}", path.display()))?
        .ok_or_else(|| anyhow!("no private key found at {}", path.display()))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file =
        File::open(path).with_context(|| format!("open certificate slot {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let chain = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("read certificate slot {}", path.display()))?;
    if chain.is_empty() {
        bail!("no certificate found at {}", path.display());
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{date_time_ymd, KeyPair};

    /// Self-signed certificate for `cn`, valid 2024 through 2024 + `years`
    fn issue(cn: &str, years: i32) -> (String, String) {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.not_before = date_time_ymd(2024, 1, 1);
        params.not_after = date_time_ymd(2024 + years, 1, 1);

        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert.pem(), key.serialize_pem())
    }

    fn element_dir(name: &str, serial: &str, cert: Option<(String, String)>) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "zone-element-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("serial"), serial).unwrap();
        if let Some((cert_pem, key_pem)) = cert {
            fs::write(dir.join("slot0.key.pem"), key_pem).unwrap();
            fs::write(dir.join("slot8.cert.pem"), cert_pem).unwrap();
        }
        dir
    }

    fn reconstruct(dir: &Path) -> Result<DeviceCertificate> {
        let mut element = FileSecureElement::new(dir);
        element.begin()?;
        element.reconstruct_certificate(&CertificateRequest::default())
    }

    #[test]
    fn test_missing_element_fails_begin() {
        let mut element = FileSecureElement::new("/nonexistent/zone-element");
        assert!(element.begin().is_err());
        assert!(element.serial_number().is_err());
    }

    #[test]
    fn test_reconstruct_certificate() {
        let dir = element_dir("full", "0123EE45\n", Some(issue("0123EE45", 31)));

        let cert = reconstruct(&dir).expect("reconstruct");
        assert_eq!(cert.common_name(), "0123EE45");
        assert_eq!(cert.validity_years(), 31);
        assert_eq!(cert.chain_len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_certificate_for_other_serial_rejected() {
        let dir = element_dir("mismatch", "0123EE45", Some(issue("99AA0000", 31)));

        let err = reconstruct(&dir).expect_err("certificate names another element");
        assert!(err.to_string().contains("99AA0000"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_certificate_with_wrong_validity_rejected() {
        let dir = element_dir("validity", "0123EE45", Some(issue("0123EE45", 1)));

        let err = reconstruct(&dir).expect_err("validity window differs");
        assert!(err.to_string().contains("valid for 1 years"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_key_slot() {
        let (cert_pem, _) = issue("0123EE45", 31);
        let dir = element_dir("nokey", "0123EE45", None);
        fs::write(dir.join("slot8.cert.pem"), cert_pem).unwrap();

        assert!(reconstruct(&dir).is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}

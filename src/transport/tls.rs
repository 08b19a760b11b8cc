//! Secure channel configuration
//!
//! Builds the rustls client config used under the MQTT session: the device
//! authenticates with its reconstructed certificate and private key, and the
//! broker certificate is checked against the webpki roots at the time given
//! by the device's [`TimeSource`] instead of the host clock.

use crate::security::DeviceCertificate;
use crate::transport::traits::TimeSource;
use anyhow::{anyhow, Context, Result};
use rumqttc::tokio_rustls::rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    client::WebPkiServerVerifier,
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Trust anchors: the webpki root set plus an optional extra CA file
pub fn root_store(extra_ca: Option<&Path>) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = extra_ca {
        let file =
            File::open(path).with_context(|| format!("open broker ca {}", path.display()))?;
        let mut reader = BufReader::new(file);
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.with_context(|| format!("read broker ca {}", path.display()))?;
            roots
                .add(cert)
                .map_err(|e| anyhow!("add broker ca: {e:?}"))?;
        }
    }

    Ok(roots)
}

/// Build the mutual-auth client config
pub fn client_config(
    roots: RootCertStore,
    device_cert: DeviceCertificate,
    clock: Arc<dyn TimeSource>,
) -> Result<Arc<ClientConfig>> {
    let webpki = WebPkiServerVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| anyhow!("build server verifier: {e:?}"))?;
    let verifier = Arc::new(ClockedServerVerifier {
        inner: webpki,
        clock,
    });

    let (chain, key) = device_cert.into_parts();
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(chain, key)
        .context("install device certificate")?;

    Ok(Arc::new(config))
}

/// Webpki verification with "now" taken from the device time source.
///
/// When the time source has no time yet the handshake fails and is retried
/// with the rest of the session setup.
#[derive(Debug)]
struct ClockedServerVerifier {
    inner: Arc<WebPkiServerVerifier>,
    clock: Arc<dyn TimeSource>,
}

impl ServerCertVerifier for ClockedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let secs = self
            .clock
            .now_unix_secs()
            .ok_or_else(|| rustls::Error::General("time source has no current time".into()))?;
        let now = UnixTime::since_unix_epoch(Duration::from_secs(secs));

        self.inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

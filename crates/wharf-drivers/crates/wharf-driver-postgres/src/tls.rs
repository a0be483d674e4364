//! TLS connector for `sslmode=prefer|require`

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;

/// Encrypting connector without certificate verification, matching libpq's
/// `require`. `prefer` falls back to plaintext inside tokio-postgres.
pub(crate) fn make_connector() -> Result<MakeTlsConnector, native_tls::Error> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(MakeTlsConnector::new(connector))
}

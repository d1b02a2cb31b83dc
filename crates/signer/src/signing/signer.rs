/// Trait for producing detached signatures bound to an identity.
///
/// Implementations are sync. Signing is CPU-bound and always runs on a
/// blocking thread.
pub trait DetachedSigner: Send + Sync {
    /// Sign raw bytes. The implementation hashes them itself.
    fn sign(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// DER-encoded certificate chain, leaf first.
    fn certificate_chain(&self) -> &[Vec<u8>];

    /// Human readable subject of the leaf certificate.
    fn subject(&self) -> &str;

    /// Algorithm identifier string (e.g. "rsa-pkcs1v15-sha256").
    fn algorithm(&self) -> &str;
}

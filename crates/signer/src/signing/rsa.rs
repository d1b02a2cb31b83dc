use anyhow::{Context, Result};
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePublicKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

const RSA_KEY_BITS: usize = 2048;

pub const ALGORITHM: &str = "rsa-pkcs1v15-sha256";

/// RSA PKCS#1 v1.5 signer with SHA-256 digest.
#[derive(Clone)]
pub struct RsaSigner {
    signing_key: SigningKey<Sha256>,
    private_key: RsaPrivateKey,
}

impl RsaSigner {
    pub fn from_key(private_key: RsaPrivateKey) -> Self {
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        Self { signing_key, private_key }
    }

    /// Derives a key deterministically from a seed string. The SHA-256 hash
    /// of the seed seeds a CSPRNG used for key generation. Meant for fixtures
    /// and local testing, never for real identities.
    pub fn from_seed(seed: &str) -> Result<Self> {
        let hash = Sha256::digest(seed.as_bytes());
        let mut rng = ChaCha20Rng::from_seed(hash.into());
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .context("generating RSA key from seed")?;
        Ok(Self::from_key(private_key))
    }

    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.signing_key.sign(data).to_vec()
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// SubjectPublicKeyInfo DER of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let der = self
            .public_key()
            .to_public_key_der()
            .context("encoding RSA public key to DER")?;
        Ok(der.into_vec())
    }
}

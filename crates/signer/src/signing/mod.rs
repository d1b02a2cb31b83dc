mod signer;
mod rsa;

pub use signer::DetachedSigner;
pub use self::rsa::{ALGORITHM as RSA_ALGORITHM, RsaSigner};

//! HMAC-SHA256 artifact integrity: compute a signature over fetched
//! artifact bytes and compare it against the published signature in
//! constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::LocalDeployment;
use crate::errors::{PullDeployError, PullDeployResult};

type HmacSha256 = Hmac<Sha256>;

/// Compute the 32-byte HMAC-SHA256 of `data`, keyed by `secret`.
pub fn compute(secret: &str, data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

impl LocalDeployment {
    /// Recompute the HMAC of the locally stored artifact and compare it,
    /// in constant time, against the stored sidecar. Fails with
    /// [`PullDeployError::Integrity`] on mismatch.
    pub async fn check_hmac(&self, version: &str, secret: &str) -> PullDeployResult<()> {
        let artifact = self.read_artifact(version).await?;
        let expected = self.read_hmac(version).await?;
        let actual = compute(secret, &artifact);

        if expected.ct_eq(&actual).into() {
            Ok(())
        } else {
            Err(PullDeployError::Integrity {
                version: version.to_string(),
                expected: hex::encode(&expected),
                actual: hex::encode(&actual),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "the quick brown fox jumps over the lazy dog";

    #[test]
    fn compute_is_deterministic() {
        let a = compute(SECRET, b"hello world");
        let b = compute(SECRET, b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn compute_differs_on_different_secret() {
        let a = compute(SECRET, b"hello world");
        let b = compute("a different secret", b"hello world");
        assert_ne!(a, b);
    }
}

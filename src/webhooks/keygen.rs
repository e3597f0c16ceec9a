//! Throwaway SSH key generation.
//!
//! When a user leaves `sshPublicKey` empty the defaulter installs a freshly
//! generated RSA-2048 public key. The private half is dropped immediately and
//! never stored anywhere: nobody can log in with it. Users who need SSH
//! access must supply their own key.

use rand_core::OsRng;
use ssh_key::private::RsaKeypair;
use ssh_key::public::KeyData;
use ssh_key::PublicKey;

use crate::error::{Error, Result};

/// Modulus size of generated keys.
pub const RSA_KEY_BITS: usize = 2048;

/// Generate an RSA key and return the OpenSSH authorized-keys encoding of
/// its public half.
pub fn generate_ssh_public_key() -> Result<String> {
    let keypair = RsaKeypair::random(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let public = PublicKey::new(KeyData::Rsa(keypair.public), "");
    public
        .to_openssh()
        .map_err(|e| Error::KeyGeneration(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::validation::{FieldPath, format};

    #[test]
    fn test_generated_key_is_valid() {
        let key = generate_ssh_public_key().unwrap();
        assert!(key.starts_with("ssh-rsa "));
        assert!(format::ssh_public_key(&key, &FieldPath::new("spec")).is_none());
    }
}

// 2.1 signature.rs: (v, r, s) secp256k1 signatures over order hashes.
// verification is a pure function of (signer, hash, signature). nothing here knows who
// is calling the engine; caller identity is passed around explicitly.

use crate::order::Order;
use crate::types::{Address, OrderHash};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// v = 27 + recovery id
pub const V_OFFSET: u8 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Signature {
    fn to_rs_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid recovery byte v={0}")]
    InvalidRecoveryId(u8),

    #[error("Malformed signature scalars")]
    Malformed,

    #[error("Public key recovery failed")]
    RecoveryFailed,

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Signing failed")]
    SigningFailed,
}

// last 20 bytes of SHA-256 over the uncompressed point (without the 0x04 prefix)
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = Sha256::digest(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address(bytes)
}

pub fn sign_hash(key: &SigningKey, hash: &OrderHash) -> Result<Signature, SignatureError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash.as_bytes())
        .map_err(|_| SignatureError::SigningFailed)?;

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(Signature {
        v: V_OFFSET + recovery_id.to_byte(),
        r,
        s,
    })
}

pub fn recover_signer(hash: &OrderHash, signature: &Signature) -> Result<Address, SignatureError> {
    let recovery_byte = signature
        .v
        .checked_sub(V_OFFSET)
        .filter(|b| *b <= 1)
        .ok_or(SignatureError::InvalidRecoveryId(signature.v))?;
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(SignatureError::InvalidRecoveryId(signature.v))?;

    let ecdsa = EcdsaSignature::from_slice(&signature.to_rs_bytes())
        .map_err(|_| SignatureError::Malformed)?;

    let key = VerifyingKey::recover_from_prehash(hash.as_bytes(), &ecdsa, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_of(&key))
}

/// True when `signature` over `hash` recovers to `signer`.
pub fn verify_signature(signer: Address, hash: &OrderHash, signature: &Signature) -> bool {
    matches!(recover_signer(hash, signature), Ok(recovered) if recovered == signer)
}

// a signing identity for makers (simulation and tests)
pub struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    pub fn from_secret(secret: &[u8; 32]) -> Result<Self, SignatureError> {
        let key = SigningKey::from_slice(secret).map_err(|_| SignatureError::InvalidSecretKey)?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, hash: &OrderHash) -> Result<Signature, SignatureError> {
        sign_hash(&self.key, hash)
    }

    pub fn sign_order(&self, order: &Order) -> Result<Signature, SignatureError> {
        self.sign(&order.hash())
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(seed: u8) -> Wallet {
        Wallet::from_secret(&[seed; 32]).unwrap()
    }

    #[test]
    fn sign_and_recover() {
        let alice = wallet(1);
        let hash = OrderHash([7u8; 32]);
        let sig = alice.sign(&hash).unwrap();

        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(&hash, &sig).unwrap(), alice.address());
        assert!(verify_signature(alice.address(), &hash, &sig));
    }

    #[test]
    fn wrong_signer_fails() {
        let alice = wallet(1);
        let bob = wallet(2);
        let hash = OrderHash([7u8; 32]);
        let sig = alice.sign(&hash).unwrap();
        assert!(!verify_signature(bob.address(), &hash, &sig));
    }

    #[test]
    fn tampered_hash_fails() {
        let alice = wallet(1);
        let sig = alice.sign(&OrderHash([7u8; 32])).unwrap();
        assert!(!verify_signature(alice.address(), &OrderHash([8u8; 32]), &sig));
    }

    #[test]
    fn bad_recovery_byte_rejected() {
        let alice = wallet(1);
        let hash = OrderHash([7u8; 32]);
        let mut sig = alice.sign(&hash).unwrap();
        sig.v = 29;
        assert_eq!(recover_signer(&hash, &sig), Err(SignatureError::InvalidRecoveryId(29)));
        assert!(!verify_signature(alice.address(), &hash, &sig));
    }

    #[test]
    fn zero_scalars_are_malformed() {
        let sig = Signature { v: 27, r: [0u8; 32], s: [0u8; 32] };
        assert_eq!(recover_signer(&OrderHash([7u8; 32]), &sig), Err(SignatureError::Malformed));
    }

    #[test]
    fn zero_secret_rejected() {
        assert!(matches!(Wallet::from_secret(&[0u8; 32]), Err(SignatureError::InvalidSecretKey)));
    }
}

//! Quantum-signature format and derivation.
//!
//! A signature is an opaque token whose trust is rooted in the gate's
//! generator; the verifier checks well-formedness only. Format:
//! `qc` prefix, total length ≥ 64, remainder unpadded base64.
//!
//! Per-cell signatures are derived from the solution signature and the cell
//! id, and share the solution signature's first 10 characters so membership
//! can be checked without consulting the generator.

use crate::error::SecurityError;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};

/// Minimum length of a well-formed signature.
pub const MIN_SIGNATURE_LEN: usize = 64;

/// Signature prefix tag.
pub const SIGNATURE_PREFIX: &str = "qc";

/// Number of leading characters shared between a solution signature and
/// the signatures of its member cells.
pub const SHARED_PREFIX_LEN: usize = 10;

/// Generate a fresh solution signature bound to the given material.
///
/// `entropy` must be caller-supplied randomness; the same material with
/// different entropy yields unrelated signatures.
pub fn generate(material: &[u8], entropy: &[u8; 16]) -> String {
    let digest = Sha256::new()
        .chain_update(material)
        .chain_update(entropy)
        .finalize();

    // 32 digest bytes + 16 entropy bytes = 48 bytes = 64 base64 chars,
    // which lands exactly on the minimum length with the prefix on top.
    let mut payload = Vec::with_capacity(48);
    payload.extend_from_slice(&digest);
    payload.extend_from_slice(entropy);

    format!("{}{}", SIGNATURE_PREFIX, STANDARD_NO_PAD.encode(payload))
}

/// Derive a member-cell signature sharing the solution prefix.
pub fn derive_for_cell(solution_signature: &str, cell_id: &str) -> String {
    let digest = Sha512::new()
        .chain_update(solution_signature.as_bytes())
        .chain_update(b":")
        .chain_update(cell_id.as_bytes())
        .finalize();

    let prefix: String = solution_signature.chars().take(SHARED_PREFIX_LEN).collect();
    // 84 of the 86 encoded chars: keeps the base64 remainder (8 prefix
    // chars + body) a whole number of quads so it decodes canonically.
    let body: String = STANDARD_NO_PAD.encode(digest).chars().take(84).collect();
    format!("{}{}", prefix, body)
}

/// Check well-formedness: length, prefix tag, base64 remainder.
pub fn verify_well_formed(signature: &str) -> Result<(), SecurityError> {
    if signature.len() < MIN_SIGNATURE_LEN {
        return Err(SecurityError::MalformedSignature {
            reason: format!(
                "length {} below minimum {}",
                signature.len(),
                MIN_SIGNATURE_LEN
            ),
        });
    }
    if !signature.starts_with(SIGNATURE_PREFIX) {
        return Err(SecurityError::MalformedSignature {
            reason: format!("missing '{}' prefix", SIGNATURE_PREFIX),
        });
    }
    if STANDARD_NO_PAD
        .decode(&signature[SIGNATURE_PREFIX.len()..])
        .is_err()
    {
        return Err(SecurityError::MalformedSignature {
            reason: "remainder is not base64".to_string(),
        });
    }
    Ok(())
}

/// Check that a cell signature shares the solution signature's prefix.
pub fn shares_prefix(solution_signature: &str, cell_signature: &str) -> bool {
    solution_signature.len() >= SHARED_PREFIX_LEN
        && cell_signature.len() >= SHARED_PREFIX_LEN
        && solution_signature[..SHARED_PREFIX_LEN] == cell_signature[..SHARED_PREFIX_LEN]
}

//! Content fingerprints for health sampling

/// BLAKE3 fingerprint of captured output, hex-encoded (64 chars).
pub fn fingerprint(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

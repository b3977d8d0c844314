use bytes::Bytes;
use depot_storage::ByteStream;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data as hex string
pub fn sha256_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Split `data` into a stream of `piece`-sized chunks.
#[allow(dead_code)]
pub fn chunked_stream(data: Bytes, piece: usize) -> ByteStream {
    let mut parts = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + piece).min(data.len());
        parts.push(Ok(data.slice(offset..end)));
        offset = end;
    }
    Box::pin(futures::stream::iter(parts))
}

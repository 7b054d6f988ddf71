/*! Splitting outgoing byte streams into bounded writes, and reassembling
returned bytes into frames.

Pure and total; [`crate::session::DutSession`] is the only caller.
*/
use crate::error::{Error, Result};
use crate::frame::FRAME_LEN;

/// Default write-burst size, chosen to cover 3 frames plus one byte of
/// slack; it bounds per-call transport pressure and has no bearing on
/// correctness.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Split `bytes` into contiguous slices of at most `buffer_size` bytes
/// each; the last slice may be shorter. Concatenating the result
/// reproduces `bytes` exactly.
pub fn chunk_outgoing(bytes: &[u8], buffer_size: usize) -> Vec<&[u8]> {
    assert!(buffer_size > 0, "buffer_size must be positive");
    bytes.chunks(buffer_size).collect()
}

/// Reinterpret a flat byte buffer as a sequence of 3-byte frames.
///
/// # Errors
///
/// Returns [`Error::FrameAlignment`] if `bytes.len()` isn't a multiple of
/// [`FRAME_LEN`].
pub fn split_frames(bytes: &[u8]) -> Result<Vec<[u8; FRAME_LEN]>> {
    if bytes.len() % FRAME_LEN != 0 {
        return Err(Error::FrameAlignment { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(FRAME_LEN)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

/// Drop the first `k` frames, compensating for device pipeline latency.
pub fn drop_prefix(frames: &[[u8; FRAME_LEN]], k: usize) -> &[[u8; FRAME_LEN]] {
    if k >= frames.len() {
        &[]
    } else {
        &frames[k..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_outgoing_splits_in_thirds() {
        let b: Vec<u8> = (0..30).collect();
        let chunks = chunk_outgoing(&b, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 10));
    }

    #[test]
    fn chunk_outgoing_preserves_content_for_any_size() {
        let b: Vec<u8> = (0..47).collect();
        for k in 1..=47 {
            let chunks = chunk_outgoing(&b, k);
            let joined: Vec<u8> = chunks.into_iter().flatten().copied().collect();
            assert_eq!(joined, b, "k={k}");
        }
    }

    #[test]
    fn split_frames_requires_alignment() {
        assert!(split_frames(&[0, 1, 2, 3]).is_err());
        assert!(split_frames(&[0, 1, 2, 3, 4, 5]).is_ok());
    }

    #[test]
    fn split_frames_recovers_triples() {
        let b = [0u8, 1, 2, 3, 4, 5, 6, 7, 8];
        let frames = split_frames(&b).unwrap();
        assert_eq!(frames, vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]]);
    }

    #[test]
    fn drop_prefix_removes_leading_frames() {
        let frames = vec![[0u8, 0, 0], [1, 1, 1], [2, 2, 2], [3, 3, 3]];
        assert_eq!(drop_prefix(&frames, 3), &[[3, 3, 3]]);
    }

    #[test]
    fn drop_prefix_handles_short_input() {
        let frames = vec![[0u8, 0, 0]];
        assert_eq!(drop_prefix(&frames, 3), &[] as &[[u8; 3]]);
    }
}

//! Outer Reed-Solomon `(255, 223)` code applied to five consecutive chunks of
//! each LDPC frame.
//!
//! Built on `reed_solomon_erasure::galois_8::ReedSolomon`, which normally wraps
//! shards chunked out of a buffer. Here each "shard" is a single byte:
//! `RS_MESSAGE_LEN` one-byte data shards plus `RS_PARITY_LEN` one-byte parity
//! shards form exactly one classical `(255, 223)` codeword, rather than
//! larger object-sized shards.

use crate::config::{RS_BLOCK_LEN, RS_MESSAGE_LEN, RS_PARITY_LEN};
use crate::tools::error::{CoreError, ErrorKind, Result};
use reed_solomon_erasure::galois_8::ReedSolomon;

/// A `(255, 223)` Reed-Solomon chunk codec.
#[derive(Debug)]
pub struct RsChunkCodec {
    rs: ReedSolomon,
}

impl RsChunkCodec {
    /// Build the codec. Fails only on a `reed-solomon-erasure` construction
    /// error, which cannot happen for the fixed `(223, 32)` parameters this
    /// crate uses but is still surfaced rather than unwrapped.
    pub fn new() -> Result<Self> {
        let rs = ReedSolomon::new(RS_MESSAGE_LEN, RS_PARITY_LEN)
            .map_err(|e| CoreError::new(ErrorKind::CodecParams, format!("RS init: {e:?}")))?;
        Ok(RsChunkCodec { rs })
    }

    /// Encode one 223-byte message chunk into a 255-byte RS block (message ∥ parity).
    pub fn encode_chunk(&self, message: &[u8]) -> Vec<u8> {
        debug_assert_eq!(message.len(), RS_MESSAGE_LEN);
        let mut shards: Vec<Vec<u8>> = message.iter().map(|&b| vec![b]).collect();
        shards.extend((0..RS_PARITY_LEN).map(|_| vec![0u8]));
        self.rs.encode(&mut shards).expect("shard shapes are fixed and correct");

        let mut out = Vec::with_capacity(RS_BLOCK_LEN);
        for shard in &shards {
            out.push(shard[0]);
        }
        out
    }

    /// Recompute parity from `data` (223 bytes) and compare against `parity` (32 bytes).
    fn parity_matches(&self, data: &[u8], parity: &[u8]) -> bool {
        let recomputed = self.encode_chunk(data);
        recomputed[RS_MESSAGE_LEN..] == *parity
    }

    /// Correct one 255-byte RS block in place via a bounded errors-only
    /// search: verify the syndrome; if non-zero, try marking each
    /// of the 255 byte positions erased in turn (ascending order), accepting
    /// the first whose reconstruction makes the recomputed parity agree with
    /// the block's unerased parity bytes. Returns whether the block is
    /// believed correct after this call (the block is always left in its best
    /// candidate state; a caller relies on the OTI CRC to reject a block this
    /// couldn't actually fix).
    pub fn correct_block(&self, block: &mut [u8]) -> bool {
        debug_assert_eq!(block.len(), RS_BLOCK_LEN);
        let (data, parity) = block.split_at(RS_MESSAGE_LEN);
        if self.parity_matches(data, parity) {
            return true;
        }

        for erase_pos in 0..RS_BLOCK_LEN {
            let mut shards: Vec<Option<Vec<u8>>> = block
                .iter()
                .enumerate()
                .map(|(i, &b)| if i == erase_pos { None } else { Some(vec![b]) })
                .collect();
            if self.rs.reconstruct(&mut shards).is_err() {
                continue;
            }
            let candidate: Vec<u8> = shards.iter().map(|s| s.as_ref().unwrap()[0]).collect();
            let (cdata, cparity) = candidate.split_at(RS_MESSAGE_LEN);
            if self.parity_matches(cdata, cparity) {
                block.copy_from_slice(&candidate);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_verify_round_trips() {
        let codec = RsChunkCodec::new().unwrap();
        let message = vec![0x5Au8; RS_MESSAGE_LEN];
        let block = codec.encode_chunk(&message);
        assert_eq!(block.len(), RS_BLOCK_LEN);
        assert!(codec.parity_matches(&block[..RS_MESSAGE_LEN], &block[RS_MESSAGE_LEN..]));
    }

    #[test]
    fn corrects_single_byte_error() {
        let codec = RsChunkCodec::new().unwrap();
        let message: Vec<u8> = (0..RS_MESSAGE_LEN).map(|i| i as u8).collect();
        let mut block = codec.encode_chunk(&message);
        block[10] ^= 0xFF;

        assert!(codec.correct_block(&mut block));
        assert_eq!(&block[..RS_MESSAGE_LEN], message.as_slice());
    }

    #[test]
    fn corrects_single_parity_byte_error() {
        let codec = RsChunkCodec::new().unwrap();
        let message: Vec<u8> = vec![0x11; RS_MESSAGE_LEN];
        let mut block = codec.encode_chunk(&message);
        block[RS_MESSAGE_LEN + 3] ^= 0x01;

        assert!(codec.correct_block(&mut block));
        assert_eq!(&block[..RS_MESSAGE_LEN], message.as_slice());
    }

    #[test]
    fn leaves_block_as_best_effort_when_uncorrectable() {
        let codec = RsChunkCodec::new().unwrap();
        let message: Vec<u8> = vec![0x22; RS_MESSAGE_LEN];
        let mut block = codec.encode_chunk(&message);
        // Corrupt many bytes: beyond this bounded single-erasure search's reach.
        for i in 0..20 {
            block[i] ^= 0xFF;
        }
        // Should not panic; may or may not report success, but must terminate.
        let _ = codec.correct_block(&mut block);
    }
}

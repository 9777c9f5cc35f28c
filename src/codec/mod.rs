//! LDPC-Staircase + Reed-Solomon FEC codec.
//!
//! [`encode`] turns an arbitrary byte message into a contiguous run of
//! RS-LDPC frames; [`decode`] reverses it, tolerating lost symbols (up to
//! what the LDPC-Staircase decoder's peeling-plus-Gaussian-elimination passes
//! can resolve — see [`ldpc`]) and intra-frame byte errors (via the RS outer
//! code).

pub mod ldpc;
pub mod oti;
pub mod rs;

use crate::config::{
    L_LDPC, L_RS_LDPC, LDPC_N1_MAX, LDPC_N1_MIN, OFEC_MAX, OTI_SIZE, RS_BLOCK_LEN, RS_MESSAGE_LEN,
    SYMBOL_SIZE,
};
use crate::tools::error::{CoreError, ErrorKind, Result};
use ldpc::{LdpcDecoder, LdpcEncoder, LdpcParams};
use oti::Oti;
use rs::RsChunkCodec;
use std::fmt;

/// Stable, matchable reasons the codec can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFailure {
    /// `n = floor(k / coderate)` would exceed [`OFEC_MAX`].
    ExceededMaxSymbols,
    /// `N1 = min(n - k, 10)` fell below the protocol minimum of 3.
    BelowN1Min,
    /// No received frame's OTI CRC matched its symbol; `(n, k)` is unknown.
    NoOtiFound,
    /// The LDPC-Staircase decoder could not resolve all source symbols.
    DecodeNotPossible,
}

impl fmt::Display for CodecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CodecFailure::ExceededMaxSymbols => "exceeded max symbols (n > 50000)",
            CodecFailure::BelowN1Min => "N1 below minimum of 3",
            CodecFailure::NoOtiFound => "no OTI with a matching CRC was found",
            CodecFailure::DecodeNotPossible => "decode not possible: insufficient symbols",
        };
        f.write_str(s)
    }
}

impl std::error::Error for CodecFailure {}

fn codec_params_err(reason: CodecFailure) -> CoreError {
    CoreError::new(ErrorKind::CodecParams, reason)
}

fn decode_failure_err(reason: CodecFailure) -> CoreError {
    CoreError::new(ErrorKind::DecodeFailure, reason)
}

/// Encode `message` at code rate `coderate`. `prng_seed` is carried
/// through to the [`LdpcParams`] for profile fidelity; it does not influence
/// the graph structure.
pub fn encode(message: &[u8], coderate: f32, prng_seed: u64) -> Result<Vec<u8>> {
    let k = ((message.len() + SYMBOL_SIZE - 1) / SYMBOL_SIZE).max(1);
    let n = ((k as f64) / (coderate as f64)).floor() as usize;

    if n > OFEC_MAX {
        return Err(codec_params_err(CodecFailure::ExceededMaxSymbols));
    }
    let r = n.saturating_sub(k);
    let n1 = r.min(LDPC_N1_MAX);
    if n1 < LDPC_N1_MIN {
        return Err(codec_params_err(CodecFailure::BelowN1Min));
    }

    let mut source = vec![vec![0u8; SYMBOL_SIZE]; k];
    for (i, chunk) in message.chunks(SYMBOL_SIZE).enumerate() {
        source[i][..chunk.len()].copy_from_slice(chunk);
    }

    let params = LdpcParams {
        k,
        r,
        symbol_size: SYMBOL_SIZE,
        n1,
        prng_seed,
    };
    let repair = LdpcEncoder::new(params).encode(&source);
    let rs_codec = RsChunkCodec::new()?;

    let mut out = Vec::with_capacity(n * L_RS_LDPC);
    for esi in 0..n {
        let symbol: &[u8] = if esi < k { &source[esi] } else { &repair[esi - k] };
        let oti = Oti::for_symbol(esi as u32, n as u32, k as u32, symbol);

        let mut ldpc_frame = Vec::with_capacity(L_LDPC);
        ldpc_frame.extend_from_slice(&oti.to_bytes());
        ldpc_frame.extend_from_slice(symbol);
        debug_assert_eq!(ldpc_frame.len(), L_LDPC);

        for chunk in ldpc_frame.chunks(RS_MESSAGE_LEN) {
            out.extend(rs_codec.encode_chunk(chunk));
        }
    }
    debug_assert_eq!(out.len(), n * L_RS_LDPC);
    Ok(out)
}

/// Decode a run of RS-LDPC frames back into the original (padded) message.
pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
    let nframes = encoded.len() / L_RS_LDPC;
    if encoded.len() % L_RS_LDPC != 0 {
        log::warn!(
            "decode: {} trailing bytes do not form a complete RS-LDPC frame",
            encoded.len() % L_RS_LDPC
        );
    }

    let rs_codec = RsChunkCodec::new()?;
    let mut ldpc_frames: Vec<Vec<u8>> = Vec::with_capacity(nframes);
    for f in 0..nframes {
        let frame_bytes = &encoded[f * L_RS_LDPC..(f + 1) * L_RS_LDPC];
        let mut ldpc_frame = Vec::with_capacity(L_LDPC);
        for block in frame_bytes.chunks(RS_BLOCK_LEN) {
            let mut block = block.to_vec();
            rs_codec.correct_block(&mut block);
            ldpc_frame.extend_from_slice(&block[..RS_MESSAGE_LEN]);
        }
        debug_assert_eq!(ldpc_frame.len(), L_LDPC);
        ldpc_frames.push(ldpc_frame);
    }

    let mut found: Option<(u32, u32)> = None;
    for frame in &ldpc_frames {
        let oti = Oti::from_bytes(&frame[..OTI_SIZE]);
        let symbol = &frame[OTI_SIZE..];
        if oti.crc_matches(symbol) {
            found = Some((oti.n, oti.k));
            break;
        }
        log::debug!("decode: OTI CRC mismatch at esi={}", oti.esi);
    }
    let (n, k) = found.ok_or_else(|| decode_failure_err(CodecFailure::NoOtiFound))?;
    let n = n as usize;
    let k = k as usize;
    let r = n.saturating_sub(k);
    let n1 = r.min(LDPC_N1_MAX);

    let params = LdpcParams {
        k,
        r,
        symbol_size: SYMBOL_SIZE,
        n1,
        prng_seed: 0,
    };
    let mut decoder = LdpcDecoder::new(params);
    for frame in &ldpc_frames {
        let oti = Oti::from_bytes(&frame[..OTI_SIZE]);
        let esi = oti.esi as usize;
        if esi >= n {
            log::debug!("decode: esi {esi} >= n {n}, skipping");
            continue;
        }
        decoder.push_symbol(esi, frame[OTI_SIZE..].to_vec());
    }

    if !decoder.finalize() {
        return Err(decode_failure_err(CodecFailure::DecodeNotPossible));
    }

    let mut output = Vec::with_capacity(k * SYMBOL_SIZE);
    for symbol in decoder.source_symbols() {
        output.extend_from_slice(symbol);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        crate::tests::init();
    }

    #[test]
    fn round_trip_single_symbol() {
        init();
        let message = b"HELLO WORLD";
        // k = 1 (11 bytes fits in one symbol); coderate 0.25 gives
        // n = floor(1/0.25) = 4, r = 3, N1 = min(3, 10) = 3 — the smallest
        // N1 the BelowN1Min invariant allows. spec.md's own scenario 1
        // literal (coderate 0.667) would drive r to 0 and N1 below the
        // minimum, so it can never actually succeed; this keeps k = 1 but
        // picks a coderate that satisfies the invariant instead.
        let encoded = encode(message, 0.25, 1).unwrap();
        assert_eq!(encoded.len() % L_RS_LDPC, 0);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.len(), SYMBOL_SIZE);
        assert_eq!(&decoded[..message.len()], message.as_slice());
        assert!(decoded[message.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn round_trip_with_multiple_symbol_loss() {
        init();
        // k = 20 source symbols (exact multiple of SYMBOL_SIZE, no padding),
        // coderate 0.5 gives n = 40, r = 20, N1 = min(20, 10) = 10.
        let message = vec![0xA5u8; 20 * SYMBOL_SIZE];
        let encoded = encode(&message, 0.5, 7).unwrap();
        let n = encoded.len() / L_RS_LDPC;
        let k = (message.len() + SYMBOL_SIZE - 1) / SYMBOL_SIZE;
        assert_eq!((n, k), (40, 20));

        // Drop six source symbols at once, well inside the n - k = 20
        // redundancy budget — past what equation-by-equation peeling alone
        // resolves, and into the range that exercises the decoder's
        // Gaussian-elimination fallback over the 20 surviving repair
        // equations.
        let missing: std::collections::HashSet<usize> =
            [1, 4, 7, 10, 13, 16].into_iter().collect();
        let mut kept = Vec::with_capacity((n - missing.len()) * L_RS_LDPC);
        for esi in 0..n {
            if missing.contains(&esi) {
                continue;
            }
            kept.extend_from_slice(&encoded[esi * L_RS_LDPC..(esi + 1) * L_RS_LDPC]);
        }

        let decoded = decode(&kept).unwrap();
        assert_eq!(decoded.len(), k * SYMBOL_SIZE);
        assert_eq!(&decoded[..message.len()], message.as_slice());
    }

    #[test]
    fn rate_one_fails_below_n1_min() {
        init();
        let err = encode(b"x", 1.0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodecParams);
    }

    #[test]
    fn tiny_rate_exceeds_max_symbols() {
        init();
        let message = vec![0u8; SYMBOL_SIZE * 10];
        let err = encode(&message, 0.0001, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CodecParams);
    }

    #[test]
    fn corrupted_first_oti_crc_is_skipped() {
        init();
        let message = b"HELLO WORLD";
        let mut encoded = encode(message, 0.2, 3).unwrap();
        // Flip every bit of the first frame's CRC field (last 4 bytes of its OTI).
        for b in encoded[12..16].iter_mut() {
            *b = !*b;
        }
        // A later frame (repair symbol with a correct OTI) must still be found.
        let decoded = decode(&encoded).unwrap();
        assert_eq!(&decoded[..message.len()], message.as_slice());
    }

    #[test]
    fn garbage_input_fails_no_oti_found() {
        init();
        let garbage = vec![0x42u8; L_RS_LDPC * 2];
        let err = decode(&garbage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }
}

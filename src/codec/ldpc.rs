//! LDPC-Staircase inner code.
//!
//! A systematic code: `k` source symbols plus `r = n - k` repair symbols, the
//! repair symbols computed from a bipartite graph with source-side column
//! weight `N1` and a "staircase" dependency between consecutive repair symbols
//! (row `i`'s equation also includes repair symbol `i - 1`). This mirrors the
//! construction in RFC 5170's LDPC-Staircase codes.
//!
//! Per the resolved open question, the graph structure is a pure function of
//! `(k, r, n1, row)` — it does not consume `prng_seed` as entropy, so encoder
//! and decoder always agree on it without a transmitted seed. Decoding runs in
//! two passes: a peeling pass resolves any equation that has exactly one
//! remaining unknown, cheaply, to a fixed point; whatever the peeling pass
//! leaves unresolved is handed to a GF(2) Gaussian-elimination fallback over
//! the surviving repair equations. Because every coefficient in this system is
//! 0 or 1, elimination is done by XOR-ing whole symbol buffers together rather
//! than bit-by-bit. This recovers any loss pattern whose induced system has
//! full column rank for the missing symbols — which a uniformly random loss
//! pattern of up to `n - k` symbols has with overwhelming probability, though
//! (as with any LDPC code) a pathological, rank-deficient pattern is not
//! excluded by construction.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Parameters shared by the LDPC-Staircase encoder and decoder.
#[derive(Debug, Clone, Copy)]
pub struct LdpcParams {
    /// Number of source symbols.
    pub k: usize,
    /// Number of repair symbols (`n - k`).
    pub r: usize,
    /// Length in bytes of each symbol.
    pub symbol_size: usize,
    /// Column weight of the source side of the bipartite graph, `3..=10`.
    pub n1: usize,
    /// Carried end-to-end for profile fidelity; not used to derive graph structure.
    pub prng_seed: u64,
}

/// Deterministic seed for equation `row`'s source-side neighbours, a pure
/// function of `(k, r, n1, row)` rather than of `params.prng_seed`.
fn equation_seed(k: usize, r: usize, n1: usize, row: usize) -> u64 {
    // A fixed splitmix64-style mix of the structural parameters; any caller
    // computing this with the same (k, r, n1, row) gets the same neighbours.
    let mut x = (k as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(r as u64)
        .wrapping_mul(0xBF58_476D_1CE4_E5B9)
        .wrapping_add(n1 as u64)
        .wrapping_mul(0x94D0_49BB_1331_11EB)
        .wrapping_add(row as u64);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    x
}

/// The `n1` source-symbol indices participating in repair equation `row`.
fn equation_sources(k: usize, r: usize, n1: usize, row: usize) -> Vec<usize> {
    let n1 = n1.min(k);
    let mut rng = StdRng::seed_from_u64(equation_seed(k, r, n1, row));
    rand::seq::index::sample(&mut rng, k, n1).into_vec()
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

/// Builds repair symbols from a complete set of source symbols.
#[derive(Debug)]
pub struct LdpcEncoder {
    params: LdpcParams,
}

impl LdpcEncoder {
    /// Construct an encoder for the given parameters.
    pub fn new(params: LdpcParams) -> Self {
        LdpcEncoder { params }
    }

    /// Compute the `r` repair symbols for `source`, one entry per source symbol
    /// (all of length `params.symbol_size`).
    pub fn encode(&self, source: &[Vec<u8>]) -> Vec<Vec<u8>> {
        debug_assert_eq!(source.len(), self.params.k);
        let mut repair: Vec<Vec<u8>> = Vec::with_capacity(self.params.r);
        for row in 0..self.params.r {
            let mut acc = vec![0u8; self.params.symbol_size];
            for idx in equation_sources(self.params.k, self.params.r, self.params.n1, row) {
                xor_into(&mut acc, &source[idx]);
            }
            if row > 0 {
                let prev = repair[row - 1].clone();
                xor_into(&mut acc, &prev);
            }
            repair.push(acc);
        }
        repair
    }
}

/// One repair equation's neighbour set, expressed as symbol slots: source
/// indices `0..k` and repair indices `k..k+r`.
fn equation_slots(k: usize, r: usize, n1: usize, row: usize) -> Vec<usize> {
    let mut slots = equation_sources(k, r, n1, row);
    slots.push(k + row);
    if row > 0 {
        slots.push(k + row - 1);
    }
    slots
}

/// Reconstructs missing source/repair symbols from whatever subset was received,
/// by peeling equations that have exactly one unresolved slot.
#[derive(Debug)]
pub struct LdpcDecoder {
    params: LdpcParams,
    symbols: Vec<Option<Vec<u8>>>,
}

impl LdpcDecoder {
    /// Construct a decoder for the given parameters with no symbols received yet.
    pub fn new(params: LdpcParams) -> Self {
        let total = params.k + params.r;
        LdpcDecoder {
            params,
            symbols: vec![None; total],
        }
    }

    /// Submit a received symbol at encoding symbol index `esi`. Symbols with
    /// `esi >= k + r` are out of range and ignored by the caller before this
    /// is reached.
    pub fn push_symbol(&mut self, esi: usize, symbol: Vec<u8>) {
        if esi < self.symbols.len() && self.symbols[esi].is_none() {
            self.symbols[esi] = Some(symbol);
        }
    }

    /// Whether every source symbol has been resolved (received or recovered).
    pub fn is_complete(&self) -> bool {
        self.symbols[..self.params.k].iter().all(Option::is_some)
    }

    /// Attempt to resolve missing symbols: first by peeling repair equations
    /// with a single unknown slot to a fixed point, then by falling back to
    /// Gaussian elimination (see module docs) over whatever equations peeling
    /// left unresolved. Returns whether all `k` source symbols are resolved
    /// afterwards.
    pub fn finalize(&mut self) -> bool {
        let k = self.params.k;
        let r = self.params.r;
        let n1 = self.params.n1;
        loop {
            if self.is_complete() {
                return true;
            }
            let mut progressed = false;
            for row in 0..r {
                let slots = equation_slots(k, r, n1, row);
                let missing: Vec<usize> = slots
                    .iter()
                    .copied()
                    .filter(|&s| self.symbols[s].is_none())
                    .collect();
                if missing.len() != 1 {
                    continue;
                }
                let target = missing[0];
                let mut acc = vec![0u8; self.params.symbol_size];
                for &s in &slots {
                    if s != target {
                        xor_into(&mut acc, self.symbols[s].as_ref().unwrap());
                    }
                }
                self.symbols[target] = Some(acc);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        if self.is_complete() {
            return true;
        }
        self.gaussian_eliminate();
        self.is_complete()
    }

    /// GF(2) elimination fallback for the repair equations peeling could not
    /// resolve. Builds one row per repair equation that still has an unknown
    /// slot (coefficients `0`/`1` for each remaining unknown, right-hand side
    /// the XOR of the equation's known terms) and row-reduces it. A column
    /// that ends up with exactly one surviving row, and that row exactly one
    /// surviving column, is solved directly: the corresponding symbol is the
    /// row's right-hand side.
    fn gaussian_eliminate(&mut self) {
        let k = self.params.k;
        let r = self.params.r;
        let n1 = self.params.n1;
        let symbol_size = self.params.symbol_size;

        let unknowns: Vec<usize> = self
            .symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect();
        if unknowns.is_empty() {
            return;
        }
        let col_of: std::collections::HashMap<usize, usize> =
            unknowns.iter().enumerate().map(|(c, &s)| (s, c)).collect();
        let m = unknowns.len();

        let mut rows: Vec<(Vec<bool>, Vec<u8>)> = Vec::new();
        for row in 0..r {
            let slots = equation_slots(k, r, n1, row);
            let mut cols = vec![false; m];
            let mut rhs = vec![0u8; symbol_size];
            let mut has_unknown = false;
            for &s in &slots {
                match &self.symbols[s] {
                    Some(sym) => xor_into(&mut rhs, sym),
                    None => {
                        cols[col_of[&s]] = true;
                        has_unknown = true;
                    }
                }
            }
            if has_unknown {
                rows.push((cols, rhs));
            }
        }

        let mut pivot_row_of_col: Vec<Option<usize>> = vec![None; m];
        let mut next_row = 0;
        for col in 0..m {
            if next_row >= rows.len() {
                break;
            }
            let Some(pivot) = (next_row..rows.len()).find(|&i| rows[i].0[col]) else {
                continue;
            };
            rows.swap(next_row, pivot);
            let pivot_cols = rows[next_row].0.clone();
            let pivot_rhs = rows[next_row].1.clone();
            for i in 0..rows.len() {
                if i != next_row && rows[i].0[col] {
                    for c in 0..m {
                        rows[i].0[c] ^= pivot_cols[c];
                    }
                    xor_into(&mut rows[i].1, &pivot_rhs);
                }
            }
            pivot_row_of_col[col] = Some(next_row);
            next_row += 1;
        }

        for (col, pivot_row) in pivot_row_of_col.into_iter().enumerate() {
            let Some(pivot_row) = pivot_row else { continue };
            if rows[pivot_row].0.iter().filter(|&&c| c).count() == 1 {
                self.symbols[unknowns[col]] = Some(rows[pivot_row].1.clone());
            }
        }
    }

    /// Retrieve the `k` source symbols in order. Panics if called before
    /// [`Self::finalize`] returns `true` — a programmer contract violation,
    /// not a wire-data error.
    pub fn source_symbols(&self) -> Vec<&[u8]> {
        assert!(self.is_complete(), "source symbols requested before decode completed");
        self.symbols[..self.params.k]
            .iter()
            .map(|s| s.as_deref().unwrap())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize, r: usize) -> LdpcParams {
        LdpcParams {
            k,
            r,
            symbol_size: 16,
            n1: 3.max(r.min(10)).min(10),
            prng_seed: 42,
        }
    }

    fn make_source(k: usize, symbol_size: usize) -> Vec<Vec<u8>> {
        (0..k)
            .map(|i| vec![i as u8; symbol_size])
            .collect()
    }

    #[test]
    fn no_loss_decodes_trivially() {
        let p = params(5, 3);
        let source = make_source(5, p.symbol_size);
        let encoder = LdpcEncoder::new(p);
        let repair = encoder.encode(&source);

        let mut decoder = LdpcDecoder::new(p);
        for (esi, s) in source.iter().enumerate() {
            decoder.push_symbol(esi, s.clone());
        }
        for (i, s) in repair.iter().enumerate() {
            decoder.push_symbol(p.k + i, s.clone());
        }
        assert!(decoder.finalize());
        assert_eq!(decoder.source_symbols(), source.iter().map(|s| s.as_slice()).collect::<Vec<_>>());
    }

    #[test]
    fn repair_only_loss_recovers() {
        let p = params(5, 3);
        let source = make_source(5, p.symbol_size);
        let encoder = LdpcEncoder::new(p);
        let repair = encoder.encode(&source);

        // Drop exactly one source symbol; all repair symbols present.
        let mut decoder = LdpcDecoder::new(p);
        for (esi, s) in source.iter().enumerate() {
            if esi != 2 {
                decoder.push_symbol(esi, s.clone());
            }
        }
        for (i, s) in repair.iter().enumerate() {
            decoder.push_symbol(p.k + i, s.clone());
        }
        assert!(decoder.finalize());
        assert_eq!(decoder.source_symbols()[2], source[2].as_slice());
    }

    #[test]
    fn encoder_structure_is_deterministic_across_instances() {
        let p = params(8, 4);
        let source = make_source(8, p.symbol_size);
        let a = LdpcEncoder::new(p).encode(&source);
        let b = LdpcEncoder::new(p).encode(&source);
        assert_eq!(a, b);
    }
}

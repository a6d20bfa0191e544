//! IKNP correlated OT extension with an optional KOS consistency check.
//!
//! One [`IknpExtender`] drives one channel. The COT sender holds the global
//! correlation `delta` and ends up with `K_j`; the receiver ends up with
//! `M_j = K_j ^ b_j * delta`, where the choice bit `b_j` is the LSB of `M_j`.

use crate::comm_channel::ByteChannel;
use crate::engine::EngineError;
use crate::hash::Block;
use crate::prg::PRG;

/// Number of base OTs, and the width of every extended OT.
pub const NUM_BITS: usize = 128;

/// Largest number of rows extended in one round trip.
const BLOCK_SIZE: usize = 1 << 16;

pub enum IknpExtender {
    Sender {
        delta: u128,
        /// Expands `k_{s_i}` for base OT `i`.
        g: Vec<PRG>,
    },
    Receiver {
        g0: Vec<PRG>,
        g1: Vec<PRG>,
        choices: PRG,
    },
}

fn prg_id(channel: usize, bit: bool, i: usize) -> u64 {
    ((channel * 2 + bit as usize) * NUM_BITS + i) as u64
}

impl IknpExtender {
    /// Sender state for `channel`, from the base-OT keys received with the
    /// bits of `delta` as choices.
    pub fn sender(delta: u128, keys: &[Block], channel: usize) -> Self {
        let g = keys
            .iter()
            .enumerate()
            .map(|(i, key)| PRG::new(Some(key), prg_id(channel, bit(delta, i), i)))
            .collect();
        IknpExtender::Sender { delta, g }
    }

    /// Receiver state for `channel`, from the base-OT key pairs it sent.
    pub fn receiver(pairs: &[(Block, Block)], channel: usize) -> Self {
        let g0 = pairs
            .iter()
            .enumerate()
            .map(|(i, (k0, _))| PRG::new(Some(k0), prg_id(channel, false, i)))
            .collect();
        let g1 = pairs
            .iter()
            .enumerate()
            .map(|(i, (_, k1))| PRG::new(Some(k1), prg_id(channel, true, i)))
            .collect();
        IknpExtender::Receiver {
            g0,
            g1,
            choices: PRG::new(None, 0),
        }
    }

    /// Fills `out` with fresh random COTs, exchanging traffic over `io`.
    ///
    /// Both parties must call this with the same `out.len()` and `malicious`
    /// flag, in the same order.
    pub fn extend<IO: ByteChannel>(
        &mut self,
        io: &mut IO,
        out: &mut [Block],
        malicious: bool,
        channel: usize,
    ) -> Result<(), EngineError> {
        for piece in out.chunks_mut(BLOCK_SIZE) {
            let rows = padded_rows(piece.len(), malicious);
            match self {
                IknpExtender::Sender { delta, g } => {
                    let q = send_pre(io, g, *delta, rows)?;
                    if malicious && !send_check(io, &q, *delta)? {
                        return Err(EngineError::ConsistencyCheck { channel });
                    }
                    for (o, q_j) in piece.iter_mut().zip(&q) {
                        *o = (q_j & !1).to_le_bytes();
                    }
                }
                IknpExtender::Receiver { g0, g1, choices } => {
                    let mut r = vec![0u128; rows / NUM_BITS];
                    choices.random_words(&mut r);
                    let t = recv_pre(io, g0, g1, &r, rows)?;
                    if malicious {
                        recv_check(io, &t, &r)?;
                    }
                    for (j, (o, t_j)) in piece.iter_mut().zip(&t).enumerate() {
                        *o = ((t_j & !1) | choice_bit(&r, j) as u128).to_le_bytes();
                    }
                }
            }
        }
        Ok(())
    }
}

/// Rows needed to produce `len` COTs: rounded up to a multiple of 128, plus
/// one sacrificed tile when the consistency check runs.
fn padded_rows(len: usize, malicious: bool) -> usize {
    let rounded = (len + NUM_BITS - 1) / NUM_BITS * NUM_BITS;
    if malicious {
        rounded + NUM_BITS
    } else {
        rounded
    }
}

fn bit(word: u128, i: usize) -> bool {
    (word >> i) & 1 == 1
}

fn choice_bit(r: &[u128], j: usize) -> bool {
    bit(r[j / NUM_BITS], j % NUM_BITS)
}

fn send_pre<IO: ByteChannel>(
    io: &mut IO,
    g: &mut [PRG],
    delta: u128,
    rows: usize,
) -> Result<Vec<u128>, EngineError> {
    let cols = rows / NUM_BITS;
    let u = recv_words(io, NUM_BITS * cols)?;

    let mut q = vec![0u128; NUM_BITS * cols];
    for (i, prg) in g.iter_mut().enumerate() {
        let row = &mut q[i * cols..(i + 1) * cols];
        prg.random_words(row);
        if bit(delta, i) {
            for (q_ij, u_ij) in row.iter_mut().zip(&u[i * cols..(i + 1) * cols]) {
                *q_ij ^= u_ij;
            }
        }
    }
    Ok(transpose(&q, cols))
}

fn recv_pre<IO: ByteChannel>(
    io: &mut IO,
    g0: &mut [PRG],
    g1: &mut [PRG],
    r: &[u128],
    rows: usize,
) -> Result<Vec<u128>, EngineError> {
    let cols = rows / NUM_BITS;
    let mut t = vec![0u128; NUM_BITS * cols];
    let mut u = vec![0u128; NUM_BITS * cols];
    let mut tmp = vec![0u128; cols];

    for (i, (prg0, prg1)) in g0.iter_mut().zip(g1.iter_mut()).enumerate() {
        let t_row = &mut t[i * cols..(i + 1) * cols];
        prg0.random_words(t_row);
        prg1.random_words(&mut tmp);
        for (((u_ij, t_ij), g_ij), r_j) in u[i * cols..(i + 1) * cols]
            .iter_mut()
            .zip(t_row.iter())
            .zip(&tmp)
            .zip(r)
        {
            *u_ij = t_ij ^ g_ij ^ r_j;
        }
    }

    send_words(io, &u)?;
    io.flush()?;
    Ok(transpose(&t, cols))
}

/// The COT sender picks the challenge after seeing `u`, then checks the
/// receiver's response `(x, t)` against `sum q_j * chi_j ^ x * delta`.
fn send_check<IO: ByteChannel>(io: &mut IO, q: &[u128], delta: u128) -> Result<bool, EngineError> {
    let mut seed = [[0u8; 16]];
    PRG::new(None, 0).random_block(&mut seed);
    io.send(&seed[0])?;
    io.flush()?;

    let chi = challenges(&seed[0], q.len());
    let response = recv_words(io, 3)?;
    let (x, t) = (response[0], (response[1], response[2]));

    let mut acc = inner_product(q, &chi);
    let x_delta = clmul128(x, delta);
    acc.0 ^= x_delta.0;
    acc.1 ^= x_delta.1;
    Ok(acc == t)
}

fn recv_check<IO: ByteChannel>(io: &mut IO, t: &[u128], r: &[u128]) -> Result<(), EngineError> {
    let mut seed = [0u8; 16];
    io.recv_into(&mut seed)?;
    let chi = challenges(&seed, t.len());

    let mut x = 0u128;
    for (j, chi_j) in chi.iter().enumerate() {
        if choice_bit(r, j) {
            x ^= chi_j;
        }
    }
    let (lo, hi) = inner_product(t, &chi);

    send_words(io, &[x, lo, hi])?;
    io.flush()?;
    Ok(())
}

fn challenges(seed: &Block, len: usize) -> Vec<u128> {
    let mut chi = vec![0u128; len];
    PRG::new(Some(seed), 0).random_words(&mut chi);
    chi
}

fn inner_product(a: &[u128], b: &[u128]) -> (u128, u128) {
    a.iter().zip(b).fold((0, 0), |(lo, hi), (x, y)| {
        let (l, h) = clmul128(*x, *y);
        (lo ^ l, hi ^ h)
    })
}

fn send_words<IO: ByteChannel>(io: &mut IO, words: &[u128]) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(words.len() * 16);
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    io.send(&bytes)
}

fn recv_words<IO: ByteChannel>(io: &mut IO, count: usize) -> std::io::Result<Vec<u128>> {
    let bytes = io.recv(count * 16)?;
    Ok(bytes
        .chunks_exact(16)
        .map(|c| {
            let mut w = [0u8; 16];
            w.copy_from_slice(c);
            u128::from_le_bytes(w)
        })
        .collect())
}

/// Turns the `128 x (cols * 128)` row-major bit matrix `m` into
/// `cols * 128` words, word `j` holding column `j`.
fn transpose(m: &[u128], cols: usize) -> Vec<u128> {
    let mut out = vec![0u128; cols * NUM_BITS];
    let mut tile = [0u128; NUM_BITS];
    for c in 0..cols {
        for (i, w) in tile.iter_mut().enumerate() {
            *w = m[i * cols + c];
        }
        transpose128(&mut tile);
        out[c * NUM_BITS..(c + 1) * NUM_BITS].copy_from_slice(&tile);
    }
    out
}

/// In-place 128x128 bit-matrix transpose, LSB-first.
fn transpose128(a: &mut [u128; NUM_BITS]) {
    let mut j = 64usize;
    let mut mask: u128 = u64::MAX as u128;
    while j != 0 {
        let mut k = 0usize;
        while k < NUM_BITS {
            let t = ((a[k] >> j) ^ a[k + j]) & mask;
            a[k + j] ^= t;
            a[k] ^= t << j;
            k = (k + j + 1) & !j;
        }
        j >>= 1;
        mask ^= mask << j;
    }
}

// Helper function to perform 64-bit carry-less multiplication
fn clmul64(a: u64, b: u64) -> u128 {
    let mut table = [0u128; 16];
    table[1] = a as u128;
    for i in 2..16 {
        table[i] = if i % 2 == 0 {
            table[i / 2] << 1
        } else {
            table[i - 1] ^ table[1]
        };
    }
    let mut result = 0u128;
    for nibble in (0..16).rev() {
        result = (result << 4) ^ table[((b >> (nibble * 4)) & 0xf) as usize];
    }
    result
}

/// Carry-less 128x128 product, returned as `(low, high)` halves.
fn clmul128(a: u128, b: u128) -> (u128, u128) {
    let (a0, a1) = (a as u64, (a >> 64) as u64);
    let (b0, b1) = (b as u64, (b >> 64) as u64);
    let z0 = clmul64(a0, b0);
    let z1 = clmul64(a0, b1) ^ clmul64(a1, b0);
    let z2 = clmul64(a1, b1);
    (z0 ^ (z1 << 64), z2 ^ (z1 >> 64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_channel::MemoryChannel;
    use std::thread;

    fn naive_clmul64(a: u64, b: u64) -> u128 {
        let mut result = 0u128;
        for i in 0..64 {
            if (b >> i) & 1 == 1 {
                result ^= (a as u128) << i;
            }
        }
        result
    }

    #[test]
    fn windowed_clmul_matches_bit_loop() {
        let samples = [
            (0u64, 0u64),
            (1, 1),
            (u64::MAX, u64::MAX),
            (0x8000_0000_0000_0001, 0xdead_beef_cafe_f00d),
            (0x0123_4567_89ab_cdef, 0xfedc_ba98_7654_3210),
        ];
        for (a, b) in samples {
            assert_eq!(clmul64(a, b), naive_clmul64(a, b));
        }
    }

    #[test]
    fn clmul128_distributes_over_xor() {
        let (a, b, c) = (0x1234u128 << 100 | 77, u128::MAX / 3, 0xabcdefu128 << 40);
        let left = clmul128(a, b ^ c);
        let (p, q) = (clmul128(a, b), clmul128(a, c));
        assert_eq!(left, (p.0 ^ q.0, p.1 ^ q.1));
    }

    #[test]
    fn transpose128_moves_single_bits() {
        for (row, col) in [(0, 0), (0, 127), (5, 64), (127, 3), (64, 64)] {
            let mut a = [0u128; NUM_BITS];
            a[row] = 1u128 << col;
            transpose128(&mut a);
            let mut expected = [0u128; NUM_BITS];
            expected[col] = 1u128 << row;
            assert_eq!(a, expected);
        }
    }

    #[test]
    fn transpose128_is_an_involution() {
        let mut a = [0u128; NUM_BITS];
        PRG::new(Some(&[1u8; 16]), 0).random_words(&mut a);
        let original = a;
        transpose128(&mut a);
        assert_ne!(a, original);
        transpose128(&mut a);
        assert_eq!(a, original);
    }

    #[test]
    fn padded_rows_rounds_and_sacrifices() {
        assert_eq!(padded_rows(1, false), 128);
        assert_eq!(padded_rows(128, false), 128);
        assert_eq!(padded_rows(129, false), 256);
        assert_eq!(padded_rows(128, true), 256);
    }

    /// Runs both extenders with shared base-OT keys (no real base OT).
    fn extend_pair(len: usize, malicious: bool) -> (u128, Vec<Block>, Vec<Block>) {
        let mut seeds = PRG::new(Some(&[42u8; 16]), 0);
        let mut pairs = vec![([0u8; 16], [0u8; 16]); NUM_BITS];
        for (k0, k1) in pairs.iter_mut() {
            let mut b = [[0u8; 16]; 2];
            seeds.random_block(&mut b);
            *k0 = b[0];
            *k1 = b[1];
        }
        let delta = 0x0f1e_2d3c_4b5a_6978_8796_a5b4_c3d2_e1f1u128 | 1;
        let chosen: Vec<Block> = pairs
            .iter()
            .enumerate()
            .map(|(i, (k0, k1))| if bit(delta, i) { *k1 } else { *k0 })
            .collect();

        let (mut a, mut b) = MemoryChannel::pair();
        let receiver = thread::spawn(move || {
            let mut ext = IknpExtender::receiver(&pairs, 0);
            let mut out = vec![[0u8; 16]; len];
            ext.extend(&mut b, &mut out, malicious, 0).unwrap();
            out
        });
        let mut ext = IknpExtender::sender(delta, &chosen, 0);
        let mut k = vec![[0u8; 16]; len];
        ext.extend(&mut a, &mut k, malicious, 0).unwrap();
        (delta, k, receiver.join().unwrap())
    }

    fn assert_correlated(delta: u128, k: &[Block], m: &[Block]) {
        for (k_j, m_j) in k.iter().zip(m) {
            let k_j = u128::from_le_bytes(*k_j);
            let m_j = u128::from_le_bytes(*m_j);
            assert_eq!(k_j & 1, 0);
            let expected = if m_j & 1 == 1 { k_j ^ delta } else { k_j };
            assert_eq!(m_j, expected);
        }
    }

    #[test]
    fn semi_honest_extension_is_correlated() {
        let (delta, k, m) = extend_pair(300, false);
        assert_correlated(delta, &k, &m);
    }

    #[test]
    fn malicious_extension_passes_check() {
        let (delta, k, m) = extend_pair(1000, true);
        assert_correlated(delta, &k, &m);
        assert!(m.iter().any(|b| b[0] & 1 == 1));
        assert!(m.iter().any(|b| b[0] & 1 == 0));
    }

    #[test]
    fn tampered_response_fails_check() {
        let delta = 5u128;
        let keys = vec![[7u8; 16]; NUM_BITS];
        let (mut a, mut b) = MemoryChannel::pair();
        let rows = padded_rows(10, true);

        // A cheating receiver that sends well-formed but unrelated data.
        let cheater = thread::spawn(move || {
            send_words(&mut b, &vec![0u128; rows]).unwrap();
            b.flush().unwrap();
            let mut seed = [0u8; 16];
            b.recv_into(&mut seed).unwrap();
            send_words(&mut b, &[1, 2, 3]).unwrap();
            b.flush().unwrap();
            b
        });

        let mut ext = IknpExtender::sender(delta, &keys, 0);
        let mut out = vec![[0u8; 16]; 10];
        let err = ext.extend(&mut a, &mut out, true, 4).unwrap_err();
        assert!(matches!(err, EngineError::ConsistencyCheck { channel: 4 }));
        drop(cheater.join().unwrap());
    }
}

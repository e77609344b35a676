use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::constants::PI;

/// Multiplies `signal` in place by `exp(-j(2*pi*freq_hz*n/fs + phase0))`,
/// i.e. carrier wipeoff at the given Doppler frequency and starting phase.
pub fn doppler_shift(signal: &mut [Complex64], freq_hz: f64, phase0: f64, fs: f64) {
    for (n, s) in signal.iter_mut().enumerate() {
        let phase = 2.0 * PI * freq_hz * n as f64 / fs + phase0;
        *s *= Complex64::new(phase.cos(), -phase.sin());
    }
}

/// Cyclic cross-correlation of `signal` against a precomputed forward-FFT'd
/// PRN reference: `IFFT( FFT(signal) . conj(FFT(prn)) )`. `prn_fft` must be
/// the forward FFT of a PRN waveform the same length as `signal`.
pub fn calc_correlation(
    planner: &mut FftPlanner<f64>,
    signal: &[Complex64],
    prn_fft: &[Complex64],
) -> Vec<Complex64> {
    assert_eq!(signal.len(), prn_fft.len());
    let n = signal.len();

    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut buf: Vec<Complex64> = signal.to_vec();
    fft.process(&mut buf);

    for (b, p) in buf.iter_mut().zip(prn_fft.iter()) {
        *b *= p.conj();
    }

    ifft.process(&mut buf);

    let scale = 1.0 / n as f64;
    for b in buf.iter_mut() {
        *b *= scale;
    }
    buf
}

pub fn get_max_with_idx(v: &[f64]) -> (usize, f64) {
    let mut idx = 0;
    let mut max = f64::MIN;
    for (i, &x) in v.iter().enumerate() {
        if x > max {
            max = x;
            idx = i;
        }
    }
    (idx, max)
}

/// Extracts an unsigned `len`-bit field starting at bit `pos` (0-based, MSB
/// first) from a packed byte buffer. RTKLIB-style bit addressing, used
/// throughout the subframe/almanac decoders.
pub fn getbitu(buf: &[u8], pos: u32, len: u32) -> u32 {
    let mut bits: u32 = 0;
    for i in pos..pos + len {
        let byte = buf[(i / 8) as usize];
        bits = (bits << 1) | ((byte >> (7 - (i % 8))) & 1) as u32;
    }
    bits
}

/// Sign-extending variant of [`getbitu`].
pub fn getbits(buf: &[u8], pos: u32, len: u32) -> i32 {
    let bits = getbitu(buf, pos, len);
    if len == 0 || len >= 32 {
        return bits as i32;
    }
    if bits & (1u32 << (len - 1)) == 0 {
        bits as i32
    } else {
        (bits as i64 - (1i64 << len)) as i32
    }
}

/// Concatenates two unsigned bit fields `(p1,l1)` then `(p2,l2)` into a
/// single value, for fields the ICD splits across word boundaries.
pub fn getbitu2(buf: &[u8], p1: u32, l1: u32, p2: u32, l2: u32) -> u32 {
    (getbitu(buf, p1, l1) << l2) | getbitu(buf, p2, l2)
}

/// Sign-extending variant of [`getbitu2`].
pub fn getbits2(buf: &[u8], p1: u32, l1: u32, p2: u32, l2: u32) -> i32 {
    let total = l1 + l2;
    let bits = getbitu2(buf, p1, l1, p2, l2);
    if total == 0 || total >= 32 {
        return bits as i32;
    }
    if bits & (1u32 << (total - 1)) == 0 {
        bits as i32
    } else {
        (bits as i64 - (1i64 << total)) as i32
    }
}

/// Packs a slice of 0/1 symbol bytes into `dest`, MSB first, starting at bit
/// offset `offset`.
pub fn pack_bits(bits: &[u8], offset: usize, dest: &mut [u8]) {
    for (i, &b) in bits.iter().enumerate() {
        let pos = offset + i;
        let byte_idx = pos / 8;
        let bit_idx = 7 - (pos % 8);
        if b != 0 {
            dest[byte_idx] |= 1 << bit_idx;
        } else {
            dest[byte_idx] &= !(1 << bit_idx);
        }
    }
}

/// True if `bits` matches `preamble` exactly (normal polarity).
pub fn bmatch_n(preamble: &[u8], bits: &[u8]) -> bool {
    preamble == bits
}

/// True if `bits` matches the bitwise complement of `preamble` (reversed
/// polarity, from the Costas loop's 180-degree phase ambiguity).
pub fn bmatch_r(preamble: &[u8], bits: &[u8]) -> bool {
    preamble.len() == bits.len() && preamble.iter().zip(bits.iter()).all(|(&p, &b)| p != b)
}

/// Even-parity XOR reduction of the set bits of `v`, used by the GPS word
/// parity equations.
pub fn xor_bits(mut v: u32) -> u8 {
    let mut x = 0u8;
    while v != 0 {
        x ^= (v & 1) as u8;
        v >>= 1;
    }
    x
}

/// Renders the first `nbits` bits of a packed buffer as an uppercase hex
/// string, for debug logging.
pub fn hex_str(buf: &[u8], nbits: usize) -> String {
    let nbytes = nbits.div_ceil(8);
    buf[..nbytes].iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getbitu_extracts_msb_first() {
        let buf = [0b1010_0000u8, 0, 0, 0];
        assert_eq!(getbitu(&buf, 0, 4), 0b1010);
        assert_eq!(getbitu(&buf, 1, 3), 0b010);
    }

    #[test]
    fn getbits_sign_extends() {
        let buf = [0b1000_0000u8];
        assert_eq!(getbits(&buf, 0, 6), -32);
        assert_eq!(getbitu(&buf, 0, 6), 32);
    }

    #[test]
    fn bmatch_handles_both_polarities() {
        let preamble = [1u8, 0, 0, 0, 1, 0, 1, 1];
        let inverted: Vec<u8> = preamble.iter().map(|&b| 1 - b).collect();
        assert!(bmatch_n(&preamble, &preamble));
        assert!(bmatch_r(&preamble, &inverted));
        assert!(!bmatch_n(&preamble, &inverted));
    }

    #[test]
    fn pack_and_read_roundtrip() {
        let bits = [1u8, 0, 1, 1, 0, 0, 1, 0];
        let mut dest = [0u8; 1];
        pack_bits(&bits, 0, &mut dest);
        assert_eq!(getbitu(&dest, 0, 8), 0b1011_0010);
    }

    #[test]
    fn doppler_shift_preserves_magnitude() {
        let mut sig = vec![Complex64::new(1.0, 0.0); 8];
        doppler_shift(&mut sig, 100.0, 0.0, 2046.0);
        for s in sig {
            assert!((s.norm() - 1.0).abs() < 1e-9);
        }
    }
}

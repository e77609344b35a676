use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;

use crate::constants::{PRN_CODE_LEN, SAMPLES_PER_CHIP, SAMPLES_PER_MS};

/// Delay (in chips) of the G2 shift register tap for each PRN, 1-indexed by
/// satellite number. Produces the standard L1 C/A Gold codes.
const G2_DELAY: [usize; 210] = [
    5, 6, 7, 8, 17, 18, 139, 140, 141, 251, 252, 254, 255, 256, 257, 258, 469, 470, 471, 472, 473,
    474, 509, 512, 513, 514, 515, 516, 859, 860, 861, 862, 863, 950, 947, 948, 950, 67, 103, 91,
    19, 679, 225, 625, 946, 638, 161, 1001, 554, 280, 710, 709, 775, 864, 558, 220, 397, 55, 898,
    759, 367, 299, 1018, 729, 695, 780, 801, 788, 732, 34, 320, 327, 389, 407, 525, 405, 221, 761,
    260, 326, 955, 653, 699, 422, 188, 438, 959, 539, 879, 677, 586, 153, 792, 814, 446, 264, 1015,
    278, 536, 819, 156, 957, 159, 712, 885, 461, 248, 713, 126, 807, 279, 122, 197, 693, 632, 771,
    467, 647, 203, 145, 175, 52, 21, 237, 235, 886, 657, 634, 762, 355, 1012, 176, 603, 130, 359,
    595, 68, 386, 797, 456, 499, 883, 307, 127, 211, 121, 118, 163, 628, 853, 484, 289, 811, 202,
    1021, 463, 568, 904, 670, 230, 911, 684, 309, 644, 932, 12, 314, 891, 212, 185, 675, 503, 150,
    395, 345, 846, 798, 992, 357, 995, 877, 112, 144, 476, 193, 109, 445, 291, 87, 399, 292, 901,
    339, 208, 711, 189, 263, 537, 663, 942, 173, 900, 30, 500, 935, 556, 373, 85, 652, 310,
];

/// Generates the 1023-chip, bipolar (+-1) L1 C/A Gold code for `prn` (1..=32)
/// via the two 10-stage LFSRs from the ICD.
pub fn gen_l1ca_chips(prn: u8) -> Vec<i8> {
    let mut g1 = [0i8; PRN_CODE_LEN];
    let mut g2 = [0i8; PRN_CODE_LEN];
    let mut r1 = [-1i8; 10];
    let mut r2 = [-1i8; 10];

    for i in 0..PRN_CODE_LEN {
        g1[i] = r1[9];
        g2[i] = r2[9];
        let c1 = r1[2] * r1[9];
        let c2 = r2[1] * r2[2] * r2[5] * r2[7] * r2[8] * r2[9];
        r1.rotate_right(1);
        r2.rotate_right(1);
        r1[0] = c1;
        r2[0] = c2;
    }

    let delay = G2_DELAY[(prn - 1) as usize];
    let mut j = PRN_CODE_LEN - delay;
    let mut chips = Vec::with_capacity(PRN_CODE_LEN);
    for i in 0..PRN_CODE_LEN {
        chips.push(-g1[i] * g2[j % PRN_CODE_LEN]);
        j += 1;
    }
    chips
}

/// Upsamples a 1023-chip code to `SAMPLES_PER_MS` samples (nearest-chip
/// replication at `SAMPLES_PER_CHIP` samples/chip) and casts to complex
/// baseband for use as a correlation reference.
pub fn upsample_to_baseband(chips: &[i8]) -> Vec<Complex64> {
    let mut out = Vec::with_capacity(SAMPLES_PER_MS);
    for &c in chips {
        for _ in 0..SAMPLES_PER_CHIP {
            out.push(Complex64::new(c as f64, 0.0));
        }
    }
    out
}

/// A single PRN's precomputed correlation reference: the upsampled code and
/// its forward FFT, so acquisition/tracking never repeats the FFT per tick.
#[derive(Clone)]
pub struct PrnCode {
    pub prn: u8,
    pub chips: Vec<i8>,
    pub baseband: Vec<Complex64>,
    pub fft: Vec<Complex64>,
}

impl PrnCode {
    pub fn new(prn: u8, planner: &mut FftPlanner<f64>) -> Self {
        let chips = gen_l1ca_chips(prn);
        let baseband = upsample_to_baseband(&chips);
        let mut fft = baseband.clone();
        planner.plan_fft_forward(fft.len()).process(&mut fft);
        PrnCode {
            prn,
            chips,
            baseband,
            fft,
        }
    }
}

/// Precomputed reference codes for every GPS L1 C/A PRN, 1..=32.
pub fn build_code_table() -> Vec<PrnCode> {
    let mut planner = FftPlanner::new();
    (1..=32u8).map(|prn| PrnCode::new(prn, &mut planner)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l1ca_code_has_correct_length() {
        let c = gen_l1ca_chips(1);
        assert_eq!(c.len(), PRN_CODE_LEN);
        assert!(c.iter().all(|&x| x == 1 || x == -1));
    }

    #[test]
    fn distinct_prns_have_low_cross_correlation() {
        let a = gen_l1ca_chips(1);
        let b = gen_l1ca_chips(2);
        let dot: i64 = a.iter().zip(b.iter()).map(|(&x, &y)| (x as i64) * (y as i64)).sum();
        let normalized = dot.unsigned_abs() as f64 / PRN_CODE_LEN as f64;
        assert!(normalized < 0.1, "cross-correlation too high: {}", normalized);
    }

    #[test]
    fn autocorrelation_peaks_at_zero_lag() {
        let a = gen_l1ca_chips(3);
        let auto: i64 = a.iter().map(|&x| (x as i64) * (x as i64)).sum();
        assert_eq!(auto, PRN_CODE_LEN as i64);
    }

    #[test]
    fn upsampling_preserves_chip_count() {
        let chips = gen_l1ca_chips(5);
        let baseband = upsample_to_baseband(&chips);
        assert_eq!(baseband.len(), SAMPLES_PER_MS);
    }
}

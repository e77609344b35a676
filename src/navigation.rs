use colored::Colorize;

use crate::almanac::Almanac;
use crate::channel::Channel;
use crate::constants::{SUBFRAME_BITS, TLM_PREAMBLE, WORD_BITS};
use crate::ephemeris::Ephemeris;
use crate::error::ReceiverError;
use crate::registry::{SatelliteStatus, SubframeRecord};
use crate::util::{bmatch_n, bmatch_r, getbitu, pack_bits, xor_bits};

/// GPS LNAV parity check masks, one per parity bit of a 30-bit word (§4.4).
const PARITY_MASK: [u32; 6] = [
    0x2EC7CD2, 0x1763E69, 0x2BB1F34, 0x15D8F9A, 0x1AEC7CD, 0x22DEA27,
];

/// Validates the 6 parity bits of every word in a 300-bit subframe, applying
/// each word's D30* inversion rule from the preceding word's last bit.
fn test_subframe_parity(bits: &[u8]) -> bool {
    assert_eq!(bits.len(), SUBFRAME_BITS);
    let mut data: u32 = 0;
    for word in 0..10 {
        data = 0;
        for j in 0..WORD_BITS {
            data = (data << 1) | bits[word * WORD_BITS + j] as u32;
        }
        if data & (1 << 30) != 0 {
            data ^= 0x3FFFFFC0;
        }
        for j in 0..6 {
            let v0 = (data >> 6) & PARITY_MASK[j];
            let v1 = ((data >> (5 - j)) & 1) as u8;
            if xor_bits(v0) != v1 {
                return false;
            }
        }
    }
    true
}

impl Channel {
    /// Looks for a fresh 300-bit subframe at the tail of `bit_stream`,
    /// validates its preamble + parity, and decodes it on success (§4.4).
    pub(crate) fn frame_decode_step(&mut self) {
        if self.state.bit_stream.len() < SUBFRAME_BITS {
            return;
        }

        let tail: Vec<u8> = self
            .state
            .bit_stream
            .iter()
            .rev()
            .take(SUBFRAME_BITS)
            .map(|&b| if b >= 0 { 1u8 } else { 0u8 })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let preamble = &tail[0..8];
        let polarity: i8 = if bmatch_n(&TLM_PREAMBLE, preamble) {
            1
        } else if bmatch_r(&TLM_PREAMBLE, preamble) {
            -1
        } else {
            return;
        };

        let bits: Vec<u8> = if polarity > 0 {
            tail.clone()
        } else {
            tail.iter().map(|&b| 1 - b).collect()
        };

        if !test_subframe_parity(&bits) {
            let err = ReceiverError::ParityFailure { prn: self.sv.prn };
            log::warn!("{}: {} ({err})", self.sv, "PARITY ERROR".red());
            return;
        }

        self.state.bit_phase = Some(polarity);

        let mut packed = vec![0u8; SUBFRAME_BITS / 8 + 1];
        pack_bits(&bits, 0, &mut packed);

        let subframe_id = getbitu(&packed, 49, 3) as u8;
        let reserved = getbitu(&packed, 52, 2);
        let tow = getbitu(&packed, 30, 17) * 6;

        // Validity rule (§4.4): preamble matched and parity passed above,
        // plus HOW's reserved bits zero and subframe ID in range, before
        // the subframe is accepted into state.
        if !(1..=5).contains(&subframe_id) || reserved != 0 {
            log::warn!(
                "{}: invalid subframe id={subframe_id} reserved={reserved}",
                self.sv
            );
            return;
        }

        log::info!("{}: {} id={subframe_id} tow={tow}", self.sv, "SUBFRAME".green());

        self.state.push_subframe(SubframeRecord {
            subframe_id,
            tow,
            bits: bits.clone(),
        });
        if self.state.status != SatelliteStatus::EphemerisReady {
            self.state.status = SatelliteStatus::FrameSynced;
        }

        match subframe_id {
            1 => self.ephemeris_mut().decode_subframe1(&packed),
            2 => self.ephemeris_mut().decode_subframe2(&packed),
            3 => self.ephemeris_mut().decode_subframe3(&packed),
            4 => self.decode_subframe4(&packed),
            5 => self.decode_subframe5(&packed),
            _ => unreachable!("subframe_id validated to be in 1..=5 above"),
        }

        if let Some(eph) = self.state.ephemeris.as_mut() {
            eph.update_gpst_epochs(self.ts_sec);
            if eph.is_complete() {
                self.state.status = SatelliteStatus::EphemerisReady;
                self.state.clock_correction = Some(crate::registry::ClockCorrection {
                    a_f0: eph.f0,
                    a_f1: eph.f1,
                    a_f2: eph.f2,
                    t_gd: eph.tgd,
                    t_oc: eph.toc,
                });
            } else if (1..=3).contains(&subframe_id) {
                let err = ReceiverError::EphemerisIncomplete { prn: self.sv.prn };
                log::debug!("{}: {err}", self.sv);
            }
        }
    }

    fn ephemeris_mut(&mut self) -> &mut Ephemeris {
        self.state.ephemeris.get_or_insert_with(|| Ephemeris::new(self.sv))
    }

    fn decode_subframe4(&mut self, buf: &[u8]) {
        let data_id = getbitu(buf, 60, 2);
        let svid = getbitu(buf, 62, 6);

        if data_id == 1 {
            if (25..=32).contains(&svid) {
                self.almanac_entries.insert(svid as u8, Almanac::decode(buf, svid));
            } else if svid == 63 {
                const ARRAY_SVH_IDX: [u32; 8] = [228, 240, 246, 252, 258, 270, 276, 282];
                for (i, &pos) in ARRAY_SVH_IDX.iter().enumerate() {
                    let sv = 25 + i as u32;
                    let svh = getbitu(buf, pos, 6);
                    if svh != 0 {
                        log::warn!("{}: subframe-4: sv {sv} unhealthy per page 25", self.sv);
                    }
                }
            }
        }
    }

    fn decode_subframe5(&mut self, buf: &[u8]) {
        let data_id = getbitu(buf, 60, 2);
        let svid = getbitu(buf, 62, 4);

        if data_id == 1 && (1..=24).contains(&svid) {
            self.almanac_entries.insert(svid as u8, Almanac::decode(buf, svid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds one valid 30-bit word (no D30* inversion from a prior word)
    /// from its 24 data bits, computing the 6 trailing parity bits the same
    /// way `test_subframe_parity` checks them.
    fn valid_word(data_bits: [u8; 24]) -> [u8; 30] {
        let mut data24: u32 = 0;
        for &b in data_bits.iter() {
            data24 = (data24 << 1) | b as u32;
        }
        let mut word = [0u8; 30];
        word[..24].copy_from_slice(&data_bits);
        for j in 0..6 {
            word[24 + j] = xor_bits(data24 & PARITY_MASK[j]);
        }
        word
    }

    #[test]
    fn valid_subframe_passes_and_single_bit_flip_fails() {
        let mut bits = Vec::with_capacity(SUBFRAME_BITS);
        for w in 0..10 {
            let mut data_bits = [0u8; 24];
            data_bits[0] = (w % 2) as u8;
            data_bits[5] = 1;
            bits.extend_from_slice(&valid_word(data_bits));
        }
        assert!(test_subframe_parity(&bits));

        bits[5] = 1 - bits[5];
        assert!(!test_subframe_parity(&bits));
    }
}

use crate::{
    constants::{P2_11, P2_19, P2_20, P2_21, P2_23, P2_38, SC2RAD},
    util::{getbitu, getbitu2},
};

/// A reduced-precision almanac entry for one PRN, decoded from subframe 4 or
/// 5 of *any* tracked satellite's broadcast (almanac pages describe other
/// satellites, not the transmitting one). Never substitutes for a
/// satellite's own ephemeris; its health bit (stale by construction, since
/// almanac data ages for days between uploads) is used only to deprioritize,
/// never skip, that PRN in the acquisition round-robin.
#[derive(Default, Clone, Copy, Debug)]
pub struct Almanac {
    pub sat: u32,
    pub svh: u32,
    pub e: f64,
    pub omg0: f64,
    pub omg: f64,
    pub m0: f64,
    pub omg_dot: f64,
    pub a: f64,
    pub toas: u32,
    pub f0: f64,
    pub f1: f64,
}

impl Almanac {
    pub fn decode(buf: &[u8], svid: u32) -> Self {
        let mut alm = Almanac {
            sat: svid,
            ..Default::default()
        };
        alm.e = getbitu(buf, 68, 16) as f64 * P2_21;
        alm.toas = getbitu(buf, 90, 8) * 4096;
        let _delta_i = getbitu(buf, 98, 16) as f64 * P2_19 * SC2RAD;

        alm.omg_dot = getbitu(buf, 120, 16) as f64 * P2_38 * SC2RAD;
        alm.svh = getbitu(buf, 136, 8);
        let sqrt_a = getbitu(buf, 150, 24) as f64 * P2_11;
        alm.a = sqrt_a * sqrt_a;
        alm.omg0 = getbitu(buf, 180, 24) as f64 * P2_23 * SC2RAD;
        alm.omg = getbitu(buf, 210, 24) as f64 * P2_23 * SC2RAD;
        alm.m0 = getbitu(buf, 240, 24) as f64 * P2_23 * SC2RAD;
        alm.f0 = getbitu2(buf, 270, 8, 289, 3) as f64 * P2_20;
        alm.f1 = getbitu(buf, 278, 11) as f64 * P2_38;
        alm
    }

    pub fn is_healthy(&self) -> bool {
        self.svh == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_subframe_decodes_to_healthy_zero_almanac() {
        let buf = [0u8; 38];
        let alm = Almanac::decode(&buf, 12);
        assert_eq!(alm.sat, 12);
        assert!(alm.is_healthy());
        assert_eq!(alm.a, 0.0);
    }
}

use colored::Colorize;
use gnss_rs::sv::SV;
use hifitime::Epoch;

use crate::{
    constants::{P2_5, P2_19, P2_29, P2_31, P2_33, P2_43, P2_55, SC2RAD, SECS_PER_WEEK},
    util::{getbits, getbits2, getbitu, getbitu2},
};

/// Broadcast ephemeris parameters assembled incrementally from subframes
/// 1, 2 and 3. "Complete" once all three have arrived with a matching
/// IODE/IODC, per the frame-decoder contract.
#[derive(Default, Clone, Copy)]
pub struct Ephemeris {
    pub sv: SV,
    pub tow: u32,
    pub ts_sec: f64, // receiver time at which this subframe set was received
    pub tow_gpst: Epoch,
    pub toe_gpst: Epoch,
    pub tlm: u32,

    pub iode: u32,
    pub iodc: u32,
    pub sva: u32,
    pub svh: u32,
    pub week: u32,
    pub code: u32,
    pub flag: u32,
    pub tgd: f64,
    pub f0: f64,
    pub f1: f64,
    pub f2: f64,
    pub omg: f64,
    pub omg0: f64,
    pub omg_dot: f64,
    pub cic: f64,
    pub cis: f64,
    pub crc: f64,
    pub crs: f64,
    pub cuc: f64,
    pub cus: f64,
    pub i_dot: f64,
    pub i0: f64,
    pub m0: f64,
    pub a: f64,
    pub ecc: f64,
    pub deln: f64,
    pub toc: u32,
    pub toe: u32,
    pub fit: u32,

    sf1_iodc: Option<u32>,
    sf2_iode: Option<u32>,
    sf3_iode: Option<u32>,
}

impl Ephemeris {
    pub fn new(sv: SV) -> Self {
        Self {
            sv,
            ..Default::default()
        }
    }

    /// True once subframes 1, 2 and 3 have all been received and their
    /// issue-of-data values agree (§4.4: IODE == IODE == IODC mod 256).
    pub fn is_complete(&self) -> bool {
        match (self.sf1_iodc, self.sf2_iode, self.sf3_iode) {
            (Some(iodc), Some(iode2), Some(iode3)) => iode2 == iode3 && iodc % 256 == iode2,
            _ => false,
        }
    }

    pub fn decode_subframe1(&mut self, buf: &[u8]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        self.week = getbitu(buf, 60, 10) + 2048;
        self.code = getbitu(buf, 70, 2);
        self.sva = getbitu(buf, 72, 4);
        self.svh = getbitu(buf, 76, 6);

        self.iodc = getbitu2(buf, 82, 2, 210, 8);
        self.flag = getbitu(buf, 90, 1);
        self.tgd = getbits(buf, 196, 8) as f64 * P2_31;
        self.toc = getbitu(buf, 218, 16) * 16;
        self.f2 = getbits(buf, 240, 8) as f64 * P2_55;
        self.f1 = getbits(buf, 248, 16) as f64 * P2_43;
        self.f0 = getbits(buf, 270, 22) as f64 * P2_31;
        self.sf1_iodc = Some(self.iodc);

        log::warn!(
            "{}: {} tow={} week={} iodc={} tgd={:+e} toc={} a0={:+e} a1={:+e} a2={:+e}",
            self.sv,
            "subframe-1".blue(),
            self.tow,
            self.week,
            self.iodc,
            self.tgd,
            self.toc,
            self.f0,
            self.f1,
            self.f2
        );
    }

    pub fn decode_subframe2(&mut self, buf: &[u8]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        self.iode = getbitu(buf, 60, 8);
        self.crs = getbits(buf, 68, 16) as f64 * P2_5;
        self.deln = getbits(buf, 90, 16) as f64 * P2_43 * SC2RAD;
        self.m0 = getbits2(buf, 106, 8, 120, 24) as f64 * P2_31 * SC2RAD;
        self.cuc = getbits(buf, 150, 16) as f64 * P2_29;
        self.ecc = getbitu2(buf, 166, 8, 180, 24) as f64 * P2_33;
        self.cus = getbits(buf, 210, 16) as f64 * P2_29;
        let sqrt_a = getbitu2(buf, 226, 8, 240, 24) as f64 * P2_19;
        self.toe = getbitu(buf, 270, 16) * 16;
        self.fit = getbitu(buf, 286, 1);
        self.a = sqrt_a * sqrt_a;
        self.sf2_iode = Some(self.iode);

        log::warn!(
            "{}: {} tow={} a={} iode={} cuc={:+e} cus={:+e} ecc={} m0={} toe={}",
            self.sv,
            "subframe-2".blue(),
            self.tow,
            self.a,
            self.iode,
            self.cuc,
            self.cus,
            self.ecc,
            self.m0,
            self.toe,
        );
    }

    pub fn decode_subframe3(&mut self, buf: &[u8]) {
        self.tow = getbitu(buf, 30, 17) * 6;
        self.cic = getbits(buf, 60, 16) as f64 * P2_29;
        self.omg0 = getbits2(buf, 76, 8, 90, 24) as f64 * P2_31 * SC2RAD;
        self.cis = getbits(buf, 120, 16) as f64 * P2_29;
        self.i0 = getbits2(buf, 136, 8, 150, 24) as f64 * P2_31 * SC2RAD;
        self.crc = getbits(buf, 180, 16) as f64 * P2_5;
        self.omg = getbits2(buf, 196, 8, 210, 24) as f64 * P2_31 * SC2RAD;
        self.omg_dot = getbits(buf, 240, 24) as f64 * P2_43 * SC2RAD;
        self.iode = getbitu(buf, 270, 8);
        self.i_dot = getbits(buf, 278, 14) as f64 * P2_43 * SC2RAD;
        self.sf3_iode = Some(self.iode);

        log::warn!(
            "{}: {} tow={} cic={:+e} cis={:+e} omg={} omg0={} omgd={:+e} i0={} idot={:+e}",
            self.sv,
            "subframe-3".blue(),
            self.tow,
            self.cic,
            self.cis,
            self.omg,
            self.omg0,
            self.omg_dot,
            self.i0,
            self.i_dot
        );
    }

    /// Stamps `tow_gpst`/`toe_gpst` once the GPS week number is known.
    pub fn update_gpst_epochs(&mut self, ts_sec: f64) {
        if self.week == 0 {
            return;
        }
        self.ts_sec = ts_sec;
        let week_to_secs = self.week * SECS_PER_WEEK;
        self.tow_gpst = Epoch::from_gpst_seconds((week_to_secs + self.tow) as f64);
        self.toe_gpst = Epoch::from_gpst_seconds((week_to_secs + self.toe) as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_requires_matching_iode() {
        let sv = SV::new(gnss_rs::constellation::Constellation::GPS, 1);
        let mut eph = Ephemeris::new(sv);
        assert!(!eph.is_complete());

        eph.sf1_iodc = Some(0x1A3);
        eph.sf2_iode = Some(0xA3);
        eph.sf3_iode = Some(0xA3);
        assert!(eph.is_complete());

        eph.sf3_iode = Some(0xA4);
        assert!(!eph.is_complete());
    }
}

pub const PI: f64 = std::f64::consts::PI;

// Sampling / code geometry -----------------------------------------------
pub const PRN_CODE_LEN: usize = 1023;
pub const SAMPLES_PER_CHIP: usize = 2;
pub const SAMPLES_PER_MS: usize = PRN_CODE_LEN * SAMPLES_PER_CHIP; // 2046
pub const NUM_GPS_SATS: usize = 32;
pub const L1CA_HZ: f64 = 1575.42e6;
pub const DEFAULT_FS_HZ: f64 = 2_046_000.0;

// Acquisition --------------------------------------------------------------
pub const ACQUISITION_WINDOW_MSEC: usize = 10;
pub const DOPPLER_SEARCH_HZ: f64 = 10_000.0;
pub const DOPPLER_STEP_HZ: f64 = 500.0;
pub const ACQUISITION_PSR_THRESHOLD: f64 = 2.5;
pub const ACQUISITION_RETRY_INTERVAL_SEC: f64 = 10.0;
pub const ACQUISITION_SIDE_LOBE_GUARD_SAMPLES: usize = 2;
pub const ACQUISITION_COHERENT_MS: usize = 1;
pub const ACQUISITION_INCOHERENT_MS: usize = 10;

// Tracking -------------------------------------------------------------
pub const SP_CORR: f64 = 0.5; // early/late correlator spacing, in chips
pub const B_DLL_HZ: f64 = 1.0;
pub const B_FLL_WIDE_HZ: f64 = 10.0;
pub const B_FLL_NARROW_HZ: f64 = 2.0;
pub const B_PLL_HZ: f64 = 15.0;
pub const T_FLL_PULLIN_SEC: f64 = 1.0;
pub const LOSS_OF_LOCK_WINDOW_MS: usize = 50;
pub const LOSS_OF_LOCK_SNR_FACTOR: f64 = 1.5;
pub const CODE_PHASE_JUMP_GUARD_SAMPLES: f64 = 2.0;

// Bit sync -----------------------------------------------------------------
pub const BITS_PER_SYMBOL: usize = 20;
pub const BIT_SYNC_MIN_MS: usize = 200;
pub const BIT_SYNC_RATIO: f64 = 3.0;

// Frame decode ---------------------------------------------------------
pub const TLM_PREAMBLE: [u8; 8] = [1, 0, 0, 0, 1, 0, 1, 1];
pub const WORD_BITS: usize = 30;
pub const WORDS_PER_SUBFRAME: usize = 10;
pub const SUBFRAME_BITS: usize = WORD_BITS * WORDS_PER_SUBFRAME; // 300
pub const SECS_PER_WEEK: u32 = 7 * 24 * 60 * 60;

// RTCA/RTKLIB style scale factors used to decode broadcast ephemeris/almanac
pub const SC2RAD: f64 = PI; // semicircles to radians
pub const P2_5: f64 = 1.0 / 32.0; // 2^-5
pub const P2_11: f64 = 1.0 / 2048.0; // 2^-11
pub const P2_19: f64 = 1.0 / 524_288.0; // 2^-19
pub const P2_20: f64 = 1.0 / 1_048_576.0; // 2^-20
pub const P2_21: f64 = 1.0 / 2_097_152.0; // 2^-21
pub const P2_23: f64 = 1.0 / 8_388_608.0; // 2^-23
pub const P2_29: f64 = 1.0 / 536_870_912.0; // 2^-29
pub const P2_31: f64 = 1.0 / 2_147_483_648.0; // 2^-31
pub const P2_33: f64 = P2_31 / 4.0; // 2^-33
pub const P2_38: f64 = P2_31 / 128.0; // 2^-38
pub const P2_43: f64 = P2_38 / 32.0; // 2^-43
pub const P2_55: f64 = P2_43 / 4096.0; // 2^-55

// Orbit / solver ---------------------------------------------------------
pub const EARTH_MU_GPS: f64 = 3.986005e14;
pub const EARTH_ROTATION_RATE: f64 = 7.2921151467e-5;
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
pub const KEPLER_TOLERANCE: f64 = 1e-12;
pub const KEPLER_MAX_ITER: usize = 10;
pub const SOLVER_MAX_ITER: usize = 20;
pub const SOLVER_CONVERGENCE_EPS: f64 = 1e-4;

// WGS-84 ellipsoid
pub const WGS84_A: f64 = 6_378_137.0;
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

// Status server ------------------------------------------------------------
pub const DEFAULT_STATUS_ADDR: &str = "127.0.0.1:8080";

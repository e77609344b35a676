pub mod acquisition;
pub mod almanac;
pub mod channel;
pub mod constants;
pub mod device;
pub mod ephemeris;
pub mod error;
pub mod gold_code;
pub mod navigation;
pub mod receiver;
pub mod recording;
pub mod registry;
pub mod solver;
pub mod state;
pub mod status_server;
pub mod types;
pub mod util;

#[cfg(target_os = "linux")]
extern crate rtlsdr_mt;

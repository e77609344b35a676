use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use colored::Colorize;
use structopt::StructOpt;

use gnss_rcv_core::error::ReceiverError;
use gnss_rcv_core::receiver::{parse_sat_list, Receiver, ReceiverConfig};
use gnss_rcv_core::recording::IQFileType;
use gnss_rcv_core::state::GnssState;
use gnss_rcv_core::status_server;

#[derive(StructOpt)]
#[structopt(name = "gnss-rcv", about = "software-defined GPS L1 C/A receiver")]
struct Options {
    #[structopt(short = "f", long, help = "path to a recorded IQ capture")]
    file: Option<PathBuf>,

    #[structopt(long = "rtl-sdr", help = "read live samples from an RTL-SDR dongle")]
    rtl_sdr: bool,

    #[structopt(short = "t", long = "unix-seconds", help = "UNIX timestamp of the first sample")]
    unix_seconds: Option<i64>,

    #[structopt(long = "iq-format", default_value = "2xf32")]
    iq_format: IQFileType,

    #[structopt(long = "sample-rate", default_value = "2046000")]
    sample_rate: f64,

    #[structopt(long, default_value = "")]
    sats: String,

    #[structopt(short = "v", long)]
    verbose: bool,

    #[structopt(long = "status-addr", default_value = "127.0.0.1:8080")]
    status_addr: String,

    #[structopt(long = "off-msec", default_value = "0")]
    off_msec: usize,
}

fn main() {
    let opt = Options::from_args();

    let log_level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    coredump::register_panic_handler().ok();

    if opt.file.is_some() == opt.rtl_sdr {
        log::error!("exactly one of -f/--file or --rtl-sdr must be given");
        std::process::exit(1);
    }

    std::process::exit(match run(opt) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}: {e}", "fatal".red());
            e.exit_code()
        }
    });
}

fn run(opt: Options) -> Result<(), ReceiverError> {
    let config = ReceiverConfig {
        fs: opt.sample_rate,
        fi: 0.0,
        sats: parse_sat_list(&opt.sats),
        start_unix_sec: opt.unix_seconds.unwrap_or(0) as f64,
    };

    let exit_req = Arc::new(AtomicBool::new(false));
    {
        let exit_req = exit_req.clone();
        ctrlc::set_handler(move || {
            exit_req.store(true, Ordering::SeqCst);
        })
        .expect("failed to register SIGINT handler");
    }

    let pub_state = Arc::new(Mutex::new(GnssState::new()));

    let mut receiver = if let Some(file) = opt.file {
        status_server::spawn(opt.status_addr.clone(), pub_state.clone(), exit_req.clone());
        Receiver::new_from_file(
            &config,
            file,
            opt.iq_format,
            opt.off_msec,
            exit_req.clone(),
            pub_state.clone(),
        )?
    } else {
        Receiver::new_from_rtl_sdr(&config, exit_req.clone(), pub_state.clone())?
    };

    receiver.run_loop(0)
}

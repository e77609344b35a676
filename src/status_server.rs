use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::state::GnssState;

/// Serves the latest [`GnssState`] snapshot as JSON over `GET /`, per §6.
/// File-mode only: live SDR capture can't spare a thread for this without
/// risking the 1ms tick budget, so `--status-addr` is rejected with
/// `--rtl-sdr`.
pub fn spawn(addr: String, state: Arc<Mutex<GnssState>>, exit_req: Arc<AtomicBool>) {
    thread::spawn(move || {
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                log::warn!("status server: failed to bind {addr}: {e}");
                return;
            }
        };
        listener
            .set_nonblocking(true)
            .expect("set_nonblocking should succeed on a fresh listener");

        log::info!("status server listening on {addr}");

        loop {
            if exit_req.load(Ordering::SeqCst) {
                break;
            }
            match listener.accept() {
                Ok((stream, _)) => handle_connection(stream, &state),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(50));
                }
                Err(e) => {
                    log::warn!("status server: accept error: {e}");
                    break;
                }
            }
        }
    });
}

fn handle_connection(mut stream: TcpStream, state: &Arc<Mutex<GnssState>>) {
    let body = {
        let snapshot = state.lock().unwrap();
        serde_json::to_string(&*snapshot).unwrap_or_else(|_| "{}".to_string())
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    if let Err(e) = stream.write_all(response.as_bytes()) {
        log::debug!("status server: write error: {e}");
    }
}

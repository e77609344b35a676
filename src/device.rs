use rustfft::num_complex::Complex64;

use crate::constants::L1CA_HZ;
use crate::error::ReceiverError;

/// The RTL-SDR live sample source (§6 interface (b)), selected with
/// `--rtl-sdr`. Only available on Linux, where `rtlsdr_mt` can talk to the
/// device over libusb.
pub struct RtlSdrDevice {
    #[cfg(target_os = "linux")]
    reader: rtlsdr_mt::Reader,
    #[cfg(target_os = "linux")]
    _ctl: rtlsdr_mt::Controller,
}

impl RtlSdrDevice {
    #[cfg(target_os = "linux")]
    pub fn new(fs: f64) -> Result<Self, ReceiverError> {
        let (mut ctl, reader) = rtlsdr_mt::open(0)
            .map_err(|_| ReceiverError::SampleSource("no rtl-sdr device found".to_string()))?;

        ctl.enable_agc()
            .map_err(|e| ReceiverError::SampleSource(format!("{e:?}")))?;
        ctl.set_center_freq(L1CA_HZ as u32)
            .map_err(|e| ReceiverError::SampleSource(format!("{e:?}")))?;
        ctl.set_sample_rate(fs as u32)
            .map_err(|e| ReceiverError::SampleSource(format!("{e:?}")))?;

        Ok(Self { reader, _ctl: ctl })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn new(_fs: f64) -> Result<Self, ReceiverError> {
        Err(ReceiverError::SampleSource(
            "--rtl-sdr is only supported on Linux".to_string(),
        ))
    }

    #[cfg(target_os = "linux")]
    pub fn read_iq_data(&mut self, num_samples: usize) -> Result<Vec<Complex64>, ReceiverError> {
        let mut out = Vec::with_capacity(num_samples);
        self.reader
            .read_async(4, 32768, |bytes| {
                for chunk in bytes.chunks_exact(2) {
                    if out.len() >= num_samples {
                        break;
                    }
                    out.push(Complex64 {
                        re: (chunk[0] as f64 - 127.5) / 128.0,
                        im: (chunk[1] as f64 - 127.5) / 128.0,
                    });
                }
            })
            .map_err(|e| ReceiverError::SampleSource(format!("{e:?}")))?;
        Ok(out)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn read_iq_data(&mut self, _num_samples: usize) -> Result<Vec<Complex64>, ReceiverError> {
        unreachable!("RtlSdrDevice::new fails before this can be called")
    }
}

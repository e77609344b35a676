use bytesize::ByteSize;
use colored::Colorize;
use rustfft::num_complex::Complex64;
use std::fmt;
use std::fs::File;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use crate::error::ReceiverError;

/// Sample encoding of a recorded IQ capture, selected with `--iq-format`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IQFileType {
    TypePairFloat32,
    TypePairInt16,
    TypeRtlSdrFile,
    TypeOneInt8,
}

impl FromStr for IQFileType {
    type Err = String;
    fn from_str(input: &str) -> Result<IQFileType, Self::Err> {
        match input {
            "2xf32" => Ok(IQFileType::TypePairFloat32),
            "2xi16" => Ok(IQFileType::TypePairInt16),
            "rtlsdr-file" => Ok(IQFileType::TypeRtlSdrFile),
            "i8" => Ok(IQFileType::TypeOneInt8),
            _ => Err(format!("unknown --iq-format '{input}'")),
        }
    }
}

impl fmt::Display for IQFileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IQFileType::TypePairFloat32 => write!(f, "2xf32"),
            IQFileType::TypePairInt16 => write!(f, "2xi16"),
            IQFileType::TypeRtlSdrFile => write!(f, "rtlsdr-file"),
            IQFileType::TypeOneInt8 => write!(f, "i8"),
        }
    }
}

/// The file-backed sample source (§6 interface (a)): pulls `n` IQ samples at
/// a time starting from an absolute sample offset.
pub struct IQRecording {
    file_path: PathBuf,
    file_type: IQFileType,
}

impl IQRecording {
    pub fn new(file_path: PathBuf, fs: f64, file_type: IQFileType) -> Result<Self, ReceiverError> {
        let file_size = file_path
            .metadata()
            .map_err(|e| ReceiverError::SampleSource(e.to_string()))?
            .len();
        let sample_size = Self::get_sample_size_bytes(&file_type) as f64;
        let recording_duration_sec = file_size as f64 / fs / sample_size;

        log::info!(
            "file: {} -- {file_type} {} duration: {:.1} secs",
            file_path.display().to_string().green(),
            ByteSize::b(file_size).to_string_as(false).bold(),
            recording_duration_sec
        );
        Ok(Self {
            file_path,
            file_type,
        })
    }

    fn get_sample_size_bytes(file_type: &IQFileType) -> usize {
        match file_type {
            IQFileType::TypeRtlSdrFile => 2,
            IQFileType::TypeOneInt8 => 1,
            IQFileType::TypePairInt16 => 2 * 2,
            IQFileType::TypePairFloat32 => 2 * 4,
        }
    }

    pub fn read_iq_file(
        &mut self,
        off_samples: usize,
        num_samples: usize,
    ) -> Result<Vec<Complex64>, ReceiverError> {
        let file =
            File::open(&self.file_path).map_err(|e| ReceiverError::SampleSource(e.to_string()))?;
        let sample_size = Self::get_sample_size_bytes(&self.file_type);
        let buf_size = sample_size * num_samples;
        let mut reader = BufReader::with_capacity(buf_size, &file);
        let mut n: usize = 0;
        let ts = Instant::now();
        let mut iq_vec = vec![];

        let off_file = off_samples * sample_size;
        reader
            .seek(SeekFrom::Current(off_file as i64))
            .map_err(|e| ReceiverError::SampleSource(e.to_string()))?;

        loop {
            let buf = reader
                .fill_buf()
                .map_err(|e| ReceiverError::SampleSource(e.to_string()))?;
            let len = buf.len();

            if len == 0 {
                break;
            }

            match self.file_type {
                IQFileType::TypeRtlSdrFile => {
                    for off in (0..len).step_by(2) {
                        iq_vec.push(Complex64 {
                            re: (buf[off] as f64 - 127.) / 128.0,
                            im: (buf[off + 1] as f64 - 127.) / 128.0,
                        });
                        n += 1;
                        if n >= num_samples {
                            break;
                        }
                    }
                }
                IQFileType::TypeOneInt8 => {
                    for off in 0..len {
                        iq_vec.push(Complex64 {
                            re: buf[off] as i8 as f64 / i8::MAX as f64,
                            im: 0.0,
                        });
                        n += 1;
                        if n >= num_samples {
                            break;
                        }
                    }
                }
                IQFileType::TypePairInt16 => {
                    for off in (0..len).step_by(4) {
                        let i = i16::from_le_bytes([buf[off], buf[off + 1]]);
                        let q = i16::from_le_bytes([buf[off + 2], buf[off + 3]]);
                        iq_vec.push(Complex64 {
                            re: i as f64 / i16::MAX as f64,
                            im: q as f64 / i16::MAX as f64,
                        });
                        n += 1;
                        if n >= num_samples {
                            break;
                        }
                    }
                }
                IQFileType::TypePairFloat32 => {
                    for off in (0..len).step_by(8) {
                        let i = f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
                        let q =
                            f32::from_le_bytes([buf[off + 4], buf[off + 5], buf[off + 6], buf[off + 7]]);
                        iq_vec.push(Complex64 {
                            re: i as f64,
                            im: q as f64,
                        });
                        n += 1;
                        if n >= num_samples {
                            break;
                        }
                    }
                }
            }
            if n >= num_samples {
                break;
            }
            reader.consume(len);
        }

        if n < num_samples {
            return Err(ReceiverError::SampleSource("end of file".to_string()));
        }

        let bw = n as f64 * buf_size as f64 / 1024.0 / 1024.0 / ts.elapsed().as_secs_f64();
        log::debug!(
            "read_iq_file: {} msec -- bandwidth: {:.1} MB/sec -- num_read_ops={}",
            ts.elapsed().as_millis(),
            bw,
            n
        );

        Ok(iq_vec)
    }
}

//! Reader for the SAC binary waveform format: a 632 byte header of 4-byte
//! words followed by the sample data as 32-bit floats. Files written on
//! either byte order are accepted, the order is detected from the header
//! version word.

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use chrono::NaiveDate;
use std::path::Path;

use crate::tank_error::TankError;

/// Size in bytes of the SAC binary header.
pub const SAC_HEADER_SIZE: usize = 632;

/// Length of the 23 short character fields (`kevnm` is twice this).
pub const K_LEN: usize = 8;

/// Undefined-value markers of the SAC format.
pub const SAC_UNDEF_F32: f32 = -12345.0;
pub const SAC_UNDEF_I32: i32 = -12345;
pub const SAC_UNDEF_STR: &str = "-12345";

/// Smallest sample period the transcoder accepts, in seconds.
pub const MIN_SAMPLE_PERIOD: f32 = 0.001;

// word offsets, in bytes, of the header fields used here
const OFF_DELTA: usize = 0;
const OFF_B: usize = 5 * 4;
const OFF_E: usize = 6 * 4;
const INT_BASE: usize = 70 * 4;
const OFF_NZYEAR: usize = INT_BASE;
const OFF_NZJDAY: usize = INT_BASE + 4;
const OFF_NZHOUR: usize = INT_BASE + 2 * 4;
const OFF_NZMIN: usize = INT_BASE + 3 * 4;
const OFF_NZSEC: usize = INT_BASE + 4 * 4;
const OFF_NZMSEC: usize = INT_BASE + 5 * 4;
const OFF_NVHDR: usize = INT_BASE + 6 * 4;
const OFF_NPTS: usize = INT_BASE + 9 * 4;
const CHAR_BASE: usize = 440;
const OFF_KSTNM: usize = CHAR_BASE;
const OFF_KHOLE: usize = CHAR_BASE + 24;
const OFF_KCMPNM: usize = CHAR_BASE + 160;
const OFF_KNETWK: usize = CHAR_BASE + 168;

/// The subset of the SAC header the transcoder needs. Character fields are
/// kept as the raw space-padded bytes from the file, trimming is the
/// identifier resolution's job.
#[derive(Debug, Clone)]
pub struct SacHeader {
    /// Sample period in seconds.
    pub delta: f32,
    /// Begin offset of the first sample relative to the reference time.
    pub b: f32,
    /// End offset of the last sample relative to the reference time.
    pub e: f32,
    pub nzyear: i32,
    pub nzjday: i32,
    pub nzhour: i32,
    pub nzmin: i32,
    pub nzsec: i32,
    pub nzmsec: i32,
    pub nvhdr: i32,
    pub npts: i32,
    pub kstnm: [u8; K_LEN],
    pub khole: [u8; K_LEN],
    pub kcmpnm: [u8; K_LEN],
    pub knetwk: [u8; K_LEN],
}

impl SacHeader {
    /// Parses a header from the first [`SAC_HEADER_SIZE`] bytes of a file.
    /// Returns the header together with whether the file is byte-swapped
    /// relative to this machine.
    pub fn from_bytes(buffer: &[u8]) -> Result<(SacHeader, bool), TankError> {
        if buffer.len() < SAC_HEADER_SIZE {
            return Err(TankError::ShortFile(buffer.len(), SAC_HEADER_SIZE));
        }
        let native = SacHeader::parse::<NativeEndian>(buffer);
        if native.nvhdr == 6 || native.nvhdr == 7 {
            return Ok((native, false));
        }
        let swapped = if cfg!(target_endian = "little") {
            SacHeader::parse::<BigEndian>(buffer)
        } else {
            SacHeader::parse::<LittleEndian>(buffer)
        };
        if swapped.nvhdr == 6 || swapped.nvhdr == 7 {
            return Ok((swapped, true));
        }
        Err(TankError::BadHeaderVersion(native.nvhdr))
    }

    fn parse<B: ByteOrder>(buffer: &[u8]) -> SacHeader {
        SacHeader {
            delta: B::read_f32(&buffer[OFF_DELTA..]),
            b: B::read_f32(&buffer[OFF_B..]),
            e: B::read_f32(&buffer[OFF_E..]),
            nzyear: B::read_i32(&buffer[OFF_NZYEAR..]),
            nzjday: B::read_i32(&buffer[OFF_NZJDAY..]),
            nzhour: B::read_i32(&buffer[OFF_NZHOUR..]),
            nzmin: B::read_i32(&buffer[OFF_NZMIN..]),
            nzsec: B::read_i32(&buffer[OFF_NZSEC..]),
            nzmsec: B::read_i32(&buffer[OFF_NZMSEC..]),
            nvhdr: B::read_i32(&buffer[OFF_NVHDR..]),
            npts: B::read_i32(&buffer[OFF_NPTS..]),
            kstnm: k_field(buffer, OFF_KSTNM),
            khole: k_field(buffer, OFF_KHOLE),
            kcmpnm: k_field(buffer, OFF_KCMPNM),
            knetwk: k_field(buffer, OFF_KNETWK),
        }
    }

    /// Epoch seconds of the file reference time, built from the nz fields.
    pub fn reference_time(&self) -> Result<f64, TankError> {
        if self.nzyear == SAC_UNDEF_I32 || self.nzjday == SAC_UNDEF_I32 {
            return Err(TankError::UndefinedReferenceTime);
        }
        let date = NaiveDate::from_yo_opt(self.nzyear, self.nzjday as u32)
            .ok_or(TankError::UndefinedReferenceTime)?;
        let time = date
            .and_hms_opt(
                clamp_undef(self.nzhour) as u32,
                clamp_undef(self.nzmin) as u32,
                clamp_undef(self.nzsec) as u32,
            )
            .ok_or(TankError::UndefinedReferenceTime)?;
        Ok(time.and_utc().timestamp() as f64 + clamp_undef(self.nzmsec) as f64 / 1000.0)
    }

    /// Time of the first sample: reference time plus the begin offset.
    pub fn begin_time(&self) -> Result<f64, TankError> {
        Ok(self.reference_time()? + self.b as f64)
    }
}

/// Undefined time-of-day fields are treated as zero, matching how a SAC file
/// with only a date stamp plays back.
fn clamp_undef(v: i32) -> i32 {
    if v == SAC_UNDEF_I32 {
        0
    } else {
        v
    }
}

fn k_field(buffer: &[u8], offset: usize) -> [u8; K_LEN] {
    let mut field = [0u8; K_LEN];
    field.copy_from_slice(&buffer[offset..offset + K_LEN]);
    field
}

/// Loads a SAC file into a header plus its float sample array.
pub fn read_sac(path: &Path) -> Result<(SacHeader, Vec<f32>), TankError> {
    let buffer = std::fs::read(path)?;
    read_sac_bytes(&buffer)
}

/// Same as [`read_sac`] but from an in-memory image of the file.
pub fn read_sac_bytes(buffer: &[u8]) -> Result<(SacHeader, Vec<f32>), TankError> {
    let (header, swapped) = SacHeader::from_bytes(buffer)?;
    if header.npts < 0 {
        return Err(TankError::BadSampleCount(header.npts));
    }
    let npts = header.npts as usize;
    let data = &buffer[SAC_HEADER_SIZE..];
    if data.len() < npts * 4 {
        return Err(TankError::ShortData(data.len() / 4, header.npts));
    }
    let mut samples = vec![0f32; npts];
    if swapped {
        if cfg!(target_endian = "little") {
            BigEndian::read_f32_into(&data[..npts * 4], &mut samples);
        } else {
            LittleEndian::read_f32_into(&data[..npts * 4], &mut samples);
        }
    } else {
        NativeEndian::read_f32_into(&data[..npts * 4], &mut samples);
    }
    Ok((header, samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// Builds a minimal SAC file image with the given byte order.
    pub fn synthetic_sac<B: ByteOrder>(samples: &[f32]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SAC_HEADER_SIZE + 4 * samples.len());
        // float words
        for i in 0..70 {
            let v = match i {
                0 => 0.01,         // delta
                5 => 0.0,          // b
                6 => 0.01 * (samples.len().max(1) - 1) as f32, // e
                _ => SAC_UNDEF_F32,
            };
            buf.write_f32::<B>(v).unwrap();
        }
        // int words
        for i in 0..40 {
            let v = match i {
                0 => 2021, // nzyear
                1 => 1,    // nzjday
                2 => 0,    // nzhour
                3 => 0,    // nzmin
                4 => 0,    // nzsec
                5 => 0,    // nzmsec
                6 => 6,    // nvhdr
                9 => samples.len() as i32,
                _ => SAC_UNDEF_I32,
            };
            buf.write_i32::<B>(v).unwrap();
        }
        // char words, space padded
        let mut chars = [b' '; 192];
        chars[0..4].copy_from_slice(b"NACB"); // kstnm
        chars[24..26].copy_from_slice(b"10"); // khole
        chars[160..163].copy_from_slice(b"HHZ"); // kcmpnm
        chars[168..170].copy_from_slice(b"TW"); // knetwk
        buf.extend_from_slice(&chars);
        for &s in samples {
            buf.write_f32::<B>(s).unwrap();
        }
        buf
    }

    #[test]
    fn parse_native_order() {
        let img = synthetic_sac::<NativeEndian>(&[1.0, 2.0, 3.0]);
        let (header, samples) = read_sac_bytes(&img).unwrap();
        assert_eq!(header.nvhdr, 6);
        assert_eq!(header.npts, 3);
        assert_eq!(header.delta, 0.01);
        assert_eq!(&header.kstnm, b"NACB    ");
        assert_eq!(&header.knetwk, b"TW      ");
        assert_eq!(samples, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn parse_swapped_order() {
        let img = if cfg!(target_endian = "little") {
            synthetic_sac::<BigEndian>(&[4.0, -5.0])
        } else {
            synthetic_sac::<LittleEndian>(&[4.0, -5.0])
        };
        let (header, samples) = read_sac_bytes(&img).unwrap();
        assert_eq!(header.nvhdr, 6);
        assert_eq!(header.delta, 0.01);
        assert_eq!(samples, vec![4.0, -5.0]);
    }

    #[test]
    fn reject_bad_version_word() {
        let mut img = synthetic_sac::<NativeEndian>(&[]);
        NativeEndian::write_i32(&mut img[OFF_NVHDR..OFF_NVHDR + 4], 42);
        assert!(matches!(
            read_sac_bytes(&img),
            Err(TankError::BadHeaderVersion(_))
        ));
    }

    #[test]
    fn reject_short_file() {
        let img = synthetic_sac::<NativeEndian>(&[]);
        assert!(matches!(
            read_sac_bytes(&img[..100]),
            Err(TankError::ShortFile(100, SAC_HEADER_SIZE))
        ));
    }

    #[test]
    fn reject_truncated_data_section() {
        let img = synthetic_sac::<NativeEndian>(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            read_sac_bytes(&img[..img.len() - 4]),
            Err(TankError::ShortData(2, 3))
        ));
    }

    #[test]
    fn reference_time_epoch_math() {
        let img = synthetic_sac::<NativeEndian>(&[]);
        let (header, _) = read_sac_bytes(&img).unwrap();
        // 2021-001 00:00:00 UTC
        assert_eq!(header.reference_time().unwrap(), 1609459200.0);
        assert_eq!(header.begin_time().unwrap(), 1609459200.0);
    }

    #[test]
    fn reference_time_undefined() {
        let img = synthetic_sac::<NativeEndian>(&[]);
        let (mut header, _) = read_sac_bytes(&img).unwrap();
        header.nzyear = SAC_UNDEF_I32;
        assert!(matches!(
            header.reference_time(),
            Err(TankError::UndefinedReferenceTime)
        ));
    }

    #[test]
    fn reference_time_includes_milliseconds() {
        let img = synthetic_sac::<NativeEndian>(&[]);
        let (mut header, _) = read_sac_bytes(&img).unwrap();
        header.nzhour = 1;
        header.nzmin = 2;
        header.nzsec = 3;
        header.nzmsec = 250;
        assert_eq!(
            header.reference_time().unwrap(),
            1609459200.0 + 3723.0 + 0.25
        );
    }
}

use byteorder::{NativeEndian, WriteBytesExt};
use std::fmt;
use std::io::prelude::*;
use std::io::BufWriter;

use crate::tank_error::TankError;

/// Maximum size in bytes of a single tracebuf packet, header included.
pub const MAX_TRACEBUF_SIZE: usize = 4096;

/// Size in bytes of the fixed TRACEBUF2 header.
pub const HEADER_SIZE: usize = 64;

/// Largest number of i4 samples that still fits in a packet.
pub const MAX_SAMPLES_PER_PACKET: usize = (MAX_TRACEBUF_SIZE - HEADER_SIZE) / 4;

// SEED code plus terminating NUL.
pub const STA_LEN: usize = 7;
pub const NET_LEN: usize = 9;
pub const CHAN_LEN: usize = 4;
pub const LOC_LEN: usize = 3;

/// Null string for the location code field.
pub const LOC_NULL_STRING: &str = "--";

/// CSS datatype code for Intel-order 32-bit integer samples.
pub const DATATYPE_I4: [u8; 3] = [b'i', b'4', 0];

/// The four bytes following the datatype field, selected by the version tag.
/// TRACEBUF2 (`'2','0'`) carries data-quality and pad bytes, TRACEBUF21
/// (`'2','1'`) reuses the same bytes as a conversion factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderVariant {
    V20 { quality: [u8; 2], pad: [u8; 2] },
    V21 { conversion_factor: f32 },
}

impl HeaderVariant {
    /// V20 with no data-quality information available.
    pub fn no_quality() -> HeaderVariant {
        HeaderVariant::V20 {
            quality: [0; 2],
            pad: [0; 2],
        }
    }

    /// The two version bytes stamped in the header for this variant.
    pub fn version_bytes(&self) -> [u8; 2] {
        match self {
            HeaderVariant::V20 { .. } => [b'2', b'0'],
            HeaderVariant::V21 { .. } => [b'2', b'1'],
        }
    }
}

/// The fixed portion of a tracebuf packet. Identifier fields are held as
/// NUL-padded byte slots exactly as they appear on the wire, so a header can
/// be serialized without further validation.
#[derive(Debug, Clone)]
pub struct TraceBuf2Header {
    pub pinno: i32,
    pub nsamp: i32,
    /// Time of first sample in epoch seconds.
    pub starttime: f64,
    /// Time of last sample in epoch seconds.
    pub endtime: f64,
    pub samprate: f64,
    pub sta: [u8; STA_LEN],
    pub net: [u8; NET_LEN],
    pub chan: [u8; CHAN_LEN],
    pub loc: [u8; LOC_LEN],
    pub datatype: [u8; 3],
    pub variant: HeaderVariant,
}

impl TraceBuf2Header {
    /// Writes the 64 header bytes. Integer and float fields use native byte
    /// order, matching the `i4` datatype code stamped in the header.
    pub fn write_to<W>(&self, buf: &mut BufWriter<W>) -> Result<(), TankError>
    where
        W: std::io::Write,
    {
        buf.write_i32::<NativeEndian>(self.pinno)?;
        buf.write_i32::<NativeEndian>(self.nsamp)?;
        buf.write_f64::<NativeEndian>(self.starttime)?;
        buf.write_f64::<NativeEndian>(self.endtime)?;
        buf.write_f64::<NativeEndian>(self.samprate)?;
        buf.write_all(&self.sta)?;
        buf.write_all(&self.net)?;
        buf.write_all(&self.chan)?;
        buf.write_all(&self.loc)?;
        buf.write_all(&self.variant.version_bytes())?;
        buf.write_all(&self.datatype)?;
        match self.variant {
            HeaderVariant::V20 { quality, pad } => {
                buf.write_all(&quality)?;
                buf.write_all(&pad)?;
            }
            HeaderVariant::V21 { conversion_factor } => {
                buf.write_f32::<NativeEndian>(conversion_factor)?;
            }
        }
        Ok(())
    }

    pub fn sta(&self) -> &str {
        slot_str(&self.sta)
    }
    pub fn net(&self) -> &str {
        slot_str(&self.net)
    }
    pub fn chan(&self) -> &str {
        slot_str(&self.chan)
    }
    pub fn loc(&self) -> &str {
        slot_str(&self.loc)
    }
}

impl fmt::Display for TraceBuf2Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{} {} samples at {} sps, {:.4} to {:.4}",
            self.sta(),
            self.chan(),
            self.net(),
            self.loc(),
            self.nsamp,
            self.samprate,
            self.starttime,
            self.endtime
        )
    }
}

/// One tracebuf packet: a header plus one contiguous run of encoded samples.
/// Constructed fresh per chunk by the packetizer and never mutated after
/// emission.
#[derive(Debug, Clone)]
pub struct TraceBuf2 {
    pub header: TraceBuf2Header,
    pub samples: Vec<i32>,
}

impl TraceBuf2 {
    /// Total packet size on the wire.
    pub fn byte_len(&self) -> usize {
        HEADER_SIZE + 4 * self.samples.len()
    }

    pub fn write_to<W>(&self, buf: &mut BufWriter<W>) -> Result<(), TankError>
    where
        W: std::io::Write,
    {
        self.header.write_to(buf)?;
        for &el in &self.samples {
            buf.write_i32::<NativeEndian>(el)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TankError> {
        let mut out = Vec::with_capacity(self.byte_len());
        {
            let mut buf_writer = BufWriter::new(&mut out);
            self.write_to(&mut buf_writer)?;
            buf_writer.flush()?;
        }
        Ok(out)
    }
}

impl fmt::Display for TraceBuf2 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {} bytes", self.header, self.byte_len())
    }
}

/// Packs a code string into a fixed header slot, NUL padded when the code is
/// shorter than the slot. A code may fill the slot completely, the wire
/// format only NUL-terminates codes shorter than their field. Never
/// truncates, a string that does not fit is an error.
pub fn pack_slot<const N: usize>(s: &str) -> Result<[u8; N], TankError> {
    if s.len() > N {
        return Err(TankError::FieldOverflow(s.to_string(), N));
    }
    let mut slot = [0u8; N];
    slot[..s.len()].copy_from_slice(s.as_bytes());
    Ok(slot)
}

fn slot_str(slot: &[u8]) -> &str {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    std::str::from_utf8(&slot[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_header() -> TraceBuf2Header {
        TraceBuf2Header {
            pinno: 0,
            nsamp: 3,
            starttime: 1714000000.0,
            endtime: 1714000000.02,
            samprate: 100.0,
            sta: pack_slot("NACB").unwrap(),
            net: pack_slot("TW").unwrap(),
            chan: pack_slot("HHZ").unwrap(),
            loc: pack_slot("--").unwrap(),
            datatype: DATATYPE_I4,
            variant: HeaderVariant::no_quality(),
        }
    }

    #[test]
    fn header_byte_layout() {
        let head = dummy_header();
        let pkt = TraceBuf2 {
            header: head,
            samples: vec![1, -2, 3],
        };
        let out = pkt.to_bytes().unwrap();
        assert_eq!(out.len(), HEADER_SIZE + 12);
        assert_eq!(i32::from_ne_bytes(out[0..4].try_into().unwrap()), 0);
        assert_eq!(i32::from_ne_bytes(out[4..8].try_into().unwrap()), 3);
        assert_eq!(
            f64::from_ne_bytes(out[8..16].try_into().unwrap()),
            1714000000.0
        );
        assert_eq!(
            f64::from_ne_bytes(out[16..24].try_into().unwrap()),
            1714000000.02
        );
        assert_eq!(f64::from_ne_bytes(out[24..32].try_into().unwrap()), 100.0);
        assert_eq!(&out[32..39], b"NACB\0\0\0");
        assert_eq!(&out[39..48], b"TW\0\0\0\0\0\0\0");
        assert_eq!(&out[48..52], b"HHZ\0");
        assert_eq!(&out[52..55], b"--\0");
        assert_eq!(&out[55..57], b"20");
        assert_eq!(&out[57..60], b"i4\0");
        assert_eq!(&out[60..64], &[0, 0, 0, 0]);
        assert_eq!(i32::from_ne_bytes(out[64..68].try_into().unwrap()), 1);
        assert_eq!(i32::from_ne_bytes(out[68..72].try_into().unwrap()), -2);
        assert_eq!(i32::from_ne_bytes(out[72..76].try_into().unwrap()), 3);
    }

    #[test]
    fn v21_variant_layout() {
        let mut head = dummy_header();
        head.variant = HeaderVariant::V21 {
            conversion_factor: 0.5,
        };
        let pkt = TraceBuf2 {
            header: head,
            samples: vec![],
        };
        let out = pkt.to_bytes().unwrap();
        assert_eq!(out.len(), HEADER_SIZE);
        assert_eq!(&out[55..57], b"21");
        assert_eq!(f32::from_ne_bytes(out[60..64].try_into().unwrap()), 0.5);
    }

    #[test]
    fn pack_slot_bounds() {
        assert_eq!(pack_slot::<4>("EHZ").unwrap(), *b"EHZ\0");
        assert_eq!(pack_slot::<3>("").unwrap(), [0, 0, 0]);
        // a code may fill its slot exactly, with no terminating NUL
        assert_eq!(pack_slot::<4>("EH Z").unwrap(), *b"EH Z");
        assert!(matches!(
            pack_slot::<4>("BHZ00"),
            Err(TankError::FieldOverflow(_, 4))
        ));
    }

    #[test]
    fn slot_accessor_handles_full_width_code() {
        let mut head = dummy_header();
        head.chan = pack_slot("EH Z").unwrap();
        assert_eq!(head.chan(), "EH Z");
    }

    #[test]
    fn slot_accessors_stop_at_nul() {
        let head = dummy_header();
        assert_eq!(head.sta(), "NACB");
        assert_eq!(head.net(), "TW");
        assert_eq!(head.chan(), "HHZ");
        assert_eq!(head.loc(), "--");
    }

    #[test]
    fn max_samples_fills_packet_exactly() {
        assert_eq!(MAX_SAMPLES_PER_PACKET, 1008);
        assert_eq!(HEADER_SIZE + 4 * MAX_SAMPLES_PER_PACKET, MAX_TRACEBUF_SIZE);
    }
}

//! Resolution of the station, channel, network and location codes stamped on
//! every output packet, from the SAC header fields and caller overrides.

use crate::sac::{SacHeader, SAC_UNDEF_STR};
use crate::tank_error::TankError;
use crate::trace_buf::{CHAN_LEN, LOC_LEN, LOC_NULL_STRING, NET_LEN, STA_LEN};

/// Longest SCNL code accepted on the command line.
pub const MAX_SCNL_CODE_LEN: usize = 8;

/// Caller-supplied replacements for the codes in the SAC header.
#[derive(Debug, Clone, Default)]
pub struct ScnlOverrides {
    pub station: Option<String>,
    pub channel: Option<String>,
    pub network: Option<String>,
    pub location: Option<String>,
}

impl ScnlOverrides {
    /// Rejects any override that could never fit an SCNL slot.
    pub fn validate(&self) -> Result<(), TankError> {
        for code in [&self.station, &self.channel, &self.network, &self.location]
            .into_iter()
            .flatten()
        {
            if code.len() > MAX_SCNL_CODE_LEN {
                return Err(TankError::ScnlTooLong(code.clone(), MAX_SCNL_CODE_LEN));
            }
        }
        Ok(())
    }
}

/// The four resolved identifier strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Scnl {
    pub station: String,
    pub channel: String,
    pub network: String,
    pub location: String,
}

impl Scnl {
    /// Resolves the SCNL for a source file. Overrides are used verbatim,
    /// header fields are clipped to their tracebuf slot and right-trimmed.
    pub fn resolve(sac: &SacHeader, overrides: &ScnlOverrides, fix_split_channel: bool) -> Scnl {
        let station = match &overrides.station {
            Some(code) => code.clone(),
            None => from_sac_field(&sac.kstnm, STA_LEN),
        };
        let mut channel = match &overrides.channel {
            Some(code) => code.clone(),
            None => from_sac_field(&sac.kcmpnm, CHAN_LEN),
        };
        // some SEISAN channels look like: EH Z
        //                                 0123
        if fix_split_channel && is_split_channel(&channel) {
            channel = collapse_split_channel(&channel);
        }
        let network = match &overrides.network {
            Some(code) => code.clone(),
            None => from_sac_field(&sac.knetwk, NET_LEN),
        };
        let location = match &overrides.location {
            Some(code) => code.clone(),
            None => resolve_location(&sac.khole),
        };
        Scnl {
            station,
            channel,
            network,
            location,
        }
    }
}

impl std::fmt::Display for Scnl {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.station, self.channel, self.network, self.location
        )
    }
}

/// Clips a raw SAC character field to at most `max_len` bytes and drops
/// trailing whitespace and NUL padding.
fn from_sac_field(field: &[u8], max_len: usize) -> String {
    let clipped = &field[..max_len.min(field.len())];
    trim_code(&String::from_utf8_lossy(clipped))
}

fn trim_code(s: &str) -> String {
    s.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// A four-slot channel code with the orientation character split off by a
/// space, the SEISAN `"EH Z"` form.
fn is_split_channel(chan: &str) -> bool {
    chan.len() == CHAN_LEN && chan.as_bytes()[2] == b' '
}

/// Moves the orientation character of a four-slot `"XX Y"` channel code into
/// the third slot, giving the three-character SEED form.
fn collapse_split_channel(chan: &str) -> String {
    let bytes = chan.as_bytes();
    String::from_utf8_lossy(&[bytes[0], bytes[1], bytes[3]]).to_string()
}

/// A blank, two-space or SAC-undefined location becomes the transport
/// format's null location code. The sentinel check sees the whole field,
/// real codes are then clipped to the location slot like the other fields.
fn resolve_location(khole: &[u8]) -> String {
    let raw = String::from_utf8_lossy(khole);
    let trimmed = trim_code(&raw);
    if trimmed.is_empty() || trimmed == SAC_UNDEF_STR || &*raw == "  " {
        LOC_NULL_STRING.to_string()
    } else {
        from_sac_field(khole, LOC_LEN)
    }
}

//! Convert a SAC waveform file into an Earthworm tankplayer tank.
//!
//! A tank is a plain concatenation of TRACEBUF2 packets, each a 64 byte
//! header followed by up to 1008 32-bit integer samples. The [`Packetizer`]
//! splits the SAC float data into bounded packets, closing a packet early at
//! every gap sample so a packet always covers one contiguous run of data.

mod packetizer;
mod sac;
mod scnl;
mod sink;
mod tank_error;
mod trace_buf;

pub use self::packetizer::{PacketConfig, Packetizer, RunningExtrema, DEFAULT_MAX_SAMPLES};
pub use self::sac::{
    read_sac, read_sac_bytes, SacHeader, K_LEN, MIN_SAMPLE_PERIOD, SAC_HEADER_SIZE,
    SAC_UNDEF_F32, SAC_UNDEF_I32, SAC_UNDEF_STR,
};
pub use self::scnl::{Scnl, ScnlOverrides, MAX_SCNL_CODE_LEN};
pub use self::sink::PacketSink;
pub use self::tank_error::TankError;
pub use self::trace_buf::{
    pack_slot, HeaderVariant, TraceBuf2, TraceBuf2Header, CHAN_LEN, DATATYPE_I4, HEADER_SIZE,
    LOC_LEN, LOC_NULL_STRING, MAX_SAMPLES_PER_PACKET, MAX_TRACEBUF_SIZE, NET_LEN, STA_LEN,
};

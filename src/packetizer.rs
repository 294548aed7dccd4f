//! The packetizer: splits one SAC sample array into bounded-size tracebuf
//! packets, closing packets early at gap samples and keeping sample timing
//! continuous across packet boundaries.

use crate::sac::{SacHeader, MIN_SAMPLE_PERIOD, SAC_UNDEF_F32};
use crate::scnl::{Scnl, ScnlOverrides};
use crate::tank_error::TankError;
use crate::trace_buf::{
    pack_slot, HeaderVariant, TraceBuf2, TraceBuf2Header, DATATYPE_I4, MAX_SAMPLES_PER_PACKET,
};

/// Default packet bound, in samples.
pub const DEFAULT_MAX_SAMPLES: usize = 100;

/// Everything the caller can tune about the conversion.
#[derive(Debug, Clone)]
pub struct PacketConfig {
    /// Most samples allowed in one output packet.
    pub max_samples: usize,
    pub overrides: ScnlOverrides,
    /// Replaces the sample rate derived from the SAC delta.
    pub sample_rate: Option<f64>,
    /// Scale factor applied to every sample before integer truncation.
    pub multiplier: f32,
    /// Sample value meaning "no data here".
    pub gap_value: f32,
    /// Collapse SEISAN `"EH Z"` channel codes to `"EHZ"`.
    pub fix_split_channel: bool,
    /// Append to a named output file instead of truncating it.
    pub append: bool,
}

impl Default for PacketConfig {
    fn default() -> PacketConfig {
        PacketConfig {
            max_samples: DEFAULT_MAX_SAMPLES,
            overrides: ScnlOverrides::default(),
            sample_rate: None,
            multiplier: 1.0,
            gap_value: SAC_UNDEF_F32,
            fix_split_channel: false,
            append: false,
        }
    }
}

impl PacketConfig {
    /// All checks that must fail before any processing begins.
    pub fn validate(&self) -> Result<(), TankError> {
        if self.max_samples < 1 {
            return Err(TankError::MaxSamplesTooSmall(self.max_samples));
        }
        if self.max_samples > MAX_SAMPLES_PER_PACKET {
            return Err(TankError::MaxSamplesTooLarge(
                self.max_samples,
                MAX_SAMPLES_PER_PACKET,
            ));
        }
        if let Some(rate) = self.sample_rate {
            if rate <= 0.0 {
                return Err(TankError::BadSampleRate(rate));
            }
        }
        self.overrides.validate()
    }
}

/// Pre-scale extrema over every non-gap sample, for the end-of-run report.
/// Diagnostic only, packets are not affected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningExtrema {
    pub min: f32,
    pub max: f32,
}

impl RunningExtrema {
    pub fn update(&mut self, v: f32) {
        if v < self.min {
            self.min = v;
        } else if v > self.max {
            self.max = v;
        }
    }

    /// Post-scale extrema, derived by scaling the pre-scale extrema rather
    /// than scanning the scaled samples. An approximation, kept for parity
    /// with the historical report.
    pub fn post_scale(&self, multiplier: f32) -> (i32, i32) {
        ((multiplier * self.min) as i32, (multiplier * self.max) as i32)
    }
}

/// Lazy sequence of tracebuf packets over one source record.
///
/// Each call to [`Iterator::next`] consumes samples up to the packet bound or
/// the next gap sample, whichever comes first. A gap closes the packet in
/// progress but never opens one, so a packet start time is always the time of
/// its first real sample and no empty packets are ever emitted.
#[derive(Debug)]
pub struct Packetizer<'a> {
    samples: &'a [f32],
    position: usize,
    cursor_time: f64,
    period: f64,
    template: TraceBuf2Header,
    max_samples: usize,
    multiplier: f32,
    gap_value: f32,
    extrema: RunningExtrema,
}

impl<'a> Packetizer<'a> {
    /// Validates the configuration and the source record, then builds the
    /// header template shared by every emitted packet.
    pub fn new(
        sac: &SacHeader,
        samples: &'a [f32],
        config: &PacketConfig,
    ) -> Result<Packetizer<'a>, TankError> {
        config.validate()?;
        if sac.delta < MIN_SAMPLE_PERIOD {
            return Err(TankError::SamplePeriodTooSmall(sac.delta));
        }
        let scnl = Scnl::resolve(sac, &config.overrides, config.fix_split_channel);
        // with a rate override the effective period follows the new rate
        let (samprate, period) = match config.sample_rate {
            Some(rate) => (rate, 1.0 / rate),
            None => (1.0 / sac.delta as f64, sac.delta as f64),
        };
        let template = TraceBuf2Header {
            pinno: 0,
            nsamp: 0,
            starttime: 0.0,
            endtime: 0.0,
            samprate,
            sta: pack_slot(&scnl.station)?,
            net: pack_slot(&scnl.network)?,
            chan: pack_slot(&scnl.channel)?,
            loc: pack_slot(&scnl.location)?,
            datatype: DATATYPE_I4,
            variant: HeaderVariant::no_quality(),
        };
        Ok(Packetizer {
            samples,
            position: 0,
            cursor_time: sac.begin_time()?,
            period,
            template,
            max_samples: config.max_samples,
            multiplier: config.multiplier,
            gap_value: config.gap_value,
            extrema: RunningExtrema::default(),
        })
    }

    /// The header stamped on every packet, for logging before the run.
    pub fn template(&self) -> &TraceBuf2Header {
        &self.template
    }

    /// Extrema accumulated so far. Complete once the iterator is exhausted.
    pub fn extrema(&self) -> RunningExtrema {
        self.extrema
    }
}

impl<'a> Iterator for Packetizer<'a> {
    type Item = TraceBuf2;

    fn next(&mut self) -> Option<TraceBuf2> {
        let mut encoded: Vec<i32> = Vec::new();
        let mut chunk_start_time = 0.0;
        while self.position < self.samples.len() {
            let v = self.samples[self.position];
            if v == self.gap_value {
                if !encoded.is_empty() {
                    // gap closes the packet, the gap sample itself stays
                    // unconsumed and is dropped by the next call
                    break;
                }
                self.position += 1;
                self.cursor_time += self.period;
                continue;
            }
            if encoded.is_empty() {
                chunk_start_time = self.cursor_time;
            }
            self.extrema.update(v);
            encoded.push((self.multiplier * v) as i32);
            self.position += 1;
            self.cursor_time += self.period;
            if encoded.len() >= self.max_samples {
                break;
            }
        }
        if encoded.is_empty() {
            return None;
        }
        let mut header = self.template.clone();
        header.nsamp = encoded.len() as i32;
        header.starttime = chunk_start_time;
        // the cursor already advanced past the last consumed sample
        header.endtime = self.cursor_time - self.period;
        Some(TraceBuf2 {
            header,
            samples: encoded,
        })
    }
}

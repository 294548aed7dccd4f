use chrono::{TimeZone, Timelike, Utc};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use sac2tank::{
    read_sac, PacketConfig, PacketSink, Packetizer, ScnlOverrides, TankError,
    DEFAULT_MAX_SAMPLES, SAC_UNDEF_F32,
};

/// Convert a SAC waveform file into an Earthworm tankplayer tank.
///
/// The tank can be replayed with tankplayer to feed a running Earthworm
/// system. Without an output file the packets go to stdout.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Station code to use instead of the one in the SAC file
    #[arg(short = 'S', long = "sta", value_name = "SSSSS")]
    station: Option<String>,

    /// Channel code to use instead of the one in the SAC file
    #[arg(short = 'C', long = "chan", value_name = "CCC")]
    channel: Option<String>,

    /// Network code to use instead of the one in the SAC file
    #[arg(short = 'N', long = "net", value_name = "NN")]
    network: Option<String>,

    /// Location code to use instead of the one in the SAC file
    #[arg(short = 'L', long = "loc", value_name = "LL")]
    location: Option<String>,

    /// Sample rate to use instead of the one in the SAC file
    #[arg(short = 's', long = "samprate")]
    sample_rate: Option<f64>,

    /// Fix a SEISAN problem with channels written in as "EH Z"
    #[arg(short = 'c', long = "chan-fix")]
    chan_fix: bool,

    /// Maximum number of samples per output packet
    #[arg(short = 'n', long = "max-samples", default_value_t = DEFAULT_MAX_SAMPLES)]
    max_samples: usize,

    /// Scale factor applied to the SAC float data
    #[arg(short = 'm', long = "multiplier", default_value_t = 1.0)]
    multiplier: f32,

    /// Gap value in the SAC float data that will be skipped
    #[arg(short = 'g', long = "gap")]
    gap: Option<f32>,

    /// Append to the named output file instead of truncating it
    #[arg(short = 'a', long = "append")]
    append: bool,

    /// Input SAC file
    infile: PathBuf,

    /// Output tank file, stdout when omitted
    outfile: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), TankError> {
    let config = PacketConfig {
        max_samples: args.max_samples,
        overrides: ScnlOverrides {
            station: args.station,
            channel: args.channel,
            network: args.network,
            location: args.location,
        },
        sample_rate: args.sample_rate,
        multiplier: args.multiplier,
        gap_value: args.gap.unwrap_or(SAC_UNDEF_F32),
        fix_split_channel: args.chan_fix,
        append: args.append,
    };
    // a bad configuration aborts before the input file is even opened
    config.validate()?;

    let (sac, samples) = read_sac(&args.infile)?;
    let reference_time = sac.reference_time()?;
    info!(
        "input SAC file ref. time is {:.3}, end at {:.3}, total {} samples with {:.3} delta",
        reference_time,
        reference_time + sac.e as f64,
        sac.npts,
        sac.delta
    );

    let mut packetizer = Packetizer::new(&sac, &samples, &config)?;
    let template = packetizer.template();
    info!("tracebuf start time {}", timestamp_gen(sac.begin_time()?));
    info!(
        "tracebuf SCNL       {}.{}.{}.{}",
        template.sta(),
        template.chan(),
        template.net(),
        template.loc()
    );

    let mut sink = PacketSink::open(args.outfile.as_deref(), config.append)?;
    let mut written = 0usize;
    for packet in &mut packetizer {
        if let Err(e) = sink.write_packet(&packet) {
            sink.discard();
            return Err(e);
        }
        written += 1;
    }
    sink.finish()?;

    let extrema = packetizer.extrema();
    let (post_min, post_max) = extrema.post_scale(config.multiplier);
    info!("wrote {written} tracebuf packets");
    info!(
        "SAC      min:max    {}:{}, multiplier {}",
        extrema.min, extrema.max, config.multiplier
    );
    info!("tracebuf min:max    {post_min}:{post_max}");
    Ok(())
}

/// Formats an epoch-seconds timestamp as `YYYY/MM/DD_HH:MM:SS.ss` UTC.
fn timestamp_gen(timestamp: f64) -> String {
    let whole = timestamp.floor();
    let frac = timestamp - whole;
    match Utc.timestamp_opt(whole as i64, 0).single() {
        Some(dt) => format!(
            "{}{:05.2}",
            dt.format("%Y/%m/%d_%H:%M:"),
            dt.second() as f64 + frac
        ),
        None => format!("{timestamp:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_format() {
        // 2021-01-01 00:00:05.25 UTC
        assert_eq!(timestamp_gen(1609459205.25), "2021/01/01_00:00:05.25");
        assert_eq!(timestamp_gen(0.0), "1970/01/01_00:00:00.00");
    }

    #[test]
    fn args_parse_defaults() {
        let args = Args::parse_from(["sac2tank", "in.sac"]);
        assert_eq!(args.max_samples, 100);
        assert_eq!(args.multiplier, 1.0);
        assert!(args.gap.is_none());
        assert!(!args.append);
        assert!(args.outfile.is_none());
    }

    #[test]
    fn bad_config_rejected_before_input_is_read() {
        // the infile does not exist, so an IO error would mean the
        // configuration check ran too late
        let args = Args::parse_from(["sac2tank", "-n", "0", "no-such-file.sac"]);
        assert!(matches!(run(args), Err(TankError::MaxSamplesTooSmall(0))));
    }

    #[test]
    fn args_parse_full() {
        let args = Args::parse_from([
            "sac2tank", "-c", "-m", "2.5", "-s", "40", "-N", "TW", "-C", "HLZ", "-S", "NACB",
            "-L", "10", "-n", "200", "-g", "0", "-a", "in.sac", "out.tnk",
        ]);
        assert!(args.chan_fix);
        assert_eq!(args.multiplier, 2.5);
        assert_eq!(args.sample_rate, Some(40.0));
        assert_eq!(args.network.as_deref(), Some("TW"));
        assert_eq!(args.channel.as_deref(), Some("HLZ"));
        assert_eq!(args.station.as_deref(), Some("NACB"));
        assert_eq!(args.location.as_deref(), Some("10"));
        assert_eq!(args.max_samples, 200);
        assert_eq!(args.gap, Some(0.0));
        assert!(args.append);
        assert_eq!(args.outfile.as_deref().unwrap().to_str(), Some("out.tnk"));
    }
}

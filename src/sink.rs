//! Output destination for the packet stream: a named tank file opened in
//! truncate or append mode, or stdout. Opened once before the run and
//! closed exactly once on every exit path.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::tank_error::TankError;
use crate::trace_buf::TraceBuf2;

pub enum PacketSink {
    File {
        path: PathBuf,
        writer: BufWriter<File>,
    },
    Stdout(BufWriter<io::Stdout>),
}

impl PacketSink {
    /// Opens the sink. `None` writes packets to stdout.
    pub fn open(path: Option<&Path>, append: bool) -> Result<PacketSink, TankError> {
        match path {
            Some(path) => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(append)
                    .truncate(!append)
                    .open(path)?;
                Ok(PacketSink::File {
                    path: path.to_path_buf(),
                    writer: BufWriter::new(file),
                })
            }
            None => Ok(PacketSink::Stdout(BufWriter::new(io::stdout()))),
        }
    }

    pub fn write_packet(&mut self, packet: &TraceBuf2) -> Result<(), TankError> {
        match self {
            PacketSink::File { writer, .. } => packet.write_to(writer),
            PacketSink::Stdout(writer) => packet.write_to(writer),
        }
    }

    /// Flushes and closes the sink. A named file that fails to flush is a
    /// partial output and gets removed like any other write failure.
    pub fn finish(self) -> Result<(), TankError> {
        match self {
            PacketSink::File { path, mut writer } => {
                if let Err(e) = writer.flush() {
                    drop(writer);
                    remove_partial(&path);
                    return Err(e.into());
                }
            }
            PacketSink::Stdout(mut writer) => writer.flush()?,
        }
        Ok(())
    }

    /// Drops the sink after a write failure. A partially written named file
    /// is removed, a stream cannot be cleaned up and is left as-is.
    pub fn discard(self) {
        if let PacketSink::File { path, writer } = self {
            drop(writer);
            remove_partial(&path);
        }
    }
}

/// Removes a partial output file. Only regular files are removed, a device
/// node such as `/dev/full` is not partial output.
fn remove_partial(path: &Path) {
    if path.metadata().map(|m| m.is_file()).unwrap_or(false) {
        let _ = std::fs::remove_file(path);
    }
}

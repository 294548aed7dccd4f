use thiserror::Error;

#[derive(Error, Debug)]
pub enum TankError {
    #[error("IO Error")]
    IOError(#[from] std::io::Error),
    #[error("max samples per packet must be at least 1, got {0}")]
    MaxSamplesTooSmall(usize),
    #[error("max samples per packet must be at most {1}, got {0}")]
    MaxSamplesTooLarge(usize, usize),
    #[error("SCNL code `{0}` is longer than {1} characters")]
    ScnlTooLong(String, usize),
    #[error("identifier `{0}` does not fit in a {1} byte header field")]
    FieldOverflow(String, usize),
    #[error("sample rate must be positive, got {0}")]
    BadSampleRate(f64),
    #[error("SAC file too short, {0} < header size {1}")]
    ShortFile(usize, usize),
    #[error("SAC header version must be 6 or 7 but was `{0}`")]
    BadHeaderVersion(i32),
    #[error("SAC header npts is invalid: `{0}`")]
    BadSampleCount(i32),
    #[error("SAC data section holds {0} samples but header claims {1}")]
    ShortData(usize, i32),
    #[error("SAC reference time fields are undefined or out of range")]
    UndefinedReferenceTime,
    #[error("SAC sample period too small: {0}")]
    SamplePeriodTooSmall(f32),
}

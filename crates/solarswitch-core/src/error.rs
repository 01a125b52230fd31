#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bounds: max {max} is below min {min}")]
    InvalidBounds { max: f64, min: f64 },

    #[error("bounds out of range: [{min}, {max}] must lie within [0, {limit}]")]
    BoundsOutOfRange { max: f64, min: f64, limit: f64 },

    #[error("interval of {0} minutes is outside 1..=60")]
    IntervalOutOfRange(u32),

    #[error("invalid value for {0}")]
    InvalidValue(&'static str),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("stored value for {key} is corrupt")]
    Corrupt { key: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HardwareError {
    #[error("failed to drive pin: {0}")]
    Pin(String),

    #[error("ADC read failed: {0}")]
    Adc(String),
}

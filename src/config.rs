use std::num::NonZeroUsize;

use smol_str::SmolStr;
use tracing::level_filters::LevelFilter;

use crate::error::{FlistError, Result};
use crate::flags::{FlagSpec, PCM_TRANS_OPEN_READWRITE};

/// Configuration for [`Client::with_config`](crate::client::Client::with_config).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of each field catalog cache (by name and by number).
    ///
    /// Default: 10 000 descriptors.
    pub catalog_cache_capacity: NonZeroUsize,
    /// Database number used for POIDs until the engine reports one.
    pub default_database: u64,
    /// Root element for XML output.
    pub xml_root: SmolStr,
    pub log_level: PinLogLevel,
    /// Flags used by [`Client::transaction`](crate::client::Client::transaction)
    /// when none are given.
    pub transaction_flags: FlagSpec,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            catalog_cache_capacity: NonZeroUsize::new(10_000).unwrap_or(NonZeroUsize::MIN),
            default_database: 1,
            xml_root: SmolStr::new_static("flist"),
            log_level: PinLogLevel::Error,
            transaction_flags: FlagSpec::Value(PCM_TRANS_OPEN_READWRITE),
        }
    }
}

// ─── Log levels ─────────────────────────────────────────────────────────────

/// The engine's own four-step log scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PinLogLevel {
    None = 0,
    Error = 1,
    Warning = 2,
    Debug = 3,
}

impl PinLogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            PinLogLevel::None => LevelFilter::OFF,
            PinLogLevel::Error => LevelFilter::ERROR,
            PinLogLevel::Warning => LevelFilter::WARN,
            PinLogLevel::Debug => LevelFilter::DEBUG,
        }
    }

    /// INFO folds into Warning and TRACE into Debug.
    pub fn from_level_filter(filter: LevelFilter) -> Self {
        if filter == LevelFilter::OFF {
            PinLogLevel::None
        } else if filter == LevelFilter::ERROR {
            PinLogLevel::Error
        } else if filter <= LevelFilter::INFO {
            PinLogLevel::Warning
        } else {
            PinLogLevel::Debug
        }
    }
}

impl TryFrom<i32> for PinLogLevel {
    type Error = FlistError;

    fn try_from(level: i32) -> Result<Self> {
        match level {
            0 => Ok(PinLogLevel::None),
            1 => Ok(PinLogLevel::Error),
            2 => Ok(PinLogLevel::Warning),
            3 => Ok(PinLogLevel::Debug),
            other => Err(FlistError::InvalidValue(format!(
                "{other} is not a log level, expected 0-3"
            ))),
        }
    }
}

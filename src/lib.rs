use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod clock;
pub mod context;
pub mod error;
pub mod harness;
pub mod hooks;
pub mod payload;
pub mod scenario;
pub mod schema;
pub mod store;
pub mod suite;

pub use error::{BenchError, Result};

/// Database the suite runs against; dropped before and after every run.
pub const DB_NAME: &str = "benchmark";

/// Collection every scenario writes to and reads from.
pub const COLLECTION_NAME: &str = "exp_series";

/// Which document code path the store uses.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Documents are kept as structured values (the accelerated path).
    #[value(alias = "c")]
    Native,
    /// Documents are serialized on insert and parsed on every read.
    #[default]
    #[value(alias = "ruby")]
    Interpreted,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Native => "native",
            Mode::Interpreted => "interpreted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_accepts_legacy_names() {
        assert_eq!(Mode::from_str("c", true), Ok(Mode::Native));
        assert_eq!(Mode::from_str("ruby", true), Ok(Mode::Interpreted));
        assert_eq!(Mode::from_str("native", true), Ok(Mode::Native));
        assert!(Mode::from_str("bogus", true).is_err());
    }
}

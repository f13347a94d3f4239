mod engine;

pub use engine::{CryptoEngine, STATE_MAX_AGE_SECS};

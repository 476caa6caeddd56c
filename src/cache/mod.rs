//! Кэш синтезированных чанков, адресуемый по содержимому

pub mod fingerprint;
pub mod store;

pub use fingerprint::{config_digest, fingerprint, Fingerprint};
pub use store::{CacheEntry, ChunkCache};

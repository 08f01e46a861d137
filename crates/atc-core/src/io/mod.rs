//! File I/O primitives for team state
//!
//! - **Locking**: team-scoped exclusive advisory lock with a bounded wait
//! - **Atomic writes**: temp file + fsync + rename, so readers never see a partial document
//! - **Fingerprints**: BLAKE3 hashes of captured worker output

pub mod atomic;
pub mod error;
pub mod hash;
pub mod lock;

pub use atomic::{read_json, read_json_or_default, write_json_atomic};
pub use error::StoreError;
pub use hash::fingerprint;
pub use lock::{DEFAULT_LOCK_TIMEOUT, FileLock, acquire_lock};

//! `logdb-storage`: durable promise/accept records on local disk.
//!
//! Each slot path maps to one file: a fixed 32-byte ASCII header
//! (`"{promised}\n{accepted}\n"`) followed by the raw accepted value.
//! Full rewrites go through a uniquely named temp file and an atomic rename;
//! header-only updates overwrite the first 32 bytes in place.

mod errors;
pub use errors::{Result, StorageError};

mod record;
pub use record::{decode_header, encode_header, Record, HEADER_LEN};

mod store;
pub use store::{PathGuard, RecordStore};

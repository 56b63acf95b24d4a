//! Remote media sources
//!
//! The core abstraction is the [`MediaSource`] trait: a camera storage that can
//! be enabled, listed, and downloaded from. Implementations provided:
//!
//! - [`DirectoryMediaSource`]: camera storage mounted as a directory
//! - [`NoOpMediaSource`]: stub that is never available
//!
//! Vendor SDK or PTP/MTP integrations implement the trait in the host.

mod directory;
mod noop;
mod traits;

pub use directory::DirectoryMediaSource;
pub use noop::NoOpMediaSource;
pub use traits::{MediaSource, TransferEvent, TransferStream};

//! Workspace entry crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates so a
//! host application can depend on `radio-core-workspace` alone and get the
//! composed playback engine (`core-service`) with desktop bridges wired in.

#[cfg(feature = "desktop-shims")]
pub use core_playback as playback;
#[cfg(feature = "desktop-shims")]
pub use core_service::*;

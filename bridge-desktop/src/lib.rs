//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `NetworkMonitor` using a periodic TCP reachability probe
//! - `LifecycleObserver` as a constant (desktop apps are always active)
//!
//! Desktop hosts still supply their own audio primitive
//! (`NativePlayer` or `AudioElementFactory`); there is no default output here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let network = Arc::new(DesktopNetworkMonitor::new());
//! ```

mod http;
mod lifecycle;
mod network;

pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopLifecycleObserver;
pub use network::{DesktopNetworkMonitor, ProbeSettings};

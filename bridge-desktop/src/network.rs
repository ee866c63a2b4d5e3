//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tracing::debug;

/// Reachability probe parameters.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// `host:port` opened with a plain TCP connect
    pub address: String,
    pub timeout: Duration,
    /// Delay between probes for change subscriptions
    pub poll_interval: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            address: "1.1.1.1:53".to_string(),
            timeout: Duration::from_secs(3),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Desktop network monitor implementation
///
/// Desktop platforms have no uniform connectivity callback, so reachability
/// is probed with a TCP connect and changes are detected by polling.
#[derive(Debug, Clone, Default)]
pub struct DesktopNetworkMonitor {
    settings: ProbeSettings,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.settings.timeout,
            tokio::net::TcpStream::connect(self.settings.address.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;
        debug!(status = ?status, probe = %self.settings.address, "Network probe finished");

        Ok(match status {
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Other),
            _ => NetworkInfo::disconnected(),
        })
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            tokio::time::sleep(self.monitor.settings.poll_interval).await;

            if let Ok(info) = self.monitor.get_network_info().await {
                if self.last_status != Some(info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}

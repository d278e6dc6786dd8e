//! Host identity detection.

use std::net::UdpSocket;
use tracing::debug;

pub const UNKNOWN_HOST: &str = "unknown-host";
pub const UNKNOWN_IP: &str = "unknown-ip";

/// Host identity attached to every log item of a sink.
///
/// Detected once at sink construction; `None` fields are omitted from
/// the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub hostname: Option<String>,
    pub host_ip: Option<String>,
}

impl HostInfo {
    pub fn detect(detect_hostname: bool, detect_ip: bool) -> Self {
        HostInfo {
            hostname: detect_hostname.then(detect_hostname_or_unknown),
            host_ip: detect_ip.then(|| detect_host_ip().unwrap_or_else(|| UNKNOWN_IP.to_string())),
        }
    }
}

fn detect_hostname_or_unknown() -> String {
    detect_hostname().unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

/// Resolve the hostname from `HOSTNAME`, then the OS.
pub fn detect_hostname() -> Option<String> {
    if let Some(hostname) = crate::env::env_opt("HOSTNAME") {
        return Some(hostname);
    }
    os_hostname()
}

#[cfg(unix)]
fn os_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name.into_string().ok().filter(|s| !s.is_empty()),
        Err(e) => {
            debug!(error = %e, "failed to read system hostname");
            None
        }
    }
}

#[cfg(not(unix))]
fn os_hostname() -> Option<String> {
    crate::env::env_opt("COMPUTERNAME")
}

/// Local address the OS would route outbound traffic from.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn detect_host_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    if let Err(e) = socket.connect("8.8.8.8:80") {
        debug!(error = %e, "no route for host ip detection");
        return None;
    }
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn disabled_detection_yields_nothing() {
        assert_eq!(HostInfo::detect(false, false), HostInfo::default());
    }

    #[test]
    #[serial]
    fn hostname_env_override_wins() {
        let previous = std::env::var("HOSTNAME").ok();
        std::env::set_var("HOSTNAME", "test-hostname");
        let info = HostInfo::detect(true, false);
        assert_eq!(info.hostname.as_deref(), Some("test-hostname"));
        assert_eq!(info.host_ip, None);
        match previous {
            Some(v) => std::env::set_var("HOSTNAME", v),
            None => std::env::remove_var("HOSTNAME"),
        }
    }

    #[test]
    fn host_ip_is_always_filled_when_enabled() {
        let info = HostInfo::detect(false, true);
        let ip = info.host_ip.unwrap();
        assert!(!ip.is_empty());
    }
}

//! Reachability probe primitive.
//!
//! A probe answers one question: does `host` respond on the network layer
//! through a given local interface, within a hop limit and a timeout?
//!
//! The default [`EchoProbe`] opens a TCP connection to the echo port with the
//! socket bound to the interface (`SO_BINDTODEVICE` on Linux). A finished
//! handshake or a refused connection both prove the host is up, so both count
//! as reachable. Raw ICMP would need elevated privileges, this does not.

use anyhow::{Context, Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpSocket;

/// Parameters shared by every probe of one resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Local interface the probe goes out on
    pub interface: String,
    /// Hop limit, 0 keeps the OS default
    pub ttl: u32,
    /// Upper bound for one probe, name resolution included
    pub timeout: Duration,
    /// Remote port to connect to
    pub port: u16,
}

/// Reachability probe.
///
/// `Ok(false)` means the host did not answer in time. `Err` means the probe
/// itself could not run (missing interface, unresolvable host, socket error).
/// Callers treat both as unreachable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, host: &str, settings: &ProbeSettings) -> Result<bool>;
}

/// TCP echo-port probe
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoProbe;

#[async_trait]
impl Probe for EchoProbe {
    async fn probe(&self, host: &str, settings: &ProbeSettings) -> Result<bool> {
        ensure_interface_up(&settings.interface).await?;

        match tokio::time::timeout(settings.timeout, connect(host, settings)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::trace!(host = %host, timeout = ?settings.timeout, "Probe timed out");
                Ok(false)
            }
        }
    }
}

async fn connect(host: &str, settings: &ProbeSettings) -> Result<bool> {
    let addr = tokio::net::lookup_host((host, settings.port))
        .await
        .with_context(|| format!("Failed to resolve host {host}"))?
        .next()
        .with_context(|| format!("No address found for host {host}"))?;

    let socket = open_socket(addr, settings)?;

    match socket.connect(addr).await {
        Ok(_stream) => Ok(true),
        // RST from the peer: something answered
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => Ok(true),
        Err(e) if matches!(e.kind(), ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable) => {
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to connect to {addr}")),
    }
}

/// Create a non-blocking TCP socket bound to the probe interface
fn open_socket(addr: SocketAddr, settings: &ProbeSettings) -> Result<TcpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("Failed to create probe socket")?;
    socket
        .set_nonblocking(true)
        .context("Failed to set probe socket non-blocking")?;

    #[cfg(target_os = "linux")]
    socket
        .bind_device(Some(settings.interface.as_bytes()))
        .with_context(|| format!("Failed to bind probe socket to {}", settings.interface))?;

    if settings.ttl > 0 {
        let hops = match addr {
            SocketAddr::V4(_) => socket.set_ttl(settings.ttl),
            SocketAddr::V6(_) => socket.set_unicast_hops_v6(settings.ttl),
        };
        hops.context("Failed to set probe hop limit")?;
    }

    Ok(TcpSocket::from_std_stream(socket.into()))
}

/// Fail unless the interface exists, is administratively up and has link
#[cfg(target_os = "linux")]
async fn ensure_interface_up(name: &str) -> Result<()> {
    use segwatch_common::constants::SYSFS_NET_PATH;

    let dir = std::path::Path::new(SYSFS_NET_PATH).join(name);
    let flags = tokio::fs::read_to_string(dir.join("flags"))
        .await
        .with_context(|| format!("Network interface {name} not found"))?;
    let operstate = tokio::fs::read_to_string(dir.join("operstate"))
        .await
        .with_context(|| format!("Failed to read operstate of network interface {name}"))?;

    check_interface_state(name, &flags, &operstate)
}

#[cfg(not(target_os = "linux"))]
async fn ensure_interface_up(name: &str) -> Result<()> {
    tracing::trace!(interface = %name, "Interface checks are only performed on Linux");
    Ok(())
}

/// Judge the sysfs `flags` and `operstate` contents of an interface.
///
/// Loopback and some virtual devices never report carrier and sit in
/// `unknown`, which is accepted.
#[cfg(any(target_os = "linux", test))]
fn check_interface_state(name: &str, flags: &str, operstate: &str) -> Result<()> {
    use segwatch_common::constants::IFF_UP;

    let flags = u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16)
        .with_context(|| format!("Malformed flags for network interface {name}"))?;
    anyhow::ensure!(flags & IFF_UP != 0, "Network interface {name} is down");

    match operstate.trim() {
        "up" | "unknown" => Ok(()),
        state => anyhow::bail!("Network interface {name} has no link (operstate {state})"),
    }
}

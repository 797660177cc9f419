//! Free host port discovery.

use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;
use vm_core::error::{Result, VmError};

/// Answers "could a listener bind this host port right now".
pub trait PortProbe: Send + Sync {
    fn is_available(&self, port: u16) -> bool;

    /// One free port from the OS ephemeral range.
    fn ephemeral(&self) -> std::io::Result<u16> {
        ephemeral_port()
    }
}

/// Probes by briefly binding a TCP listener on `0.0.0.0`, the address
/// Docker publishes container ports on.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

impl PortProbe for TcpProbe {
    fn is_available(&self, port: u16) -> bool {
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
    }
}

/// Lowest port `>= start` that the probe reports free and `is_reserved` does
/// not claim.
///
/// At most `limit` candidates are tried, and the scan never wraps past 65535.
pub fn scan_free_port<R>(start: u16, limit: u32, probe: &dyn PortProbe, is_reserved: R) -> Result<u16>
where
    R: Fn(u16) -> bool,
{
    let mut tried: u32 = 0;
    for candidate in start..=u16::MAX {
        if tried >= limit {
            break;
        }
        tried += 1;

        if is_reserved(candidate) {
            debug!("Port {} is reserved, skipping", candidate);
            continue;
        }
        if probe.is_available(candidate) {
            return Ok(candidate);
        }
        debug!("Port {} is in use, skipping", candidate);
    }

    Err(VmError::ResourceExhausted(format!(
        "no free host port found after trying {} candidates starting at {}",
        tried, start
    )))
}

/// Ask the OS for a free port from its ephemeral range.
///
/// The listener is dropped before returning, so the port is only known to be
/// free at the moment of the call.
pub fn ephemeral_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Occupied(HashSet<u16>);

    impl PortProbe for Occupied {
        fn is_available(&self, port: u16) -> bool {
            !self.0.contains(&port)
        }
    }

    #[test]
    fn test_returns_candidate_when_free() {
        let probe = Occupied(HashSet::new());
        assert_eq!(scan_free_port(8006, 10, &probe, |_| false).unwrap(), 8006);
    }

    #[test]
    fn test_skips_occupied_ports() {
        let probe = Occupied([8006, 8007, 8008].into_iter().collect());
        assert_eq!(scan_free_port(8006, 10, &probe, |_| false).unwrap(), 8009);
    }

    #[test]
    fn test_skips_reserved_ports() {
        let probe = Occupied([8006].into_iter().collect());
        let port = scan_free_port(8006, 10, &probe, |p| p == 8007).unwrap();
        assert_eq!(port, 8008);
    }

    #[test]
    fn test_gives_up_after_limit() {
        let probe = Occupied((8006..8016).collect());
        let err = scan_free_port(8006, 10, &probe, |_| false).unwrap_err();
        assert!(matches!(err, VmError::ResourceExhausted(_)));
    }

    #[test]
    fn test_stops_at_end_of_range() {
        let probe = Occupied([65534, 65535].into_iter().collect());
        let err = scan_free_port(65534, 1000, &probe, |_| false).unwrap_err();
        assert!(err.to_string().contains("2 candidates"));
    }

    #[test]
    fn test_ephemeral_port_is_bindable() {
        let port = ephemeral_port().expect("OS hands out a port");
        assert_ne!(port, 0);
        assert!(TcpProbe.is_available(port));
    }
}

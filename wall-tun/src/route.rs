//! Route management for TUN devices
//!
//! Adding, removing, and querying routes via the `net-route` crate. The
//! client's route-all-traffic mode never touches the real default route:
//! it covers 0.0.0.0/0 with the two half-space routes 0.0.0.0/1 and
//! 128.0.0.0/1 through the tunnel interface, which are more specific than
//! any default and disappear cleanly on teardown.

#[cfg(unix)]
use std::ffi::CString;
use std::net::{IpAddr, Ipv4Addr};

use ipnet::{IpNet, Ipv4Net};

use crate::error::{Error, Result};

/// Convert an interface name to its index
#[cfg(unix)]
fn get_interface_index(name: &str) -> Result<u32> {
    let c_name =
        CString::new(name).map_err(|_| Error::Config("invalid interface name".into()))?;

    // SAFETY: if_nametoindex is safe to call with a valid C string
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };

    if index == 0 {
        return Err(Error::Route(format!(
            "interface '{}' not found (os error {})",
            name,
            std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
        )));
    }

    Ok(index)
}

#[cfg(windows)]
fn get_interface_index(name: &str) -> Result<u32> {
    Err(Error::Config(format!(
        "interface routing by name not supported on Windows: {}",
        name
    )))
}

/// A network route entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Destination network
    pub destination: IpNet,
    /// Gateway address (None for direct/interface routes)
    pub gateway: Option<IpAddr>,
    /// Interface name
    pub interface: Option<String>,
}

impl Route {
    /// Create a new route to a destination network via a gateway
    pub fn new(destination: IpNet, gateway: IpAddr) -> Self {
        Self {
            destination,
            gateway: Some(gateway),
            interface: None,
        }
    }

    /// Create a new IPv4 route
    pub fn ipv4(dest_addr: Ipv4Addr, prefix_len: u8, gateway: Option<Ipv4Addr>) -> Result<Self> {
        let destination =
            Ipv4Net::new(dest_addr, prefix_len).map_err(|e| Error::InvalidPrefix(e.to_string()))?;

        Ok(Self {
            destination: IpNet::V4(destination),
            gateway: gateway.map(IpAddr::V4),
            interface: None,
        })
    }

    /// Create a host route (/32) via a gateway
    pub fn host_via(host: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            destination: IpNet::V4(Ipv4Net::new(host, 32).expect("/32 is always valid")),
            gateway: Some(IpAddr::V4(gateway)),
            interface: None,
        }
    }

    /// Create an interface route (no gateway, traffic goes directly to interface)
    pub fn interface_route(destination: IpNet, interface: impl Into<String>) -> Self {
        Self {
            destination,
            gateway: None,
            interface: Some(interface.into()),
        }
    }

    /// The two half-space routes that together cover 0.0.0.0/0 through an
    /// interface without displacing the system default route
    pub fn split_default(interface: &str) -> [Self; 2] {
        let low = Ipv4Net::new(Ipv4Addr::UNSPECIFIED, 1).expect("/1 is always valid");
        let high = Ipv4Net::new(Ipv4Addr::new(128, 0, 0, 0), 1).expect("/1 is always valid");
        [
            Self::interface_route(IpNet::V4(low), interface),
            Self::interface_route(IpNet::V4(high), interface),
        ]
    }

    /// Check if this is a default route
    pub fn is_default(&self) -> bool {
        self.destination.prefix_len() == 0
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.destination)?;
        if let Some(ref gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        if let Some(ref iface) = self.interface {
            write!(f, " dev {}", iface)?;
        }
        Ok(())
    }
}

/// Route manager for adding/removing routes
///
/// Uses the `net-route` crate for cross-platform route manipulation.
/// Requires root or `CAP_NET_ADMIN`.
pub struct RouteManager {
    handle: net_route::Handle,
}

impl RouteManager {
    /// Create a new route manager
    pub fn new() -> Result<Self> {
        let handle = net_route::Handle::new()
            .map_err(|e| Error::Route(format!("failed to create route handle: {}", e)))?;

        Ok(Self { handle })
    }

    /// Add a route to the routing table
    pub async fn add(&self, route: &Route) -> Result<()> {
        let mut net_route =
            net_route::Route::new(route.destination.addr(), route.destination.prefix_len());

        if let Some(gw) = route.gateway {
            net_route = net_route.with_gateway(gw);
        }

        if let Some(ref iface) = route.interface {
            let ifindex = get_interface_index(iface)?;
            net_route = net_route.with_ifindex(ifindex);
        }

        match self.handle.add(&net_route).await {
            Ok(()) => {
                log::info!("Added route: {}", route);
            }
            Err(e) => {
                let err_str = e.to_string();
                // EEXIST: the route is already in place, which is fine
                if err_str.contains("File exists") || err_str.contains("os error 17") {
                    log::debug!("Route already exists: {}", route);
                } else {
                    return Err(Error::Route(format!("failed to add route: {}", e)));
                }
            }
        }

        Ok(())
    }

    /// Remove a route from the routing table
    pub async fn delete(&self, route: &Route) -> Result<()> {
        let mut net_route =
            net_route::Route::new(route.destination.addr(), route.destination.prefix_len());

        if let Some(gw) = route.gateway {
            net_route = net_route.with_gateway(gw);
        }

        if let Some(ref iface) = route.interface {
            // The interface may already be gone during teardown
            if let Ok(ifindex) = get_interface_index(iface) {
                net_route = net_route.with_ifindex(ifindex);
            }
        }

        self.handle
            .delete(&net_route)
            .await
            .map_err(|e| Error::Route(format!("failed to delete route: {}", e)))?;

        log::info!("Deleted route: {}", route);
        Ok(())
    }

    /// Find the system's current default IPv4 gateway.
    ///
    /// The client needs this to pin the server's address onto the
    /// physical uplink before the tunnel starts swallowing all traffic.
    pub async fn get_default_gateway(&self) -> Result<Ipv4Addr> {
        let route = self
            .handle
            .default_route()
            .await
            .map_err(|e| Error::Route(format!("failed to query default route: {}", e)))?
            .ok_or_else(|| Error::Route("no default route configured".into()))?;

        match route.gateway {
            Some(IpAddr::V4(gw)) => Ok(gw),
            Some(IpAddr::V6(gw)) => Err(Error::Route(format!(
                "default gateway {} is IPv6, only IPv4 uplinks are supported",
                gw
            ))),
            None => Err(Error::Route("default route has no gateway".into())),
        }
    }
}

/// Tracks applied routes for cleanup on shutdown
pub struct AppliedRoutes {
    routes: Vec<Route>,
}

impl AppliedRoutes {
    /// Start an empty set
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add a route and record it for later removal
    pub async fn add(&mut self, manager: &RouteManager, route: Route) -> Result<()> {
        manager.add(&route).await?;
        self.routes.push(route);
        Ok(())
    }

    /// Get the applied routes
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Remove all applied routes, most recent first
    pub async fn cleanup(self, manager: &RouteManager) -> Result<()> {
        for route in self.routes.iter().rev() {
            if let Err(e) = manager.delete(route).await {
                log::warn!("Failed to remove route {}: {}", route, e);
            }
        }
        Ok(())
    }
}

impl Default for AppliedRoutes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_creation() {
        let route = Route::ipv4(
            Ipv4Addr::new(10, 8, 0, 0),
            24,
            Some(Ipv4Addr::new(192, 168, 1, 1)),
        )
        .unwrap();

        assert!(!route.is_default());
        assert_eq!(
            route.gateway,
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)))
        );
    }

    #[test]
    fn test_host_route() {
        let route = Route::host_via(Ipv4Addr::new(203, 0, 113, 1), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(route.destination.prefix_len(), 32);
        assert_eq!(route.destination.addr(), "203.0.113.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_split_default_covers_everything() {
        let [low, high] = Route::split_default("cw0");

        assert_eq!(low.destination.to_string(), "0.0.0.0/1");
        assert_eq!(high.destination.to_string(), "128.0.0.0/1");
        assert_eq!(low.interface.as_deref(), Some("cw0"));
        assert_eq!(high.interface.as_deref(), Some("cw0"));
        assert!(low.gateway.is_none());

        // More specific than a default route, but neither is itself default
        assert!(!low.is_default());
        assert!(!high.is_default());
    }

    #[test]
    fn test_route_display() {
        let route = Route::ipv4(
            Ipv4Addr::new(10, 8, 0, 0),
            24,
            Some(Ipv4Addr::new(192, 168, 1, 1)),
        )
        .unwrap();

        let display = format!("{}", route);
        assert!(display.contains("10.8.0.0/24"));
        assert!(display.contains("via 192.168.1.1"));
    }
}

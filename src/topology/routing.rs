// Routing tables

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::topology::ip_address::IpAddress;

/// destination/mask -> gateway, leaving on `interface`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub destination: IpAddress,
    pub mask: IpAddress,
    pub gateway: IpAddress,
    /// Name of the outgoing interface on the owning host
    pub interface: String,
}

impl Route {
    pub fn new(destination: IpAddress, mask: IpAddress, gateway: IpAddress, interface: &str) -> Self {
        Self { destination, mask, gateway, interface: interface.to_string() }
    }

    pub fn is_default(&self) -> bool {
        self.destination == IpAddress::ANY && self.mask == IpAddress::ANY
    }

    pub fn matches(&self, address: IpAddress) -> bool {
        IpAddress::network_in_other_network(address, IpAddress::HOST_MASK, self.destination, self.mask)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "destination : {}/{} -> gateway : {} on interface {}",
            self.destination,
            self.mask.mask_prefix_length(),
            self.gateway,
            self.interface
        )
    }
}

/// Ordered routes of a host, the default route always last
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn has_default_route(&self) -> bool {
        self.routes.last().map(Route::is_default).unwrap_or(false)
    }

    /// Insert a route. A new default route replaces the existing one; any
    /// other route goes just before the default route.
    pub fn add_route(&mut self, route: Route) -> &Route {
        let position = if route.is_default() {
            if self.has_default_route() {
                self.routes.pop();
            }
            self.routes.len()
        } else if self.has_default_route() {
            self.routes.len() - 1
        } else {
            self.routes.len()
        };
        self.routes.insert(position, route);
        &self.routes[position]
    }

    /// Gateway for `address`: the route with the longest matching prefix, the
    /// earlier route on ties. `None` when nothing matches.
    pub fn next_hop(&self, address: IpAddress) -> Option<IpAddress> {
        let mut best: Option<&Route> = None;
        for route in self.routes.iter().filter(|route| route.matches(address)) {
            match best {
                Some(current) if current.mask.mask_prefix_length() >= route.mask.mask_prefix_length() => {}
                _ => best = Some(route),
            }
        }
        best.map(|route| route.gateway)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routing table :")?;
        for route in &self.routes {
            writeln!(f, "\t -{}", route)?;
        }
        Ok(())
    }
}

use std::net::Ipv4Addr;

/// Outcomes reported by the network stack after a request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    ConnectSucceeded,
    /// Association failed or was lost. `reason` is the driver's code.
    Disconnected { reason: u16 },
    AddressAssigned(Ipv4Addr),
}

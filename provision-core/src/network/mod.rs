// Network connection module

pub mod connection;
pub mod events;
pub mod radio;

pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use events::NetworkEvent;
pub use radio::{Radio, RadioCall, SecurityMode, SimulatedRadio, StationConfig};

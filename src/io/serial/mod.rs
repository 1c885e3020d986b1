// src/io/serial/mod.rs
//
// Serial port driver for the voting base station.
//
// Features:
// - Device discovery by name pattern
// - Line framing of inbound vote events
// - Port handles that can be cloned so reads and writes run independently

pub mod framer;
pub mod port;
pub(crate) mod utils;

pub use framer::{LineFramer, SerialFrame};
pub use port::{Connector, SerialConfig, SerialConnector, SerialStream};
pub use utils::{list_serial_ports, Parity, SerialPortInfo};

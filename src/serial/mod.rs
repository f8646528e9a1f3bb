//! The serial module contains the components responsible for moving command
//! lines to and from the module: the transport trait, the line framer, the
//! tokio-serial binding and the mocks used in tests.

pub mod port;
pub mod serial_mock;
pub mod transport;

pub use port::{open_serial, SerialConfig};
pub use serial_mock::{MockReply, MockSerialPort, MockTransport};
pub use transport::{LineTransport, SerialIo, Transport};

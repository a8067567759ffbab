//! The interface between the host and the controller
//!
//! This crate is the part of the host stack that sits directly on top of the transport to the
//! controller. It does not know anything about the link layer states of the host, its job is to
//! turn the byte stream of the transport into packets and to keep the bookkeeping of the
//! interface.
//!
//! * [`framing`] splits the unframed byte stream of a transport into HCI packets.
//! * [`transport`] is the read/write interface of a byte stream transport (a UART, a USB bulk
//!   endpoint, or for testing an in-memory pipe).
//! * [`correlator`] enforces the command flow control of the HCI and matches the Command
//!   Complete and Command Status events back to the command that caused them.
//! * [`reassembler`] reassembles (and fragments) the PDUs carried by HCI ACL data packets.
//!
//! The types within this crate are not thread safe by themselves, they are intended to be owned
//! by a single task or guarded by a mutex. No lock is ever needed across an `await`.

pub mod correlator;
pub mod framing;
pub mod reassembler;
pub mod transport;

pub use tble_hci_util as util;

//! Common items for the host controller interface
//!
//! This crate carries the wire format of the HCI. It is used by both the interface crate (which
//! decodes whatever the controller sends) and the host crate (which encodes the commands it
//! sends).
//!
//! # Packets
//! Every packet transferred over a byte stream interface starts with a single byte indicating the
//! kind of packet, followed by a packet specific header and the payload. The [`codec`] module
//! converts between raw bytes and the tagged [`HciPacket`](codec::HciPacket) type. Decoding is
//! strict, a packet whose length field does not exactly match the bytes available is rejected as
//! a malformed packet, but a packet that is well formed yet unknown to this library (such as a
//! vendor event) is passed through opaquely.
//!
//! # Opcodes and Events
//! [`opcodes`] contains the command opcodes and [`events`] contains the events (and their
//! parameters) that are understood by this library.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

extern crate alloc;

pub mod acl;
pub mod codec;
pub mod events;
pub mod le;
pub mod opcodes;

use core::fmt;

pub use tble_core::errors;
pub use tble_core::BluetoothDeviceAddress;

/// The connection handle
///
/// This is used as an identifier of a connection by both the host and interface. It is created by
/// the controller when a connection is established between this device and another device. The
/// handle is a 12 bit value, it occupies the lower 12 bits of the first two bytes of a HCI data
/// packet header.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct ConnectionHandle {
    handle: u16,
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#05x}", self.handle)
    }
}

impl ConnectionHandle {
    /// The largest raw value of a connection handle
    pub const MAX: u16 = 0x0FFF;

    const ERROR: &'static str = "raw connection handle is wider than 12 bits";

    /// Get the raw value of the handle
    pub fn get_raw_handle(&self) -> u16 {
        self.handle
    }

    /// Get the handle from the first two bytes of an ACL or SCO data packet header
    ///
    /// The flags in the upper four bits are masked off.
    pub(crate) fn from_header(first_2_bytes: u16) -> Self {
        ConnectionHandle {
            handle: first_2_bytes & Self::MAX,
        }
    }
}

impl TryFrom<u16> for ConnectionHandle {
    type Error = &'static str;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        if raw <= ConnectionHandle::MAX {
            Ok(ConnectionHandle { handle: raw })
        } else {
            Err(Self::ERROR)
        }
    }
}

impl TryFrom<[u8; 2]> for ConnectionHandle {
    type Error = &'static str;

    fn try_from(raw: [u8; 2]) -> Result<Self, Self::Error> {
        ConnectionHandle::try_from(<u16>::from_le_bytes(raw))
    }
}

/// The types of HCI packets
///
/// This is the indicator byte placed in front of every packet on a byte stream interface.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum HciPacketType {
    /// Command packet
    Command,
    /// Asynchronous Connection-Oriented Data Packet
    Acl,
    /// Synchronous Connection-Oriented Data Packet
    Sco,
    /// Event Packet
    Event,
}

impl HciPacketType {
    /// Get the packet indicator byte
    pub const fn get_indicator(self) -> u8 {
        match self {
            HciPacketType::Command => 0x01,
            HciPacketType::Acl => 0x02,
            HciPacketType::Sco => 0x03,
            HciPacketType::Event => 0x04,
        }
    }

    /// Try to get the packet type from its indicator byte
    pub const fn try_from_indicator(indicator: u8) -> Option<Self> {
        match indicator {
            0x01 => Some(HciPacketType::Command),
            0x02 => Some(HciPacketType::Acl),
            0x03 => Some(HciPacketType::Sco),
            0x04 => Some(HciPacketType::Event),
            _ => None,
        }
    }

    /// Get the size of the header that follows the indicator byte
    ///
    /// The length of the payload is always the last field of the header.
    pub const fn header_size(self) -> usize {
        match self {
            HciPacketType::Command => 3,
            HciPacketType::Acl => 4,
            HciPacketType::Sco => 3,
            HciPacketType::Event => 2,
        }
    }

    /// Get the payload length from a complete header
    ///
    /// The input `header` must be exactly the header (without the indicator byte).
    pub fn payload_len(self, header: &[u8]) -> Option<usize> {
        if header.len() != self.header_size() {
            return None;
        }

        match self {
            HciPacketType::Acl => Some(<u16>::from_le_bytes([header[2], header[3]]).into()),
            HciPacketType::Command | HciPacketType::Sco => Some(header[2].into()),
            HciPacketType::Event => Some(header[1].into()),
        }
    }
}

impl fmt::Display for HciPacketType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HciPacketType::Command => f.write_str("Command"),
            HciPacketType::Acl => f.write_str("ACL"),
            HciPacketType::Sco => f.write_str("SCO"),
            HciPacketType::Event => f.write_str("Event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_handle_range() {
        assert!(ConnectionHandle::try_from(0).is_ok());
        assert!(ConnectionHandle::try_from(0x0FFF).is_ok());
        assert!(ConnectionHandle::try_from(0x1000).is_err());

        assert_eq!(
            0x0102,
            ConnectionHandle::try_from([0x02, 0x01]).unwrap().get_raw_handle()
        );
    }

    #[test]
    fn packet_type_lengths() {
        assert_eq!(Some(5), HciPacketType::Event.payload_len(&[0x0E, 5]));
        assert_eq!(Some(0x0102), HciPacketType::Acl.payload_len(&[0x01, 0x00, 0x02, 0x01]));
        assert_eq!(None, HciPacketType::Command.payload_len(&[0x03, 0x0C]));
        assert_eq!(None, HciPacketType::try_from_indicator(0x05));
    }
}

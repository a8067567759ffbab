//! Framing of HCI packets from a byte stream
//!
//! Transports such as a UART do not have any notion of a packet, the bytes of consecutive
//! packets are received back to back. A [`PacketFramer`] is fed bytes in the order they are
//! received and outputs each complete packet (starting with the packet indicator) as soon as its
//! last byte is added.
//!
//! ```
//! # use tble_hci_interface::framing::{Framed, PacketFramer};
//! let mut framer = PacketFramer::new();
//!
//! // an "Inquiry Complete" event
//! assert_eq!(None, framer.add(0x04));
//! assert_eq!(None, framer.add(0x01));
//! assert_eq!(None, framer.add(0x01));
//! assert_eq!(Some(Framed::Packet(vec![0x04, 0x01, 0x01, 0x00])), framer.add(0x00));
//! ```

use std::fmt;
use tble_hci_util::HciPacketType;

/// Output of a [`PacketFramer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framed {
    /// A complete packet, the first byte is the packet indicator
    Packet(Vec<u8>),
    /// A byte that is not a packet indicator was received where a packet was expected to start.
    ///
    /// The byte is dropped and the framer tries to start a packet with the next byte.
    UnknownIndicator(u8),
}

/// Assembles packets from a byte stream
#[derive(Default)]
pub struct PacketFramer {
    packet_type: Option<HciPacketType>,
    packet_len: Option<usize>,
    buffer: Vec<u8>,
}

impl PacketFramer {
    pub fn new() -> Self {
        PacketFramer::default()
    }

    /// Add a byte
    ///
    /// When the byte completes a packet, the packet is returned.
    pub fn add(&mut self, byte: u8) -> Option<Framed> {
        let packet_type = match self.packet_type {
            Some(packet_type) => packet_type,
            None => {
                let Some(packet_type) = HciPacketType::try_from_indicator(byte) else {
                    return Some(Framed::UnknownIndicator(byte));
                };

                self.packet_type = Some(packet_type);

                self.buffer.push(byte);

                return None;
            }
        };

        self.buffer.push(byte);

        if self.packet_len.is_none() && self.buffer.len() == 1 + packet_type.header_size() {
            let payload_len = packet_type.payload_len(&self.buffer[1..]).unwrap_or_default();

            self.packet_len = Some(self.buffer.len() + payload_len);
        }

        match self.packet_len {
            Some(len) if len == self.buffer.len() => {
                self.packet_type = None;
                self.packet_len = None;

                Some(Framed::Packet(core::mem::take(&mut self.buffer)))
            }
            _ => None,
        }
    }

    /// Add multiple bytes
    ///
    /// Every packet completed by `bytes` is pushed to `output`.
    pub fn add_bytes(&mut self, bytes: &[u8], output: &mut Vec<Framed>) {
        output.extend(bytes.iter().filter_map(|byte| self.add(*byte)))
    }

    /// Check if a partial packet is buffered
    pub fn is_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drop any partial packet
    pub fn clear(&mut self) {
        self.packet_type = None;
        self.packet_len = None;
        self.buffer.clear();
    }
}

impl fmt::Debug for PacketFramer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PacketFramer")
            .field("packet_type", &self.packet_type)
            .field("packet_len", &self.packet_len)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_to_back_packets() {
        let mut framer = PacketFramer::new();

        let mut output = Vec::new();

        let stream = [
            0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00, // command complete (reset)
            0x02, 0x01, 0x20, 0x02, 0x00, 0xAA, 0xBB, // ACL data
            0x04, 0x13, 0x05, // first part of an event
        ];

        framer.add_bytes(&stream, &mut output);

        assert_eq!(
            vec![
                Framed::Packet(stream[..7].to_vec()),
                Framed::Packet(stream[7..14].to_vec())
            ],
            output
        );

        assert!(framer.is_partial());

        output.clear();

        framer.add_bytes(&[0x01, 0x01, 0x00, 0x01, 0x00], &mut output);

        assert_eq!(
            vec![Framed::Packet(vec![0x04, 0x13, 0x05, 0x01, 0x01, 0x00, 0x01, 0x00])],
            output
        );

        assert!(!framer.is_partial());
    }

    #[test]
    fn zero_length_payload() {
        let mut framer = PacketFramer::new();

        let mut output = Vec::new();

        framer.add_bytes(&[0x02, 0x01, 0x00, 0x00, 0x00], &mut output);

        assert_eq!(vec![Framed::Packet(vec![0x02, 0x01, 0x00, 0x00, 0x00])], output);
    }

    #[test]
    fn resynchronization() {
        let mut framer = PacketFramer::new();

        let mut output = Vec::new();

        framer.add_bytes(&[0xFF, 0x00, 0x04, 0x10, 0x01, 0x02], &mut output);

        assert_eq!(
            vec![
                Framed::UnknownIndicator(0xFF),
                Framed::UnknownIndicator(0x00),
                Framed::Packet(vec![0x04, 0x10, 0x01, 0x02]),
            ],
            output
        );
    }
}

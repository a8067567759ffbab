//! HCI ACL data packets
//!
//! The first two bytes of the header of an ACL data packet contain the connection handle in the
//! lower 12 bits, the packet boundary flag in bits 12 and 13, and the broadcast flag in bits 14
//! and 15. The next two bytes are the length of the payload. All of these fields are little
//! endian.

use crate::ConnectionHandle;
use alloc::vec::Vec;
use core::fmt;

/// The packet boundary flag
///
/// This flag tells the receiver how this fragment fits within a higher layer PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclPacketBoundary {
    FirstNonFlushable,
    ContinuingFragment,
    FirstAutoFlushable,
    CompleteL2capPdu,
}

impl AclPacketBoundary {
    /// Get the value shifted into the correct place of the Packet Boundary Flag in the HCI ACL
    /// data packet. The returned value is in host byte order.
    pub fn get_shifted_val(&self) -> u16 {
        (match self {
            AclPacketBoundary::FirstNonFlushable => 0x0,
            AclPacketBoundary::ContinuingFragment => 0x1,
            AclPacketBoundary::FirstAutoFlushable => 0x2,
            AclPacketBoundary::CompleteL2capPdu => 0x3,
        }) << 12
    }

    /// Get the `AclPacketBoundary` from the first 16 bits of a HCI ACL data packet
    ///
    /// The input `val` does not need to be masked, however it does need to be in host byte
    /// order. All four values of the two bit field are valid.
    pub fn from_shifted_val(val: u16) -> Self {
        match (val >> 12) & 0x3 {
            0x0 => AclPacketBoundary::FirstNonFlushable,
            0x1 => AclPacketBoundary::ContinuingFragment,
            0x2 => AclPacketBoundary::FirstAutoFlushable,
            _ => AclPacketBoundary::CompleteL2capPdu,
        }
    }

    /// Check if this flag marks the start of a higher layer PDU
    pub fn is_start(&self) -> bool {
        matches!(
            self,
            AclPacketBoundary::FirstNonFlushable | AclPacketBoundary::FirstAutoFlushable
        )
    }
}

/// The broadcast flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclBroadcastFlag {
    /// Point-to-point message
    NoBroadcast,
    /// Broadcast to all active peripherals
    ActivePeripheralBroadcast,
}

impl AclBroadcastFlag {
    /// Get the value shifted into the correct place of the Broadcast Flag in the HCI ACL data
    /// packet. The returned value is in host byte order.
    pub fn get_shifted_val(&self) -> u16 {
        (match self {
            AclBroadcastFlag::NoBroadcast => 0x0,
            AclBroadcastFlag::ActivePeripheralBroadcast => 0x1,
        }) << 14
    }

    /// Try to get the `AclBroadcastFlag` from the first 16 bits of a HCI ACL data packet
    ///
    /// The values `0b10` and `0b11` are reserved, `None` is returned for either of them.
    pub fn try_from_shifted_val(val: u16) -> Option<Self> {
        match (val >> 14) & 0x3 {
            0x0 => Some(AclBroadcastFlag::NoBroadcast),
            0x1 => Some(AclBroadcastFlag::ActivePeripheralBroadcast),
            _ => None,
        }
    }
}

/// A HCI ACL Data Packet
///
/// HCI ACL data packets are sent between the host and controller for a specified connection. They
/// consist of a header and payload. The header contains a connection handle, a packet boundary
/// flag, a broadcast flag, and the total length of the payload.
///
/// # LE-U Logical Link
/// For a LE-U logical link the packet boundary flag can be either `FirstNonFlushable` or
/// `ContinuingFragment` when sent from the host, and the broadcast flag must always be
/// `NoBroadcast`. A controller may use `CompleteL2capPdu` or `FirstAutoFlushable` for data sent
/// to the host, so all four are accepted when decoding.
#[derive(Clone, PartialEq, Eq)]
pub struct HciAclData {
    connection_handle: ConnectionHandle,
    packet_boundary_flag: AclPacketBoundary,
    broadcast_flag: AclBroadcastFlag,
    payload: Vec<u8>,
}

impl HciAclData {
    /// The size of the header of a HCI ACL data packet
    pub const HEADER_SIZE: usize = 4;

    /// The largest payload that can be described by the length field
    pub const MAX_PAYLOAD_SIZE: usize = <u16>::MAX as usize;

    /// The minimum size of the payload that a LE controller must support
    pub const MIN_LE_PAYLOAD_SIZE: usize = 27;

    /// Create a new HciAclData
    ///
    /// # Error
    /// `payload` is larger than [`MAX_PAYLOAD_SIZE`](Self::MAX_PAYLOAD_SIZE).
    pub fn new(
        connection_handle: ConnectionHandle,
        packet_boundary_flag: AclPacketBoundary,
        broadcast_flag: AclBroadcastFlag,
        payload: Vec<u8>,
    ) -> Result<Self, HciAclPacketError> {
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(HciAclPacketError::PayloadTooLarge(payload.len()));
        }

        Ok(HciAclData {
            connection_handle,
            packet_boundary_flag,
            broadcast_flag,
            payload,
        })
    }

    pub fn get_handle(&self) -> ConnectionHandle {
        self.connection_handle
    }

    pub fn get_payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn get_packet_boundary_flag(&self) -> AclPacketBoundary {
        self.packet_boundary_flag
    }

    pub fn get_broadcast_flag(&self) -> AclBroadcastFlag {
        self.broadcast_flag
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Get the size of this packet (header and payload) without the packet indicator
    pub fn packet_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// Get the first two bytes of the header (in host byte order)
    fn header_handle_field(&self) -> u16 {
        self.connection_handle.get_raw_handle()
            | self.packet_boundary_flag.get_shifted_val()
            | self.broadcast_flag.get_shifted_val()
    }

    /// Write this packet (without the packet indicator) into `buffer`
    ///
    /// `buffer` must be exactly [`packet_size`](Self::packet_size) bytes.
    pub(crate) fn write_packet(&self, buffer: &mut [u8]) {
        buffer[..2].copy_from_slice(&self.header_handle_field().to_le_bytes());
        buffer[2..4].copy_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buffer[4..].copy_from_slice(&self.payload);
    }

    /// Convert the HciAclData into a raw packet
    ///
    /// The returned packet does not contain the packet indicator.
    pub fn to_packet(&self) -> Vec<u8> {
        let mut packet = alloc::vec![0u8; self.packet_size()];

        self.write_packet(&mut packet);

        packet
    }

    /// Attempt to create a `HciAclData` from a raw packet
    ///
    /// The packet must not contain the packet indicator, and the length field must exactly match
    /// the size of the payload within `packet`.
    pub fn try_from_packet(packet: &[u8]) -> Result<Self, HciAclPacketError> {
        if packet.len() < Self::HEADER_SIZE {
            return Err(HciAclPacketError::PacketTooSmall);
        }

        let first_2_bytes = <u16>::from_le_bytes([packet[0], packet[1]]);

        let connection_handle = ConnectionHandle::from_header(first_2_bytes);

        let packet_boundary_flag = AclPacketBoundary::from_shifted_val(first_2_bytes);

        let broadcast_flag =
            AclBroadcastFlag::try_from_shifted_val(first_2_bytes).ok_or(HciAclPacketError::InvalidBroadcastFlag)?;

        let data_length = <u16>::from_le_bytes([packet[2], packet[3]]) as usize;

        let payload = &packet[Self::HEADER_SIZE..];

        if payload.len() != data_length {
            return Err(HciAclPacketError::LengthMismatch {
                declared: data_length,
                actual: payload.len(),
            });
        }

        Ok(HciAclData {
            connection_handle,
            packet_boundary_flag,
            broadcast_flag,
            payload: payload.to_vec(),
        })
    }
}

impl fmt::Debug for HciAclData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HciAclData")
            .field("connection_handle", &self.connection_handle)
            .field("packet_boundary_flag", &self.packet_boundary_flag)
            .field("broadcast_flag", &self.broadcast_flag)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Error for an invalid HCI ACL data packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciAclPacketError {
    PacketTooSmall,
    InvalidBroadcastFlag,
    PayloadTooLarge(usize),
    LengthMismatch { declared: usize, actual: usize },
}

impl fmt::Display for HciAclPacketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HciAclPacketError::PacketTooSmall => f.write_str("packet is too small to be a valid HCI ACL data packet"),
            HciAclPacketError::InvalidBroadcastFlag => f.write_str("packet has an invalid broadcast flag"),
            HciAclPacketError::PayloadTooLarge(len) => {
                write!(f, "payload of {} bytes is too large for a HCI ACL data packet", len)
            }
            HciAclPacketError::LengthMismatch { declared, actual } => write!(
                f,
                "length field ({}) does not match the size of the payload ({})",
                declared, actual
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HciAclPacketError {}

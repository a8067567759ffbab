//! Encoding and decoding of HCI packets
//!
//! A packet on a byte stream interface is the packet indicator, the header specific to the type
//! of packet, and then the payload. [`HciPacket`] is the tagged form of any of the four packet
//! types.
//!
//! ```
//! # use tble_hci_util::codec::{CommandPacket, HciPacket};
//! # use tble_hci_util::opcodes::{ControllerAndBaseband, HciCommand};
//! let reset = CommandPacket::new(HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset), Vec::new()).unwrap();
//!
//! let bytes = HciPacket::Command(reset).encode();
//!
//! assert_eq!(&[0x01, 0x03, 0x0C, 0x00], bytes.as_slice());
//! ```

use crate::acl::{HciAclData, HciAclPacketError};
use crate::events::{EventError, EventsData};
use crate::opcodes::HciCommand;
use crate::{ConnectionHandle, HciPacketType};
use alloc::vec::Vec;
use core::fmt;

/// The opcode of a command packet
///
/// A decoded command packet may have an opcode that this library does not know of, it is kept as
/// the raw value instead of failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Known(HciCommand),
    Unsupported(u16),
}

impl Opcode {
    /// Create an `Opcode` from a raw (host byte order) opcode
    pub fn from_raw(raw: u16) -> Self {
        HciCommand::try_from_opcode(raw)
            .map(Opcode::Known)
            .unwrap_or(Opcode::Unsupported(raw))
    }

    /// Get the raw opcode (in host byte order)
    pub fn get_raw(&self) -> u16 {
        match self {
            Opcode::Known(command) => command.into_opcode(),
            Opcode::Unsupported(raw) => *raw,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Opcode::Known(command) => fmt::Display::fmt(command, f),
            Opcode::Unsupported(raw) => write!(f, "unsupported opcode {:#06x}", raw),
        }
    }
}

/// A HCI command packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPacket {
    opcode: Opcode,
    parameter: Vec<u8>,
}

impl CommandPacket {
    /// The largest size of a command parameter
    pub const MAX_PARAMETER_SIZE: usize = <u8>::MAX as usize;

    /// Create a new command packet
    ///
    /// # Error
    /// The parameter is larger than [`MAX_PARAMETER_SIZE`](Self::MAX_PARAMETER_SIZE).
    pub fn new(command: HciCommand, parameter: Vec<u8>) -> Result<Self, CodecError> {
        if parameter.len() > Self::MAX_PARAMETER_SIZE {
            return Err(CodecError::InvalidArgument("command parameter is larger than 255 bytes"));
        }

        Ok(CommandPacket {
            opcode: Opcode::Known(command),
            parameter,
        })
    }

    /// Create a new command packet from a raw opcode
    ///
    /// Only opcodes of commands known to this library are accepted.
    ///
    /// # Error
    /// * The opcode is unknown
    /// * The parameter is larger than [`MAX_PARAMETER_SIZE`](Self::MAX_PARAMETER_SIZE).
    pub fn try_from_raw(opcode: u16, parameter: Vec<u8>) -> Result<Self, CodecError> {
        let command = HciCommand::try_from_opcode(opcode).map_err(|_| CodecError::UnknownOpcode(opcode))?;

        Self::new(command, parameter)
    }

    pub fn get_opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn get_parameter(&self) -> &[u8] {
        &self.parameter
    }
}

/// A HCI synchronous (SCO) data packet
///
/// Synchronous data is not used by a LE host, these are only passed through opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoPacket {
    connection_handle: ConnectionHandle,
    flags: u8,
    payload: Vec<u8>,
}

impl ScoPacket {
    /// The largest size of a SCO payload
    pub const MAX_PAYLOAD_SIZE: usize = <u8>::MAX as usize;

    /// Create a new SCO packet
    ///
    /// Input `flags` is the upper four bits of the first two bytes of the header (the packet
    /// status flag and the reserved bits), only the lower four bits of `flags` are used.
    pub fn new(connection_handle: ConnectionHandle, flags: u8, payload: Vec<u8>) -> Result<Self, CodecError> {
        if payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(CodecError::InvalidArgument("SCO payload is larger than 255 bytes"));
        }

        Ok(ScoPacket {
            connection_handle,
            flags: flags & 0xF,
            payload,
        })
    }

    pub fn get_handle(&self) -> ConnectionHandle {
        self.connection_handle
    }

    pub fn get_flags(&self) -> u8 {
        self.flags
    }

    pub fn get_payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A HCI event packet
///
/// This is the event code and the raw parameter. The parameter is converted into an
/// [`EventsData`] with the method [`to_events_data`](EventPacket::to_events_data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPacket {
    event_code: u8,
    parameter: Vec<u8>,
}

impl EventPacket {
    /// The largest size of an event parameter
    pub const MAX_PARAMETER_SIZE: usize = <u8>::MAX as usize;

    pub fn new(event_code: u8, parameter: Vec<u8>) -> Result<Self, CodecError> {
        if parameter.len() > Self::MAX_PARAMETER_SIZE {
            return Err(CodecError::InvalidArgument("event parameter is larger than 255 bytes"));
        }

        Ok(EventPacket { event_code, parameter })
    }

    pub fn get_event_code(&self) -> u8 {
        self.event_code
    }

    pub fn get_parameter(&self) -> &[u8] {
        &self.parameter
    }

    /// Convert into the typed event
    pub fn to_events_data(&self) -> Result<EventsData, EventError> {
        EventsData::try_from_packet(self.event_code, &self.parameter)
    }
}

/// A packet sent over the HCI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HciPacket {
    Command(CommandPacket),
    Acl(HciAclData),
    Sco(ScoPacket),
    Event(EventPacket),
}

impl HciPacket {
    pub fn get_packet_type(&self) -> HciPacketType {
        match self {
            HciPacket::Command(_) => HciPacketType::Command,
            HciPacket::Acl(_) => HciPacketType::Acl,
            HciPacket::Sco(_) => HciPacketType::Sco,
            HciPacket::Event(_) => HciPacketType::Event,
        }
    }

    /// Get the size of the encoded packet (including the packet indicator)
    pub fn encoded_len(&self) -> usize {
        let payload_len = match self {
            HciPacket::Command(c) => c.parameter.len(),
            HciPacket::Acl(a) => a.get_payload().len(),
            HciPacket::Sco(s) => s.payload.len(),
            HciPacket::Event(e) => e.parameter.len(),
        };

        1 + self.get_packet_type().header_size() + payload_len
    }

    /// Encode this packet into `buffer`
    ///
    /// The number of bytes written is returned.
    ///
    /// # Error
    /// `buffer` is smaller than [`encoded_len`](HciPacket::encoded_len). Nothing is written to
    /// `buffer` when this error is returned.
    pub fn encode_into(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        let required = self.encoded_len();

        if buffer.len() < required {
            return Err(CodecError::BufferTooSmall {
                required,
                available: buffer.len(),
            });
        }

        let buffer = &mut buffer[..required];

        buffer[0] = self.get_packet_type().get_indicator();

        match self {
            HciPacket::Command(c) => {
                buffer[1..3].copy_from_slice(&c.opcode.get_raw().to_le_bytes());
                buffer[3] = c.parameter.len() as u8;
                buffer[4..].copy_from_slice(&c.parameter);
            }
            HciPacket::Acl(a) => a.write_packet(&mut buffer[1..]),
            HciPacket::Sco(s) => {
                let first_2_bytes = s.connection_handle.get_raw_handle() | (s.flags as u16) << 12;

                buffer[1..3].copy_from_slice(&first_2_bytes.to_le_bytes());
                buffer[3] = s.payload.len() as u8;
                buffer[4..].copy_from_slice(&s.payload);
            }
            HciPacket::Event(e) => {
                buffer[1] = e.event_code;
                buffer[2] = e.parameter.len() as u8;
                buffer[3..].copy_from_slice(&e.parameter);
            }
        }

        Ok(required)
    }

    /// Encode this packet into a new `Vec`
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = alloc::vec![0u8; self.encoded_len()];

        // the buffer is always the exact size
        let _ = self.encode_into(&mut buffer);

        buffer
    }

    /// Decode a packet
    ///
    /// Input `bytes` must be exactly one packet starting with the packet indicator. The length
    /// field within the header must match exactly the number of bytes after the header.
    ///
    /// Commands with an opcode unknown to this library are returned with an
    /// [`Opcode::Unsupported`], and event packets are not checked beyond their header.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&indicator, rest) = bytes.split_first().ok_or(CodecError::MalformedPacket(Malformed::Empty))?;

        let packet_type =
            HciPacketType::try_from_indicator(indicator).ok_or(CodecError::MalformedPacket(Malformed::UnknownPacketType(indicator)))?;

        let header_size = packet_type.header_size();

        if rest.len() < header_size {
            return Err(CodecError::MalformedPacket(Malformed::HeaderTooShort(packet_type)));
        }

        let (header, payload) = rest.split_at(header_size);

        // header has the correct size so this cannot fail
        let declared = packet_type.payload_len(header).unwrap_or_default();

        if declared != payload.len() {
            return Err(CodecError::MalformedPacket(Malformed::LengthMismatch {
                packet_type,
                declared,
                actual: payload.len(),
            }));
        }

        let packet = match packet_type {
            HciPacketType::Command => HciPacket::Command(CommandPacket {
                opcode: Opcode::from_raw(<u16>::from_le_bytes([header[0], header[1]])),
                parameter: payload.to_vec(),
            }),
            HciPacketType::Acl => HciPacket::Acl(HciAclData::try_from_packet(rest).map_err(Malformed::Acl)?),
            HciPacketType::Sco => {
                let first_2_bytes = <u16>::from_le_bytes([header[0], header[1]]);

                HciPacket::Sco(ScoPacket {
                    connection_handle: ConnectionHandle::from_header(first_2_bytes),
                    flags: (first_2_bytes >> 12) as u8,
                    payload: payload.to_vec(),
                })
            }
            HciPacketType::Event => HciPacket::Event(EventPacket {
                event_code: header[0],
                parameter: payload.to_vec(),
            }),
        };

        Ok(packet)
    }
}

/// The reason a packet is malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    Empty,
    UnknownPacketType(u8),
    HeaderTooShort(HciPacketType),
    LengthMismatch {
        packet_type: HciPacketType,
        declared: usize,
        actual: usize,
    },
    Acl(HciAclPacketError),
    Event(EventError),
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Malformed::Empty => f.write_str("empty packet"),
            Malformed::UnknownPacketType(indicator) => write!(f, "unknown packet indicator {:#04x}", indicator),
            Malformed::HeaderTooShort(ty) => write!(f, "{} packet is too short for its header", ty),
            Malformed::LengthMismatch {
                packet_type,
                declared,
                actual,
            } => write!(
                f,
                "{} packet declares {} bytes of payload but has {}",
                packet_type, declared, actual
            ),
            Malformed::Acl(e) => fmt::Display::fmt(e, f),
            Malformed::Event(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl From<Malformed> for CodecError {
    fn from(m: Malformed) -> Self {
        CodecError::MalformedPacket(m)
    }
}

impl From<EventError> for CodecError {
    fn from(e: EventError) -> Self {
        CodecError::MalformedPacket(Malformed::Event(e))
    }
}

/// Error returned by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes were not a valid packet
    MalformedPacket(Malformed),
    /// The output buffer is too small for the encoded packet
    BufferTooSmall { required: usize, available: usize },
    /// An argument cannot be represented within a packet
    InvalidArgument(&'static str),
    /// A raw opcode is not the opcode of any command known to this library
    UnknownOpcode(u16),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodecError::MalformedPacket(m) => write!(f, "malformed packet, {}", m),
            CodecError::BufferTooSmall { required, available } => write!(
                f,
                "buffer is too small, {} bytes are required but only {} are available",
                required, available
            ),
            CodecError::InvalidArgument(reason) => write!(f, "invalid argument, {}", reason),
            CodecError::UnknownOpcode(opcode) => write!(f, "unknown opcode {:#06x}", opcode),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AclBroadcastFlag, AclPacketBoundary};
    use crate::opcodes::{ControllerAndBaseband, LEController};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// A command with an opcode known to this library
    #[derive(Clone, Debug)]
    struct KnownCommand(HciCommand);

    impl Arbitrary for KnownCommand {
        fn arbitrary(g: &mut Gen) -> Self {
            const GROUPS: [u16; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x08, 0x3F];

            // the vendor specific group accepts every command, so this always ends
            loop {
                let ogf = *g.choose(&GROUPS).unwrap();

                let ocf = <u16>::arbitrary(g) & 0x7F;

                if let Ok(command) = HciCommand::try_from_opcode(ocf | ogf << 10) {
                    break KnownCommand(command);
                }
            }
        }
    }

    fn set_advertising_enable(enable: bool) -> HciPacket {
        HciPacket::Command(
            CommandPacket::new(
                HciCommand::LEController(LEController::SetAdvertisingEnable),
                alloc::vec![enable as u8],
            )
            .unwrap(),
        )
    }

    #[test]
    fn command_encoding() {
        let packet = set_advertising_enable(true);

        assert_eq!(alloc::vec![0x01, 0x0A, 0x20, 0x01, 0x01], packet.encode());
        assert_eq!(packet, HciPacket::decode(&packet.encode()).unwrap());
    }

    #[test]
    fn zero_length_command() {
        let reset = HciPacket::Command(
            CommandPacket::new(HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset), Vec::new()).unwrap(),
        );

        assert_eq!(alloc::vec![0x01, 0x03, 0x0C, 0x00], reset.encode());
    }

    #[test]
    fn buffer_too_small_writes_nothing() {
        let packet = set_advertising_enable(false);

        let mut buffer = [0xFFu8; 4];

        assert_eq!(
            Err(CodecError::BufferTooSmall {
                required: 5,
                available: 4
            }),
            packet.encode_into(&mut buffer)
        );

        assert_eq!([0xFF; 4], buffer);

        let mut buffer = [0u8; 8];

        assert_eq!(Ok(5), packet.encode_into(&mut buffer));
    }

    #[test]
    fn oversized_parameters_are_rejected() {
        assert!(matches!(
            CommandPacket::new(
                HciCommand::LEController(LEController::SetAdvertisingData),
                alloc::vec![0; 256]
            ),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn raw_opcodes() {
        assert_eq!(
            Err(CodecError::UnknownOpcode(0x1C01)),
            CommandPacket::try_from_raw(0x1C01, Vec::new())
        );

        let packet = CommandPacket::try_from_raw(0x0C03, Vec::new()).unwrap();

        assert_eq!(
            Opcode::Known(HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset)),
            packet.get_opcode()
        );
    }

    #[test]
    fn unsupported_opcode_passes_through() {
        match HciPacket::decode(&[0x01, 0x01, 0x1C, 0x01, 0xAB]).unwrap() {
            HciPacket::Command(c) => {
                assert_eq!(Opcode::Unsupported(0x1C01), c.get_opcode());
                assert_eq!(&[0xAB], c.get_parameter());
            }
            p => panic!("unexpected packet {:?}", p),
        }
    }

    #[test]
    fn acl_packet() {
        let data = HciAclData::new(
            ConnectionHandle::try_from(0x001).unwrap(),
            AclPacketBoundary::FirstNonFlushable,
            AclBroadcastFlag::NoBroadcast,
            alloc::vec![0x0A, 0x0B],
        )
        .unwrap();

        let bytes = HciPacket::Acl(data.clone()).encode();

        assert_eq!(alloc::vec![0x02, 0x01, 0x00, 0x02, 0x00, 0x0A, 0x0B], bytes);
        assert_eq!(HciPacket::Acl(data), HciPacket::decode(&bytes).unwrap());
    }

    #[test]
    fn sco_packet() {
        let sco = ScoPacket::new(ConnectionHandle::try_from(0x123).unwrap(), 0x2, alloc::vec![9, 9]).unwrap();

        let bytes = HciPacket::Sco(sco.clone()).encode();

        assert_eq!(alloc::vec![0x03, 0x23, 0x21, 0x02, 9, 9], bytes);
        assert_eq!(HciPacket::Sco(sco), HciPacket::decode(&bytes).unwrap());
    }

    #[test]
    fn event_packet() {
        let bytes = [0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00];

        match HciPacket::decode(&bytes).unwrap() {
            HciPacket::Event(e) => {
                assert_eq!(0x0E, e.get_event_code());

                match e.to_events_data().unwrap() {
                    EventsData::CommandComplete(cc) => assert_eq!(Some(0x0C03), cc.command_opcode),
                    d => panic!("unexpected event {:?}", d),
                }
            }
            p => panic!("unexpected packet {:?}", p),
        }
    }

    #[test]
    fn length_mismatches_are_malformed() {
        assert_eq!(
            Err(CodecError::MalformedPacket(Malformed::LengthMismatch {
                packet_type: HciPacketType::Event,
                declared: 4,
                actual: 3
            })),
            HciPacket::decode(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C])
        );

        // trailing bytes are not allowed either
        assert!(matches!(
            HciPacket::decode(&[0x01, 0x03, 0x0C, 0x00, 0x00]),
            Err(CodecError::MalformedPacket(Malformed::LengthMismatch { .. }))
        ));

        assert_eq!(
            Err(CodecError::MalformedPacket(Malformed::HeaderTooShort(HciPacketType::Acl))),
            HciPacket::decode(&[0x02, 0x01, 0x00])
        );

        assert_eq!(
            Err(CodecError::MalformedPacket(Malformed::UnknownPacketType(0x09))),
            HciPacket::decode(&[0x09])
        );

        assert_eq!(Err(CodecError::MalformedPacket(Malformed::Empty)), HciPacket::decode(&[]));
    }

    #[quickcheck]
    fn decode_never_panics(bytes: Vec<u8>) -> bool {
        let _ = HciPacket::decode(&bytes);

        true
    }

    #[quickcheck]
    fn commands_decode_to_what_was_encoded(command: KnownCommand, parameter: Vec<u8>) -> bool {
        let mut parameter = parameter;

        parameter.truncate(CommandPacket::MAX_PARAMETER_SIZE);

        let packet = HciPacket::Command(CommandPacket::new(command.0, parameter).unwrap());

        HciPacket::decode(&packet.encode()) == Ok(packet)
    }

    #[quickcheck]
    fn acl_data_decodes_to_what_was_encoded(raw_header: u16, broadcast: bool, payload: Vec<u8>) -> bool {
        let broadcast_flag = if broadcast {
            AclBroadcastFlag::ActivePeripheralBroadcast
        } else {
            AclBroadcastFlag::NoBroadcast
        };

        let data = HciAclData::new(
            ConnectionHandle::try_from(raw_header & ConnectionHandle::MAX).unwrap(),
            AclPacketBoundary::from_shifted_val(raw_header),
            broadcast_flag,
            payload,
        )
        .unwrap();

        let packet = HciPacket::Acl(data);

        HciPacket::decode(&packet.encode()) == Ok(packet)
    }

    #[quickcheck]
    fn truncated_packets_are_malformed(parameter: Vec<u8>, cut: usize) -> bool {
        let mut parameter = parameter;

        parameter.truncate(CommandPacket::MAX_PARAMETER_SIZE);

        let packet = HciPacket::Event(EventPacket::new(0xFF, parameter).unwrap());

        let bytes = packet.encode();

        let cut = cut % bytes.len();

        matches!(HciPacket::decode(&bytes[..cut]), Err(CodecError::MalformedPacket(_)))
    }
}

//! Host Controller Interface Commands
//!
//! These are the commands listed under Vol 4, Part E, section 7 of the Bluetooth Core
//! Specifications that are used by this library. The modules match the sub sections header names.
//!
//! Every command is a type that implements [`CommandParameter`]. The module of a command contains
//! the parameter type and a `send` function for sending it with the default timeout, any command
//! can also be submitted with [`Host::submit`](crate::Host::submit).

pub mod cb;
pub mod info_params;
pub mod le;
pub mod link_control;
pub mod testing;

use crate::link::LinkEffect;
use tble_hci_interface::correlator::{CommandError, CommandResponse};
use tble_hci_util::codec::{CodecError, CommandPacket, Opcode};
use tble_hci_util::opcodes::HciCommand;

/// A command that can be sent to the controller
pub trait CommandParameter {
    /// The type returned when the controller completes the command
    type Return;

    /// The command to send to the Bluetooth Controller.
    ///
    /// This is the OGF & OCF pair.
    fn get_command(&self) -> HciCommand;

    /// Convert Self into the parameter form
    ///
    /// The returned parameter is the structure defined as the parameter part of the command packet
    /// for the specific HCI command.
    fn get_parameter(&self) -> Vec<u8>;

    /// What a success of this command does to the link states
    fn link_effect(&self) -> LinkEffect {
        LinkEffect::None
    }

    /// Convert the response of the controller into the return
    fn try_from_response(response: CommandResponse) -> Result<Self::Return, CommandError>;

    /// Get the command packet to be sent to the controller
    fn as_command_packet(&self) -> Result<CommandPacket, CodecError> {
        CommandPacket::new(self.get_command(), self.get_parameter())
    }
}

/// Get the return parameter of a successful Command Complete
///
/// The status (the first byte) is stripped from the returned parameter.
pub(crate) fn expect_complete(response: CommandResponse) -> Result<Vec<u8>, CommandError> {
    match response.into_result()? {
        CommandResponse::Complete { mut return_parameter, .. } => {
            return_parameter.remove(0);

            Ok(return_parameter)
        }
        CommandResponse::Status { opcode, .. } => {
            log::warn!("(HCI) expected a command complete for opcode {:#06x}", opcode);

            Err(CommandError::Malformed)
        }
    }
}

/// Check the status of the response
///
/// This accepts both a Command Status and a Command Complete. Some controllers respond with a
/// Command Complete to commands that are normally answered with a Command Status.
pub(crate) fn expect_status(response: CommandResponse) -> Result<(), CommandError> {
    response.into_result().map(|_| ())
}

/// A command built from a raw opcode and parameter
///
/// This is for sending a command that has no type within this library. The opcode must still be
/// one that is known to this library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    command: HciCommand,
    parameter: Vec<u8>,
}

impl RawCommand {
    /// Create a new `RawCommand`
    ///
    /// # Error
    /// The opcode is unknown or the parameter is larger than 255 bytes.
    pub fn new(opcode: u16, parameter: Vec<u8>) -> Result<Self, CodecError> {
        let packet = CommandPacket::try_from_raw(opcode, parameter)?;

        let Opcode::Known(command) = packet.get_opcode() else {
            return Err(CodecError::UnknownOpcode(opcode));
        };

        Ok(RawCommand {
            command,
            parameter: packet.get_parameter().to_vec(),
        })
    }
}

impl CommandParameter for RawCommand {
    type Return = CommandResponse;

    fn get_command(&self) -> HciCommand {
        self.command
    }

    fn get_parameter(&self) -> Vec<u8> {
        self.parameter.clone()
    }

    fn try_from_response(response: CommandResponse) -> Result<Self::Return, CommandError> {
        response.into_result()
    }
}

/// Read a little endian `u16` from the return parameter
pub(crate) fn return_u16(parameter: &[u8], index: usize) -> Result<u16, CommandError> {
    match parameter.get(index..index + 2) {
        Some([b0, b1]) => Ok(<u16>::from_le_bytes([*b0, *b1])),
        _ => Err(CommandError::Malformed),
    }
}

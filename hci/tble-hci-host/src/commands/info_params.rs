//! Informational Parameter Commands

/// Read the public address of the controller
pub mod read_bd_addr {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, InformationParameters};
    use tble_hci_util::BluetoothDeviceAddress;

    const COMMAND: HciCommand = HciCommand::InformationParameters(InformationParameters::ReadBD_ADDR);

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Parameter;

    impl CommandParameter for Parameter {
        type Return = BluetoothDeviceAddress;

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            Vec::new()
        }

        fn try_from_response(response: CommandResponse) -> Result<BluetoothDeviceAddress, CommandError> {
            let parameter = expect_complete(response)?;

            BluetoothDeviceAddress::try_from_slice(&parameter).ok_or(CommandError::Malformed)
        }
    }

    /// Send the command
    ///
    /// The public address is returned, this is all zeros if the controller does not have one.
    pub async fn send(host: &Host) -> Result<BluetoothDeviceAddress, SendCommandError> {
        host.send_command(Parameter).await
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn address_return() {
            let response = CommandResponse::Complete {
                opcode: COMMAND.into_opcode(),
                return_parameter: vec![0x00, 1, 2, 3, 4, 5, 6],
            };

            assert_eq!(
                Ok(BluetoothDeviceAddress([1, 2, 3, 4, 5, 6])),
                Parameter::try_from_response(response)
            );

            let response = CommandResponse::Complete {
                opcode: COMMAND.into_opcode(),
                return_parameter: vec![0x00, 1, 2],
            };

            assert_eq!(Err(CommandError::Malformed), Parameter::try_from_response(response));
        }
    }
}

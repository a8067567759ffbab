//! LE Direct Test Mode Commands
//!
//! These commands are for testing the radio of the controller. The default timeout of these
//! commands is the long command timeout of the [`Config`](crate::Config).

use tble_hci_util::codec::CodecError;

/// The largest radio frequency channel of a direct test
const MAX_CHANNEL: u8 = 0x27;

/// A radio frequency channel of a direct test
///
/// The frequency of the channel is `2402 + channel * 2` MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestChannel(u8);

impl TestChannel {
    pub fn new(channel: u8) -> Result<Self, CodecError> {
        if channel <= MAX_CHANNEL {
            Ok(TestChannel(channel))
        } else {
            Err(CodecError::InvalidArgument("test channel is larger than 0x27"))
        }
    }

    pub fn get_raw_val(&self) -> u8 {
        self.0
    }
}

/// Start a test where the controller receives test packets
pub mod receiver_test {
    use super::TestChannel;
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::ReceiverTest);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Parameter {
        pub rx_channel: TestChannel,
    }

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            vec![self.rx_channel.get_raw_val()]
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, rx_channel: TestChannel) -> Result<(), SendCommandError> {
        host.send_command(Parameter { rx_channel }).await
    }
}

/// Start a test where the controller transmits test packets
pub mod transmitter_test {
    use super::TestChannel;
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::TransmitterTest);

    /// The payload of the test packets
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub enum TestPayload {
        #[default]
        PseudoRandomBitSequence9,
        Pattern11110000,
        Pattern10101010,
        PseudoRandomBitSequence15,
        AllOnes,
        AllZeros,
        Pattern00001111,
        Pattern01010101,
    }

    impl TestPayload {
        fn val(&self) -> u8 {
            match *self {
                TestPayload::PseudoRandomBitSequence9 => 0x00,
                TestPayload::Pattern11110000 => 0x01,
                TestPayload::Pattern10101010 => 0x02,
                TestPayload::PseudoRandomBitSequence15 => 0x03,
                TestPayload::AllOnes => 0x04,
                TestPayload::AllZeros => 0x05,
                TestPayload::Pattern00001111 => 0x06,
                TestPayload::Pattern01010101 => 0x07,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Parameter {
        pub tx_channel: TestChannel,
        /// The length of the payload of each test packet
        pub length_of_test_data: u8,
        pub packet_payload: TestPayload,
    }

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            vec![
                self.tx_channel.get_raw_val(),
                self.length_of_test_data,
                self.packet_payload.val(),
            ]
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, parameter: Parameter) -> Result<(), SendCommandError> {
        host.send_command(parameter).await
    }
}

/// End the current test
pub mod test_end {
    use crate::commands::{expect_complete, return_u16, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::TestEnd);

    /// The return of the test end command
    ///
    /// The number of packets is only meaningful for a receiver test, it is zero for a transmitter
    /// test.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Return {
        pub number_of_packets: u16,
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Parameter;

    impl CommandParameter for Parameter {
        type Return = Return;

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            Vec::new()
        }

        fn try_from_response(response: CommandResponse) -> Result<Return, CommandError> {
            let parameter = expect_complete(response)?;

            let number_of_packets = return_u16(&parameter, 0)?;

            Ok(Return { number_of_packets })
        }
    }

    /// Send the command
    pub async fn send(host: &Host) -> Result<Return, SendCommandError> {
        host.send_command(Parameter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandParameter;
    use tble_hci_interface::correlator::CommandResponse;

    #[test]
    fn channel_range() {
        assert!(TestChannel::new(0x27).is_ok());
        assert!(TestChannel::new(0x28).is_err());
    }

    #[test]
    fn transmitter_parameter() {
        let parameter = transmitter_test::Parameter {
            tx_channel: TestChannel::new(0x13).unwrap(),
            length_of_test_data: 37,
            packet_payload: transmitter_test::TestPayload::AllZeros,
        };

        assert_eq!(vec![0x13, 37, 0x05], parameter.get_parameter());
    }

    #[test]
    fn received_packet_count() {
        let response = CommandResponse::Complete {
            opcode: 0x201F,
            return_parameter: vec![0x00, 0x10, 0x27],
        };

        assert_eq!(
            Ok(test_end::Return {
                number_of_packets: 10000
            }),
            test_end::Parameter::try_from_response(response)
        );
    }
}

//! Controller errors
//!
//! These are the status codes a controller returns within HCI events.

use core::fmt::{self, Display, Formatter};

macro_rules! controller_errors {
    ( $( $name:ident = $code:literal, $text:literal; )* ) => {
        /// A Controller Error
        ///
        /// `Error` is an enum of the controller error codes listed in volume one part F of the
        /// Bluetooth core specification. Status codes are converted into `Error` so that they can
        /// be printed by name.
        ///
        /// ### `NoError`
        /// The status code zero is not an error, it is the success status of HCI events.
        ///
        /// ### `Unknown`
        /// A controller can send a code that is not part of the Bluetooth Specification (a
        /// vendor specific code or just a bug). These codes are kept within `Unknown`.
        ///
        /// ### `MissingErrorCode`
        /// Used when an event parameter did not contain the status byte at all.
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Error {
            NoError,
            Unknown(u8),
            MissingErrorCode,
            $( $name, )*
        }

        impl Error {
            /// Get the status code
            ///
            /// `MissingErrorCode` has no status code so `None` is returned for it.
            pub fn get_code(&self) -> Option<u8> {
                match self {
                    Error::NoError => Some(0),
                    Error::Unknown(code) => Some(*code),
                    Error::MissingErrorCode => None,
                    $( Error::$name => Some($code), )*
                }
            }

            fn description(&self) -> &'static str {
                match self {
                    Error::NoError => "no error",
                    Error::Unknown(_) => "unknown error code",
                    Error::MissingErrorCode => "missing error code",
                    $( Error::$name => $text, )*
                }
            }
        }

        impl From<u8> for Error {
            fn from(raw: u8) -> Self {
                match raw {
                    0x00 => Error::NoError,
                    $( $code => Error::$name, )*
                    _ => Error::Unknown(raw),
                }
            }
        }
    };
}

controller_errors! {
    UnknownHciCommand = 0x01, "unknown HCI command";
    UnknownConnectionIdentifier = 0x02, "unknown connection identifier";
    HardwareFailure = 0x03, "hardware failure";
    PageTimeout = 0x04, "page timeout";
    AuthenticationFailure = 0x05, "authentication failure";
    PinOrKeyMissing = 0x06, "PIN or key missing";
    MemoryCapacityExceeded = 0x07, "memory capacity exceeded";
    ConnectionTimeout = 0x08, "connection timeout";
    ConnectionLimitExceeded = 0x09, "connection limit exceeded";
    SynchronousConnectionLimitToADeviceExceeded = 0x0a, "synchronous connection limit to a device exceeded";
    ConnectionAlreadyExists = 0x0b, "connection already exists";
    CommandDisallowed = 0x0c, "command disallowed";
    ConnectionRejectedDueToLimitedResources = 0x0d, "connection rejected due to limited resources";
    ConnectionRejectedDueToSecurityReasons = 0x0e, "connection rejected due to security reasons";
    ConnectionRejectedDueToUnacceptableBluetoothAddress = 0x0f, "connection rejected due to unacceptable bluetooth address";
    ConnectionAcceptTimeoutExceeded = 0x10, "connection accept timeout exceeded";
    UnsupportedFeatureOrParameterValue = 0x11, "unsupported feature or parameter value";
    InvalidHciCommandParameters = 0x12, "invalid HCI command parameters";
    RemoteUserTerminatedConnection = 0x13, "remote user terminated connection";
    RemoteDeviceTerminatedConnectionDueToLowResources = 0x14, "remote device terminated connection due to low resources";
    RemoteDeviceTerminatedConnectionDueToPowerOff = 0x15, "remote device terminated connection due to power off";
    ConnectionTerminatedByLocalHost = 0x16, "connection terminated by local host";
    RepeatedAttempts = 0x17, "repeated attempts";
    PairingNotAllowed = 0x18, "pairing not allowed";
    UnknownLmpPdu = 0x19, "unknown LMP PDU";
    UnsupportedRemoteFeature = 0x1a, "unsupported remote feature";
    InvalidLmpParametersOrInvalidLlParameters = 0x1e, "invalid LMP parameters / invalid LL parameters";
    UnspecifiedError = 0x1f, "unspecified error";
    UnsupportedLlParameterValue = 0x20, "unsupported LMP / LL parameter value";
    RoleChangeNotAllowed = 0x21, "role change not allowed";
    LlResponseTimeout = 0x22, "LMP response timeout / LL response timeout";
    LlProcedureCollision = 0x23, "LMP error transaction collision / LL procedure collision";
    LmpPduNotAllowed = 0x24, "LMP PDU not allowed";
    EncryptionModeNotAcceptable = 0x25, "encryption mode not acceptable";
    LinkKeyCannotBeChanged = 0x26, "link key cannot be changed";
    InstantPassed = 0x28, "instant passed";
    DifferentTransactionCollision = 0x2a, "different transaction collision";
    InsufficientSecurity = 0x2f, "insufficient security";
    ParameterOutOfMandatoryRange = 0x30, "parameter out of mandatory range";
    HostBusyPairing = 0x38, "host busy - pairing";
    ConnectionRejectedDueToNoSuitableChannelFound = 0x39, "connection rejected due to no suitable channel found";
    ControllerBusy = 0x3a, "controller busy";
    UnacceptableConnectionParameters = 0x3b, "unacceptable connection parameters";
    AdvertisingTimeout = 0x3c, "advertising timeout";
    ConnectionTerminatedDueToMicFailure = 0x3d, "connection terminated due to MIC failure";
    ConnectionFailedToBeEstablished = 0x3e, "connection failed to be established / synchronization timeout";
    UnknownAdvertisingIdentifier = 0x42, "unknown advertising identifier";
    LimitReached = 0x43, "limit reached";
    OperationCancelledByHost = 0x44, "operation cancelled by host";
    PacketTooLong = 0x45, "packet too long";
}

impl Error {
    /// Convert into a `Result`
    ///
    /// `Ok(())` is returned for `NoError`, otherwise `err` is called with the error.
    pub fn ok_or_else<F, E>(self, err: F) -> Result<(), E>
    where
        F: FnOnce(Self) -> E,
    {
        if let Error::NoError = self {
            Ok(())
        } else {
            Err(err(self))
        }
    }

    /// Check if this is the success status
    pub fn is_ok(&self) -> bool {
        matches!(self, Error::NoError)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.get_code() {
            Some(code) => write!(f, "{} (0x{:02X})", self.description(), code),
            None => f.write_str(self.description()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::NoError | Error::MissingErrorCode => f.write_str(self.description()),
            Error::Unknown(code) => write!(f, "unknown error code 0x{:X}", code),
            _ => write!(f, "controller error: {}", self.description()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_conversion() {
        assert_eq!(Error::NoError, Error::from(0));
        assert_eq!(Error::CommandDisallowed, Error::from(0x0c));
        assert_eq!(Error::Unknown(0xFE), Error::from(0xFE));

        assert_eq!(Some(0x3b), Error::UnacceptableConnectionParameters.get_code());
        assert_eq!(None, Error::MissingErrorCode.get_code());
    }

    #[test]
    fn ok_or_else() {
        assert!(Error::NoError.ok_or_else(|e| e).is_ok());
        assert_eq!(Err(Error::ControllerBusy), Error::ControllerBusy.ok_or_else(|e| e));
    }
}

//! Parameter types of the LE commands
//!
//! These are the types used for building the parameters of the LE advertising, scanning, and
//! connection commands.

use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

/// The address type used by this device for advertising, scanning, and initiating
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum OwnAddressType {
    #[default]
    PublicDeviceAddress,
    RandomDeviceAddress,
    RpaFromLocalIrkOrPublicAddress,
    RpaFromLocalIrkOrRandomAddress,
}

impl OwnAddressType {
    pub fn get_raw_val(self) -> u8 {
        match self {
            OwnAddressType::PublicDeviceAddress => 0x00,
            OwnAddressType::RandomDeviceAddress => 0x01,
            OwnAddressType::RpaFromLocalIrkOrPublicAddress => 0x02,
            OwnAddressType::RpaFromLocalIrkOrRandomAddress => 0x03,
        }
    }
}

/// The address type of a peer device
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum PeerAddressType {
    #[default]
    PublicAddress,
    RandomAddress,
}

impl PeerAddressType {
    pub fn get_raw_val(self) -> u8 {
        match self {
            PeerAddressType::PublicAddress => 0x00,
            PeerAddressType::RandomAddress => 0x01,
        }
    }
}

/// The type of advertising
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AdvertisingType {
    /// Connectable and scannable undirected advertising
    #[default]
    ConnectableAndScannableUndirected,
    /// Connectable high duty cycle directed advertising
    ConnectableHighDutyCycleDirected,
    ScannableUndirected,
    NonConnectableUndirected,
    ConnectableLowDutyCycleDirected,
}

impl AdvertisingType {
    pub fn get_raw_val(self) -> u8 {
        match self {
            AdvertisingType::ConnectableAndScannableUndirected => 0x00,
            AdvertisingType::ConnectableHighDutyCycleDirected => 0x01,
            AdvertisingType::ScannableUndirected => 0x02,
            AdvertisingType::NonConnectableUndirected => 0x03,
            AdvertisingType::ConnectableLowDutyCycleDirected => 0x04,
        }
    }

    /// Check if a connection can be established from this type of advertising
    pub fn is_connectable(self) -> bool {
        matches!(
            self,
            AdvertisingType::ConnectableAndScannableUndirected
                | AdvertisingType::ConnectableHighDutyCycleDirected
                | AdvertisingType::ConnectableLowDutyCycleDirected
        )
    }
}

/// The advertising channels used for advertising
///
/// The default is to use all three channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AdvertisingChannelMap {
    pub channel_37: bool,
    pub channel_38: bool,
    pub channel_39: bool,
}

impl AdvertisingChannelMap {
    pub fn get_raw_val(self) -> u8 {
        (self.channel_37 as u8) | (self.channel_38 as u8) << 1 | (self.channel_39 as u8) << 2
    }
}

impl Default for AdvertisingChannelMap {
    fn default() -> Self {
        AdvertisingChannelMap {
            channel_37: true,
            channel_38: true,
            channel_39: true,
        }
    }
}

/// Filter policy for advertising
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AdvertisingFilterPolicy {
    #[default]
    AllDevices,
    FilterScanRequests,
    FilterConnectionRequests,
    FilterBoth,
}

impl AdvertisingFilterPolicy {
    pub fn get_raw_val(self) -> u8 {
        match self {
            AdvertisingFilterPolicy::AllDevices => 0x00,
            AdvertisingFilterPolicy::FilterScanRequests => 0x01,
            AdvertisingFilterPolicy::FilterConnectionRequests => 0x02,
            AdvertisingFilterPolicy::FilterBoth => 0x03,
        }
    }
}

/// The type of scanning
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ScanType {
    /// No scan requests are sent
    #[default]
    PassiveScanning,
    /// Scan requests may be sent
    ActiveScanning,
}

impl ScanType {
    pub fn get_raw_val(self) -> u8 {
        match self {
            ScanType::PassiveScanning => 0x00,
            ScanType::ActiveScanning => 0x01,
        }
    }
}

/// Filter policy for scanning
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum ScanningFilterPolicy {
    #[default]
    AcceptAll,
    FilterListOnly,
}

impl ScanningFilterPolicy {
    pub fn get_raw_val(self) -> u8 {
        match self {
            ScanningFilterPolicy::AcceptAll => 0x00,
            ScanningFilterPolicy::FilterListOnly => 0x01,
        }
    }
}

/// Error for an interval out of its valid range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalError {
    pub name: &'static str,
    pub low: u16,
    pub high: u16,
}

impl fmt::Display for IntervalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} is out of range, the raw value must be within {:#x}..={:#x}",
            self.name, self.low, self.high
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IntervalError {}

/// Create an interval type
///
/// The interval is a raw `u16` bounded by `$raw_low..=$raw_high`, each unit is `$micros`
/// microseconds.
macro_rules! interval {
    ( $(#[$doc:meta])* $name:ident, $raw_low:literal ..= $raw_high:literal, default $raw_default:literal, $micros:literal us ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            interval: u16,
        }

        impl $name {
            pub const MIN: u16 = $raw_low;
            pub const MAX: u16 = $raw_high;
            const MICROS_PER_UNIT: u64 = $micros;

            const ERROR: IntervalError = IntervalError {
                name: core::stringify!($name),
                low: $raw_low,
                high: $raw_high,
            };

            /// Try to create from a raw value
            pub fn try_from_raw(raw: u16) -> Result<Self, IntervalError> {
                if (Self::MIN..=Self::MAX).contains(&raw) {
                    Ok($name { interval: raw })
                } else {
                    Err(Self::ERROR)
                }
            }

            /// Try to create from a `Duration`
            ///
            /// The duration is rounded down to the unit of the interval.
            pub fn try_from_duration(duration: Duration) -> Result<Self, IntervalError> {
                let units = duration.as_micros() / Self::MICROS_PER_UNIT as u128;

                u16::try_from(units)
                    .map_err(|_| Self::ERROR)
                    .and_then(Self::try_from_raw)
            }

            pub fn get_raw_val(&self) -> u16 {
                self.interval
            }

            pub fn get_duration(&self) -> Duration {
                Duration::from_micros(self.interval as u64 * Self::MICROS_PER_UNIT)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name { interval: $raw_default }
            }
        }

        impl TryFrom<Duration> for $name {
            type Error = IntervalError;

            fn try_from(duration: Duration) -> Result<Self, Self::Error> {
                Self::try_from_duration(duration)
            }
        }
    };
}

interval!(
    /// The interval between advertising events
    AdvertisingInterval, 0x0020..=0x4000, default 0x0800, 625 us
);

interval!(
    /// The interval between the start of two consecutive scan windows
    ScanningInterval, 0x0004..=0x4000, default 0x0010, 625 us
);

interval!(
    /// The duration of a scan window
    ScanningWindow, 0x0004..=0x4000, default 0x0010, 625 us
);

interval!(
    /// The interval between connection events
    ConnectionInterval, 0x0006..=0x0C80, default 0x0028, 1250 us
);

interval!(
    /// The supervision timeout of a connection
    SupervisionTimeout, 0x000A..=0x0C80, default 0x00C8, 10000 us
);

/// Advertising data (or scan response data)
///
/// Legacy advertising data is at most 31 bytes. Within the parameter of the LE Set Advertising
/// Data (and LE Set Scan Response Data) command the data is always a 31 byte field preceded by
/// the length of the significant part, the unused part of the field is zeroed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisingData {
    data: Vec<u8>,
}

impl AdvertisingData {
    /// The maximum size of the advertising data
    pub const MAX_LEN: usize = 31;

    /// Create new advertising data
    ///
    /// # Error
    /// `data` is longer than [`MAX_LEN`](AdvertisingData::MAX_LEN). The data is never truncated.
    pub fn new<T>(data: T) -> Result<Self, crate::codec::CodecError>
    where
        T: Into<Vec<u8>>,
    {
        let data = data.into();

        if data.len() > Self::MAX_LEN {
            Err(crate::codec::CodecError::InvalidArgument(
                "advertising data is longer than 31 bytes",
            ))
        } else {
            Ok(AdvertisingData { data })
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get the command parameter
    ///
    /// This is the length followed by the zero padded 31 byte window.
    pub fn to_parameter(&self) -> [u8; 1 + Self::MAX_LEN] {
        let mut parameter = [0u8; 1 + Self::MAX_LEN];

        parameter[0] = self.data.len() as u8;

        parameter[1..=self.data.len()].copy_from_slice(&self.data);

        parameter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;

    #[test]
    fn advertising_data_window() {
        let data = AdvertisingData::new([0x02u8, 0x01, 0x06]).unwrap();

        let parameter = data.to_parameter();

        assert_eq!(32, parameter.len());
        assert_eq!([0x03, 0x02, 0x01, 0x06], parameter[..4]);
        assert!(parameter[4..].iter().all(|b| *b == 0));

        assert_eq!(31, AdvertisingData::new([0xAAu8; 31]).unwrap().to_parameter()[0]);
    }

    #[test]
    fn advertising_data_too_long() {
        assert!(matches!(
            AdvertisingData::new([0u8; 32]),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn intervals() {
        assert!(AdvertisingInterval::try_from_raw(0x1F).is_err());
        assert!(AdvertisingInterval::try_from_raw(0x4001).is_err());

        let interval = AdvertisingInterval::try_from_duration(Duration::from_millis(100)).unwrap();

        assert_eq!(160, interval.get_raw_val());
        assert_eq!(Duration::from_millis(100), interval.get_duration());

        assert_eq!(
            Err(IntervalError {
                name: "ConnectionInterval",
                low: 0x6,
                high: 0xC80
            }),
            ConnectionInterval::try_from_duration(Duration::from_secs(5))
        );

        assert!(ConnectionInterval::try_from_duration(Duration::from_secs(u64::MAX / 2)).is_err());
    }

    #[test]
    fn channel_map() {
        assert_eq!(0x7, AdvertisingChannelMap::default().get_raw_val());
    }
}

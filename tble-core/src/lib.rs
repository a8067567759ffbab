//! Core types shared by the `tble` crates
//!
//! This contains the items that are not specific to any one layer of the stack, such as the
//! controller status codes and the Bluetooth device address.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod errors;

use core::fmt;

/// A Bluetooth device address
///
/// The address is stored in the order it is transferred over the HCI (little endian), so the
/// first byte is the least significant byte of the address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BluetoothDeviceAddress(pub [u8; 6]);

impl BluetoothDeviceAddress {
    /// The number of bytes of a Bluetooth device address
    pub const LEN: usize = 6;

    /// Create a `BluetoothDeviceAddress` from a slice
    ///
    /// `None` is returned if `slice` is not exactly six bytes.
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        let mut address = [0u8; 6];

        (slice.len() == Self::LEN).then(|| {
            address.copy_from_slice(slice);

            BluetoothDeviceAddress(address)
        })
    }
}

impl From<[u8; 6]> for BluetoothDeviceAddress {
    fn from(address: [u8; 6]) -> Self {
        BluetoothDeviceAddress(address)
    }
}

impl AsRef<[u8]> for BluetoothDeviceAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BluetoothDeviceAddress {
    /// Addresses are displayed most significant byte first (the way they are printed on devices)
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let a = &self.0;

        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )
    }
}

impl fmt::Debug for BluetoothDeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

//! A Bluetooth Low Energy Host Controller Interface
//!
//! tble is the host side of the HCI. It frames and decodes what the controller sends over a byte
//! stream transport, keeps the commands sent to the controller in order, tracks the state of the
//! advertiser, scanner, initiator, and connections, and reassembles the ACL data of connections.
//!
//! The primary way of interfacing to the controller is through the [`Host`] in [`hci`]. A host is
//! created from a [`Transport`](hci::Transport) and is driven by its [`Driver`](hci::Driver).
//!
//! ```no_run
//! # async fn example(transport: tokio::io::DuplexStream) {
//! use futures::StreamExt;
//! use tble::hci::{Config, Host, HostEvent};
//!
//! let (host, driver) = Host::new(transport, Config::default());
//!
//! tokio::spawn(driver.run());
//!
//! let mut events = host.subscribe();
//!
//! host.init().await.unwrap();
//!
//! while let Some(event) = events.next().await {
//!     if let HostEvent::Connected(info) = event {
//!         println!("connected to {}", info.peer_address);
//!     }
//! }
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use tble_core::{errors, BluetoothDeviceAddress};

/// The Host Controller Interface
pub mod hci {
    #[doc(inline)]
    pub use tble_hci_host::*;

    /// Packet codecs and event parameters
    #[doc(inline)]
    pub use tble_hci_util as util;

    /// Framing, reassembly, transport, and command correlation
    #[doc(inline)]
    pub use tble_hci_interface as interface;
}

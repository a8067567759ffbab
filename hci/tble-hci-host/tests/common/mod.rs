//! A simulated controller on the other end of a duplex pipe

#![allow(dead_code)]

use futures::{FutureExt, StreamExt};
use tble_hci_host::{Config, DriverError, EventStream, Host, HostEvent};
use tble_hci_interface::framing::Framed;
use tble_hci_interface::transport::{split, PacketReader, PacketWriter};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

pub const RESET: u16 = 0x0C03;
pub const SET_EVENT_MASK: u16 = 0x0C01;
pub const READ_BD_ADDR: u16 = 0x1009;
pub const DISCONNECT: u16 = 0x0406;
pub const LE_SET_EVENT_MASK: u16 = 0x2001;
pub const LE_READ_BUFFER_SIZE: u16 = 0x2002;
pub const LE_SET_ADVERTISING_PARAMETERS: u16 = 0x2006;
pub const LE_SET_ADVERTISING_ENABLE: u16 = 0x200A;
pub const LE_SET_SCAN_PARAMETERS: u16 = 0x200B;
pub const LE_SET_SCAN_ENABLE: u16 = 0x200C;
pub const LE_CREATE_CONNECTION: u16 = 0x200D;
pub const LE_CREATE_CONNECTION_CANCEL: u16 = 0x200E;

pub const PEER_ADDRESS: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

pub fn init_logging() {
    // only the first test to initialize the logger succeeds
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Trace, simplelog::Config::default());
}

/// Create a host with a spawned driver and the controller at the other end of its transport
pub fn new(config: Config) -> (Host, Controller, JoinHandle<Result<(), DriverError>>) {
    init_logging();

    let (host_end, controller_end) = tokio::io::duplex(1024);

    let (host, driver) = Host::new(host_end, config);

    let driver = tokio::spawn(driver.run());

    let (reader, writer) = split(controller_end);

    (host, Controller { reader, writer }, driver)
}

/// Get the next event when one was already produced
pub fn try_next_event(events: &mut EventStream) -> Option<HostEvent> {
    events.next().now_or_never().flatten()
}

pub struct Controller {
    reader: PacketReader<ReadHalf<DuplexStream>>,
    writer: PacketWriter<WriteHalf<DuplexStream>>,
}

impl Controller {
    /// Read the next packet sent by the host
    pub async fn next(&mut self) -> Vec<u8> {
        match self.reader.next().await {
            Ok(Framed::Packet(packet)) => packet,
            other => panic!("expected a packet from the host, got {:?}", other.map_err(|e| e.to_string())),
        }
    }

    /// Read a command sent by the host and return its parameter
    pub async fn expect_command(&mut self, opcode: u16) -> Vec<u8> {
        let packet = self.next().await;

        assert_eq!(0x01, packet[0], "not a command packet: {:x?}", packet);

        assert_eq!(
            opcode,
            u16::from_le_bytes([packet[1], packet[2]]),
            "unexpected command: {:x?}",
            packet
        );

        assert_eq!(packet[3] as usize, packet.len() - 4);

        packet[4..].to_vec()
    }

    /// Read an ACL data packet sent by the host and return its header and payload
    pub async fn expect_acl(&mut self) -> (u16, Vec<u8>) {
        let packet = self.next().await;

        assert_eq!(0x02, packet[0], "not an ACL data packet: {:x?}", packet);

        let header = u16::from_le_bytes([packet[1], packet[2]]);

        let len = u16::from_le_bytes([packet[3], packet[4]]) as usize;

        assert_eq!(len, packet.len() - 5);

        (header, packet[5..].to_vec())
    }

    pub async fn write(&mut self, bytes: &[u8]) {
        self.writer.send(bytes).await.unwrap()
    }

    pub async fn event(&mut self, code: u8, parameter: &[u8]) {
        let mut packet = vec![0x04, code, parameter.len() as u8];

        packet.extend_from_slice(parameter);

        self.write(&packet).await
    }

    pub async fn command_complete(&mut self, opcode: u16, return_parameter: &[u8]) {
        let [o0, o1] = opcode.to_le_bytes();

        let mut parameter = vec![0x01, o0, o1];

        parameter.extend_from_slice(return_parameter);

        self.event(0x0E, &parameter).await
    }

    pub async fn command_status(&mut self, opcode: u16, status: u8) {
        let [o0, o1] = opcode.to_le_bytes();

        self.event(0x0F, &[status, 0x01, o0, o1]).await
    }

    /// Expect a command and respond to it with a Command Complete event
    pub async fn complete(&mut self, opcode: u16, return_parameter: &[u8]) -> Vec<u8> {
        let parameter = self.expect_command(opcode).await;

        self.command_complete(opcode, return_parameter).await;

        parameter
    }

    /// Expect a command and respond to it with a Command Status event
    pub async fn status(&mut self, opcode: u16, status: u8) -> Vec<u8> {
        let parameter = self.expect_command(opcode).await;

        self.command_status(opcode, status).await;

        parameter
    }

    /// Send a LE Connection Complete event
    ///
    /// Input `role` is zero for central and one for peripheral.
    pub async fn le_connection_complete(&mut self, status: u8, handle: u16, role: u8) {
        let [h0, h1] = handle.to_le_bytes();

        let mut parameter = vec![0x01, status, h0, h1, role, 0x00];

        parameter.extend_from_slice(&PEER_ADDRESS);

        // interval, latency, supervision timeout, and clock accuracy
        parameter.extend_from_slice(&[0x18, 0x00, 0x00, 0x00, 0x48, 0x00, 0x00]);

        self.event(0x3E, &parameter).await
    }

    pub async fn disconnection_complete(&mut self, status: u8, handle: u16, reason: u8) {
        let [h0, h1] = handle.to_le_bytes();

        self.event(0x05, &[status, h0, h1, reason]).await
    }

    pub async fn hardware_error(&mut self, code: u8) {
        self.event(0x10, &[code]).await
    }

    /// Send ACL data
    ///
    /// Input `boundary` is the raw packet boundary flag.
    pub async fn acl(&mut self, handle: u16, boundary: u16, payload: &[u8]) {
        let [h0, h1] = (handle | boundary << 12).to_le_bytes();

        let [l0, l1] = (payload.len() as u16).to_le_bytes();

        let mut packet = vec![0x02, h0, h1, l0, l1];

        packet.extend_from_slice(payload);

        self.write(&packet).await
    }
}

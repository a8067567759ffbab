//! The transport between the host and the controller
//!
//! The host only needs a byte stream to the controller. Anything that implements the `AsyncRead`
//! and `AsyncWrite` traits of tokio is a [`Transport`], for example a serial port or, for tests,
//! one end of a [`tokio::io::duplex`] pipe with a simulated controller on the other end.
//!
//! The stream is split into a [`PacketReader`] which frames the received bytes into HCI packets
//! and a [`PacketWriter`] which writes complete packets. A read of zero bytes (the end of the
//! stream) or any I/O error means the transport is closed.

use crate::framing::{Framed, PacketFramer};
use std::collections::VecDeque;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// A byte stream transport to a controller
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Split a transport into its reading and writing ends
pub fn split<T: Transport>(transport: T) -> (PacketReader<ReadHalf<T>>, PacketWriter<WriteHalf<T>>) {
    let (reader, writer) = tokio::io::split(transport);

    (PacketReader::new(reader), PacketWriter::new(writer))
}

/// Error of a transport
#[derive(Debug)]
pub enum TransportError {
    /// The other end closed the transport
    Closed,
    Io(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Closed => f.write_str("transport closed"),
            TransportError::Io(e) => write!(f, "transport I/O error, {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Closed => None,
            TransportError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Reads HCI packets from a byte stream
pub struct PacketReader<R> {
    reader: R,
    framer: PacketFramer,
    framed: VecDeque<Framed>,
    buffer: Box<[u8]>,
}

impl<R> PacketReader<R>
where
    R: AsyncRead + Unpin,
{
    const READ_SIZE: usize = 512;

    pub fn new(reader: R) -> Self {
        PacketReader {
            reader,
            framer: PacketFramer::new(),
            framed: VecDeque::new(),
            buffer: vec![0u8; Self::READ_SIZE].into_boxed_slice(),
        }
    }

    /// Read the next packet
    ///
    /// This method is cancel safe, if the returned future is dropped before it completes no
    /// received data is lost.
    pub async fn next(&mut self) -> Result<Framed, TransportError> {
        loop {
            if let Some(framed) = self.framed.pop_front() {
                return Ok(framed);
            }

            let len = self.reader.read(&mut self.buffer).await?;

            if len == 0 {
                if self.framer.is_partial() {
                    log::warn!("(HCI) transport closed with a partially received packet");
                }

                return Err(TransportError::Closed);
            }

            log::trace!("(HCI) received bytes {:x?}", &self.buffer[..len]);

            for byte in &self.buffer[..len] {
                if let Some(framed) = self.framer.add(*byte) {
                    self.framed.push_back(framed)
                }
            }
        }
    }
}

/// Writes HCI packets to a byte stream
pub struct PacketWriter<W> {
    writer: W,
}

impl<W> PacketWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        PacketWriter { writer }
    }

    /// Write a complete packet
    ///
    /// The packet must start with the packet indicator.
    pub async fn send(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        log::trace!("(HCI) sending bytes {:x?}", packet);

        self.writer.write_all(packet).await?;

        self.writer.flush().await?;

        Ok(())
    }

    /// Shut down the writing end of the transport
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await.map_err(TransportError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn packets_across_reads() {
        let mock = Builder::new()
            .read(&[0x04, 0x0E])
            .read(&[0x04, 0x01, 0x03, 0x0C, 0x00, 0x04])
            .read(&[0x10, 0x01, 0x05])
            .build();

        let mut reader = PacketReader::new(mock);

        assert_eq!(
            Framed::Packet(vec![0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]),
            reader.next().await.unwrap()
        );

        assert_eq!(Framed::Packet(vec![0x04, 0x10, 0x01, 0x05]), reader.next().await.unwrap());

        assert!(matches!(reader.next().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn write_packet() {
        let mock = Builder::new().write(&[0x01, 0x03, 0x0C, 0x00]).build();

        let mut writer = PacketWriter::new(mock);

        writer.send(&[0x01, 0x03, 0x0C, 0x00]).await.unwrap();
    }

    #[tokio::test]
    async fn duplex_transport() {
        let (host_end, mut controller_end) = tokio::io::duplex(64);

        let (mut reader, mut writer) = split(host_end);

        writer.send(&[0x01, 0x03, 0x0C, 0x00]).await.unwrap();

        let mut received = [0u8; 4];

        controller_end.read_exact(&mut received).await.unwrap();

        assert_eq!([0x01, 0x03, 0x0C, 0x00], received);

        controller_end.write_all(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]).await.unwrap();

        assert_eq!(
            Framed::Packet(vec![0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]),
            reader.next().await.unwrap()
        );

        drop(controller_end);

        assert!(matches!(reader.next().await, Err(TransportError::Closed)));
    }
}

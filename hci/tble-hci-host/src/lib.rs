//! The Host Interface to the Controller
//!
//! This is the implementation of the host of the Host Controller Interface. It's purpose is to
//! function and control the Bluetooth controller. The host is broken into two parts, the [`Host`]
//! which is used by the application and the [`Driver`] which is the task that owns the transport
//! to the controller.
//!
//! ```no_run
//! # async fn example(transport: tokio::io::DuplexStream) {
//! use tble_hci_host::{Config, Host};
//!
//! let (host, driver) = Host::new(transport, Config::default());
//!
//! tokio::spawn(driver.run());
//!
//! host.init().await.unwrap();
//! # }
//! ```
//!
//! ## Commands
//! Commands are located within the module [`commands`]. Commands are organized by modules in the
//! form of "tble_hci_host::commands::*command_group*::*command*". Only a single command is ever
//! waiting on the controller, commands submitted while a command is waiting are queued and sent
//! in the order they were submitted.
//!
//! ## Events
//! Everything the controller reports is given to the application as a [`HostEvent`] through an
//! [`EventStream`] created by [`Host::subscribe`].
//!
//! ## Connections
//! Data is sent and received over a connection with a [`Connection`]. A `Connection` is taken
//! from the host with [`Host::connection`] after the host reported it as connected.

pub mod commands;
mod config;
mod connection;
mod driver;
pub mod link;
mod stream;

pub use config::Config;
pub use connection::{Connection, ConnectionError};
pub use driver::{Driver, DriverError};
pub use stream::{Diagnostic, EventStream, HostEvent};
pub use tble_hci_interface::correlator::{CancelError, CommandError, CommandId, CommandResponse};
pub use tble_hci_interface::reassembler::ReassemblyError;
pub use tble_hci_interface::transport::Transport;
pub use tble_hci_util::codec::CodecError;
pub use tble_hci_util::{errors, le, opcodes, BluetoothDeviceAddress, ConnectionHandle};

use commands::CommandParameter;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use link::{ConnectionInfo, LinkEffect, LinkRole, LinkStates};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tble_hci_interface::correlator::{Busy, CommandResult, Correlator};
use tble_hci_util::codec::HciPacket;
use tble_hci_util::events::{Events, LeMeta};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::time::Instant;

/// Lock a mutex
///
/// A panic while holding one of the locks of the host cannot leave the state half updated, so a
/// poisoned lock is still used.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A message to the driver
pub(crate) enum Outbound {
    /// A complete packet to write to the transport
    Packet(Vec<u8>),
    /// Shut down the transport
    Close,
}

/// The data channel ends of a connection
pub(crate) struct ConnectionEnds {
    sender: mpsc::UnboundedSender<Result<Vec<u8>, ReassemblyError>>,
    /// Taken by [`Host::connection`]
    receiver: Option<mpsc::UnboundedReceiver<Result<Vec<u8>, ReassemblyError>>>,
}

impl ConnectionEnds {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        ConnectionEnds {
            sender,
            receiver: Some(receiver),
        }
    }
}

/// The state shared between the host and the driver
///
/// The locks are always taken in the order correlator, links, connections.
pub(crate) struct Shared {
    config: Config,
    correlator: Mutex<Correlator<LinkEffect>>,
    links: Mutex<LinkStates>,
    connections: Mutex<HashMap<ConnectionHandle, ConnectionEnds>>,
    /// Set to `None` once the driver exits
    events: Mutex<Option<broadcast::Sender<HostEvent>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    /// Woken when a command is submitted so the driver updates its timer
    deadline_changed: Notify,
    max_acl_data_length: AtomicUsize,
}

impl Shared {
    fn correlator(&self) -> MutexGuard<'_, Correlator<LinkEffect>> {
        lock(&self.correlator)
    }

    fn links(&self) -> MutexGuard<'_, LinkStates> {
        lock(&self.links)
    }

    fn connections(&self) -> MutexGuard<'_, HashMap<ConnectionHandle, ConnectionEnds>> {
        lock(&self.connections)
    }

    fn is_closed(&self) -> bool {
        lock(&self.events).is_none()
    }

    fn emit(&self, event: HostEvent) {
        log::trace!("(HCI) host event {:?}", event);

        if let Some(sender) = lock(&self.events).as_ref() {
            // an error only means there are no subscribers
            let _ = sender.send(event);
        }
    }

    fn emit_all<I: IntoIterator<Item = HostEvent>>(&self, events: I) {
        events.into_iter().for_each(|event| self.emit(event))
    }

    fn send_outbound(&self, packet: Vec<u8>) -> Result<(), SubmitError> {
        self.outbound
            .send(Outbound::Packet(packet))
            .map_err(|_| SubmitError::Closed)
    }
}

/// Error for submitting a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The command queue is full
    Busy,
    /// The command could not be encoded
    Codec(CodecError),
    /// The host is closed
    Closed,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubmitError::Busy => fmt::Display::fmt(&Busy, f),
            SubmitError::Codec(e) => write!(f, "invalid command, {}", e),
            SubmitError::Closed => f.write_str("host is closed"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<Busy> for SubmitError {
    fn from(_: Busy) -> Self {
        SubmitError::Busy
    }
}

impl From<CodecError> for SubmitError {
    fn from(e: CodecError) -> Self {
        SubmitError::Codec(e)
    }
}

/// Error returned by [`Host::send_command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendCommandError {
    /// The command was not submitted
    Submit(SubmitError),
    /// The command was submitted but it failed
    Command(CommandError),
}

impl fmt::Display for SendCommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SendCommandError::Submit(e) => fmt::Display::fmt(e, f),
            SendCommandError::Command(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for SendCommandError {}

impl From<SubmitError> for SendCommandError {
    fn from(e: SubmitError) -> Self {
        SendCommandError::Submit(e)
    }
}

impl From<CommandError> for SendCommandError {
    fn from(e: CommandError) -> Self {
        SendCommandError::Command(e)
    }
}

/// The host interface
///
/// This is used by the application to interact with the Bluetooth Controller. Its purpose is to
/// send commands, give out the events of the controller, and hand out the connections.
///
/// A `Host` is cheap to clone, every clone refers to the same controller.
#[derive(Clone)]
pub struct Host {
    shared: Arc<Shared>,
}

impl Host {
    /// Create a new host
    ///
    /// The returned [`Driver`] must be run (normally by spawning [`Driver::run`]) for anything to
    /// be sent to or received from the controller.
    pub fn new<T: Transport>(transport: T, config: Config) -> (Host, Driver<T>) {
        let (outbound, outbound_receiver) = mpsc::unbounded_channel();

        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let shared = Arc::new(Shared {
            correlator: Mutex::new(Correlator::new(config.max_queued_commands)),
            links: Mutex::new(LinkStates::new()),
            connections: Mutex::new(HashMap::new()),
            events: Mutex::new(Some(events)),
            outbound,
            deadline_changed: Notify::new(),
            max_acl_data_length: AtomicUsize::new(config.max_acl_data_length.max(1)),
            config,
        });

        let driver = Driver::new(transport, outbound_receiver, shared.clone());

        (Host { shared }, driver)
    }

    pub fn get_config(&self) -> &Config {
        &self.shared.config
    }

    /// Submit a command
    ///
    /// The command is sent to the controller right away if no other command is waiting on the
    /// controller, otherwise it is queued. The returned `PendingCommand` is a future for the
    /// result of the command, dropping it before the command is sent cancels the command.
    ///
    /// # Error
    /// * `Busy` if the command queue is full.
    /// * `Codec` if the command parameter is too large.
    /// * `Closed` if the driver has exited.
    pub fn submit<C>(&self, command: C, timeout: Duration) -> Result<PendingCommand<C::Return>, SubmitError>
    where
        C: CommandParameter,
    {
        let hci_command = command.get_command();

        let packet = HciPacket::Command(command.as_command_packet()?).encode();

        let mut correlator = self.shared.correlator();

        // checked while holding the lock of the correlator as the driver aborts
        // every command under the same lock when it exits
        if self.shared.is_closed() {
            return Err(SubmitError::Closed);
        }

        let (id, receiver) = correlator.submit(
            hci_command.into_opcode(),
            packet,
            timeout,
            command.link_effect(),
            Instant::now(),
        )?;

        log::debug!("(HCI) submitted command {} ({})", id, hci_command);

        if let Some(packet) = correlator.next_dispatch() {
            if let Err(e) = self.shared.send_outbound(packet) {
                correlator.abort_in_flight(CommandError::Closed);

                return Err(e);
            }
        }

        drop(correlator);

        self.shared.deadline_changed.notify_one();

        Ok(PendingCommand {
            id,
            receiver,
            convert: C::try_from_response,
            shared: self.shared.clone(),
            finished: false,
        })
    }

    /// Send a command and await its result
    ///
    /// The command is sent with the default timeout for it within the configuration.
    pub async fn send_command<C>(&self, command: C) -> Result<C::Return, SendCommandError>
    where
        C: CommandParameter,
    {
        let timeout = self.shared.config.timeout_for(command.get_command());

        Ok(self.submit(command, timeout)?.await?)
    }

    /// Initialize the controller
    ///
    /// This resets the controller, reads the size of its LE ACL data buffers, and enables the
    /// events used by the host. The maximum size of ACL data sent to the controller is updated
    /// with the buffer size of the controller.
    pub async fn init(&self) -> Result<(), SendCommandError> {
        commands::cb::reset::send(self).await?;

        let buffer_size = commands::le::read_buffer_size::send(self).await?;

        if buffer_size.len != 0 {
            log::info!("(HCI) controller LE ACL data length is {}", buffer_size.len);

            self.shared
                .max_acl_data_length
                .store(buffer_size.len.into(), Ordering::Relaxed);
        } else {
            log::info!(
                "(HCI) controller has no LE ACL data buffers, keeping the ACL data length of {}",
                self.max_acl_data_length()
            );
        }

        commands::cb::set_event_mask::send(
            self,
            &[
                Events::DisconnectionComplete,
                Events::HardwareError,
                Events::DataBufferOverflow,
                Events::LeMeta(LeMeta::ConnectionComplete),
            ],
        )
        .await?;

        commands::le::set_event_mask::send(
            self,
            &[
                LeMeta::ConnectionComplete,
                LeMeta::AdvertisingReport,
                LeMeta::ConnectionUpdateComplete,
            ],
        )
        .await?;

        Ok(())
    }

    /// Subscribe to the events of the host
    ///
    /// The returned stream starts with the next event. Every subscriber gets every event.
    pub fn subscribe(&self) -> EventStream {
        let receiver = match lock(&self.shared.events).as_ref() {
            Some(sender) => sender.subscribe(),
            // the sender is dropped right away so the stream ends
            None => broadcast::channel(1).1,
        };

        EventStream::new(receiver)
    }

    /// Take the data ends of a connection
    ///
    /// `None` is returned if there is no open connection with `handle` or if the `Connection`
    /// was already taken. Data received on a connection before it is taken is buffered.
    pub fn connection(&self, handle: ConnectionHandle) -> Option<Connection> {
        let receiver = self.shared.connections().get_mut(&handle)?.receiver.take()?;

        Some(Connection::new(handle, receiver, self.clone()))
    }

    /// Get the state of the advertiser
    pub fn advertiser_state(&self) -> LinkRole {
        self.shared.links().advertiser()
    }

    /// Get the state of the scanner
    pub fn scanner_state(&self) -> LinkRole {
        self.shared.links().scanner()
    }

    /// Get the state of the initiator
    pub fn initiator_state(&self) -> LinkRole {
        self.shared.links().initiator()
    }

    /// Get the state of a connection
    ///
    /// `None` is returned if there is no connection with `handle`.
    pub fn link_state(&self, handle: ConnectionHandle) -> Option<LinkRole> {
        self.shared.links().connection(handle)
    }

    /// Get the information of every open connection
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let links = self.shared.links();

        links
            .handles()
            .filter_map(|handle| links.connection_info(handle).cloned())
            .collect()
    }

    /// Get the maximum payload size of the ACL data packets sent to the controller
    pub fn max_acl_data_length(&self) -> usize {
        self.shared.max_acl_data_length.load(Ordering::Relaxed)
    }

    /// Check if the driver has exited
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Close the host
    ///
    /// This tells the driver to shut down the transport and exit. Every pending command is
    /// resolved with [`CommandError::Closed`].
    pub fn close(&self) {
        log::info!("(HCI) closing the host");

        // the driver has already exited if this fails
        let _ = self.shared.outbound.send(Outbound::Close);
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Host")
            .field("correlator", &*self.shared.correlator())
            .field("links", &*self.shared.links())
            .finish()
    }
}

/// A submitted command
///
/// This is a future for the result of the command. Dropping a `PendingCommand` before the
/// command was sent to the controller cancels the command.
pub struct PendingCommand<R> {
    id: CommandId,
    receiver: oneshot::Receiver<CommandResult>,
    convert: fn(CommandResponse) -> Result<R, CommandError>,
    shared: Arc<Shared>,
    finished: bool,
}

impl<R> PendingCommand<R> {
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Cancel the command
    ///
    /// Only a command that has not been sent to the controller can be cancelled, afterwards the
    /// command resolves to [`CommandError::Cancelled`].
    ///
    /// # Error
    /// * `AlreadySent` if the command is waiting on the controller.
    /// * `NotFound` if the command already resolved.
    pub fn cancel(&self) -> Result<(), CancelError> {
        self.shared.correlator().cancel(self.id)
    }

    /// Wait for the result of the command
    pub async fn wait(self) -> Result<R, CommandError> {
        self.await
    }
}

impl<R> Future for PendingCommand<R> {
    type Output = Result<R, CommandError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        let result = match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        this.finished = true;

        Poll::Ready(match result {
            Ok(Ok(response)) => (this.convert)(response),
            Ok(Err(e)) => Err(e),
            // the correlator was dropped with the command
            Err(_) => Err(CommandError::Closed),
        })
    }
}

impl<R> Drop for PendingCommand<R> {
    fn drop(&mut self) {
        if !self.finished && self.shared.correlator().cancel(self.id).is_ok() {
            log::debug!("(HCI) dropped command {} before it was sent", self.id);
        }
    }
}

impl<R> fmt::Debug for PendingCommand<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

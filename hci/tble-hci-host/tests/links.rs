mod common;

use common::*;
use futures::StreamExt;
use std::time::Duration;
use tble_hci_host::commands::info_params::read_bd_addr;
use tble_hci_host::commands::le::{
    create_connection, create_connection_cancel, set_advertising_enable, set_advertising_parameters,
    set_scan_enable, set_scan_parameters,
};
use tble_hci_host::commands::link_control::disconnect::DisconnectReason;
use tble_hci_host::errors::Error;
use tble_hci_host::link::LinkRole;
use tble_hci_host::{
    BluetoothDeviceAddress, Config, Connection, ConnectionError, ConnectionHandle, Diagnostic, EventStream, Host,
    HostEvent, ReassemblyError,
};
use tble_hci_util::events::{Events, LeMeta};
use tble_hci_util::le::PeerAddressType;

const HANDLE: u16 = 0x0040;

fn handle() -> ConnectionHandle {
    ConnectionHandle::try_from(HANDLE).unwrap()
}

/// Wait for the next event that is not a state change of a role
async fn next_non_state_event(events: &mut EventStream) -> Option<HostEvent> {
    loop {
        match events.next().await? {
            HostEvent::AdvertisingStateChanged(_)
            | HostEvent::ScanStateChanged(_)
            | HostEvent::InitiatorStateChanged(_) => continue,
            event => break Some(event),
        }
    }
}

/// Start advertising and have a peer connect to it
async fn connect_as_peripheral(host: &Host, controller: &mut Controller, events: &mut EventStream) -> Connection {
    let (result, _) = tokio::join!(
        set_advertising_parameters::send(host, Default::default()),
        controller.complete(LE_SET_ADVERTISING_PARAMETERS, &[0x00])
    );

    result.unwrap();

    let (result, _) = tokio::join!(
        set_advertising_enable::send(host, true),
        controller.complete(LE_SET_ADVERTISING_ENABLE, &[0x00])
    );

    result.unwrap();

    controller.le_connection_complete(0x00, HANDLE, 0x01).await;

    match next_non_state_event(events).await {
        Some(HostEvent::Connected(info)) => assert_eq!(handle(), info.handle),
        other => panic!("expected a connection, got {:?}", other),
    }

    host.connection(handle()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn peripheral_connection_lifecycle() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    assert_eq!(LinkRole::Idle, host.advertiser_state());

    let (result, _) = tokio::join!(
        set_advertising_parameters::send(&host, Default::default()),
        controller.complete(LE_SET_ADVERTISING_PARAMETERS, &[0x00])
    );

    result.unwrap();

    assert_eq!(Some(HostEvent::AdvertisingStateChanged(LinkRole::Configured)), events.next().await);

    let (result, _) = tokio::join!(
        set_advertising_enable::send(&host, true),
        controller.complete(LE_SET_ADVERTISING_ENABLE, &[0x00])
    );

    result.unwrap();

    assert_eq!(Some(HostEvent::AdvertisingStateChanged(LinkRole::Advertising)), events.next().await);

    controller.le_connection_complete(0x00, HANDLE, 0x01).await;

    assert_eq!(Some(HostEvent::AdvertisingStateChanged(LinkRole::Idle)), events.next().await);

    match events.next().await {
        Some(HostEvent::Connected(info)) => {
            assert_eq!(handle(), info.handle);
            assert_eq!(BluetoothDeviceAddress(PEER_ADDRESS), info.peer_address);
            assert_eq!(0x18, info.connection_interval);
            assert_eq!(0x48, info.supervision_timeout);
        }
        other => panic!("expected a connection, got {:?}", other),
    }

    assert_eq!(Some(LinkRole::Connected), host.link_state(handle()));

    assert_eq!(1, host.connections().len());

    let mut connection = host.connection(handle()).unwrap();

    // a connection can only be taken once
    assert!(host.connection(handle()).is_none());

    let (result, parameter) = tokio::join!(
        connection.disconnect(DisconnectReason::RemoteUserTerminatedConnection),
        controller.status(DISCONNECT, 0x00)
    );

    result.unwrap();

    assert_eq!(vec![0x40, 0x00, 0x13], parameter);

    assert_eq!(Some(LinkRole::Disconnecting), host.link_state(handle()));

    assert_eq!(Err(ConnectionError::Disconnected(handle())), connection.send(&[0x00; 4]));

    controller.disconnection_complete(0x00, HANDLE, 0x16).await;

    assert_eq!(
        Some(HostEvent::Disconnected {
            handle: handle(),
            reason: Error::ConnectionTerminatedByLocalHost,
        }),
        events.next().await
    );

    assert_eq!(None, host.link_state(handle()));

    assert_eq!(None, connection.recv().await);
}

#[tokio::test(start_paused = true)]
async fn failed_disconnection_keeps_the_connection() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    let connection = connect_as_peripheral(&host, &mut controller, &mut events).await;

    let (result, _) = tokio::join!(
        connection.disconnect(DisconnectReason::default()),
        controller.status(DISCONNECT, 0x00)
    );

    result.unwrap();

    controller.disconnection_complete(0x3E, HANDLE, 0x00).await;

    // a command round trip makes sure the event was processed
    let (address, _) = tokio::join!(
        read_bd_addr::send(&host),
        controller.complete(READ_BD_ADDR, &[0x00, 1, 2, 3, 4, 5, 6])
    );

    address.unwrap();

    assert_eq!(Some(LinkRole::Connected), host.link_state(handle()));
}

#[tokio::test(start_paused = true)]
async fn cancelled_connection_is_not_reported() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    let parameters =
        create_connection::ConnectionParameters::new(PeerAddressType::PublicAddress, BluetoothDeviceAddress(PEER_ADDRESS));

    let (result, parameter) = tokio::join!(
        create_connection::send(&host, parameters),
        controller.status(LE_CREATE_CONNECTION, 0x00)
    );

    result.unwrap();

    assert_eq!(25, parameter.len());

    assert_eq!(Some(HostEvent::InitiatorStateChanged(LinkRole::Initiating)), events.next().await);

    let (result, _) = tokio::join!(
        create_connection_cancel::send(&host),
        controller.complete(LE_CREATE_CONNECTION_CANCEL, &[0x00])
    );

    result.unwrap();

    assert_eq!(Some(HostEvent::InitiatorStateChanged(LinkRole::Idle)), events.next().await);

    // the controller reports the cancellation as a failed connection
    controller.le_connection_complete(0x02, 0x0000, 0x00).await;

    let (address, _) = tokio::join!(
        read_bd_addr::send(&host),
        controller.complete(READ_BD_ADDR, &[0x00, 1, 2, 3, 4, 5, 6])
    );

    address.unwrap();

    assert_eq!(None, try_next_event(&mut events));

    assert!(host.connections().is_empty());

    assert_eq!(LinkRole::Idle, host.initiator_state());
}

#[tokio::test(start_paused = true)]
async fn connection_while_idle_is_unexpected() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    controller.le_connection_complete(0x00, HANDLE, 0x01).await;

    assert_eq!(
        Some(HostEvent::Diagnostic(Diagnostic::UnexpectedEvent {
            event: Events::LeMeta(LeMeta::ConnectionComplete),
            opcode: None,
            handle: Some(handle()),
        })),
        events.next().await
    );

    assert!(host.connections().is_empty());

    assert!(host.connection(handle()).is_none());
}

#[tokio::test(start_paused = true)]
async fn advertising_reports_only_while_scanning() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    // one report with three bytes of data and no RSSI
    let mut report = vec![0x02, 0x01, 0x00, 0x00];

    report.extend_from_slice(&PEER_ADDRESS);

    report.extend_from_slice(&[0x03, 0x02, 0x01, 0x06, 0x7F]);

    controller.event(0x3E, &report).await;

    assert!(matches!(
        events.next().await,
        Some(HostEvent::Diagnostic(Diagnostic::UnexpectedEvent { .. }))
    ));

    let (result, _) = tokio::join!(
        set_scan_parameters::send(&host, Default::default()),
        controller.complete(LE_SET_SCAN_PARAMETERS, &[0x00])
    );

    result.unwrap();

    let (result, _) = tokio::join!(
        set_scan_enable::send(&host, true, false),
        controller.complete(LE_SET_SCAN_ENABLE, &[0x00])
    );

    result.unwrap();

    assert_eq!(Some(HostEvent::ScanStateChanged(LinkRole::Configured)), events.next().await);
    assert_eq!(Some(HostEvent::ScanStateChanged(LinkRole::Scanning)), events.next().await);

    controller.event(0x3E, &report).await;

    match events.next().await {
        Some(HostEvent::AdvertisingReport(report)) => {
            assert_eq!(BluetoothDeviceAddress(PEER_ADDRESS), report.address);
            assert_eq!(vec![0x02, 0x01, 0x06], report.data);
            assert_eq!(None, report.rssi);
        }
        other => panic!("expected an advertising report, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn received_data_is_reassembled() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    let mut connection = connect_as_peripheral(&host, &mut controller, &mut events).await;

    // a PDU with a six byte payload split over two fragments
    controller.acl(HANDLE, 0b10, &[0x06, 0x00, 0x04, 0x00, 1, 2]).await;
    controller.acl(HANDLE, 0b01, &[3, 4, 5, 6]).await;

    assert_eq!(
        Some(Ok(vec![0x06, 0x00, 0x04, 0x00, 1, 2, 3, 4, 5, 6])),
        connection.recv().await
    );

    controller.acl(HANDLE, 0b01, &[7, 8]).await;

    assert_eq!(
        Some(Err(ReassemblyError::UnexpectedContinuation(handle()))),
        connection.recv().await
    );

    assert_eq!(
        Some(HostEvent::DataLoss(ReassemblyError::UnexpectedContinuation(handle()))),
        next_non_state_event(&mut events).await
    );

    // data for a connection that does not exist is dropped
    controller.acl(0x0041, 0b10, &[0x01, 0x00, 0x04, 0x00, 1]).await;

    controller.acl(HANDLE, 0b10, &[0x01, 0x00, 0x04, 0x00, 9]).await;

    assert_eq!(Some(Ok(vec![0x01, 0x00, 0x04, 0x00, 9])), connection.recv().await);
}

#[tokio::test(start_paused = true)]
async fn sent_data_is_fragmented() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    let connection = connect_as_peripheral(&host, &mut controller, &mut events).await;

    assert_eq!(27, host.max_acl_data_length());

    let pdu: Vec<u8> = (0..30).collect();

    connection.send(&pdu).unwrap();

    let (first_header, first) = controller.expect_acl().await;

    assert_eq!(HANDLE, first_header);
    assert_eq!(&pdu[..27], first.as_slice());

    let (continuing_header, continuing) = controller.expect_acl().await;

    assert_eq!(HANDLE | 0b01 << 12, continuing_header);
    assert_eq!(&pdu[27..], continuing.as_slice());
}

#[tokio::test(start_paused = true)]
async fn hardware_error_closes_connections() {
    let (host, mut controller, _driver) = new(Config::default());

    let mut events = host.subscribe();

    let mut connection = connect_as_peripheral(&host, &mut controller, &mut events).await;

    controller.hardware_error(0x00).await;

    assert_eq!(Some(HostEvent::ControllerReset), next_non_state_event(&mut events).await);

    assert_eq!(None, host.link_state(handle()));

    assert_eq!(None, connection.recv().await);

    // the stack keeps working after the reset
    let (address, _) = tokio::join!(
        read_bd_addr::send(&host),
        controller.complete(READ_BD_ADDR, &[0x00, 1, 2, 3, 4, 5, 6])
    );

    address.unwrap();

    assert!(tokio::time::timeout(Duration::from_millis(100), controller.next())
        .await
        .is_err());
}

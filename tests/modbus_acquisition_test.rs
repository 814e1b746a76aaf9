// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition over a real Modbus TCP connection
//!
//! These tests start a simulated inverter on an OS-assigned port and read it
//! with the TCP transport, going through the full request, word order and
//! decode path.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rust_inverter_monitor::acquisition::SampleAcquirer;
use rust_inverter_monitor::config::FailurePolicy;
use rust_inverter_monitor::decoder::{DecodedValue, FixedPoint};
use rust_inverter_monitor::error::AcquisitionError;
use rust_inverter_monitor::modbus::{
    serve_simulator, RegisterTransport, SimulatedInverter, TcpRegisterTransport,
};
use rust_inverter_monitor::register_map::RegisterMap;

/// Test utility function to start a simulated inverter in the background
async fn start_simulator(inverter: SimulatedInverter) -> (SocketAddr, JoinHandle<()>) {
    // Use port 0 to let the OS assign an available port
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();
    let handle = serve_simulator(listener, inverter);
    (socket_addr, handle)
}

fn transport(addr: SocketAddr) -> TcpRegisterTransport {
    TcpRegisterTransport::new(addr.ip().to_string(), addr.port(), 1)
        .with_timeout(Duration::from_secs(2))
        .with_retries(1)
}

/// Fill every register of the map with plausible readings.
fn populate(inverter: &SimulatedInverter, map: &RegisterMap) {
    for spec in &map.registers {
        if spec.data_type.is_text() {
            inverter.set_text(spec, "A2104123456");
        } else {
            inverter.set_integer(spec, 0);
        }
    }
    let set = |name: &str, raw: i128| inverter.set_integer(map.get(name).unwrap(), raw);
    set("5031 - Total active power", 123_456);
    set("5011 - MPPT 1 voltage", 3504);
    set("5013 - MPPT 2 voltage", 3698);
    set("5008 - Internal temperature", -52);
    set("5033 - Reactive power", -1200);
    set("5003 - Daily power yields", 154);
}

#[tokio::test]
async fn test_sweep_decodes_every_register() {
    let map = RegisterMap::for_model("sg-ktl").unwrap();
    let inverter = SimulatedInverter::new();
    populate(&inverter, &map);
    let (addr, server) = start_simulator(inverter).await;

    let mut transport = transport(addr);
    let snapshot = SampleAcquirer::default()
        .acquire(&mut transport, &map.registers)
        .await
        .unwrap();
    transport.close().await;
    assert!(!transport.is_connected());

    assert!(snapshot.is_complete());
    assert_eq!(snapshot.len(), map.len());
    assert_eq!(
        snapshot.get("5031 - Total active power"),
        Some(&DecodedValue::Unsigned(123_456))
    );
    assert_eq!(
        snapshot.get("5011 - MPPT 1 voltage"),
        Some(&DecodedValue::Decimal(FixedPoint::new(3504, 1)))
    );
    assert_eq!(snapshot.numeric("5013 - MPPT 2 voltage"), Some(369.8));
    assert_eq!(
        snapshot.get("5008 - Internal temperature").unwrap().to_string(),
        "-5.2"
    );
    assert_eq!(
        snapshot.get("5033 - Reactive power"),
        Some(&DecodedValue::Signed(-1200))
    );
    assert_eq!(
        snapshot.get("4990 - Serial number"),
        Some(&DecodedValue::Text("A2104123456".to_string()))
    );

    server.abort();
}

#[tokio::test]
async fn test_sentinel_reading_is_absent() {
    let map = RegisterMap::for_model("sg-ktl").unwrap();
    let inverter = SimulatedInverter::new();
    populate(&inverter, &map);
    let generation = map.get("5031 - Total active power").unwrap();
    inverter.set_integer(generation, u32::MAX as i128);
    let reactive = map.get("5033 - Reactive power").unwrap();
    inverter.set_integer(reactive, i32::MIN as i128);
    let (addr, server) = start_simulator(inverter).await;

    let mut transport = transport(addr);
    let snapshot = SampleAcquirer::default()
        .acquire(&mut transport, &map.registers)
        .await
        .unwrap();
    transport.close().await;

    assert!(snapshot.get("5031 - Total active power").unwrap().is_absent());
    assert!(snapshot.get("5033 - Reactive power").unwrap().is_absent());
    assert_eq!(snapshot.numeric("5011 - MPPT 1 voltage"), Some(350.4));

    server.abort();
}

#[tokio::test]
async fn test_missing_register_aborts_or_skips() {
    let map = RegisterMap::for_model("sg-ktl").unwrap();
    let inverter = SimulatedInverter::new();
    populate(&inverter, &map);
    inverter.remove(map.get("5011 - MPPT 1 voltage").unwrap());
    let (addr, server) = start_simulator(inverter).await;

    let mut transport = transport(addr);
    let result = SampleAcquirer::new(FailurePolicy::AbortCycle)
        .acquire(&mut transport, &map.registers)
        .await;
    transport.close().await;
    match result {
        Err(AcquisitionError::Read { register, .. }) => {
            assert_eq!(register, "5011 - MPPT 1 voltage")
        }
        other => panic!("unexpected result {:?}", other),
    }

    let snapshot = SampleAcquirer::new(FailurePolicy::SkipRegister)
        .acquire(&mut transport, &map.registers)
        .await
        .unwrap();
    transport.close().await;
    assert!(snapshot.get("5011 - MPPT 1 voltage").unwrap().is_absent());
    assert_eq!(snapshot.numeric("5013 - MPPT 2 voltage"), Some(369.8));
    assert_eq!(snapshot.len(), map.len());

    server.abort();
}

#[tokio::test]
async fn test_connection_refused() {
    // Reserve a port, then free it so nothing listens there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let map = RegisterMap::for_model("sg-ktl").unwrap();
    let mut transport = transport(addr);
    let result = SampleAcquirer::default()
        .acquire(&mut transport, &map.registers)
        .await;
    assert!(matches!(result, Err(AcquisitionError::Connect(_))));
    assert!(!transport.is_connected());
}

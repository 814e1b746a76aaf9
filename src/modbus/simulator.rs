// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated inverter
//!
//! A Modbus TCP server exposing input registers from an in-memory table. Values
//! are written through [`SimulatedInverter::set_integer`] and
//! [`SimulatedInverter::set_text`], which lay the words out exactly as a real
//! inverter does, so a [`TcpRegisterTransport`](super::TcpRegisterTransport)
//! pointed at the simulator goes through the full decode path.
//!
//! Addresses in the table are zero-based protocol addresses.

use std::{
    collections::HashMap,
    future,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use log::{debug, error};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use crate::register_map::{DataType, RegisterSpec};

/// Words for an integer register, in on-wire order for `data_type`.
///
/// Values wider than the type are truncated to its width.
pub fn encode_integer(data_type: DataType, raw: i128) -> Vec<u16> {
    let width = data_type.width() as usize;
    let bits = raw as u64;
    let mut words: Vec<u16> = (0..width.min(4))
        .rev()
        .map(|i| (bits >> (16 * i)) as u16)
        .collect();
    if data_type.low_word_first() {
        words.reverse();
    }
    words
}

/// Words for a text register, NUL padded to the type's width.
pub fn encode_text(data_type: DataType, text: &str) -> Vec<u16> {
    let width = data_type.width() as usize;
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(width * 2, 0);
    bytes
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

/// In-memory inverter answering `ReadInputRegisters` requests.
///
/// Cloning shares the register table, so a handle kept by a test or by the
/// simulator binary can change readings while clients are connected.
#[derive(Debug, Clone, Default)]
pub struct SimulatedInverter {
    input_registers: Arc<Mutex<HashMap<u16, u16>>>,
}

impl SimulatedInverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw words starting at a zero-based address.
    pub fn set_words(&self, address: u16, words: &[u16]) {
        match self.input_registers.lock() {
            Ok(mut registers) => {
                for (offset, word) in words.iter().enumerate() {
                    registers.insert(address + offset as u16, *word);
                }
            }
            Err(_) => error!("SIMULATOR: register table lock poisoned"),
        }
    }

    /// Store an integer reading for a register of the map.
    pub fn set_integer(&self, spec: &RegisterSpec, raw: i128) {
        self.set_words(spec.protocol_address(), &encode_integer(spec.data_type, raw));
    }

    /// Store a text reading for a register of the map.
    pub fn set_text(&self, spec: &RegisterSpec, text: &str) {
        self.set_words(spec.protocol_address(), &encode_text(spec.data_type, text));
    }

    /// Remove a register so that reads covering it fail with an exception.
    pub fn remove(&self, spec: &RegisterSpec) {
        if let Ok(mut registers) = self.input_registers.lock() {
            for offset in 0..spec.width() {
                registers.remove(&(spec.protocol_address() + offset));
            }
        }
    }
}

impl tokio_modbus::server::Service for SimulatedInverter {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("SIMULATOR: received request {:?}", req);
        let res = match req {
            Request::ReadInputRegisters(addr, cnt) => match self.input_registers.lock() {
                Ok(registers) => {
                    register_read(&registers, addr, cnt).map(Response::ReadInputRegisters)
                }
                Err(_) => Err(ExceptionCode::ServerDeviceFailure),
            },
            _ => {
                error!("SIMULATOR: Exception::IllegalFunction - Unimplemented function code in request: {req:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        };
        future::ready(res)
    }
}

/// Helper function implementing reading registers from a HashMap.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = vec![0; cnt.into()];
    for i in 0..cnt {
        let reg_addr = addr + i;
        if let Some(r) = registers.get(&reg_addr) {
            response_values[i as usize] = *r;
        } else {
            error!("SIMULATOR: Exception::IllegalDataAddress at {}", reg_addr);
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    Ok(response_values)
}

/// Serve `inverter` on `listener` until the returned task is aborted.
pub fn serve_simulator(
    listener: TcpListener,
    inverter: SimulatedInverter,
) -> tokio::task::JoinHandle<()> {
    let server = Server::new(listener);
    let on_connected = move |stream, socket_addr: SocketAddr| {
        let inverter = inverter.clone();
        async move {
            debug!("SIMULATOR: client connected from {}", socket_addr);
            accept_tcp_connection(stream, socket_addr, move |_socket_addr| {
                Ok(Some(inverter.clone()))
            })
        }
    };
    let on_process_error = |err| {
        error!("SIMULATOR: server error: {err}");
    };

    tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            error!("SIMULATOR: server stopped: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode, DecodedValue};
    use crate::register_map::Scale;

    #[test]
    fn test_encoding_matches_decoder() {
        let cases = [
            (DataType::U16, 4321i128),
            (DataType::S16, -17),
            (DataType::U32, 123_456),
            (DataType::S32, -98_765),
            (DataType::U64, 0x0001_0002_0003_0004),
        ];
        for (data_type, raw) in cases {
            let spec = RegisterSpec::new("test", 1, data_type, Scale::None);
            let words = encode_integer(data_type, raw);
            assert_eq!(words.len(), data_type.width() as usize);
            let decoded = decode(&spec, &words);
            assert_eq!(decoded.as_f64(), Some(raw as f64), "{:?}", data_type);
        }
    }

    #[test]
    fn test_u32_words_are_low_word_first() {
        assert_eq!(encode_integer(DataType::U32, 0x0001_E240), vec![0xE240, 0x0001]);
    }

    #[test]
    fn test_text_encoding() {
        let spec = RegisterSpec::new("serial", 1, DataType::Str16, Scale::None);
        let words = encode_text(DataType::Str16, "A2011234567");
        assert_eq!(words.len(), 8);
        assert_eq!(
            decode(&spec, &words),
            DecodedValue::Text("A2011234567".to_string())
        );
    }

    #[test]
    fn test_register_read_reports_missing_address() {
        let inverter = SimulatedInverter::new();
        inverter.set_words(10, &[1, 2]);
        let registers = inverter.input_registers.lock().unwrap();
        assert_eq!(register_read(&registers, 10, 2), Ok(vec![1, 2]));
        assert_eq!(
            register_read(&registers, 10, 3),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }
}

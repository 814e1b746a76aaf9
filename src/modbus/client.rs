// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-inverter-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP client transport

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::time;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use super::RegisterTransport;
use crate::config::InverterConfig;
use crate::error::TransportError;

/// Reads input registers from an inverter over Modbus TCP.
///
/// The connection is opened lazily by [`RegisterTransport::connect`] and reused
/// until [`RegisterTransport::close`] or a failed read drops it.
pub struct TcpRegisterTransport {
    address: String,
    port: u16,
    slave: u8,
    timeout: Duration,
    retries: u32,
    ctx: Option<Context>,
}

impl TcpRegisterTransport {
    pub fn new(address: impl Into<String>, port: u16, slave: u8) -> Self {
        Self {
            address: address.into(),
            port,
            slave,
            timeout: Duration::from_secs(3),
            retries: 3,
            ctx: None,
        }
    }

    pub fn from_config(config: &InverterConfig) -> Self {
        Self::new(config.address.clone(), config.port, config.slave)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_retries(config.retries)
    }

    /// Timeout applied to the connection attempt and to each read
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Additional attempts for a failed or empty read
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    async fn resolve(endpoint: String) -> Result<SocketAddr, TransportError> {
        let mut addrs = tokio::net::lookup_host(endpoint.clone())
            .await
            .map_err(|e| TransportError::Connect {
                address: endpoint.clone(),
                reason: e.to_string(),
            })?;
        addrs.next().ok_or_else(|| TransportError::Connect {
            address: endpoint,
            reason: "address did not resolve".to_string(),
        })
    }

    async fn read_once(&mut self, address: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        let timeout = self.timeout;
        let ctx = self.ctx.as_mut().ok_or(TransportError::NotConnected)?;
        match time::timeout(timeout, ctx.read_input_registers(address, count)).await {
            Err(_) => Err(TransportError::Timeout(timeout)),
            Ok(Err(e)) => Err(TransportError::Protocol(e.to_string())),
            Ok(Ok(Err(exception))) => Err(TransportError::Exception(exception.to_string())),
            Ok(Ok(Ok(words))) if words.len() < count as usize => Err(TransportError::ShortRead {
                address,
                expected: count,
                received: words.len(),
            }),
            Ok(Ok(Ok(words))) => Ok(words),
        }
    }
}

#[async_trait]
impl RegisterTransport for TcpRegisterTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ctx.is_some() {
            return Ok(());
        }

        let socket_addr = Self::resolve(self.endpoint()).await?;
        debug!("Connecting to Modbus server at {}", socket_addr);
        let ctx = time::timeout(self.timeout, tcp::connect_slave(socket_addr, Slave(self.slave)))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Connect {
                address: self.endpoint(),
                reason: e.to_string(),
            })?;

        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        // A connection dropped by an earlier failure of the same sweep
        if self.ctx.is_none() {
            self.connect().await?;
        }

        let max_attempts = self.retries + 1;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.read_once(address, count).await {
                Ok(words) => return Ok(words),
                Err(TransportError::NotConnected) => return Err(TransportError::NotConnected),
                Err(e) if attempts >= max_attempts => {
                    // An exception is a complete answer, anything else may leave
                    // the stream out of sync
                    if !matches!(e, TransportError::Exception(_)) {
                        self.close().await;
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Read of {} registers at {} failed (attempt {}/{}): {}",
                        count, address, attempts, max_attempts, e
                    );
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!("Error while disconnecting from {}: {}", self.endpoint(), e);
            }
        }
    }
}

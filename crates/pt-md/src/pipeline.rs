//! Generic venue adapter engine.
//!
//! Provides [`GenericAdapter`], a data-driven implementation of
//! [`VenueAdapter`]. Each venue only describes its connections as
//! [`StreamDef`]s; the engine creates the clients, registers subscriptions
//! (replayed on every connect), and owns start/stop.
//!
//! # Architecture
//!
//! ```text
//! StreamDef ──► GenericAdapter::new()  ──► VenueClient + registered keys per stream
//!          ──► GenericAdapter.start() ──► connect (login + subscribe replay)
//!          ──► GenericAdapter.stop()  ──► stop every connection
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pt_core::dispatch::{OnData, VenueClient, VenueProtocol};
use pt_core::ws::{ConnectionConfig, ConnectionEvent};
use pt_core::{DecodeError, FeedError, PriceUpdate, Venue};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{FeedCaches, VenueAdapter};

/// Everything needed to run one venue connection.
pub struct StreamDef<P: VenueProtocol> {
    /// Human-readable label (e.g. `"okx_public"`).
    pub label: String,
    pub connection: ConnectionConfig,
    pub protocol: P,
    /// Keys registered before start and replayed on every connect.
    pub keys: Vec<P::Key>,
    /// Callback shared by all `keys`.
    pub on_data: OnData,
}

/// Build an [`OnData`] callback that parses a frame and publishes the
/// resulting records into `caches`.
pub fn cache_writer<F>(caches: FeedCaches, parse: F) -> OnData
where
    F: Fn(&Value) -> Result<Vec<PriceUpdate>, DecodeError> + Send + Sync + 'static,
{
    Arc::new(move |value: &Value| -> Result<(), FeedError> {
        for update in parse(value)? {
            caches.publish(update);
        }
        Ok(())
    })
}

/// Generic venue adapter driven by [`StreamDef`] descriptors.
pub struct GenericAdapter<P: VenueProtocol> {
    name: String,
    venue: Venue,
    clients: Vec<VenueClient<P>>,
}

impl<P: VenueProtocol> GenericAdapter<P> {
    pub fn new(name: impl Into<String>, venue: Venue, streams: Vec<StreamDef<P>>) -> Self {
        let name = name.into();
        let clients = streams
            .into_iter()
            .map(|def| {
                let client = VenueClient::new(def.label.clone(), def.connection, def.protocol);
                let label = def.label.clone();
                let err_label = def.label;
                client.set_listeners(
                    Arc::new(move |raw: &str| debug!("[{label}] {raw}")),
                    Arc::new(move |raw: &str| warn!("[{err_label}] error frame: {raw}")),
                );
                for key in def.keys {
                    client.dispatcher().registry().subscribe(key, Some(Arc::clone(&def.on_data)));
                }
                client
            })
            .collect();
        Self { name, venue, clients }
    }

    pub fn clients(&self) -> &[VenueClient<P>] {
        &self.clients
    }
}

#[async_trait]
impl<P: VenueProtocol> VenueAdapter for GenericAdapter<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn venue(&self) -> Venue {
        self.venue
    }

    async fn start(&self) -> Result<()> {
        for client in &self.clients {
            let label = client.connection().label().to_string();
            client
                .start()
                .await
                .with_context(|| format!("[{}] failed to start {label}", self.name))?;
            info!("[{}] {label} started with {} subscription(s)", self.name, client.subscriptions().len());
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        for client in &self.clients {
            client.stop().await;
        }
        info!("[{}] stopped", self.name);
        Ok(())
    }

    fn take_event_receivers(&self) -> Vec<(String, mpsc::Receiver<ConnectionEvent>)> {
        self.clients
            .iter()
            .filter_map(|c| c.take_event_receiver().map(|rx| (c.connection().label().to_string(), rx)))
            .collect()
    }

    fn is_exhausted(&self) -> bool {
        self.clients.iter().any(|c| c.connection().is_exhausted())
    }
}

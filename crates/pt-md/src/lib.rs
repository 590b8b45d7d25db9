//! # pt-md
//!
//! Venue adapters that turn streaming ticker, mark-price and funding-rate
//! frames into [`PriceUpdate`](pt_core::PriceUpdate) records.
//!
//! ## Architecture
//!
//! Each venue provides a [`VenueProtocol`](pt_core::dispatch::VenueProtocol)
//! (envelope classification, subscribe/login frames) and a
//! `build(config, caches) -> Vec<StreamDef>` function describing its
//! connections. The generic [`pipeline::GenericAdapter`] owns one
//! [`VenueClient`](pt_core::dispatch::VenueClient) per stream definition and
//! handles registration, start and stop.
//!
//! ## Shared infrastructure
//!
//! - [`pipeline`]: `StreamDef` + `GenericAdapter`
//! - [`json_util`]: JSON field helpers
//! - [`auth`]: login frames for authenticated streams
//! - [`registry`]: config-driven adapter factory

pub mod auth;
pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod json_util;
pub mod okx;
pub mod pipeline;
pub mod registry;

use std::sync::Arc;

use ahash::AHashMap;
use anyhow::Result;
use async_trait::async_trait;
use pt_core::cache::PriceCache;
use pt_core::ws::ConnectionEvent;
use pt_core::{Feed, PriceUpdate, Venue};
use tokio::sync::mpsc;
use tracing::trace;

/// Trait implemented by every venue adapter.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Human-readable adapter name.
    fn name(&self) -> &str;
    fn venue(&self) -> Venue;
    /// Connect every stream; registered subscriptions are sent on connect.
    async fn start(&self) -> Result<()>;
    /// Stop all connections.
    async fn stop(&self) -> Result<()>;
    /// Lifecycle event streams, one per connection, labelled. Each can be
    /// taken once.
    fn take_event_receivers(&self) -> Vec<(String, mpsc::Receiver<ConnectionEvent>)>;
    /// `true` if any connection gave up reconnecting.
    fn is_exhausted(&self) -> bool;
}

/// Destination caches of one venue, one per [`Feed`].
#[derive(Clone, Default)]
pub struct FeedCaches {
    caches: AHashMap<Feed, Arc<PriceCache>>,
}

impl FeedCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feed: Feed, cache: Arc<PriceCache>) -> Self {
        self.caches.insert(feed, cache);
        self
    }

    pub fn get(&self, feed: Feed) -> Option<&Arc<PriceCache>> {
        self.caches.get(&feed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Feed, &Arc<PriceCache>)> {
        self.caches.iter()
    }

    /// Write `update` into the cache of its feed (direct or batched).
    pub fn publish(&self, update: PriceUpdate) {
        match self.caches.get(&update.feed) {
            Some(cache) => cache.ingest(update),
            None => trace!("no cache for {}:{}, dropping {}", update.venue, update.feed, update.symbol),
        }
    }
}

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::dispatcher::{VenueDispatcher, VenueProtocol};
use super::{MessageDispatcher, OnData, OnReceive};
use crate::error::FeedError;
use crate::ws::{ConnectionConfig, ConnectionEvent, ConnectionState, StreamConnection};

/// A venue connection: one [`StreamConnection`] plus the dispatcher that
/// owns its subscription registry.
pub struct VenueClient<P: VenueProtocol> {
    connection: StreamConnection<VenueDispatcher<P>>,
    dispatcher: Arc<VenueDispatcher<P>>,
}

impl<P: VenueProtocol> VenueClient<P> {
    pub fn new(label: impl Into<String>, config: ConnectionConfig, protocol: P) -> Self {
        let dispatcher = Arc::new(VenueDispatcher::new(protocol));
        let connection = StreamConnection::new(label, config);
        connection.set_dispatcher(Arc::clone(&dispatcher));
        Self { connection, dispatcher }
    }

    pub fn connection(&self) -> &StreamConnection<VenueDispatcher<P>> {
        &self.connection
    }

    pub fn dispatcher(&self) -> &Arc<VenueDispatcher<P>> {
        &self.dispatcher
    }

    pub fn set_listeners(&self, on_message: OnReceive, on_error: OnReceive) {
        self.dispatcher.set_listeners(on_message, on_error);
    }

    pub async fn start(&self) -> Result<(), FeedError> {
        self.connection.start().await
    }

    pub async fn stop(&self) {
        self.connection.stop().await;
    }

    pub fn take_event_receiver(&self) -> Option<mpsc::Receiver<ConnectionEvent>> {
        self.connection.take_event_receiver()
    }

    pub fn is_logged_in(&self) -> bool {
        self.dispatcher.is_logged_in()
    }

    pub fn subscriptions(&self) -> Vec<P::Key> {
        self.dispatcher.registry().subscriptions()
    }

    pub async fn subscribe(&self, key: P::Key, callback: Option<OnData>) -> Result<(), FeedError> {
        self.subscribe_list(vec![(key, callback)]).await
    }

    /// Register every key, then send one subscribe request for all of them.
    ///
    /// Without an open socket the keys are only registered; the next
    /// successful connect replays them.
    pub async fn subscribe_list(&self, entries: Vec<(P::Key, Option<OnData>)>) -> Result<(), FeedError> {
        if entries.is_empty() {
            return Ok(());
        }
        if self.connection.state() == ConnectionState::Stopped {
            return Err(FeedError::Stopped);
        }
        let keys: Vec<P::Key> = entries.iter().map(|(k, _)| k.clone()).collect();
        for (key, callback) in entries {
            self.dispatcher.registry().subscribe(key, callback);
        }
        let request = self.dispatcher.protocol().subscribe_request(&keys);
        self.send_or_defer(request).await
    }

    pub async fn unsubscribe(&self, key: P::Key) -> Result<(), FeedError> {
        self.unsubscribe_list(vec![key]).await
    }

    pub async fn unsubscribe_list(&self, keys: Vec<P::Key>) -> Result<(), FeedError> {
        if keys.is_empty() {
            return Ok(());
        }
        for key in &keys {
            self.dispatcher.registry().unsubscribe(key);
        }
        if self.connection.state() == ConnectionState::Stopped {
            return Ok(());
        }
        let request = self.dispatcher.protocol().unsubscribe_request(&keys);
        self.send_or_defer(request).await
    }

    async fn send_or_defer(&self, request: String) -> Result<(), FeedError> {
        match self.connection.send(request).await {
            Err(FeedError::NotConnected) => {
                debug!("[{}] not connected, request deferred to next connect", self.connection.label());
                Ok(())
            }
            other => other,
        }
    }
}

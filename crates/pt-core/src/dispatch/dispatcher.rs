use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::registry::SubscriptionRegistry;
use super::{MessageDispatcher, OnReceive, decode};
use crate::error::FeedError;
use crate::types::Venue;

/// What a decoded frame turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<K> {
    /// In-band non-success status.
    Error { code: String, message: String },
    /// Successful login/auth acknowledgement.
    Login,
    /// Market data. `None` when no subscription key could be extracted.
    Data(Option<K>),
    /// Subscribe acks, notices and anything else.
    Other,
}

/// The venue-specific half of dispatch: envelope shape and outbound frames.
pub trait VenueProtocol: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn venue(&self) -> Venue;

    /// Heartbeat replies and acks that bypass regular dispatch.
    fn is_special(&self, raw: &str) -> bool;

    fn classify(&self, value: &Value) -> Envelope<Self::Key>;

    /// One outbound frame subscribing every key in `keys` (non-empty).
    fn subscribe_request(&self, keys: &[Self::Key]) -> String;

    fn unsubscribe_request(&self, keys: &[Self::Key]) -> String;

    /// Login frame sent first on every connect, if the venue is configured
    /// for authenticated streams.
    fn login_request(&self) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct Listeners {
    on_message: Option<OnReceive>,
    on_error: Option<OnReceive>,
}

/// [`MessageDispatcher`] implementing the shared routing algorithm on top of
/// a [`VenueProtocol`].
///
/// decode → protocol error? → login ack? → keyed data? → catch-all.
pub struct VenueDispatcher<P: VenueProtocol> {
    protocol: P,
    registry: SubscriptionRegistry<P::Key>,
    listeners: RwLock<Listeners>,
    logged_in: AtomicBool,
}

impl<P: VenueProtocol> VenueDispatcher<P> {
    pub fn new(protocol: P) -> Self {
        Self {
            protocol,
            registry: SubscriptionRegistry::new(),
            listeners: RwLock::new(Listeners::default()),
            logged_in: AtomicBool::new(false),
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn registry(&self) -> &SubscriptionRegistry<P::Key> {
        &self.registry
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    fn forward(&self, raw: &str) {
        let listener = self.listeners.read().on_message.clone();
        match listener {
            Some(cb) => cb(raw),
            None => debug!("[{}] unrouted message: {raw}", self.protocol.venue()),
        }
    }
}

impl<P: VenueProtocol> MessageDispatcher for VenueDispatcher<P> {
    fn handle_message(&self, raw: &str) -> Result<(), FeedError> {
        let value = decode(raw)?;
        match self.protocol.classify(&value) {
            Envelope::Error { code, message } => Err(FeedError::Protocol { code, message }),
            Envelope::Login => {
                info!("[{}] login acknowledged", self.protocol.venue());
                self.logged_in.store(true, Ordering::Release);
                self.forward(raw);
                Ok(())
            }
            Envelope::Data(Some(key)) => match self.registry.lookup(&key) {
                Some(cb) => cb(&value),
                None => {
                    self.forward(raw);
                    Ok(())
                }
            },
            Envelope::Data(None) | Envelope::Other => {
                self.forward(raw);
                Ok(())
            }
        }
    }

    fn handle_error(&self, raw: &str) -> Result<(), FeedError> {
        warn!("[{}] error message: {raw}", self.protocol.venue());
        let listener = self.listeners.read().on_error.clone();
        if let Some(cb) = listener {
            cb(raw);
        }
        Ok(())
    }

    fn handle_special_message(&self, raw: &str) -> Result<bool, FeedError> {
        if self.protocol.is_special(raw) {
            debug!("[{}] special message: {raw}", self.protocol.venue());
            return Ok(true);
        }
        Ok(false)
    }

    fn set_listeners(&self, on_message: OnReceive, on_error: OnReceive) {
        let mut listeners = self.listeners.write();
        listeners.on_message = Some(on_message);
        listeners.on_error = Some(on_error);
    }

    fn connect_messages(&self) -> Vec<String> {
        let mut frames = Vec::new();
        if let Some(login) = self.protocol.login_request() {
            self.logged_in.store(false, Ordering::Release);
            frames.push(login);
        }
        let keys = self.registry.subscriptions();
        if !keys.is_empty() {
            frames.push(self.protocol.subscribe_request(&keys));
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    struct TopicProtocol {
        login: bool,
    }

    impl VenueProtocol for TopicProtocol {
        type Key = String;

        fn venue(&self) -> Venue {
            Venue::Bybit
        }

        fn is_special(&self, raw: &str) -> bool {
            raw == "pong"
        }

        fn classify(&self, value: &Value) -> Envelope<String> {
            if value.get("success") == Some(&Value::Bool(false)) {
                return Envelope::Error {
                    code: "-1".into(),
                    message: value["ret_msg"].as_str().unwrap_or_default().into(),
                };
            }
            if value["op"] == "auth" {
                return Envelope::Login;
            }
            if value.get("data").is_some() {
                return Envelope::Data(value["topic"].as_str().map(String::from));
            }
            Envelope::Other
        }

        fn subscribe_request(&self, keys: &[String]) -> String {
            json!({"op": "subscribe", "args": keys}).to_string()
        }

        fn unsubscribe_request(&self, keys: &[String]) -> String {
            json!({"op": "unsubscribe", "args": keys}).to_string()
        }

        fn login_request(&self) -> Option<String> {
            self.login.then(|| r#"{"op":"auth"}"#.to_string())
        }
    }

    fn counting_listeners(d: &VenueDispatcher<TopicProtocol>) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let msgs = Arc::new(AtomicUsize::new(0));
        let errs = Arc::new(AtomicUsize::new(0));
        let (m, e) = (msgs.clone(), errs.clone());
        d.set_listeners(
            Arc::new(move |_: &str| {
                m.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(move |_: &str| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (msgs, errs)
    }

    #[test]
    fn keyed_data_reaches_callback_until_unsubscribed() {
        let d = VenueDispatcher::new(TopicProtocol { login: false });
        let (catch_all, _) = counting_listeners(&d);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        d.registry().subscribe(
            "tickers.BTCUSDT".into(),
            Some(Arc::new(move |v: &Value| -> Result<(), FeedError> {
                assert_eq!(v["data"]["lastPrice"], "50000");
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })),
        );

        let frame = r#"{"topic":"tickers.BTCUSDT","data":{"lastPrice":"50000"}}"#;
        d.handle_message(frame).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(catch_all.load(Ordering::SeqCst), 0);

        d.registry().unsubscribe(&"tickers.BTCUSDT".to_string());
        d.handle_message(frame).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(catch_all.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn protocol_error_and_malformed_frames_surface_as_errors() {
        let d = VenueDispatcher::new(TopicProtocol { login: false });
        let (_, errs) = counting_listeners(&d);

        let err = d.handle_message(r#"{"success":false,"ret_msg":"bad topic"}"#).unwrap_err();
        assert!(matches!(err, FeedError::Protocol { ref message, .. } if message == "bad topic"));

        let err = d.handle_message("{oops").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));

        d.handle_error("{oops").unwrap();
        assert_eq!(errs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn login_ack_records_state_and_forwards() {
        let d = VenueDispatcher::new(TopicProtocol { login: true });
        let (catch_all, _) = counting_listeners(&d);
        assert!(!d.is_logged_in());
        d.handle_message(r#"{"op":"auth","success":true}"#).unwrap();
        assert!(d.is_logged_in());
        assert_eq!(catch_all.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn special_frames_are_consumed() {
        let d = VenueDispatcher::new(TopicProtocol { login: false });
        assert!(d.handle_special_message("pong").unwrap());
        assert!(!d.handle_special_message(r#"{"topic":"x"}"#).unwrap());
    }

    #[test]
    fn connect_messages_put_login_before_resubscribe() {
        let d = VenueDispatcher::new(TopicProtocol { login: true });
        assert_eq!(d.connect_messages(), vec![r#"{"op":"auth"}"#.to_string()]);

        d.registry().subscribe("tickers.ETHUSDT".into(), None);
        let frames = d.connect_messages();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], r#"{"op":"auth"}"#);
        assert!(frames[1].contains("tickers.ETHUSDT"));
    }
}

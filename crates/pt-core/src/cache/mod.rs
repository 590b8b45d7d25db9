//! Last-value price cache.
//!
//! Two modes share one read interface:
//!
//! - **Direct**: [`PriceCache::write`] overwrites the entry in the primary map
//!   under a short exclusive lock.
//! - **Batched** (double buffer): [`PriceCache::write_batched`] lands in a
//!   concurrent write buffer and bumps a pending counter. When the counter
//!   reaches `batch_size`, or the flush timer fires with pending writes, the
//!   write and read buffers are swapped and the inert read buffer is drained
//!   into the primary map and the [`PriceSink`].
//!
//! Reads only ever see the primary map, so a batched record becomes visible
//! after the flush that drains it.

mod sink;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ahash::AHashMap;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

pub use sink::{ChannelSink, LogSink, PriceSink};

use crate::types::PriceUpdate;

/// Floor applied to `flush_interval`; the flush timer cannot tick at zero.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Double-buffer tunables.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval: Duration::from_secs(1),
        }
    }
}

type Buffer = Arc<DashMap<String, PriceUpdate>>;

struct BufferPair {
    write: Buffer,
    read: Buffer,
}

struct Batching {
    /// Writers hold the read side while inserting and counting; the swap
    /// takes the write side so insert + count never straddle a swap.
    buffers: RwLock<BufferPair>,
    pending: AtomicUsize,
    config: BatchConfig,
    sink: Arc<dyn PriceSink>,
    trigger_tx: Mutex<Option<mpsc::Sender<()>>>,
    /// Serializes flushes: the next swap waits until the previous drain
    /// emptied the read buffer.
    drain_gate: tokio::sync::Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

pub struct PriceCache {
    name: String,
    primary: RwLock<AHashMap<String, PriceUpdate>>,
    batch: Option<Batching>,
}

impl PriceCache {
    /// Direct-write cache.
    pub fn direct(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            primary: RwLock::new(AHashMap::new()),
            batch: None,
        })
    }

    /// Double-buffer cache with a background flush loop. Must be called
    /// within a tokio runtime.
    pub fn batched(name: impl Into<String>, config: BatchConfig, sink: Arc<dyn PriceSink>) -> Arc<Self> {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let cache = Arc::new(Self {
            name: name.into(),
            primary: RwLock::new(AHashMap::new()),
            batch: Some(Batching {
                buffers: RwLock::new(BufferPair {
                    write: Arc::new(DashMap::new()),
                    read: Arc::new(DashMap::new()),
                }),
                pending: AtomicUsize::new(0),
                config: BatchConfig {
                    batch_size: config.batch_size.max(1),
                    flush_interval: config.flush_interval.max(MIN_FLUSH_INTERVAL),
                },
                sink,
                trigger_tx: Mutex::new(Some(trigger_tx)),
                drain_gate: tokio::sync::Mutex::new(()),
                task: Mutex::new(None),
                stopped: AtomicBool::new(false),
            }),
        });

        if let Some(batch) = &cache.batch {
            let handle = tokio::spawn(flush_loop(
                Arc::downgrade(&cache),
                trigger_rx,
                batch.config.flush_interval,
            ));
            *batch.task.lock() = Some(handle);
        }
        cache
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_batched(&self) -> bool {
        self.batch.is_some()
    }

    /// Overwrite the entry for `update.symbol` in the primary map.
    pub fn write(&self, update: PriceUpdate) {
        self.primary.write().insert(update.symbol.clone(), update);
    }

    pub fn write_many(&self, updates: impl IntoIterator<Item = PriceUpdate>) {
        let mut primary = self.primary.write();
        for update in updates {
            primary.insert(update.symbol.clone(), update);
        }
    }

    /// Buffer `update` for the next flush. Falls back to a direct write on a
    /// direct cache or after [`stop`](Self::stop).
    pub fn write_batched(&self, update: PriceUpdate) {
        let Some(batch) = &self.batch else {
            self.write(update);
            return;
        };

        // `stopped` flips under the write side, so checking it under the read
        // side means the final flush sees every record buffered here.
        let buffers = batch.buffers.read();
        if batch.stopped.load(Ordering::Acquire) {
            drop(buffers);
            self.write(update);
            return;
        }
        buffers.write.insert(update.symbol.clone(), update);
        let pending = batch.pending.fetch_add(1, Ordering::AcqRel) + 1;
        drop(buffers);

        if pending >= batch.config.batch_size {
            if let Some(tx) = batch.trigger_tx.lock().as_ref() {
                // Full means a flush is already requested.
                let _ = tx.try_send(());
            }
        }
    }

    /// Route by mode.
    pub fn ingest(&self, update: PriceUpdate) {
        if self.is_batched() {
            self.write_batched(update);
        } else {
            self.write(update);
        }
    }

    /// `None` if `symbol` was never written (or is still buffered).
    pub fn read(&self, symbol: &str) -> Option<PriceUpdate> {
        self.primary.read().get(symbol).cloned()
    }

    pub fn read_all(&self) -> Vec<PriceUpdate> {
        self.primary.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.primary.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes accepted since the last swap.
    pub fn pending(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.pending.load(Ordering::Acquire))
    }

    /// Swap buffers and drain the swapped-out one. Returns the number of
    /// records applied; `0` (no swap) when nothing is pending.
    pub async fn flush(&self) -> usize {
        let Some(batch) = &self.batch else {
            return 0;
        };
        let _gate = batch.drain_gate.lock().await;

        let drained = {
            let mut buffers = batch.buffers.write();
            if batch.pending.load(Ordering::Acquire) == 0 {
                return 0;
            }
            let BufferPair { write, read } = &mut *buffers;
            std::mem::swap(write, read);
            batch.pending.store(0, Ordering::Release);
            Arc::clone(read)
        };

        self.drain(batch, &drained).await
    }

    async fn drain(&self, batch: &Batching, buffer: &DashMap<String, PriceUpdate>) -> usize {
        let keys: Vec<String> = buffer.iter().map(|e| e.key().clone()).collect();
        let mut records = Vec::with_capacity(keys.len());
        {
            let mut primary = self.primary.write();
            for key in keys {
                if let Some((symbol, update)) = buffer.remove(&key) {
                    primary.insert(symbol, update.clone());
                    records.push(update);
                }
            }
        }

        let count = records.len();
        trace!("[{}] draining {count} record(s)", self.name);
        if let Err(e) = batch.sink.flush(records).await {
            warn!("[{}] sink flush failed ({count} records): {e}", self.name);
        }
        count
    }

    /// Stop the flush loop and force a final flush. Idempotent; a no-op on a
    /// direct cache.
    pub async fn stop(&self) -> usize {
        let Some(batch) = &self.batch else {
            return 0;
        };
        {
            let _buffers = batch.buffers.write();
            if batch.stopped.swap(true, Ordering::AcqRel) {
                return 0;
            }
        }
        batch.trigger_tx.lock().take();
        let task = batch.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        let flushed = self.flush().await;
        info!("[{}] stopped, final flush applied {flushed} record(s)", self.name);
        flushed
    }
}

async fn flush_loop(cache: Weak<PriceCache>, mut trigger_rx: mpsc::Receiver<()>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        let reason = tokio::select! {
            msg = trigger_rx.recv() => match msg {
                Some(()) => "size",
                None => break,
            },
            _ = ticker.tick() => "timer",
        };
        let Some(cache) = cache.upgrade() else {
            break;
        };
        if cache.pending() == 0 {
            continue;
        }
        trace!("[{}] flush triggered by {reason}", cache.name);
        tokio::spawn(async move {
            cache.flush().await;
        });
    }
    debug!("flush loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Feed, Venue};

    fn update(symbol: &str, price: &str) -> PriceUpdate {
        PriceUpdate::new(Venue::Binance, Feed::Spot, symbol, "1700000000000").with_last_price(price)
    }

    fn slow_batch(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            flush_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn last_write_wins() {
        let cache = PriceCache::direct("test");
        cache.write(update("BTCUSDT", "1"));
        cache.write(update("BTCUSDT", "2"));
        assert_eq!(cache.read("BTCUSDT").unwrap().last_price.as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_symbol_is_not_found() {
        let cache = PriceCache::direct("test");
        cache.write(update("BTCUSDT", "1"));
        assert!(cache.read("ETHUSDT").is_none());
    }

    #[tokio::test]
    async fn batched_writes_visible_only_after_flush() {
        let (sink, mut rx) = ChannelSink::new();
        let cache = PriceCache::batched("test", slow_batch(100), Arc::new(sink));

        for i in 0..10 {
            cache.write_batched(update(&format!("SYM{i}"), "1"));
        }
        assert!(cache.read_all().is_empty());
        assert_eq!(cache.pending(), 10);

        assert_eq!(cache.flush().await, 10);
        assert_eq!(cache.read_all().len(), 10);
        assert_eq!(rx.recv().await.unwrap().len(), 10);
        assert_eq!(cache.pending(), 0);
    }

    #[tokio::test]
    async fn flush_with_nothing_pending_is_noop() {
        let (sink, mut rx) = ChannelSink::new();
        let cache = PriceCache::batched("test", slow_batch(100), Arc::new(sink));
        assert_eq!(cache.flush().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reaching_batch_size_flushes_without_timer() {
        let (sink, mut rx) = ChannelSink::new();
        let cache = PriceCache::batched("test", slow_batch(5), Arc::new(sink));

        for i in 0..5 {
            cache.write_batched(update(&format!("SYM{i}"), "1"));
        }
        let batch = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("size-triggered flush")
            .unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(cache.read_all().len(), 5);
    }

    #[tokio::test]
    async fn stop_flushes_pending_writes() {
        let (sink, mut rx) = ChannelSink::new();
        let cache = PriceCache::batched("test", slow_batch(1000), Arc::new(sink));
        cache.write_batched(update("BTCUSDT", "50000"));
        cache.write_batched(update("ETHUSDT", "3000"));

        assert_eq!(cache.stop().await, 2);
        assert_eq!(cache.read("BTCUSDT").unwrap().last_price.as_deref(), Some("50000"));
        assert_eq!(rx.recv().await.unwrap().len(), 2);
        assert_eq!(cache.stop().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_lose_nothing() {
        let (sink, mut rx) = ChannelSink::new();
        let cache = PriceCache::batched("test", slow_batch(64), Arc::new(sink));

        let mut writers = Vec::new();
        for w in 0..8 {
            let cache = Arc::clone(&cache);
            writers.push(tokio::spawn(async move {
                for i in 0..500 {
                    cache.write_batched(update(&format!("W{w}-{i}"), "1"));
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }
        cache.stop().await;

        assert_eq!(cache.read_all().len(), 4000);
        let mut delivered = 0;
        while let Ok(batch) = rx.try_recv() {
            delivered += batch.len();
        }
        assert_eq!(delivered, 4000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writes_racing_stop_are_kept() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 200;

        for round in 0..50 {
            let (sink, _rx) = ChannelSink::new();
            let cache = PriceCache::batched("test", slow_batch(16), Arc::new(sink));

            let writers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let cache = Arc::clone(&cache);
                    tokio::task::spawn_blocking(move || {
                        for i in 0..PER_THREAD {
                            cache.write_batched(update(&format!("R{round}-T{t}-{i}"), "1"));
                        }
                    })
                })
                .collect();
            tokio::task::yield_now().await;
            cache.stop().await;
            for writer in writers {
                writer.await.unwrap();
            }

            assert_eq!(cache.read_all().len(), THREADS * PER_THREAD, "round {round}");
            assert_eq!(cache.pending(), 0, "round {round}");
        }
    }

    #[tokio::test]
    async fn zero_flush_interval_still_flushes_on_size() {
        let (sink, mut rx) = ChannelSink::new();
        let config = BatchConfig { batch_size: 2, flush_interval: Duration::ZERO };
        let cache = PriceCache::batched("test", config, Arc::new(sink));

        cache.write_batched(update("BTCUSDT", "1"));
        cache.write_batched(update("ETHUSDT", "2"));
        let batch = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("flush with zero interval")
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(cache.len(), 2);
    }
}

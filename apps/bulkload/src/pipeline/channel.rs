//! Bounded, closable record channel.
//!
//! A thin layer over `tokio::sync::mpsc`: the single sender belongs to the
//! feeder, the receiver is shared by every worker. `recv` returning `None`
//! means the feeder is done AND the buffer is drained, observed atomically.

use crate::records::Record;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Lifetime tallies; `sent == received + remaining` at all times.
#[derive(Debug, Default)]
pub struct ChannelStats {
    sent: AtomicU64,
    received: AtomicU64,
}

impl ChannelStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::SeqCst)
    }
}

/// Returned when every receiver is gone; hands the record back.
#[derive(Debug)]
pub struct ChannelClosed(pub Record);

/// Producer side. Dropping it closes the stream.
#[derive(Debug)]
pub struct RecordSender {
    tx: mpsc::Sender<Record>,
    stats: Arc<ChannelStats>,
}

impl RecordSender {
    /// Send from a synchronous thread, blocking while the buffer is full.
    ///
    /// Must not be called from inside an async context.
    pub fn blocking_send(&self, record: Record) -> Result<(), ChannelClosed> {
        self.stats.sent.fetch_add(1, Ordering::SeqCst);
        self.tx.blocking_send(record).map_err(|e| self.undo_send(e.0))
    }

    pub async fn send(&self, record: Record) -> Result<(), ChannelClosed> {
        self.stats.sent.fetch_add(1, Ordering::SeqCst);
        self.tx.send(record).await.map_err(|e| self.undo_send(e.0))
    }

    // Counted before handing over so `received` never overtakes `sent`.
    fn undo_send(&self, record: Record) -> ChannelClosed {
        self.stats.sent.fetch_sub(1, Ordering::SeqCst);
        ChannelClosed(record)
    }

    /// Close the stream. Equivalent to dropping the sender.
    pub fn close(self) {}
}

/// Consumer side, cloned once per worker.
#[derive(Debug, Clone)]
pub struct RecordReceiver {
    rx: Arc<Mutex<mpsc::Receiver<Record>>>,
    stats: Arc<ChannelStats>,
}

impl RecordReceiver {
    /// Wait for the next record; `None` once the stream is closed and empty.
    pub async fn recv(&self) -> Option<Record> {
        let record = self.rx.lock().await.recv().await?;
        self.stats.received.fetch_add(1, Ordering::SeqCst);
        Some(record)
    }

    /// Tallies shared with the sender; outlives the receiver.
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

/// Create a channel holding at most `capacity` records (minimum 1).
pub fn record_channel(capacity: usize) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(ChannelStats::default());
    (
        RecordSender {
            tx,
            stats: Arc::clone(&stats),
        },
        RecordReceiver {
            rx: Arc::new(Mutex::new(rx)),
            stats,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Header;
    use std::time::Duration;

    fn record(position: u64) -> Record {
        let header = Arc::new(Header::new(["email"]));
        Record::new(position, header, vec![format!("u{position}@example.com")]).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_and_close_after_drain() {
        let (tx, rx) = record_channel(4);
        for i in 1..=3 {
            tx.send(record(i)).await.unwrap();
        }
        tx.close();

        let mut seen = Vec::new();
        while let Some(r) = rx.recv().await {
            seen.push(r.position());
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(rx.stats().sent(), 3);
        assert_eq!(rx.stats().received(), 3);
    }

    #[tokio::test]
    async fn test_send_blocks_at_capacity() {
        let (tx, rx) = record_channel(1);
        tx.send(record(1)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.send(record(2))).await;
        assert!(blocked.is_err(), "send should wait while the buffer is full");

        assert_eq!(rx.recv().await.unwrap().position(), 1);
        tx.send(record(3)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().position(), 3);
    }

    #[tokio::test]
    async fn test_send_after_receivers_dropped() {
        let (tx, rx) = record_channel(2);
        drop(rx);
        let err = tx.send(record(9)).await.unwrap_err();
        assert_eq!(err.0.position(), 9);
        assert_eq!(tx.stats.sent(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_receiver_no_loss() {
        const TOTAL: u64 = 500;
        let (tx, rx) = record_channel(8);

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let rx = rx.clone();
                tokio::spawn(async move {
                    let mut n = 0u64;
                    while rx.recv().await.is_some() {
                        n += 1;
                    }
                    n
                })
            })
            .collect();

        let producer = tokio::task::spawn_blocking(move || {
            for i in 1..=TOTAL {
                tx.blocking_send(record(i)).unwrap();
            }
        });
        producer.await.unwrap();

        let mut total = 0;
        for c in consumers {
            total += c.await.unwrap();
        }
        assert_eq!(total, TOTAL);
        assert_eq!(rx.stats().sent(), rx.stats().received());
    }
}

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tmini_data::LaserScan;

/// Bounded hand-off of completed scans from the acquisition thread to
/// consumers. Holds the most recent rotations, not history.
pub(crate) struct ScanBuffer {
    scan_tx: Sender<LaserScan>,
    scan_rx: Receiver<LaserScan>,
    n_produced: AtomicUsize,
}

impl ScanBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> ScanBuffer {
        let (scan_tx, scan_rx) = bounded(capacity);
        ScanBuffer {
            scan_tx,
            scan_rx,
            n_produced: AtomicUsize::new(0),
        }
    }

    /// Queues a completed scan without ever blocking the producer. When
    /// the buffer is full the oldest queued scan is evicted to admit the
    /// new one.
    pub(crate) fn push(&self, scan: LaserScan) {
        let mut scan = scan;
        loop {
            match self.scan_tx.try_send(scan) {
                Ok(()) => break,
                Err(TrySendError::Full(rejected)) => {
                    debug!("Scan buffer full, dropping the oldest scan");
                    let _ = self.scan_rx.try_recv();
                    scan = rejected;
                }
                // both channel ends live in this struct
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        self.n_produced.fetch_add(1, Ordering::Relaxed);
    }

    /// Waits up to `timeout` for the oldest queued scan. `None` on
    /// expiry is a normal outcome, not a failure.
    pub(crate) fn pop(&self, timeout: Duration) -> Option<LaserScan> {
        self.scan_rx.recv_timeout(timeout).ok()
    }

    pub(crate) fn has_scan(&self) -> bool {
        !self.scan_rx.is_empty()
    }

    /// Total scans produced since creation, evictions included.
    pub(crate) fn n_produced(&self) -> usize {
        self.n_produced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn scan(timestamp: f64) -> LaserScan {
        LaserScan {
            points: Vec::new(),
            scan_frequency: 6.,
            timestamp,
        }
    }

    #[test]
    fn test_push_evicts_oldest_when_full() {
        let buffer = ScanBuffer::with_capacity(2);
        buffer.push(scan(1.));
        buffer.push(scan(2.));
        buffer.push(scan(3.));

        let popped = buffer.pop(Duration::from_millis(10)).unwrap();
        assert_eq!(popped.timestamp, 2.);
        let popped = buffer.pop(Duration::from_millis(10)).unwrap();
        assert_eq!(popped.timestamp, 3.);
        assert!(buffer.pop(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_n_produced_counts_evicted_scans() {
        let buffer = ScanBuffer::with_capacity(2);
        assert_eq!(buffer.n_produced(), 0);
        for i in 0..5 {
            buffer.push(scan(i as f64));
        }
        // total produced, not currently queued
        assert_eq!(buffer.n_produced(), 5);
        assert!(buffer.has_scan());
    }

    #[test]
    fn test_pop_times_out_on_empty_buffer() {
        let buffer = ScanBuffer::with_capacity(2);
        assert!(!buffer.has_scan());

        let before = Instant::now();
        assert!(buffer.pop(Duration::from_millis(100)).is_none());
        let elapsed = before.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_pop_from_consumer_thread() {
        let buffer = std::sync::Arc::new(ScanBuffer::with_capacity(2));
        let consumer = {
            let buffer = std::sync::Arc::clone(&buffer);
            std::thread::spawn(move || buffer.pop(Duration::from_secs(2)))
        };
        buffer.push(scan(7.));
        let received = consumer.join().unwrap();
        assert_eq!(received.unwrap().timestamp, 7.);
    }
}

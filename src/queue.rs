use crossbeam_channel::{bounded, Receiver, Sender};

/// Creates the bounded line queue connecting the sampler to the forwarder.
///
/// The producer half never blocks; the consumer half is a plain
/// `crossbeam_channel::Receiver` so the forwarder can `select!` over it
/// alongside its timers.
pub(crate) fn line_queue(capacity: usize) -> (LineSender, Receiver<String>) {
    let (tx, rx) = bounded(capacity);
    (LineSender { tx }, rx)
}

/// Producer half of the line queue.
///
/// Dropping every `LineSender` closes the queue: the receiver drains whatever
/// is buffered and then observes end-of-stream. The close is terminal --
/// nothing is accepted afterwards.
#[derive(Clone)]
pub(crate) struct LineSender {
    tx: Sender<String>,
}

impl LineSender {
    /// Enqueues a line without blocking.
    ///
    /// A line that arrives while the queue is full (or after it has closed) is
    /// dropped. Overflow is expected backpressure under load, not a fault, and
    /// is not reported to the caller.
    pub fn push(&self, line: String) {
        let _ = self.tx.try_send(line);
    }
}

#[cfg(test)]
mod tests {
    use super::line_queue;

    #[test]
    fn overflow_drops_the_incoming_line() {
        let (tx, rx) = line_queue(2);

        tx.push("first\n".to_string());
        tx.push("second\n".to_string());
        // The queue is full; this line is the one that gets dropped.
        tx.push("third\n".to_string());

        assert!(rx.len() <= 2);

        drop(tx);
        let drained: Vec<String> = rx.iter().collect();
        assert_eq!(drained, vec!["first\n".to_string(), "second\n".to_string()]);
    }

    #[test]
    fn close_drains_then_ends() {
        let (tx, rx) = line_queue(4);

        tx.push("pending\n".to_string());
        drop(tx);

        assert_eq!(rx.recv().as_deref(), Ok("pending\n"));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn push_after_close_is_a_no_op() {
        let (tx, rx) = line_queue(4);
        drop(rx);

        // Must neither panic nor block.
        tx.push("ignored\n".to_string());
    }
}

use tetra_proto::event::ScanEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Where a scan publishes its diagnostics. Must never block the scan.
pub trait EventSink {
    fn emit(&mut self, event: ScanEvent);
}

/// Discards everything.
impl EventSink for () {
    fn emit(&mut self, _event: ScanEvent) {}
}

impl EventSink for Vec<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) {
        self.push(event);
    }
}

/// Drops the event when the queue is full or the receiver is gone.
impl EventSink for mpsc::Sender<ScanEvent> {
    fn emit(&mut self, event: ScanEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => trace!("scan: event queue full, dropped {:?}", ev),
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_proto::event::ScanPhase;

    fn ev(cursor: usize) -> ScanEvent {
        ScanEvent::PhaseEntered { phase: ScanPhase::Scan, cursor }
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (mut tx, mut rx) = mpsc::channel(1);
        tx.emit(ev(1));
        tx.emit(ev(2));
        assert_eq!(rx.try_recv().ok(), Some(ev(1)));
        assert!(rx.try_recv().is_err());

        drop(rx);
        tx.emit(ev(3));
    }

    #[test]
    fn vec_collects() {
        let mut v = Vec::new();
        v.emit(ev(0));
        assert_eq!(v, vec![ev(0)]);
    }
}

//! Event delivery over a channel.
//!
//! [`ChannelSink`] forwards engine events to a consumer on another
//! thread. Delivery never blocks the tick: when the channel is full or
//! the receiver is gone, the event is counted as dropped.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;
use trackway_core::{EventSink, TrackEvent};

/// [`EventSink`] backed by a crossbeam channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<TrackEvent>,
    dropped: u64,
}

impl ChannelSink {
    /// Wrap an existing sender.
    pub fn new(tx: Sender<TrackEvent>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// A sink over a new bounded channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<TrackEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self::new(tx), rx)
    }

    /// A sink over a new unbounded channel.
    pub fn unbounded() -> (Self, Receiver<TrackEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(tx), rx)
    }

    /// Events that could not be delivered.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn dispatch(&mut self, event: TrackEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if self.dropped == 0 {
                    warn!("event channel full, dropping events");
                }
                self.dropped += 1;
            }
            Err(TrySendError::Disconnected(_)) => {
                if self.dropped == 0 {
                    warn!("event receiver disconnected, dropping events");
                }
                self.dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackway_core::GroupId;

    #[test]
    fn delivers_in_order() {
        let (mut sink, rx) = ChannelSink::unbounded();
        sink.dispatch(TrackEvent::GroupCreated { group: GroupId(1) });
        sink.dispatch(TrackEvent::GroupRemoved { group: GroupId(1) });
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                TrackEvent::GroupCreated { group: GroupId(1) },
                TrackEvent::GroupRemoved { group: GroupId(1) },
            ]
        );
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn full_or_closed_channel_counts_drops() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        sink.dispatch(TrackEvent::GroupCreated { group: GroupId(1) });
        sink.dispatch(TrackEvent::GroupCreated { group: GroupId(2) });
        assert_eq!(sink.dropped(), 1);
        drop(rx);
        sink.dispatch(TrackEvent::GroupCreated { group: GroupId(3) });
        assert_eq!(sink.dropped(), 2);
    }
}

//! Direct wiring of pipeline elements inside one execution context.
//!
//! Both execution models use these operations: local mode calls them from the
//! caller's context, threaded mode from the worker servicing envelopes. The
//! chain state is a [`BoundEndpoints`] value tracking which readable endpoint
//! is the current tail.

use crate::report::ErrorReporter;
use crate::stage::{self, TransformStage};
use crate::stream::{self, Readable, Writable};
use std::sync::Arc;

/// Ordered bookkeeping of the readable endpoints a chain has exposed.
///
/// The slot list only ever grows. A slot starts open and flips to piped when
/// the next element is wired onto it; on the orderly path only the last slot
/// is ever open. Slots before an out-of-order addition can stay open forever,
/// which is exactly the unfed-chain hazard the wiring leaves unenforced.
pub struct BoundEndpoints<T> {
    slots: Vec<EndpointSlot<T>>,
}

enum EndpointSlot<T> {
    Open(Readable<T>),
    Piped,
}

impl<T> BoundEndpoints<T> {
    /// Creates an empty endpoint list.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of endpoints ever registered, piped or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true when the last registered endpoint is still unconsumed.
    pub fn tail_is_open(&self) -> bool {
        matches!(self.slots.last(), Some(EndpointSlot::Open(_)))
    }

    /// Registers a readable endpoint as the new tail.
    pub fn push_open(&mut self, readable: Readable<T>) {
        self.slots.push(EndpointSlot::Open(readable));
    }

    /// Takes the tail endpoint out of its slot, leaving the slot piped.
    ///
    /// Returns `None` when there is no tail or it was already consumed.
    pub fn take_tail(&mut self) -> Option<Readable<T>> {
        let last = self.slots.last_mut()?;
        match std::mem::replace(last, EndpointSlot::Piped) {
            EndpointSlot::Open(readable) => Some(readable),
            EndpointSlot::Piped => None,
        }
    }
}

impl<T> Default for BoundEndpoints<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers a source endpoint as the new chain tail.
pub fn add_source<T>(source: Readable<T>, bound: &mut BoundEndpoints<T>) {
    bound.push_open(source);
}

/// Wires a stage onto the current tail and registers its output as the new tail.
///
/// Without a tail the stage starts a new chain nothing feeds: its inlet is
/// already closed, so the pump exits at once and everything chained onto it
/// stays silent until a later element is wired to a live endpoint.
pub fn add_transform<T: Send + 'static>(
    transform: TransformStage<T>,
    bound: &mut BoundEndpoints<T>,
    default_capacity: usize,
    reporter: Arc<dyn ErrorReporter>,
) {
    let inlet = match bound.take_tail() {
        Some(tail) => tail,
        None => {
            tracing::warn!(
                stage = transform.name(),
                "no upstream endpoint; stage starts an unfed chain"
            );
            closed_inlet()
        }
    };
    let capacity = transform.capacity().unwrap_or(default_capacity);
    let (outlet_tx, outlet_rx) = stream::bounded(capacity);
    stage::spawn_transform_pump(transform, inlet, outlet_tx, reporter);
    bound.push_open(outlet_rx);
}

/// Drives the current tail into a sink endpoint.
///
/// Sinks expose no readable endpoint, so nothing new is registered. Without
/// a tail the sink endpoint is dropped and downstream observes a closed
/// stream.
pub fn add_sink<T: Send + 'static>(sink: Writable<T>, bound: &mut BoundEndpoints<T>) {
    match bound.take_tail() {
        Some(tail) => stage::spawn_forward_pump(tail, sink),
        None => {
            tracing::warn!("no upstream endpoint; sink stream stays empty");
            drop(sink);
        }
    }
}

fn closed_inlet<T>() -> Readable<T> {
    let (_tx, rx) = stream::bounded(1);
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::LogReporter;
    use std::time::Duration;

    #[test]
    fn test_bound_endpoints_starts_empty() {
        let bound: BoundEndpoints<i32> = BoundEndpoints::new();
        assert_eq!(bound.len(), 0);
        assert!(bound.is_empty());
        assert!(!bound.tail_is_open());
    }

    #[test]
    fn test_take_tail_consumes_slot_once() {
        let mut bound = BoundEndpoints::new();
        let (_tx, rx) = stream::bounded::<i32>(1);
        bound.push_open(rx);

        assert!(bound.tail_is_open());
        assert!(bound.take_tail().is_some());
        // Slot stays counted but is piped now
        assert_eq!(bound.len(), 1);
        assert!(!bound.tail_is_open());
        assert!(bound.take_tail().is_none());
    }

    #[test]
    fn test_add_source_registers_tail() {
        let mut bound = BoundEndpoints::new();
        let (_tx, rx) = stream::bounded::<i32>(1);
        add_source(rx, &mut bound);
        assert_eq!(bound.len(), 1);
        assert!(bound.tail_is_open());
    }

    #[test]
    fn test_add_transform_chains_onto_tail() {
        let mut bound = BoundEndpoints::new();
        let (tx, rx) = stream::bounded(4);
        add_source(rx, &mut bound);

        let stage = TransformStage::map("double", |x: i32| x * 2);
        add_transform(stage, &mut bound, 4, Arc::new(LogReporter));
        assert_eq!(bound.len(), 2);
        assert!(bound.tail_is_open());

        tx.send(21).unwrap();
        drop(tx);

        let tail = bound.take_tail().unwrap();
        assert_eq!(tail.recv().unwrap(), 42);
        assert!(tail.recv().is_err());
    }

    #[test]
    fn test_add_transform_honors_capacity_override() {
        let mut bound = BoundEndpoints::new();
        let (tx, rx) = stream::bounded(8);
        add_source(rx, &mut bound);

        let stage = TransformStage::map("hold", |x: i32| x).with_capacity(1);
        add_transform(stage, &mut bound, 64, Arc::new(LogReporter));

        // With capacity 1 and nobody reading the tail, only the buffered
        // item plus the one in flight make progress.
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let tail = bound.take_tail().unwrap();
        assert_eq!(tail.recv().unwrap(), 1);
        assert_eq!(tail.recv().unwrap(), 2);
        drop(tx);
        assert_eq!(tail.recv().unwrap(), 3);
    }

    #[test]
    fn test_add_transform_without_tail_starts_unfed_chain() {
        let mut bound: BoundEndpoints<i32> = BoundEndpoints::new();
        let stage = TransformStage::map("orphan", |x: i32| x);
        add_transform(stage, &mut bound, 4, Arc::new(LogReporter));

        assert_eq!(bound.len(), 1);
        // The orphan's inlet is pre-closed, so its output closes too
        let tail = bound.take_tail().unwrap();
        assert!(tail.recv_timeout(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_add_sink_forwards_tail() {
        let mut bound = BoundEndpoints::new();
        let (tx, rx) = stream::bounded(4);
        add_source(rx, &mut bound);

        let (sink_tx, sink_rx) = stream::bounded(4);
        add_sink(sink_tx, &mut bound);
        assert_eq!(bound.len(), 1);
        assert!(!bound.tail_is_open());

        tx.send(7).unwrap();
        drop(tx);

        assert_eq!(sink_rx.recv().unwrap(), 7);
        assert!(sink_rx.recv().is_err());
    }

    #[test]
    fn test_add_sink_without_tail_closes_stream() {
        let mut bound: BoundEndpoints<i32> = BoundEndpoints::new();
        let (sink_tx, sink_rx) = stream::bounded(4);
        add_sink(sink_tx, &mut bound);

        assert!(sink_rx.recv().is_err());
        assert_eq!(bound.len(), 0);
    }

    #[test]
    fn test_source_stage_sink_end_to_end() {
        let mut bound = BoundEndpoints::new();
        let (tx, rx) = stream::bounded(4);
        add_source(rx, &mut bound);

        let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
        add_transform(
            TransformStage::map("inc", |x: i32| x + 1),
            &mut bound,
            4,
            reporter.clone(),
        );
        add_transform(
            TransformStage::map("double", |x: i32| x * 2),
            &mut bound,
            4,
            reporter,
        );

        let (sink_tx, sink_rx) = stream::bounded(4);
        add_sink(sink_tx, &mut bound);

        assert_eq!(bound.len(), 3);

        tx.send(5).unwrap();
        drop(tx);

        assert_eq!(sink_rx.recv().unwrap(), 12);
        assert!(sink_rx.recv().is_err());
    }
}

//! Mechanical events with a pre-allocated ring buffer.
//!
//! Topology events (placement, removal, variant exchange, merges and splits)
//! are recorded synchronously as the resolver applies each edit. Rotational
//! transitions are recorded by the tick driver. The host drains the buffer
//! whenever it likes; when the buffer is full the oldest events are dropped.

use crate::direction::Direction;
use crate::fixed::Ticks;
use crate::grid::GridPos;
use crate::id::{BlockTypeId, NetworkId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Why a node left the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Broken by the host (player action or world edit).
    Broken,
    /// Lost its last supporting connection and has no zero-connector state.
    Unsupported,
    /// The world no longer holds the block the record describes.
    Stale,
}

/// A mechanical event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MechanicalEvent {
    // -- Nodes --
    NodePlaced {
        pos: GridPos,
        block_type: BlockTypeId,
        tick: Ticks,
    },
    NodeRemoved {
        pos: GridPos,
        block_type: BlockTypeId,
        reason: RemovalReason,
        tick: Ticks,
    },
    VariantExchanged {
        pos: GridPos,
        from: BlockTypeId,
        to: BlockTypeId,
        tick: Ticks,
    },
    ConnectorLinked {
        pos: GridPos,
        dir: Direction,
        tick: Ticks,
    },
    ConnectorUnlinked {
        pos: GridPos,
        dir: Direction,
        tick: Ticks,
    },
    DisconnectToggled {
        pos: GridPos,
        disconnected: bool,
        tick: Ticks,
    },
    /// A composite lost a satellite and fell back to a single-cell block.
    CompositeDetached {
        principal: GridPos,
        from: BlockTypeId,
        to: BlockTypeId,
        tick: Ticks,
    },

    // -- Networks --
    NetworkCreated {
        network: NetworkId,
        tick: Ticks,
    },
    NetworksMerged {
        survivor: NetworkId,
        absorbed: NetworkId,
        tick: Ticks,
    },
    NetworkSplit {
        original: NetworkId,
        parts: Vec<NetworkId>,
        tick: Ticks,
    },
    NetworkDestroyed {
        network: NetworkId,
        tick: Ticks,
    },

    // -- Rotation --
    NetworkStarted {
        network: NetworkId,
        tick: Ticks,
    },
    NetworkStopped {
        network: NetworkId,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodePlaced,
    NodeRemoved,
    VariantExchanged,
    ConnectorLinked,
    ConnectorUnlinked,
    DisconnectToggled,
    CompositeDetached,
    NetworkCreated,
    NetworksMerged,
    NetworkSplit,
    NetworkDestroyed,
    NetworkStarted,
    NetworkStopped,
}

impl MechanicalEvent {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            MechanicalEvent::NodePlaced { .. } => EventKind::NodePlaced,
            MechanicalEvent::NodeRemoved { .. } => EventKind::NodeRemoved,
            MechanicalEvent::VariantExchanged { .. } => EventKind::VariantExchanged,
            MechanicalEvent::ConnectorLinked { .. } => EventKind::ConnectorLinked,
            MechanicalEvent::ConnectorUnlinked { .. } => EventKind::ConnectorUnlinked,
            MechanicalEvent::DisconnectToggled { .. } => EventKind::DisconnectToggled,
            MechanicalEvent::CompositeDetached { .. } => EventKind::CompositeDetached,
            MechanicalEvent::NetworkCreated { .. } => EventKind::NetworkCreated,
            MechanicalEvent::NetworksMerged { .. } => EventKind::NetworksMerged,
            MechanicalEvent::NetworkSplit { .. } => EventKind::NetworkSplit,
            MechanicalEvent::NetworkDestroyed { .. } => EventKind::NetworkDestroyed,
            MechanicalEvent::NetworkStarted { .. } => EventKind::NetworkStarted,
            MechanicalEvent::NetworkStopped { .. } => EventKind::NetworkStopped,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            MechanicalEvent::NodePlaced { tick, .. }
            | MechanicalEvent::NodeRemoved { tick, .. }
            | MechanicalEvent::VariantExchanged { tick, .. }
            | MechanicalEvent::ConnectorLinked { tick, .. }
            | MechanicalEvent::ConnectorUnlinked { tick, .. }
            | MechanicalEvent::DisconnectToggled { tick, .. }
            | MechanicalEvent::CompositeDetached { tick, .. }
            | MechanicalEvent::NetworkCreated { tick, .. }
            | MechanicalEvent::NetworksMerged { tick, .. }
            | MechanicalEvent::NetworkSplit { tick, .. }
            | MechanicalEvent::NetworkDestroyed { tick, .. }
            | MechanicalEvent::NetworkStarted { tick, .. }
            | MechanicalEvent::NetworkStopped { tick, .. } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    /// Pre-allocated storage.
    events: Vec<Option<MechanicalEvent>>,
    /// Write position (wraps around).
    head: usize,
    /// Number of events currently stored (may be less than capacity).
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    /// Events dropped because the buffer was full.
    dropped: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: MechanicalEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        } else {
            self.dropped += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation (including dropped).
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    fn oldest(&self) -> usize {
        if self.len < self.capacity() {
            (self.head + self.capacity() - self.len) % self.capacity()
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        }
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        EventBufferIter {
            buffer: self,
            index: self.oldest(),
            remaining: self.len,
        }
    }

    /// Take every stored event, oldest first, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<MechanicalEvent> {
        let mut out = Vec::with_capacity(self.len);
        let cap = self.capacity();
        let mut index = self.oldest();
        for _ in 0..self.len {
            if let Some(event) = self.events[index].take() {
                out.push(event);
            }
            index = (index + 1) % cap;
        }
        self.head = 0;
        self.len = 0;
        out
    }

    /// Clear all events from the buffer.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a MechanicalEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

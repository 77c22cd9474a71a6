//
// Copyright 2025 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Event bus implementation

use super::types::CitizenEvent;
use std::sync::{Arc, RwLock};

/// What a listener wants done with a cancellable event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDisposition {
    #[default]
    Continue,
    Cancel,
}

pub type EventHandler = Box<dyn Fn(&CitizenEvent) -> EventDisposition + Send + Sync>;

/// Event bus for citizen lifecycle and interaction notifications.
///
/// Cancellable events (`Interacted`, `Died`) go through [`EventBus::dispatch`],
/// which runs every listener synchronously before the caller commits side
/// effects; any listener returning [`EventDisposition::Cancel`] vetoes the
/// event. Post-hoc notifications use [`EventBus::publish`] and are drained by
/// [`EventBus::process_events`].
pub struct EventBus {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
    event_queue: Arc<RwLock<Vec<CitizenEvent>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
            event_queue: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Subscribe to events with a handler function
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&CitizenEvent) -> EventDisposition + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap();
        handlers.push(Box::new(handler));
    }

    /// Run every handler against the event immediately. Returns `true` if
    /// any handler cancelled it. All handlers see the event even when an
    /// earlier one cancels.
    pub fn dispatch(&self, event: &CitizenEvent) -> bool {
        let handlers = self.handlers.read().unwrap();
        let mut cancelled = false;
        for handler in handlers.iter() {
            if handler(event) == EventDisposition::Cancel {
                cancelled = true;
            }
        }
        cancelled
    }

    /// Queue a post-hoc notification
    pub fn publish(&self, event: CitizenEvent) {
        let mut queue = self.event_queue.write().unwrap();
        queue.push(event);
    }

    /// Process all queued notifications. Dispositions are ignored; queued
    /// events are not cancellable.
    pub fn process_events(&self) {
        let mut queue = self.event_queue.write().unwrap();
        let events: Vec<_> = queue.drain(..).collect();
        drop(queue);

        let handlers = self.handlers.read().unwrap();
        for event in events {
            for handler in handlers.iter() {
                handler(&event);
            }
        }
    }

    /// Clear all queued events without processing
    pub fn clear(&self) {
        let mut queue = self.event_queue.write().unwrap();
        queue.clear();
    }

    /// Get the number of queued events
    pub fn queue_len(&self) -> usize {
        let queue = self.event_queue.read().unwrap();
        queue.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
            event_queue: Arc::clone(&self.event_queue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use townsfolk_common::id::CitizenId;

    #[test]
    fn test_event_bus() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        bus.subscribe(move |_event| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            EventDisposition::Continue
        });

        bus.publish(CitizenEvent::Despawned {
            citizen: CitizenId::new(),
        });

        assert_eq!(bus.queue_len(), 1);

        bus.process_events();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_dispatch_cancel() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s1 = Arc::clone(&seen);
        bus.subscribe(move |_| {
            s1.fetch_add(1, Ordering::SeqCst);
            EventDisposition::Cancel
        });
        let s2 = Arc::clone(&seen);
        bus.subscribe(move |_| {
            s2.fetch_add(1, Ordering::SeqCst);
            EventDisposition::Continue
        });

        let cancelled = bus.dispatch(&CitizenEvent::Removed {
            citizen: CitizenId::new(),
        });

        assert!(cancelled);
        // Both handlers still observed the event
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispatch_without_handlers_continues() {
        let bus = EventBus::new();
        assert!(!bus.dispatch(&CitizenEvent::Removed {
            citizen: CitizenId::new(),
        }));
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();

        bus.publish(CitizenEvent::Despawned {
            citizen: CitizenId::new(),
        });

        assert_eq!(bus.queue_len(), 1);
        bus.clear();
        assert_eq!(bus.queue_len(), 0);
    }
}

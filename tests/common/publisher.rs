//! Recording publisher for coordinator tests

use bytes::Bytes;
use huddle::backend::realtime::EventPublisher;
use huddle::shared::{Event, EventType};
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingPublisher {
    broadcasts: Mutex<Vec<(Uuid, Event)>>,
    direct: Mutex<Vec<(Uuid, Bytes)>>,
}

impl RecordingPublisher {
    /// Types of every channel broadcast so far, in order
    pub fn broadcast_types(&self) -> Vec<EventType> {
        self.broadcasts.lock().iter().map(|(_, e)| e.event_type.clone()).collect()
    }

    pub fn count_of(&self, event_type: EventType) -> usize {
        self.broadcasts
            .lock()
            .iter()
            .filter(|(_, e)| e.event_type == event_type)
            .count()
    }

    pub fn direct_messages(&self) -> Vec<(Uuid, Bytes)> {
        self.direct.lock().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn broadcast(&self, channel_id: Uuid, event: &Event) {
        self.broadcasts.lock().push((channel_id, event.clone()));
    }

    fn send_to_user(&self, user_id: Uuid, payload: Bytes) {
        self.direct.lock().push((user_id, payload));
    }
}

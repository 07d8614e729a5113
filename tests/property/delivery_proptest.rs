//! Property-based tests for channel delivery
//!
//! Whatever the mix of subscribed and unsubscribed connections, a channel
//! broadcast reaches exactly the subscribers minus the excluded connection.

use bytes::Bytes;
use huddle::backend::realtime::{Connection, Hub};
use huddle::backend::server::RealtimeConfig;
use proptest::prelude::*;
use uuid::Uuid;

proptest! {
    #[test]
    fn test_broadcast_reaches_subscribers_except_excluded(
        subscribed in prop::collection::vec(any::<bool>(), 1..12),
        exclude_index in any::<prop::sample::Index>(),
        exclude_some in any::<bool>(),
    ) {
        tokio_test::block_on(async {
            let hub = Hub::start(&RealtimeConfig::default(), None).await;
            let channel = Uuid::new_v4();

            let mut connections = Vec::new();
            for &is_member in &subscribed {
                let (connection, queue) = Connection::new(Uuid::new_v4(), "user", 64);
                if is_member {
                    connection.subscribe(channel);
                }
                hub.register(connection.clone()).await.unwrap();
                connections.push((connection, queue, is_member));
            }

            // Drop presence announcements
            for (_, queue, _) in connections.iter_mut() {
                while queue.try_recv().is_ok() {}
            }

            let excluded = if exclude_some {
                Some(connections[exclude_index.index(connections.len())].0.id())
            } else {
                None
            };

            let delivered = hub.broadcast_to_channel(channel, Bytes::from_static(b"{}"), excluded);

            let mut expected = 0;
            for (connection, queue, is_member) in connections.iter_mut() {
                let should_receive = *is_member && Some(connection.id()) != excluded;
                if should_receive {
                    expected += 1;
                }
                prop_assert_eq!(queue.try_recv().is_ok(), should_receive);
            }
            prop_assert_eq!(delivered, expected);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn test_full_queue_never_blocks_delivery(capacity in 1usize..8, sends in 0usize..32) {
        let (connection, mut queue) = Connection::new(Uuid::new_v4(), "user", capacity);

        let accepted = (0..sends).filter(|_| connection.send(Bytes::from_static(b"x"))).count();

        prop_assert_eq!(accepted, sends.min(capacity));
        prop_assert_eq!(connection.dropped_messages() as usize, sends.saturating_sub(capacity));

        let mut drained = 0;
        while queue.try_recv().is_ok() {
            drained += 1;
        }
        prop_assert_eq!(drained, accepted);
    }
}

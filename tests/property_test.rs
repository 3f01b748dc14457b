//! Property-based tests for unread counts and status monotonicity

mod common;

use proptest::prelude::*;
use pulsechat::backend::store::PersistentStore;
use pulsechat::shared::messaging::MessageStatus;

fn status() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sent),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_unread_count_matches_unacknowledged(acks in proptest::collection::vec(any::<bool>(), 1..12)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (count, expected, read) = runtime.block_on(async {
            let h = common::harness();
            let a = h.user("a").await;
            let b = h.user("b").await;
            h.befriend(a, b).await;

            let mut conversation_id = None;
            let mut acknowledged = Vec::new();
            for ack in &acks {
                let mut payload = common::first_message(a, b, "hi");
                payload.conversation_id = conversation_id;
                let (resolution, message) = h.state.messaging.send_message(payload).await.unwrap();
                conversation_id = Some(resolution.conversation.id);
                if *ack {
                    acknowledged.push(message.id);
                }
            }
            let conversation_id = conversation_id.unwrap();

            h.state
                .messaging
                .messages_read(&acknowledged, conversation_id, b)
                .await
                .unwrap();

            let mut read = 0;
            for id in &acknowledged {
                if h.store.find_message(*id).await.unwrap().unwrap().status == MessageStatus::Read {
                    read += 1;
                }
            }

            let count = h.state.messaging.unread().count(conversation_id, b).await.unwrap();
            (count, (acks.len() - acknowledged.len()) as u64, (read, acknowledged.len()))
        });

        prop_assert_eq!(count, expected);
        prop_assert_eq!(read.0, read.1);
    }

    #[test]
    fn test_status_never_moves_backward(start in status(), steps in proptest::collection::vec(status(), 0..16)) {
        let mut current = start;
        for next in steps {
            let advanced = current.advance(next);
            prop_assert!(advanced >= current);
            prop_assert!(advanced >= next);
            current = advanced;
        }
    }

    #[test]
    fn test_acknowledging_twice_is_harmless(repeats in 1usize..4) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let count = runtime.block_on(async {
            let h = common::harness();
            let a = h.user("a").await;
            let b = h.user("b").await;
            h.befriend(a, b).await;

            let (resolution, message) = h
                .state
                .messaging
                .send_message(common::first_message(a, b, "hi"))
                .await
                .unwrap();
            let mut count = 0;
            for _ in 0..repeats {
                count = h
                    .state
                    .messaging
                    .messages_read(&[message.id], resolution.conversation.id, b)
                    .await
                    .unwrap();
            }
            count
        });
        prop_assert_eq!(count, 0);
    }
}

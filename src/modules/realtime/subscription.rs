use actix::prelude::*;
use uuid::Uuid;

use super::events::{ChannelFilter, ChannelId, Subscribe, Unsubscribe};
use super::hub::RealtimeHub;
use super::events::ChannelEvent;

/// Holds at most one open channel for its owner.
///
/// Opening always closes the previous channel first; both requests go through the hub's
/// mailbox in order, so the old channel is gone before the new one exists. Events that
/// still arrive for a closed channel are recognised by their id and dropped by the owner.
pub struct ChannelSlot {
    hub: Addr<RealtimeHub>,
    current: Option<(ChannelId, ChannelFilter)>,
}

impl ChannelSlot {
    pub fn new(hub: Addr<RealtimeHub>) -> Self {
        Self { hub, current: None }
    }

    pub fn open(&mut self, filter: ChannelFilter, recipient: Recipient<ChannelEvent>) -> ChannelId {
        self.close();

        let channel_id = Uuid::now_v7();
        tracing::debug!("Opening channel {} for {:?}", channel_id, filter);
        self.hub.do_send(Subscribe { channel_id, filter: filter.clone(), recipient });
        self.current = Some((channel_id, filter));
        channel_id
    }

    pub fn close(&mut self) -> Option<ChannelId> {
        let (channel_id, _) = self.current.take()?;
        self.hub.do_send(Unsubscribe { channel_id });
        Some(channel_id)
    }

    pub fn is_current(&self, channel_id: &ChannelId) -> bool {
        self.current.as_ref().is_some_and(|(id, _)| id == channel_id)
    }

    pub fn filter(&self) -> Option<&ChannelFilter> {
        self.current.as_ref().map(|(_, filter)| filter)
    }
}

impl Drop for ChannelSlot {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::realtime::events::CountChannels;
    use crate::test::{Collector, settle};

    #[actix_web::test]
    async fn test_reopen_keeps_one_channel() {
        let hub = RealtimeHub::default().start();
        let addr = Collector::default().start();
        let mut slot = ChannelSlot::new(hub.clone());

        let first = slot.open(
            ChannelFilter::ConversationMessages { conversation_id: Uuid::now_v7() },
            addr.clone().recipient(),
        );
        let second = slot.open(
            ChannelFilter::ConversationMessages { conversation_id: Uuid::now_v7() },
            addr.clone().recipient(),
        );
        settle().await;

        assert_ne!(first, second);
        assert!(!slot.is_current(&first));
        assert!(slot.is_current(&second));
        assert_eq!(hub.send(CountChannels { filter: None }).await.unwrap(), 1);

        drop(slot);
        settle().await;
        assert_eq!(hub.send(CountChannels { filter: None }).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_close_without_channel_is_noop() {
        let hub = RealtimeHub::default().start();
        let mut slot = ChannelSlot::new(hub);
        assert!(slot.close().is_none());
        assert!(slot.filter().is_none());
    }
}

/// Realtime Hub Actor
///
/// Owns every open channel and routes change events to the subscribers whose filter
/// matches. Delivery to one recipient goes through its mailbox, so per-channel order is
/// the order events were published.
use actix::prelude::*;
use std::collections::HashMap;

use super::events::*;

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub max_channels: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { max_channels: 10_000 }
    }
}

struct Channel {
    filter: ChannelFilter,
    recipient: Recipient<ChannelEvent>,
}

pub struct RealtimeHub {
    /// Map: channel_id -> subscriber
    channels: HashMap<ChannelId, Channel>,
    config: HubConfig,
}

impl RealtimeHub {
    pub fn new(config: HubConfig) -> Self {
        Self { channels: HashMap::new(), config }
    }

    fn notify_status(
        recipient: &Recipient<ChannelEvent>,
        channel_id: ChannelId,
        status: ChannelStatus,
        reason: Option<String>,
    ) {
        recipient.do_send(ChannelEvent {
            channel_id,
            payload: ChannelPayload::Status { status, reason },
        });
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl Actor for RealtimeHub {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Realtime hub started (capacity {} channels)", self.config.max_channels);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        for (channel_id, channel) in self.channels.drain() {
            Self::notify_status(&channel.recipient, channel_id, ChannelStatus::Closed, None);
        }
        Running::Stop
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Realtime hub stopped");
    }
}

impl Handler<Subscribe> for RealtimeHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        if self.channels.contains_key(&msg.channel_id) {
            tracing::warn!("Channel {} is already open", msg.channel_id);
            Self::notify_status(
                &msg.recipient,
                msg.channel_id,
                ChannelStatus::Error,
                Some("channel is already open".to_string()),
            );
            return;
        }

        if self.channels.len() >= self.config.max_channels {
            tracing::warn!(
                "Rejecting channel {}: {} channels open",
                msg.channel_id,
                self.channels.len()
            );
            Self::notify_status(
                &msg.recipient,
                msg.channel_id,
                ChannelStatus::Error,
                Some("realtime capacity reached".to_string()),
            );
            return;
        }

        tracing::debug!("Channel {} subscribed to {:?}", msg.channel_id, msg.filter);
        Self::notify_status(&msg.recipient, msg.channel_id, ChannelStatus::Subscribed, None);
        self.channels.insert(msg.channel_id, Channel { filter: msg.filter, recipient: msg.recipient });
    }
}

impl Handler<Unsubscribe> for RealtimeHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        if self.channels.remove(&msg.channel_id).is_some() {
            tracing::debug!("Channel {} closed ({} remaining)", msg.channel_id, self.channels.len());
        }
    }
}

impl Handler<Publish> for RealtimeHub {
    type Result = ();

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) {
        // subscribers that went away without unsubscribing
        self.channels.retain(|_, channel| channel.recipient.connected());

        let mut sent_count = 0;
        for (channel_id, channel) in &self.channels {
            if channel.filter.matches(&msg.event) {
                channel.recipient.do_send(ChannelEvent {
                    channel_id: *channel_id,
                    payload: ChannelPayload::Change(msg.event.clone()),
                });
                sent_count += 1;
            }
        }

        tracing::debug!("Published change to {} channel(s)", sent_count);
    }
}

impl Handler<ChannelFault> for RealtimeHub {
    type Result = ();

    fn handle(&mut self, msg: ChannelFault, _: &mut Context<Self>) {
        let failed: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, channel)| channel.filter == msg.filter)
            .map(|(channel_id, _)| *channel_id)
            .collect();

        for channel_id in failed {
            if let Some(channel) = self.channels.remove(&channel_id) {
                tracing::warn!("Channel {} failed: {}", channel_id, msg.reason);
                Self::notify_status(
                    &channel.recipient,
                    channel_id,
                    ChannelStatus::Error,
                    Some(msg.reason.clone()),
                );
            }
        }
    }
}

impl Handler<CountChannels> for RealtimeHub {
    type Result = usize;

    fn handle(&mut self, msg: CountChannels, _: &mut Context<Self>) -> Self::Result {
        match msg.filter {
            Some(filter) => self.channels.values().filter(|c| c.filter == filter).count(),
            None => self.channels.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{Collector, settle};
    use uuid::Uuid;

    #[actix_web::test]
    async fn test_publish_reaches_matching_channels_only() {
        let hub = RealtimeHub::default().start();
        let collector = Collector::default();
        let addr = collector.clone().start();

        let conv = Uuid::now_v7();
        let watched = Uuid::now_v7();
        hub.do_send(Subscribe {
            channel_id: watched,
            filter: ChannelFilter::ConversationMessages { conversation_id: conv },
            recipient: addr.clone().recipient(),
        });
        hub.do_send(Subscribe {
            channel_id: Uuid::now_v7(),
            filter: ChannelFilter::ConversationMessages { conversation_id: Uuid::now_v7() },
            recipient: addr.clone().recipient(),
        });

        let message = crate::test::text_message(conv, Uuid::now_v7(), "hi");
        hub.do_send(Publish { event: ChangeEvent::MessageInserted { message, audience: vec![] } });
        settle().await;

        let changes = collector.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, watched);
        assert_eq!(collector.statuses().len(), 2);
    }

    #[actix_web::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = RealtimeHub::default().start();
        let collector = Collector::default();
        let addr = collector.clone().start();
        let conv = Uuid::now_v7();
        let channel_id = Uuid::now_v7();

        hub.do_send(Subscribe {
            channel_id,
            filter: ChannelFilter::ConversationMessages { conversation_id: conv },
            recipient: addr.recipient(),
        });
        hub.do_send(Unsubscribe { channel_id });

        let message = crate::test::text_message(conv, Uuid::now_v7(), "hi");
        hub.do_send(Publish { event: ChangeEvent::MessageInserted { message, audience: vec![] } });
        settle().await;

        assert!(collector.changes().is_empty());
        assert_eq!(hub.send(CountChannels { filter: None }).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_capacity_reports_error() {
        let hub = RealtimeHub::new(HubConfig { max_channels: 1 }).start();
        let collector = Collector::default();
        let addr = collector.clone().start();

        for _ in 0..2 {
            hub.do_send(Subscribe {
                channel_id: Uuid::now_v7(),
                filter: ChannelFilter::Inbox { user_id: Uuid::now_v7() },
                recipient: addr.clone().recipient(),
            });
        }
        settle().await;

        let statuses: Vec<ChannelStatus> = collector.statuses().into_iter().map(|(_, s)| s).collect();
        assert_eq!(statuses, vec![ChannelStatus::Subscribed, ChannelStatus::Error]);
        assert_eq!(hub.send(CountChannels { filter: None }).await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn test_fault_closes_matching_channels() {
        let hub = RealtimeHub::default().start();
        let collector = Collector::default();
        let addr = collector.clone().start();
        let user = Uuid::now_v7();
        let filter = ChannelFilter::Inbox { user_id: user };

        hub.do_send(Subscribe { channel_id: Uuid::now_v7(), filter: filter.clone(), recipient: addr.recipient() });
        hub.do_send(ChannelFault { filter: filter.clone(), reason: "socket dropped".to_string() });
        settle().await;

        assert_eq!(collector.statuses().last().map(|(_, s)| *s), Some(ChannelStatus::Error));
        assert_eq!(hub.send(CountChannels { filter: Some(filter) }).await.unwrap(), 0);
    }
}

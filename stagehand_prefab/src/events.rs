//! Template change notifications.
//!
//! Each instance holds a [`Subscription`] for the template it is bound to. The library
//! publishes into the bus; instances drain their subscription when the level pumps events.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fnv::FnvHashMap;
use log::debug;

use crate::template::TemplateId;

/// Something that happened to a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateEvent {
    /// The template got a new display name.
    Renamed {
        /// The template.
        template: TemplateId,
        /// Its new name.
        name: String,
    },
    /// The template was removed from the library.
    Removed {
        /// The template.
        template: TemplateId,
    },
}

impl TemplateEvent {
    /// The template the event is about.
    pub fn template(&self) -> TemplateId {
        match self {
            TemplateEvent::Renamed { template, .. } | TemplateEvent::Removed { template } => {
                *template
            }
        }
    }
}

/// The receiving end of one subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    template: TemplateId,
    receiver: Receiver<TemplateEvent>,
}

impl Subscription {
    /// The template this subscription listens to.
    pub fn template(&self) -> TemplateId {
        self.template
    }

    /// Events received so far, without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = TemplateEvent> + '_ {
        self.receiver.try_iter()
    }
}

/// Per-template fan-out of [`TemplateEvent`]s.
#[derive(Debug, Default)]
pub struct TemplateEvents {
    next_id: u64,
    subscribers: FnvHashMap<TemplateId, Vec<(u64, Sender<TemplateEvent>)>>,
}

impl TemplateEvents {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening to `template`.
    pub fn subscribe(&mut self, template: TemplateId) -> Subscription {
        let (sender, receiver) = unbounded();
        self.next_id += 1;
        self.subscribers
            .entry(template)
            .or_insert_with(Vec::new)
            .push((self.next_id, sender));
        Subscription {
            id: self.next_id,
            template,
            receiver,
        }
    }

    /// Stops delivering to `subscription`.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        let template = subscription.template;
        if let Some(senders) = self.subscribers.get_mut(&template) {
            senders.retain(|(id, _)| *id != subscription.id);
            if senders.is_empty() {
                self.subscribers.remove(&template);
            }
        }
    }

    /// Delivers `event` to every subscriber of its template, returning how many got it.
    ///
    /// Subscribers whose receiving end is gone are dropped.
    pub fn emit(&mut self, event: TemplateEvent) -> usize {
        let template = event.template();
        let senders = match self.subscribers.get_mut(&template) {
            Some(senders) => senders,
            None => return 0,
        };
        senders.retain(|(_, sender)| sender.send(event.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            self.subscribers.remove(&template);
        }
        debug!("Delivered {:?} to {} subscriber(s)", event, delivered);
        delivered
    }

    /// Number of live subscriptions to `template`.
    pub fn subscriber_count(&self, template: TemplateId) -> usize {
        self.subscribers.get(&template).map_or(0, Vec::len)
    }
}

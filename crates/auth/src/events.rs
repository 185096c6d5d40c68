use super::*;
use warden_core::ID;

/// State transitions interesting to outside collaborators (notification,
/// audit). Values only; no behavior is coupled to the core.
#[derive(Debug, Clone)]
pub enum Event {
    UserRegistered { user: ID<User>, email: String },
    UserLoggedIn { user: ID<User>, ip: String, agent: String },
    UserLoggedOut { user: ID<User>, session: ID<Session> },
    PasswordChanged { user: ID<User> },
    RoleAssigned { user: ID<User>, role: ID<Role> },
    RoleRemoved { user: ID<User>, role: ID<Role> },
}

/// In-memory outbox. Operations push events while they run; the surrounding
/// dispatcher drains and publishes only after the operation commits, so a
/// rolled-back write never notifies anyone.
#[derive(Debug, Default)]
pub struct Outbox {
    events: std::sync::Mutex<Vec<Event>>,
}

impl Outbox {
    pub fn push(&self, event: Event) {
        self.events.lock().expect("outbox").push(event);
    }
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().expect("outbox"))
    }
}

/// Collaborator notification hook. Fire-and-forget: the core never blocks
/// on, or observes, delivery outcome.
pub trait Notify {
    fn publish(&self, event: &Event);
}

/// Default notifier: structured log lines.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn publish(&self, event: &Event) {
        log::info!("domain event: {:?}", event);
    }
}

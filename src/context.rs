use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::middleware::auth::{AuthUser, OptionalAuthUser};

/// Who is acting on the store. Guests can check out without an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    Guest,
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::Guest => None,
        }
    }

    /// Value stored in `audit_logs.user_id`.
    pub fn audit_id(&self) -> String {
        match self {
            Actor::User(id) => id.to_string(),
            Actor::Guest => "guest".to_string(),
        }
    }
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Actor::User(user.user_id)
    }
}

impl From<&OptionalAuthUser> for Actor {
    fn from(user: &OptionalAuthUser) -> Self {
        user.0.as_ref().map(Actor::from).unwrap_or(Actor::Guest)
    }
}

/// Everything a checkout needs besides the cart itself. Built once per
/// request so pricing never reads the clock or config on its own.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    pub actor: Actor,
    pub now: DateTime<Utc>,
    pub shipping_fee: i64,
}

impl CheckoutContext {
    pub fn new(actor: Actor, shipping_fee: i64) -> Self {
        Self {
            actor,
            now: Utc::now(),
            shipping_fee,
        }
    }
}

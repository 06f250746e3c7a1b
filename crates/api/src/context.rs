use stockbook_auth::Role;
use stockbook_core::UserId;
use stockbook_infra::Actor;

/// Authenticated actor context for a request.
///
/// Populated by the auth middleware from verified token claims; immutable and
/// present for all protected routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: UserId,
    role: Role,
}

impl ActorContext {
    pub fn new(actor_id: UserId, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn actor_id(&self) -> UserId {
        self.actor_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    pub fn actor(&self) -> Actor {
        Actor {
            actor_id: self.actor_id,
            role: self.role,
        }
    }
}

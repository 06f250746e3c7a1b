//! Role policy: which movement types each role may create.
//!
//! A static, total mapping checked **before** any storage access. The check
//! is pure set membership with no side effects; an unauthorized attempt never
//! touches the database.

use stockbook_auth::Role;

use crate::error::LedgerError;
use crate::movement::MovementType;

/// Movement types the given role may create.
pub fn allowed_types(role: Role) -> &'static [MovementType] {
    match role {
        Role::Staff => &[MovementType::SaleOffline, MovementType::Return],
        // Owner-only: CANCEL_SALE, LOSS and ADJUSTMENT are corrective or
        // destructive and stay behind the counter key.
        Role::Owner => &MovementType::ALL,
    }
}

/// Fail fast with `PermissionDenied` if `role` may not create `movement_type`.
pub fn ensure_allowed(role: Role, movement_type: MovementType) -> Result<(), LedgerError> {
    if allowed_types(role).contains(&movement_type) {
        Ok(())
    } else {
        Err(LedgerError::PermissionDenied {
            role,
            movement_type,
        })
    }
}

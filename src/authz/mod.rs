//! Authorization module - Gate and Principal
//!
//! This module implements the super-admin aware gate:
//! - Permission-backed policies returning allow / deny / abstain
//! - Super-admin intercept before or after policy evaluation
//! - Checks against generated resource policies

mod evaluator;
mod principal;

pub use evaluator::{Decision, Gate, PermissionPolicy, PolicyEvaluator};
pub use principal::Principal;

/// Role-management abilities, checked with the configured key codec.
pub mod abilities {
    pub const VIEW_ANY: &str = "viewAny";
    pub const VIEW: &str = "view";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";

    /// Subject of the role-management resource.
    pub const ROLE_SUBJECT: &str = "Role";
}

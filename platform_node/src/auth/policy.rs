//! Access policy gate: classifies a resolved identity against a route's
//! required capability. Pure and side-effect-free.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::Account;

/// Capability a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    Public,
    Authenticated,
    AdminOnly,
}

/// Decide whether the (possibly absent) resolved account may use a route.
///
/// Must be called only after identity resolution has completed; an
/// unresolved identity is represented as `None`, never as a partially
/// trusted account.
pub fn authorize(account: Option<&Account>, class: RouteClass) -> EngineResult<()> {
    match class {
        RouteClass::Public => Ok(()),
        RouteClass::Authenticated => match account {
            Some(_) => Ok(()),
            None => Err(EngineError::Unauthenticated),
        },
        RouteClass::AdminOnly => match account {
            Some(account) if account.is_admin() => Ok(()),
            Some(_) => Err(EngineError::Forbidden),
            None => Err(EngineError::Unauthenticated),
        },
    }
}

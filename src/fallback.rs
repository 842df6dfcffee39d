//! Model fallback across a priority-ordered tier list.
//!
//! Two policies coexist and the caller picks one per operation:
//! - [`FallbackPolicy::Unconditional`]: any failure moves on to the next tier.
//!   Used for text, where failures are usually transient or availability related.
//! - [`FallbackPolicy::PermissionGated`]: only an authorization failure moves on;
//!   everything else is returned as-is. Used for image operations, where a rate
//!   limit or a malformed request would fail the same way on any tier.
//!
//! Exhausting the list returns the last concrete error unchanged.

use std::future::Future;
use tracing::{info, warn};

use crate::error::RequestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    Unconditional,
    PermissionGated,
}

impl FallbackPolicy {
    /// Whether `error` on one tier justifies trying the next one.
    pub fn allows_fallback(&self, error: &RequestError) -> bool {
        match self {
            FallbackPolicy::Unconditional => true,
            FallbackPolicy::PermissionGated => error.is_authorization(),
        }
    }
}

/// Call `attempt` with each model in `tiers` until one succeeds or the policy
/// refuses to continue.
pub async fn run_with_fallback<T, F, Fut>(
    policy: FallbackPolicy,
    tiers: &[String],
    mut attempt: F,
) -> Result<T, RequestError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let mut last_error = None;

    for (tier, model) in tiers.iter().enumerate() {
        match attempt(model.clone()).await {
            Ok(value) => {
                if tier > 0 {
                    info!(model = %model, tier, "[GEN] succeeded on fallback tier");
                }
                return Ok(value);
            }
            Err(e) => {
                let has_next = tier + 1 < tiers.len();
                if has_next && policy.allows_fallback(&e) {
                    warn!(
                        model = %model,
                        next = %tiers[tier + 1],
                        error = %e,
                        ?policy,
                        "[GEN] request failed, falling back to next tier"
                    );
                    last_error = Some(e);
                    continue;
                }
                if has_next {
                    warn!(model = %model, error = %e, ?policy, "[GEN] request failed, error is not eligible for fallback");
                }
                return Err(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| RequestError::unconfigured("generation")))
}

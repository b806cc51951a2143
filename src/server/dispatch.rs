//! Two-phase permission checks wired into the handlers: the collection phase
//! runs before any object is loaded, the object phase after it has been resolved.
//! Denials become 401 for anonymous callers and 403 otherwise.

use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::policy::{AccessPolicy, Decision, Method, OwnerRef};

fn denied(ctx: &RequestContext, policy: AccessPolicy, phase: &str, method: &Method, decision: Decision) -> AppError {
    debug!(
        target: "serieshub::access",
        "deny id={} policy={:?} phase={} method={} rule={:?} identity={:?}",
        ctx.request_id, policy, phase, method, decision.rule, ctx.identity
    );
    if ctx.is_authenticated() { AppError::permission_denied() } else { AppError::not_authenticated() }
}

pub fn check_collection(policy: AccessPolicy, ctx: &RequestContext, method: &Method) -> AppResult<()> {
    let decision = policy.collection(&ctx.identity, method);
    if decision.allowed { Ok(()) } else { Err(denied(ctx, policy, "collection", method, decision)) }
}

pub fn check_object<R: OwnerRef + ?Sized>(policy: AccessPolicy, ctx: &RequestContext, method: &Method, resource: &R) -> AppResult<()> {
    let decision = policy.object(&ctx.identity, method, resource);
    if decision.allowed { Ok(()) } else { Err(denied(ctx, policy, "object", method, decision)) }
}

/// Object check that treats an ownerless resource under an ownership policy as
/// a server defect (500) instead of a plain denial.
pub fn check_object_strict<R: OwnerRef + ?Sized>(
    policy: AccessPolicy,
    ctx: &RequestContext,
    method: &Method,
    resource: &R,
    resource_name: &'static str,
) -> AppResult<()> {
    match policy.object_strict(&ctx.identity, method, resource, resource_name) {
        Ok(decision) if decision.allowed => Ok(()),
        Ok(decision) => Err(denied(ctx, policy, "object", method, decision)),
        Err(e) => {
            error!(target: "serieshub::access", "request id={} policy misconfiguration: {}", ctx.request_id, e);
            Err(e.into())
        }
    }
}

/// Both phases for handlers that load the object up front.
pub fn check<R: OwnerRef + ?Sized>(policy: AccessPolicy, ctx: &RequestContext, method: &Method, resource: &R) -> AppResult<()> {
    check_collection(policy, ctx, method)?;
    check_object(policy, ctx, method, resource)
}

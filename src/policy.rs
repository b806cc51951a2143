//!
//! serieshub access policy
//! ------------------------
//! Ownership-based access control shared by every resource the API exposes.
//!
//! A request is evaluated in two phases. The collection phase runs before any
//! object is resolved (list, create); the object phase runs once the target has
//! been loaded (retrieve, update, delete). Both phases are pure functions of the
//! policy variant, the acting `Identity`, the request `Method` and, for the
//! object phase, the resource's owner as reported by `OwnerRef`.
//!
//! Denial is a normal outcome (`Decision::allowed == false`). The only error is
//! `PolicyError::InvalidResourceShape`, raised by `AccessPolicy::object_strict`
//! when a resource without any owner is asked to satisfy an ownership rule.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type UserId = u64;

/// The acting party of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Anonymous,
    User { id: UserId, is_admin: bool },
}

impl Identity {
    pub fn user(id: UserId) -> Self { Identity::User { id, is_admin: false } }
    pub fn admin(id: UserId) -> Self { Identity::User { id, is_admin: true } }

    pub fn id(&self) -> Option<UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::User { id, .. } => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, Identity::User { .. }) }

    pub fn is_admin(&self) -> bool { matches!(self, Identity::User { is_admin: true, .. }) }

    /// True when this identity is the given owner. Anonymous never owns anything.
    pub fn owns(&self, owner: Owner) -> bool {
        match (self.id(), owner.id()) {
            (Some(me), Some(them)) => me == them,
            _ => false,
        }
    }
}

/// Request method as seen by the policy. Unknown method names are kept and
/// classified as unsafe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
    Other(String),
}

impl Method {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn is_safe(&self) -> bool { matches!(self, Method::Get | Method::Head | Method::Options) }
}

impl From<&axum::http::Method> for Method {
    fn from(m: &axum::http::Method) -> Self { Method::from_name(m.as_str()) }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Head => f.write_str("HEAD"),
            Method::Options => f.write_str("OPTIONS"),
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
            Method::Patch => f.write_str("PATCH"),
            Method::Delete => f.write_str("DELETE"),
            Method::Other(s) => f.write_str(s),
        }
    }
}

/// Named CRUD actions and the method each one is dispatched as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action { List, Retrieve, Create, Update, PartialUpdate, Destroy }

impl Action {
    pub fn method(self) -> Method {
        match self {
            Action::List | Action::Retrieve => Method::Get,
            Action::Create => Method::Post,
            Action::Update => Method::Put,
            Action::PartialUpdate => Method::Patch,
            Action::Destroy => Method::Delete,
        }
    }
}

/// Owner of a resource after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Creator(UserId),
    User(UserId),
    Unowned,
}

impl Owner {
    pub fn id(&self) -> Option<UserId> {
        match self {
            Owner::Creator(id) | Owner::User(id) => Some(*id),
            Owner::Unowned => None,
        }
    }
}

/// Ownership capability of a resource. Implementors override whichever of the
/// two owner shapes they carry; `owner` prefers the creator over the user.
pub trait OwnerRef {
    fn creator(&self) -> Option<UserId> { None }
    fn user(&self) -> Option<UserId> { None }

    fn owner(&self) -> Owner {
        if let Some(id) = self.creator() { return Owner::Creator(id); }
        if let Some(id) = self.user() { return Owner::User(id); }
        Owner::Unowned
    }
}

impl<T: OwnerRef + ?Sized> OwnerRef for &T {
    fn creator(&self) -> Option<UserId> { (**self).creator() }
    fn user(&self) -> Option<UserId> { (**self).user() }
}

/// A resource with no ownership concept at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unowned;

impl OwnerRef for Unowned {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    ReadOnlyForEveryoneElseWrite,
    AdminWriteOnly,
    OwnerWriteOnly,
    OwnerOrAdminWrite,
    AdminOrOwnerFullAccess,
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SafeMethod,
    Authenticated,
    NotAuthenticated,
    Admin,
    NotAdmin,
    Owner,
    NotOwner,
    NoOwner,
    DeferredToObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub rule: Rule,
}

impl Decision {
    fn allow(rule: Rule) -> Self { Self { allowed: true, rule } }
    fn deny(rule: Rule) -> Self { Self { allowed: false, rule } }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy {policy:?} requires an owner but the {resource} resource exposes none")]
    InvalidResourceShape { policy: AccessPolicy, resource: &'static str },
}

impl AccessPolicy {
    pub const ALL: [AccessPolicy; 5] = [
        AccessPolicy::ReadOnlyForEveryoneElseWrite,
        AccessPolicy::AdminWriteOnly,
        AccessPolicy::OwnerWriteOnly,
        AccessPolicy::OwnerOrAdminWrite,
        AccessPolicy::AdminOrOwnerFullAccess,
    ];

    /// Collection-phase check: no object has been resolved yet.
    pub fn collection(self, identity: &Identity, method: &Method) -> Decision {
        match self {
            AccessPolicy::AdminOrOwnerFullAccess => Decision::allow(Rule::DeferredToObject),
            _ if method.is_safe() => Decision::allow(Rule::SafeMethod),
            AccessPolicy::AdminWriteOnly => admin_only(identity),
            AccessPolicy::ReadOnlyForEveryoneElseWrite
            | AccessPolicy::OwnerWriteOnly
            | AccessPolicy::OwnerOrAdminWrite => authenticated(identity),
        }
    }

    /// Object-phase check against a resolved resource.
    pub fn object<R: OwnerRef + ?Sized>(self, identity: &Identity, method: &Method, resource: &R) -> Decision {
        let owner = resource.owner();
        if self == AccessPolicy::AdminOrOwnerFullAccess {
            if identity.is_admin() { return Decision::allow(Rule::Admin); }
            return ownership(identity, owner);
        }
        if method.is_safe() {
            return Decision::allow(Rule::SafeMethod);
        }
        match self {
            AccessPolicy::ReadOnlyForEveryoneElseWrite => authenticated(identity),
            AccessPolicy::AdminWriteOnly => admin_only(identity),
            AccessPolicy::OwnerWriteOnly => ownership(identity, owner),
            AccessPolicy::OwnerOrAdminWrite => {
                if identity.is_admin() { return Decision::allow(Rule::Admin); }
                ownership(identity, owner)
            }
            AccessPolicy::AdminOrOwnerFullAccess => ownership(identity, owner),
        }
    }

    /// Like `object`, but a resource without an owner is a configuration defect
    /// whenever the decision would have to consult ownership.
    pub fn object_strict<R: OwnerRef + ?Sized>(
        self,
        identity: &Identity,
        method: &Method,
        resource: &R,
        resource_name: &'static str,
    ) -> Result<Decision, PolicyError> {
        let needs_owner = match self {
            AccessPolicy::AdminOrOwnerFullAccess => true,
            AccessPolicy::OwnerWriteOnly | AccessPolicy::OwnerOrAdminWrite => !method.is_safe(),
            AccessPolicy::ReadOnlyForEveryoneElseWrite | AccessPolicy::AdminWriteOnly => false,
        };
        if needs_owner && resource.owner() == Owner::Unowned {
            return Err(PolicyError::InvalidResourceShape { policy: self, resource: resource_name });
        }
        Ok(self.object(identity, method, resource))
    }
}

fn authenticated(identity: &Identity) -> Decision {
    if identity.is_authenticated() { Decision::allow(Rule::Authenticated) } else { Decision::deny(Rule::NotAuthenticated) }
}

fn admin_only(identity: &Identity) -> Decision {
    if identity.is_admin() { Decision::allow(Rule::Admin) } else { Decision::deny(Rule::NotAdmin) }
}

fn ownership(identity: &Identity, owner: Owner) -> Decision {
    match owner {
        Owner::Unowned => Decision::deny(Rule::NoOwner),
        o if identity.owns(o) => Decision::allow(Rule::Owner),
        _ => Decision::deny(Rule::NotOwner),
    }
}

pub fn has_collection_permission(policy: AccessPolicy, identity: &Identity, method: &Method) -> bool {
    policy.collection(identity, method).allowed
}

pub fn has_object_permission<R: OwnerRef + ?Sized>(policy: AccessPolicy, identity: &Identity, method: &Method, resource: &R) -> bool {
    policy.object(identity, method, resource).allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Created(UserId);
    impl OwnerRef for Created {
        fn creator(&self) -> Option<UserId> { Some(self.0) }
    }

    struct Both { creator: UserId, user: UserId }
    impl OwnerRef for Both {
        fn creator(&self) -> Option<UserId> { Some(self.creator) }
        fn user(&self) -> Option<UserId> { Some(self.user) }
    }

    struct Belongs(UserId);
    impl OwnerRef for Belongs {
        fn user(&self) -> Option<UserId> { Some(self.0) }
    }

    #[test]
    fn method_classification() {
        for m in ["get", "HEAD", " options "] {
            assert!(Method::from_name(m).is_safe(), "{m} should be safe");
        }
        for m in ["POST", "put", "Patch", "DELETE", "PROPFIND"] {
            assert!(!Method::from_name(m).is_safe(), "{m} should be unsafe");
        }
        assert_eq!(Method::from_name("propfind"), Method::Other("PROPFIND".into()));
        assert!(Action::List.method().is_safe());
        assert!(Action::Retrieve.method().is_safe());
        assert!(!Action::PartialUpdate.method().is_safe());
        assert!(!Action::Destroy.method().is_safe());
    }

    #[test]
    fn creator_takes_precedence_over_user() {
        assert_eq!(Both { creator: 1, user: 2 }.owner(), Owner::Creator(1));
        assert_eq!(Belongs(2).owner(), Owner::User(2));
        assert_eq!(Unowned.owner(), Owner::Unowned);
        let me = Identity::user(2);
        let m = Action::Update.method();
        assert!(!has_object_permission(AccessPolicy::OwnerWriteOnly, &me, &m, &Both { creator: 1, user: 2 }));
    }

    #[test]
    fn anonymous_owns_nothing() {
        assert!(!Identity::Anonymous.owns(Owner::User(0)));
        assert!(!Identity::Anonymous.is_authenticated());
        assert!(!Identity::Anonymous.is_admin());
    }

    #[test]
    fn owner_write_only_ignores_admin() {
        let admin = Identity::admin(9);
        let del = Action::Destroy.method();
        let d = AccessPolicy::OwnerWriteOnly.object(&admin, &del, &Created(1));
        assert_eq!(d, Decision { allowed: false, rule: Rule::NotOwner });
        let d = AccessPolicy::OwnerOrAdminWrite.object(&admin, &del, &Created(1));
        assert_eq!(d, Decision { allowed: true, rule: Rule::Admin });
    }

    #[test]
    fn full_access_ignores_method() {
        let other = Identity::user(5);
        for m in [Method::Get, Method::Delete] {
            assert!(!has_object_permission(AccessPolicy::AdminOrOwnerFullAccess, &other, &m, &Belongs(1)));
            assert!(has_object_permission(AccessPolicy::AdminOrOwnerFullAccess, &Identity::user(1), &m, &Belongs(1)));
            assert!(has_object_permission(AccessPolicy::AdminOrOwnerFullAccess, &Identity::admin(7), &m, &Unowned));
        }
        assert_eq!(AccessPolicy::AdminOrOwnerFullAccess.collection(&Identity::Anonymous, &Method::Post).rule, Rule::DeferredToObject);

        assert_eq!(AccessPolicy::AdminOrOwnerFullAccess.collection(&Identity::Anonymous, &Method::Get).rule, Rule::DeferredToObject);
    }

    #[test]
    fn collection_rules_per_policy() {
        let anon = Identity::Anonymous;
        assert_eq!(AccessPolicy::OwnerWriteOnly.collection(&anon, &Method::Get), Decision::allow(Rule::SafeMethod));
        assert!(!AccessPolicy::OwnerWriteOnly.collection(&anon, &Method::Post).allowed);
        assert!(AccessPolicy::OwnerWriteOnly.collection(&Identity::user(1), &Method::Post).allowed);
        assert!(!AccessPolicy::AdminWriteOnly.collection(&Identity::user(1), &Method::Delete).allowed);
        assert!(AccessPolicy::AdminWriteOnly.collection(&Identity::admin(1), &Method::Delete).allowed);
    }

    #[test]
    fn strict_check_flags_unowned_resources() {
        let me = Identity::user(1);
        let err = AccessPolicy::OwnerOrAdminWrite
            .object_strict(&me, &Method::Patch, &Unowned, "series")
            .unwrap_err();
        assert_eq!(err, PolicyError::InvalidResourceShape { policy: AccessPolicy::OwnerOrAdminWrite, resource: "series" });
        // Safe methods never need an owner under write-gated policies.
        let d = AccessPolicy::OwnerOrAdminWrite.object_strict(&me, &Method::Get, &Unowned, "series").unwrap();
        assert!(d.allowed);
        assert!(AccessPolicy::AdminOrOwnerFullAccess.object_strict(&me, &Method::Get, &Unowned, "activity").is_err());
        assert!(AccessPolicy::AdminWriteOnly.object_strict(&me, &Method::Delete, &Unowned, "user").is_ok());
    }
}

// SPDX-License-Identifier: Apache-2.0

//! Facets: mutable-then-frozen capability carriers.
//!
//! A facet is born mutable (members and dependencies may be added, lifecycle
//! callbacks registered) and becomes immutable the instant [`Facet::init`]
//! succeeds. The `initialized` flag is monotonic: every mutator checks it and
//! fails with a mutation-after-init error once it is set.
//!
//! Members come in three shapes:
//! - [`Member::Value`]: plain JSON data,
//! - [`Member::Handle`]: shared typed state, downcast at the consuming seam,
//! - [`Member::Method`]: a callable invoked with a [`MethodCall`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::ctx::Ctx;
use crate::hook::HookMeta;
use crate::manager::FacetManager;
use crate::message::SharedMessage;

/// Shared opaque state stored under a [`Member::Handle`].
pub type SharedHandle = Arc<dyn Any + Send + Sync>;

/// Arguments to a [`Member::Method`] invocation.
#[derive(Default)]
pub struct MethodCall {
    /// Positional JSON arguments.
    pub args: Vec<Value>,
    /// Message in flight, when the call is part of message processing.
    pub message: Option<SharedMessage>,
}

impl MethodCall {
    /// Call with no arguments.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Call with positional JSON arguments.
    #[must_use]
    pub fn with_args(args: Vec<Value>) -> Self {
        Self {
            args,
            message: None,
        }
    }

    /// Call carrying a message.
    #[must_use]
    pub fn with_message(message: SharedMessage) -> Self {
        Self {
            args: Vec::new(),
            message: Some(message),
        }
    }
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("args", &self.args)
            .field("has_message", &self.message.is_some())
            .finish()
    }
}

/// Callable member.
pub type MethodFn = Arc<dyn Fn(MethodCall) -> Result<Value, FacetError> + Send + Sync>;

/// Callback invoked once when the facet initializes.
pub type InitFn = Box<dyn FnOnce(&mut Facet, &InitArgs<'_>) -> Result<(), FacetError> + Send + Sync>;

/// Callback invoked on every [`Facet::dispose`] call.
pub type DisposeFn = Arc<dyn Fn(&Facet) + Send + Sync>;

/// A single facet member.
#[derive(Clone)]
pub enum Member {
    /// Plain JSON data.
    Value(Value),
    /// Shared typed state; consumers downcast via [`Facet::handle`].
    Handle(SharedHandle),
    /// Callable member.
    Method(MethodFn),
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Handle(_) => f.write_str("Handle(..)"),
            Self::Method(_) => f.write_str("Method(..)"),
        }
    }
}

/// Context handed to [`Facet::init`] and its `on_init` callback.
pub struct InitArgs<'a> {
    /// Resolved build context.
    pub ctx: &'a Ctx,
    /// Facet manager owning the facet being initialized.
    pub manager: &'a FacetManager,
    /// Name of the subsystem being built.
    pub subsystem: &'a str,
}

impl fmt::Debug for InitArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitArgs")
            .field("subsystem", &self.subsystem)
            .finish_non_exhaustive()
    }
}

/// Errors raised by facet operations.
#[derive(Debug, Error)]
pub enum FacetError {
    /// A constructor or mutator received a malformed argument.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was malformed.
        reason: String,
    },
    /// A mutation was attempted after the facet initialized.
    #[error("mutation after init on facet '{kind}'")]
    MutationAfterInit {
        /// Kind of the frozen facet.
        kind: String,
    },
    /// A method or handle was requested under a name with no member.
    #[error("no member named '{name}'")]
    UnknownMember {
        /// Requested member name.
        name: String,
    },
    /// A non-method member was invoked.
    #[error("member '{name}' is not callable")]
    NotCallable {
        /// Requested member name.
        name: String,
    },
    /// An `on_init` callback reported a failure.
    #[error("facet init failed: {reason}")]
    InitFailed {
        /// Callback-supplied reason.
        reason: String,
    },
    /// A method member reported a failure.
    #[error("method '{name}' failed: {reason}")]
    MethodFailed {
        /// Invoked member name.
        name: String,
        /// Method-supplied reason.
        reason: String,
    },
}

impl FacetError {
    /// Convenience constructor for [`FacetError::InvalidArgument`].
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`FacetError::InitFailed`].
    #[must_use]
    pub fn init_failed(reason: impl Into<String>) -> Self {
        Self::InitFailed {
            reason: reason.into(),
        }
    }
}

/// A named capability bundle installed into a subsystem.
pub struct Facet {
    kind: String,
    required: Vec<String>,
    attach: bool,
    overwrite: bool,
    source: Option<String>,
    members: FxHashMap<String, Member>,
    member_order: Vec<String>,
    on_init: Option<InitFn>,
    on_dispose: Option<DisposeFn>,
    initialized: bool,
}

impl fmt::Debug for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facet")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("attach", &self.attach)
            .field("overwrite", &self.overwrite)
            .field("source", &self.source)
            .field("members", &self.member_order)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Facet {
    /// Creates a facet of the given kind. The kind must be non-empty.
    pub fn new(kind: impl Into<String>) -> Result<Self, FacetError> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(FacetError::invalid("facet kind must be a non-empty string"));
        }
        Ok(Self {
            kind,
            required: Vec::new(),
            attach: false,
            overwrite: false,
            source: None,
            members: FxHashMap::default(),
            member_order: Vec::new(),
            on_init: None,
            on_dispose: None,
            initialized: false,
        })
    }

    /// Creates a facet pre-populated from hook metadata.
    pub fn from_meta(meta: &HookMeta) -> Result<Self, FacetError> {
        let mut facet = Self::new(meta.kind.clone())?;
        facet.attach = meta.attach;
        facet.overwrite = meta.overwrite;
        if !meta.source.is_empty() {
            facet.source = Some(meta.source.clone());
        }
        for dep in &meta.required {
            facet.add_dependency(dep.clone())?;
        }
        Ok(facet)
    }

    fn guard_mutable(&self) -> Result<(), FacetError> {
        if self.initialized {
            return Err(FacetError::MutationAfterInit {
                kind: self.kind.clone(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Merges member descriptors into the facet.
    ///
    /// Pre-existing members are not overwritten: the first writer wins.
    /// Chainable; fails once the facet is initialized.
    pub fn add_members<I, K>(&mut self, members: I) -> Result<&mut Self, FacetError>
    where
        I: IntoIterator<Item = (K, Member)>,
        K: Into<String>,
    {
        self.guard_mutable()?;
        for (name, member) in members {
            let name = name.into();
            if name.is_empty() {
                return Err(FacetError::invalid("member name must be a non-empty string"));
            }
            if !self.members.contains_key(&name) {
                self.member_order.push(name.clone());
                self.members.insert(name, member);
            }
        }
        Ok(self)
    }

    /// Adds a single data member. First writer wins.
    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) -> Result<&mut Self, FacetError> {
        self.add_members([(name.into(), Member::Value(value))])
    }

    /// Adds a shared state handle. First writer wins.
    pub fn add_handle(
        &mut self,
        name: impl Into<String>,
        handle: SharedHandle,
    ) -> Result<&mut Self, FacetError> {
        self.add_members([(name.into(), Member::Handle(handle))])
    }

    /// Adds a callable member. First writer wins.
    pub fn add_method<F>(&mut self, name: impl Into<String>, method: F) -> Result<&mut Self, FacetError>
    where
        F: Fn(MethodCall) -> Result<Value, FacetError> + Send + Sync + 'static,
    {
        self.add_members([(name.into(), Member::Method(Arc::new(method)))])
    }

    /// Returns the member stored under `name`.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Whether a member named `name` exists.
    #[must_use]
    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Whether a callable member named `name` exists.
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        matches!(self.members.get(name), Some(Member::Method(_)))
    }

    /// Member names in insertion order.
    #[must_use]
    pub fn member_names(&self) -> Vec<String> {
        self.member_order.clone()
    }

    /// Returns the data value stored under `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.members.get(name) {
            Some(Member::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Downcasts the handle stored under `name` to `T`.
    #[must_use]
    pub fn handle<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.members.get(name) {
            Some(Member::Handle(h)) => h.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Downcasts the conventional `state` handle to `T`.
    #[must_use]
    pub fn state<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.handle::<T>(STATE_MEMBER)
    }

    /// Invokes the method member stored under `name`.
    pub fn call(&self, name: &str, call: MethodCall) -> Result<Value, FacetError> {
        match self.members.get(name) {
            Some(Member::Method(f)) => f(call),
            Some(_) => Err(FacetError::NotCallable {
                name: name.to_owned(),
            }),
            None => Err(FacetError::UnknownMember {
                name: name.to_owned(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle callbacks
    // ------------------------------------------------------------------

    /// Registers the init callback; replaces any previous registration.
    /// Rejected after init.
    pub fn on_init<F>(&mut self, callback: F) -> Result<&mut Self, FacetError>
    where
        F: FnOnce(&mut Facet, &InitArgs<'_>) -> Result<(), FacetError> + Send + Sync + 'static,
    {
        self.guard_mutable()?;
        self.on_init = Some(Box::new(callback));
        Ok(self)
    }

    /// Registers the dispose callback; replaces any previous registration.
    ///
    /// Unlike `on_init` this may be registered at any time; dispose is legal
    /// both before and after init.
    pub fn on_dispose<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&Facet) + Send + Sync + 'static,
    {
        self.on_dispose = Some(Arc::new(callback));
        self
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    /// Declares a dependency on another facet kind. Duplicates are ignored;
    /// order of first insertion is preserved.
    pub fn add_dependency(&mut self, kind: impl Into<String>) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        let kind = kind.into();
        if kind.is_empty() {
            return Err(FacetError::invalid("dependency kind must be a non-empty string"));
        }
        if !self.required.contains(&kind) {
            self.required.push(kind);
        }
        Ok(self)
    }

    /// Removes a declared dependency. Removing an absent kind is a no-op.
    pub fn remove_dependency(&mut self, kind: &str) -> Result<&mut Self, FacetError> {
        self.guard_mutable()?;
        self.required.retain(|k| k != kind);
        Ok(self)
    }

    /// Declared dependency kinds, as a defensive copy.
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        self.required.clone()
    }

    /// Whether `kind` is a declared dependency.
    #[must_use]
    pub fn has_dependency(&self, kind: &str) -> bool {
        self.required.iter().any(|k| k == kind)
    }

    /// Whether any dependencies are declared.
    #[must_use]
    pub fn has_dependencies(&self) -> bool {
        !self.required.is_empty()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Initializes the facet: runs the `on_init` callback (if registered) and
    /// flips the monotonic `initialized` flag, freezing the facet.
    ///
    /// At-most-once effective: calling `init` on an initialized facet is a
    /// no-op. If the callback fails the facet stays uninitialized and the
    /// error propagates.
    pub fn init(&mut self, args: &InitArgs<'_>) -> Result<(), FacetError> {
        if self.initialized {
            return Ok(());
        }
        if let Some(callback) = self.on_init.take() {
            callback(self, args)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Disposes the facet: invokes the dispose callback, if registered.
    ///
    /// Never fails; legal before or after init and any number of times. The
    /// callback runs once per `dispose` call and must keep its own cleanup
    /// idempotent.
    pub fn dispose(&self) {
        if let Some(callback) = &self.on_dispose {
            callback(self);
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// The facet's kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the facet asks to be exposed as a subsystem property.
    #[must_use]
    pub fn should_attach(&self) -> bool {
        self.attach
    }

    /// Whether the facet replaces an earlier facet of the same kind during
    /// planning.
    #[must_use]
    pub fn should_overwrite(&self) -> bool {
        self.overwrite
    }

    /// Optional source tag identifying the producing hook set.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the facet has initialized (and is therefore frozen).
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Conventional member name for a facet's primary shared state.
pub const STATE_MEMBER: &str = "state";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_args<'a>(manager: &'a FacetManager, ctx: &'a Ctx) -> InitArgs<'a> {
        InitArgs {
            ctx,
            manager,
            subsystem: "test",
        }
    }

    #[test]
    fn empty_kind_is_rejected() {
        assert!(matches!(
            Facet::new(""),
            Err(FacetError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn first_writer_wins_on_members() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.add_value("answer", json!(42));
        let _ = facet.add_value("answer", json!(7));
        assert_eq!(facet.value("answer"), Some(&json!(42)));
    }

    #[test]
    fn mutators_fail_after_init() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let manager = FacetManager::new("test");
        let ctx = Ctx::new();
        assert!(facet.init(&init_args(&manager, &ctx)).is_ok());

        assert!(matches!(
            facet.add_value("late", json!(1)),
            Err(FacetError::MutationAfterInit { .. })
        ));
        assert!(matches!(
            facet.add_dependency("router"),
            Err(FacetError::MutationAfterInit { .. })
        ));
        assert!(matches!(
            facet.remove_dependency("router"),
            Err(FacetError::MutationAfterInit { .. })
        ));
        assert!(matches!(
            facet.on_init(|_, _| Ok(())),
            Err(FacetError::MutationAfterInit { .. })
        ));
    }

    #[test]
    fn init_is_at_most_once_effective() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let _ = facet.on_init(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let manager = FacetManager::new("test");
        let ctx = Ctx::new();
        assert!(facet.init(&init_args(&manager, &ctx)).is_ok());
        assert!(facet.init(&init_args(&manager, &ctx)).is_ok(), "second init is a no-op");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(facet.is_initialized());
    }

    #[test]
    fn failed_init_leaves_facet_uninitialized() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.on_init(|_, _| Err(FacetError::init_failed("boom")));
        let manager = FacetManager::new("test");
        let ctx = Ctx::new();
        assert!(facet.init(&init_args(&manager, &ctx)).is_err());
        assert!(!facet.is_initialized());
    }

    #[test]
    fn on_init_may_add_members_before_freeze() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.on_init(|facet, _| {
            facet.add_value("installed", json!(true))?;
            Ok(())
        });
        let manager = FacetManager::new("test");
        let ctx = Ctx::new();
        assert!(facet.init(&init_args(&manager, &ctx)).is_ok());
        assert_eq!(facet.value("installed"), Some(&json!(true)));
    }

    #[test]
    fn dispose_invokes_callback_each_call() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        facet.on_dispose(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        facet.dispose();
        facet.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_without_callback_is_silent() {
        let Ok(facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        facet.dispose();
    }

    #[test]
    fn dependencies_are_ordered_and_unique() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.add_dependency("router");
        let _ = facet.add_dependency("queue");
        let _ = facet.add_dependency("router");
        assert_eq!(facet.dependencies(), vec!["router", "queue"]);
        assert!(facet.has_dependency("queue"));
        assert!(facet.has_dependencies());

        let _ = facet.remove_dependency("router");
        assert_eq!(facet.dependencies(), vec!["queue"]);
        // Removing an absent dependency is a no-op.
        let _ = facet.remove_dependency("router");
        assert_eq!(facet.dependencies(), vec!["queue"]);
    }

    #[test]
    fn dependencies_returns_defensive_copy() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.add_dependency("router");
        let mut copy = facet.dependencies();
        copy.push("queue".to_owned());
        assert_eq!(facet.dependencies(), vec!["router"]);
    }

    #[test]
    fn call_dispatches_to_method_members() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.add_method("double", |call| {
            let n = call.args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(n * 2))
        });

        let result = facet.call("double", MethodCall::with_args(vec![json!(21)]));
        assert!(matches!(result, Ok(v) if v == json!(42)));
        assert!(matches!(
            facet.call("missing", MethodCall::empty()),
            Err(FacetError::UnknownMember { .. })
        ));

        let _ = facet.add_value("data", json!(1));
        assert!(matches!(
            facet.call("data", MethodCall::empty()),
            Err(FacetError::NotCallable { .. })
        ));
    }

    #[test]
    fn handle_downcasts_by_type() {
        let Ok(mut facet) = Facet::new("probe") else {
            unreachable!("kind is valid")
        };
        let _ = facet.add_handle("state", Arc::new(7_u64) as SharedHandle);
        assert_eq!(facet.handle::<u64>("state").as_deref(), Some(&7));
        assert!(facet.handle::<String>("state").is_none(), "wrong type must not downcast");
    }
}

//! The host scene adapter contract.
//!
//! The reconciler never renders anything itself; it drives a mutable
//! scene graph owned by a host engine through this narrow trait. Hosts
//! provide object creation/removal, event (un)registration, property
//! access, animation, and asynchronous module import. Test doubles live
//! in [`crate::testing`].

use std::any::Any;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use std::collections::HashMap;

use crate::error::Result;
use crate::event::{EventCallback, EventKind};
use crate::props::{PropMap, PropValue};

/// An opaque handle to a host-owned scene object. Minted by the host;
/// the reconciler only stores and compares it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostHandle(u64);

impl HostHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// An opaque reference to a host module resolved through
/// [`HostScene::import_modules`].
#[derive(Clone)]
pub struct Module(Rc<dyn Any>);

impl Module {
    pub fn new(value: impl Any) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Whether two references point at the same underlying module.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module").finish()
    }
}

/// Resolved modules, keyed by the names they were requested under.
pub type ModuleMap = HashMap<String, Module>;

/// A name-to-locator request for module import. Locators are
/// host-defined strings (URLs, built-in module ids, ...).
#[derive(Clone, Debug, Default)]
pub struct ModuleSpec {
    entries: HashMap<String, String>,
}

impl ModuleSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, locator: impl Into<String>) -> Self {
        self.entries.insert(name.into(), locator.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, locator)| (name.as_str(), locator.as_str()))
    }
}

/// Parameters for a host-side animation.
#[derive(Clone, Copy, Debug)]
pub struct AnimateParams {
    /// Duration in seconds.
    pub duration: f64,
    /// Tween curve; one of [`crate::constants::animation`]'s `TWEEN_*` /
    /// `EASE_*` codes.
    pub tween: i32,
    /// Repeat behavior; `OPTION_*` codes.
    pub options: i32,
    /// Repeat count, or `COUNT_FOREVER`.
    pub count: i32,
}

impl Default for AnimateParams {
    fn default() -> Self {
        Self {
            duration: 0.0,
            tween: crate::constants::animation::TWEEN_LINEAR,
            options: crate::constants::animation::OPTION_LOOP,
            count: 1,
        }
    }
}

/// An opaque reference to a running host animation.
#[derive(Clone)]
pub struct AnimationHandle(Rc<dyn Any>);

impl AnimationHandle {
    pub fn new(value: impl Any) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for AnimationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationHandle").finish()
    }
}

/// The host scene adapter.
///
/// All methods are invoked from the reconciler's single-threaded
/// executor. Promise-shaped operations return local boxed futures.
pub trait HostScene: 'static {
    /// The root object new elements mount under when no explicit parent
    /// is given.
    fn root(&self) -> HostHandle;

    /// Creates a scene object of the given kind under `parent` (or
    /// parentless, for shared resources), with its initial properties.
    fn create_object(
        &self,
        kind: &str,
        parent: Option<&HostHandle>,
        props: &PropMap,
    ) -> Result<HostHandle>;

    /// Detaches and frees a previously created object.
    fn remove_object(&self, handle: &HostHandle);

    fn register_event_handler(&self, handle: &HostHandle, event: EventKind, callback: EventCallback);

    /// Unregisters a callback previously registered for `event`.
    /// Identity is `Rc::ptr_eq` on the callback.
    fn unregister_event_handler(
        &self,
        handle: &HostHandle,
        event: EventKind,
        callback: &EventCallback,
    );

    fn get_property(&self, handle: &HostHandle, key: &str) -> Option<PropValue>;

    fn set_property(&self, handle: &HostHandle, key: &str, value: PropValue) -> Result<()>;

    /// Whether the object already carries `key`. Updates only write keys
    /// the host object has.
    fn has_property(&self, handle: &HostHandle, key: &str) -> bool {
        self.get_property(handle, key).is_some()
    }

    /// Starts a host-side animation toward `target` property values.
    fn animate(
        &self,
        handle: &HostHandle,
        target: PropMap,
        params: AnimateParams,
    ) -> Result<AnimationHandle>;

    /// Asynchronously resolves the requested modules. Used both for the
    /// top-level scene bootstrap and for per-component dependencies.
    fn import_modules(&self, request: ModuleSpec) -> LocalBoxFuture<'static, Result<ModuleMap>>;

    /// Registers the callback invoked when the host scene is about to
    /// close. The host emits this signal at most once; the reconciler
    /// subscribes exactly once, at scene-init time.
    fn on_close(&self, callback: Box<dyn FnOnce()>);

    /// Cooperative yield before queued updates touch event registrations,
    /// giving the host time to release internal locks. Hosts without the
    /// concern resolve immediately.
    fn defer(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(std::future::ready(()))
    }
}

//! Test support: a scripted in-memory host scene.
//!
//! [`TestScene`] implements [`HostScene`] against plain maps and records
//! every adapter call in order, so tests can assert on host-call
//! sequencing (remove-before-create, exact property writes) as well as
//! final object state.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::{Error, Result};
use crate::event::{EventCallback, EventKind, HostEvent};
use crate::host::{AnimateParams, AnimationHandle, HostHandle, HostScene, Module, ModuleMap, ModuleSpec};
use crate::props::{PropMap, PropValue};

/// One recorded adapter call.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    Create { handle: HostHandle, kind: String },
    Remove { handle: HostHandle },
    Register { handle: HostHandle, event: EventKind },
    Unregister { handle: HostHandle, event: EventKind },
    Set { handle: HostHandle, key: String, value: PropValue },
    Animate { handle: HostHandle },
    Import { names: Vec<String> },
}

struct TestObject {
    kind: String,
    props: PropMap,
    handlers: Vec<(EventKind, EventCallback)>,
    removed: bool,
}

/// An in-memory host scene that records every call.
pub struct TestScene {
    next_handle: Cell<u64>,
    objects: RefCell<HashMap<u64, TestObject>>,
    calls: RefCell<Vec<HostCall>>,
    modules: RefCell<HashMap<String, Module>>,
    import_count: Cell<usize>,
    on_close: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl TestScene {
    pub fn new() -> Self {
        let scene = Self {
            next_handle: Cell::new(1),
            objects: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            modules: RefCell::new(HashMap::new()),
            import_count: Cell::new(0),
            on_close: RefCell::new(None),
        };
        // Handle 0 is the pre-existing scene root.
        scene.objects.borrow_mut().insert(
            0,
            TestObject {
                kind: "scene".to_string(),
                props: PropMap::new(),
                handlers: Vec::new(),
                removed: false,
            },
        );
        scene
    }

    /// Registers a module the next import can resolve.
    pub fn provide_module(&self, name: impl Into<String>, value: impl Any) {
        self.modules.borrow_mut().insert(name.into(), Module::new(value));
    }

    /// How many host-level imports have been issued.
    pub fn import_count(&self) -> usize {
        self.import_count.get()
    }

    /// Every adapter call so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Recorded `Set` calls for the given property key, in order.
    pub fn set_calls(&self, key: &str) -> Vec<(HostHandle, PropValue)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                HostCall::Set { handle, key: k, value } if k == key => {
                    Some((*handle, value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn object_kind(&self, handle: &HostHandle) -> Option<String> {
        self.objects
            .borrow()
            .get(&handle.raw())
            .map(|object| object.kind.clone())
    }

    pub fn object_prop(&self, handle: &HostHandle, key: &str) -> Option<PropValue> {
        self.objects
            .borrow()
            .get(&handle.raw())
            .and_then(|object| object.props.get(key).cloned())
    }

    pub fn is_removed(&self, handle: &HostHandle) -> bool {
        self.objects
            .borrow()
            .get(&handle.raw())
            .is_some_and(|object| object.removed)
    }

    /// Objects created and not yet removed, excluding the root.
    pub fn live_object_count(&self) -> usize {
        self.objects
            .borrow()
            .iter()
            .filter(|(id, object)| **id != 0 && !object.removed)
            .count()
    }

    pub fn handler_count(&self, handle: &HostHandle, event: EventKind) -> usize {
        self.objects
            .borrow()
            .get(&handle.raw())
            .map(|object| {
                object
                    .handlers
                    .iter()
                    .filter(|(kind, _)| *kind == event)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Delivers an event to every callback registered on the object.
    pub fn fire(&self, handle: &HostHandle, event: HostEvent) {
        let callbacks: Vec<EventCallback> = self
            .objects
            .borrow()
            .get(&handle.raw())
            .map(|object| {
                object
                    .handlers
                    .iter()
                    .filter(|(kind, _)| *kind == event.kind)
                    .map(|(_, callback)| callback.clone())
                    .collect()
            })
            .unwrap_or_default();
        for callback in callbacks {
            callback(&event);
        }
    }

    /// Delivers the close signal, if anything subscribed.
    pub fn close(&self) {
        if let Some(callback) = self.on_close.borrow_mut().take() {
            callback();
        }
    }

    /// Writes a property directly onto an object, bypassing call logging.
    /// Used to seed root metrics like `w`/`h`.
    pub fn seed_prop(&self, handle: &HostHandle, key: impl Into<String>, value: impl Into<PropValue>) {
        if let Some(object) = self.objects.borrow_mut().get_mut(&handle.raw()) {
            object.props.insert(key.into(), value.into());
        }
    }
}

impl Default for TestScene {
    fn default() -> Self {
        Self::new()
    }
}

impl HostScene for TestScene {
    fn root(&self) -> HostHandle {
        HostHandle::new(0)
    }

    fn create_object(
        &self,
        kind: &str,
        _parent: Option<&HostHandle>,
        props: &PropMap,
    ) -> Result<HostHandle> {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        let handle = HostHandle::new(id);
        self.objects.borrow_mut().insert(
            id,
            TestObject {
                kind: kind.to_string(),
                props: props.clone(),
                handlers: Vec::new(),
                removed: false,
            },
        );
        self.calls.borrow_mut().push(HostCall::Create {
            handle,
            kind: kind.to_string(),
        });
        Ok(handle)
    }

    fn remove_object(&self, handle: &HostHandle) {
        if let Some(object) = self.objects.borrow_mut().get_mut(&handle.raw()) {
            object.removed = true;
            object.handlers.clear();
        }
        self.calls.borrow_mut().push(HostCall::Remove { handle: *handle });
    }

    fn register_event_handler(&self, handle: &HostHandle, event: EventKind, callback: EventCallback) {
        if let Some(object) = self.objects.borrow_mut().get_mut(&handle.raw()) {
            object.handlers.push((event, callback));
        }
        self.calls.borrow_mut().push(HostCall::Register { handle: *handle, event });
    }

    fn unregister_event_handler(
        &self,
        handle: &HostHandle,
        event: EventKind,
        callback: &EventCallback,
    ) {
        if let Some(object) = self.objects.borrow_mut().get_mut(&handle.raw()) {
            object
                .handlers
                .retain(|(kind, cb)| *kind != event || !Rc::ptr_eq(cb, callback));
        }
        self.calls.borrow_mut().push(HostCall::Unregister { handle: *handle, event });
    }

    fn get_property(&self, handle: &HostHandle, key: &str) -> Option<PropValue> {
        self.object_prop(handle, key)
    }

    fn set_property(&self, handle: &HostHandle, key: &str, value: PropValue) -> Result<()> {
        let mut objects = self.objects.borrow_mut();
        let object = objects
            .get_mut(&handle.raw())
            .ok_or_else(|| Error::host("set_property", "no such object"))?;
        object.props.insert(key.to_string(), value.clone());
        drop(objects);
        self.calls.borrow_mut().push(HostCall::Set {
            handle: *handle,
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn animate(
        &self,
        handle: &HostHandle,
        target: PropMap,
        _params: AnimateParams,
    ) -> Result<AnimationHandle> {
        // The fake jumps straight to the target values.
        if let Some(object) = self.objects.borrow_mut().get_mut(&handle.raw()) {
            object.props.extend(target);
        }
        self.calls.borrow_mut().push(HostCall::Animate { handle: *handle });
        Ok(AnimationHandle::new(()))
    }

    fn import_modules(&self, request: ModuleSpec) -> LocalBoxFuture<'static, Result<ModuleMap>> {
        self.import_count.set(self.import_count.get() + 1);
        let mut names: Vec<String> = request.names().map(str::to_string).collect();
        names.sort_unstable();
        self.calls.borrow_mut().push(HostCall::Import { names });

        // Resolve every provided module, plus a placeholder for any
        // requested name nothing was scripted for. Returning extras lets
        // tests check that undeclared names get filtered out.
        let mut resolved: ModuleMap = self.modules.borrow().clone();
        for name in request.names() {
            resolved
                .entry(name.to_string())
                .or_insert_with(|| Module::new(()));
        }
        Box::pin(std::future::ready(Ok(resolved)))
    }

    fn on_close(&self, callback: Box<dyn FnOnce()>) {
        *self.on_close.borrow_mut() = Some(callback);
    }
}

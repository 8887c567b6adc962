//! Components: stateful behavior behind composite elements.
//!
//! A [`Component`] declares what a composite renders as and reacts to
//! the lifecycle the engine drives it through. Hooks receive a context
//! view over the instance's props, state, inherited context, resolved
//! modules, and passed children rather than owning any of them; state
//! changes flow through [`UpdateCx::set_state`] or a retained
//! [`ComponentHandle`].

use std::cell::Cell;
use std::rc::Rc;

use crate::element::{Element, WeakElement};
use crate::error::{Error, Result};
use crate::host::{ModuleMap, ModuleSpec};
use crate::props::PropMap;
use crate::runtime::WeakRuntime;

/// How `set_state` behaves for a component instance right now.
///
/// `Immediate` applies changes to the in-flight state snapshot so the
/// current pass renders with them. `Deferred` queues a whole new update
/// pass. `Disabled` (before mount and after unmount) drops changes with
/// a warning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateGate {
    Immediate,
    Deferred,
    Disabled,
}

/// Read-only view hooks receive while the engine renders or compares.
pub struct RenderCx<'a> {
    pub props: &'a PropMap,
    pub state: &'a PropMap,
    pub context: &'a PropMap,
    /// Children the parent declared on this composite, for the render
    /// output to place.
    pub children: &'a [Element],
    pub modules: &'a ModuleMap,
    handle: &'a ComponentHandle,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(
        props: &'a PropMap,
        state: &'a PropMap,
        context: &'a PropMap,
        children: &'a [Element],
        modules: &'a ModuleMap,
        handle: &'a ComponentHandle,
    ) -> Self {
        Self {
            props,
            state,
            context,
            children,
            modules,
            handle,
        }
    }

    /// A retained handle for event closures and async work.
    pub fn handle(&self) -> ComponentHandle {
        self.handle.clone()
    }
}

/// Mutable view for lifecycle hooks that may change state.
pub struct UpdateCx<'a> {
    pub props: &'a PropMap,
    pub context: &'a PropMap,
    pub children: &'a [Element],
    pub modules: &'a ModuleMap,
    state: &'a mut PropMap,
    handle: &'a ComponentHandle,
}

impl<'a> UpdateCx<'a> {
    pub(crate) fn new(
        props: &'a PropMap,
        context: &'a PropMap,
        children: &'a [Element],
        modules: &'a ModuleMap,
        state: &'a mut PropMap,
        handle: &'a ComponentHandle,
    ) -> Self {
        Self {
            props,
            context,
            children,
            modules,
            state,
            handle,
        }
    }

    pub fn state(&self) -> &PropMap {
        self.state
    }

    /// Merges `changes` into state. Under an `Immediate` gate (inside
    /// `will_mount` / `will_receive_props`) the merge lands on the
    /// snapshot the current pass will render with; otherwise a fresh
    /// update pass is queued.
    pub fn set_state(&mut self, changes: PropMap) {
        match self.handle.gate.get() {
            StateGate::Immediate => {
                for (key, value) in changes {
                    self.state.insert(key, value);
                }
            }
            StateGate::Deferred | StateGate::Disabled => self.handle.set_state(changes),
        }
    }

    /// A retained handle for event closures and async work.
    pub fn handle(&self) -> ComponentHandle {
        self.handle.clone()
    }
}

/// Behavior behind a composite element.
///
/// Hooks default to no-ops; `render` is the only required method beside
/// `kind`. Fallible hooks propagate errors to the nearest enclosing
/// error boundary.
pub trait Component {
    /// A stable name for this component class. Composites reconcile in
    /// place only when kinds match.
    fn kind(&self) -> &str;

    fn initial_state(&self) -> PropMap {
        PropMap::new()
    }

    /// Host modules this component needs resolved before it mounts.
    fn modules(&self) -> ModuleSpec {
        ModuleSpec::new()
    }

    /// Receives the resolved modules just before `will_mount`.
    fn modules_resolved(&mut self, _modules: &ModuleMap) {}

    /// Produces the element tree this composite renders as.
    fn render(&self, cx: &RenderCx<'_>) -> Result<Element>;

    fn will_mount(&mut self, _cx: &mut UpdateCx<'_>) -> Result<()> {
        Ok(())
    }

    fn did_mount(&mut self, _cx: &mut UpdateCx<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs when the parent re-declares this composite with new props,
    /// before `should_update` is consulted. `cx` still holds the current
    /// props; state changes made here apply immediately.
    fn will_receive_props(&mut self, _next_props: &PropMap, _cx: &mut UpdateCx<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether the pending props/state warrant re-rendering. Skipped
    /// for forced updates.
    fn should_update(&self, _next_props: &PropMap, _next_state: &PropMap, _cx: &RenderCx<'_>) -> bool {
        true
    }

    fn will_update(
        &self,
        _next_props: &PropMap,
        _next_state: &PropMap,
        _cx: &RenderCx<'_>,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs after a re-render has been applied to the host scene. `cx`
    /// holds the new props/state; the previous ones are passed in.
    fn did_update(
        &mut self,
        _prev_props: &PropMap,
        _prev_state: &PropMap,
        _cx: &mut UpdateCx<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn will_unmount(&mut self) {}

    /// Marks this component as an error boundary: errors raised while
    /// mounting or updating descendants route to `did_catch` instead of
    /// propagating. A boundary never catches its own errors.
    fn is_error_boundary(&self) -> bool {
        false
    }

    /// Invoked with errors caught from descendants. Typically calls
    /// `cx.set_state` to render a fallback.
    fn did_catch(&mut self, _error: &Error, _cx: &mut UpdateCx<'_>) {}

    /// Context entries exposed to all descendants, merged over inherited
    /// context (this component's entries win on key collision).
    fn child_context(&self, _cx: &RenderCx<'_>) -> PropMap {
        PropMap::new()
    }
}

/// A retained reference to a mounted component instance. Cheap to clone
/// into event closures; holds the element and runtime weakly so it never
/// keeps a torn-down tree alive.
#[derive(Clone)]
pub struct ComponentHandle {
    element: WeakElement,
    runtime: WeakRuntime,
    gate: Rc<Cell<StateGate>>,
}

impl ComponentHandle {
    pub(crate) fn new(element: WeakElement, runtime: WeakRuntime, gate: Rc<Cell<StateGate>>) -> Self {
        Self {
            element,
            runtime,
            gate,
        }
    }

    /// The composite element this handle refers to, if still alive.
    pub fn element(&self) -> Option<Element> {
        self.element.upgrade()
    }

    /// Queues a state merge followed by an update pass. Ignored with a
    /// warning once the component has unmounted.
    pub fn set_state(&self, changes: PropMap) {
        if self.gate.get() == StateGate::Disabled {
            log::warn!("set_state on an unmounted component; dropping changes");
            return;
        }
        let (Some(element), Some(runtime)) = (self.element.upgrade(), self.runtime.upgrade())
        else {
            log::warn!("set_state after teardown; dropping changes");
            return;
        };
        runtime.schedule_set_state(element, changes);
    }

    /// Queues an update pass that bypasses `should_update`.
    pub fn force_update(&self) {
        if self.gate.get() == StateGate::Disabled {
            log::warn!("force_update on an unmounted component; ignoring");
            return;
        }
        let (Some(element), Some(runtime)) = (self.element.upgrade(), self.runtime.upgrade())
        else {
            return;
        };
        runtime.schedule_force_update(element);
    }
}

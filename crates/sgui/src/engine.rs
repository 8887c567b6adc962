//! The reconciliation engine.
//!
//! Mounts, updates, replaces, and unmounts element subtrees against the
//! host scene. The recursive entry points return boxed local futures;
//! every await happens with no node borrow held, and component hooks run
//! on a checked-out behavior so re-entrant access to the node stays
//! legal. All engine work is driven from the runtime's job queue, one
//! pass at a time.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::component::{ComponentHandle, RenderCx, StateGate, UpdateCx};
use crate::element::{Element, ErrorHandler, Mounted, RefHook};
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::host::{HostHandle, HostScene, ModuleMap};
use crate::modules;
use crate::props::{PropMap, merged};
use crate::runtime::WeakRuntime;

/// A checked-out composite: the behavior plus snapshots of everything a
/// hook may read, taken so no node borrow is held while user code runs.
struct Checkout {
    behavior: Box<dyn crate::component::Component>,
    props: PropMap,
    state: PropMap,
    context: PropMap,
    modules: ModuleMap,
    passed: Vec<Element>,
    gate: Rc<std::cell::Cell<StateGate>>,
    handle: ComponentHandle,
}

#[derive(Clone)]
pub(crate) struct Reconciler {
    scene: Rc<dyn HostScene>,
    runtime: WeakRuntime,
}

impl Reconciler {
    pub(crate) fn new(scene: Rc<dyn HostScene>, runtime: WeakRuntime) -> Self {
        Self { scene, runtime }
    }

    fn checkout(&self, element: &Element) -> Result<Checkout> {
        let mut data = element.data_mut();
        let props = data.props.clone();
        let cell = data
            .cell
            .as_mut()
            .ok_or_else(|| Error::structural("expected a composite element"))?;
        let behavior = cell
            .behavior
            .take()
            .ok_or_else(|| Error::structural("component hook re-entered"))?;
        let gate = cell.gate.clone();
        Ok(Checkout {
            behavior,
            props,
            state: cell.state.clone(),
            context: cell.context.clone(),
            modules: cell.modules.clone(),
            passed: cell.passed_children.clone(),
            handle: ComponentHandle::new(element.downgrade(), self.runtime.clone(), gate.clone()),
            gate,
        })
    }

    fn checkin(element: &Element, behavior: Box<dyn crate::component::Component>, state: PropMap) {
        let mut data = element.data_mut();
        if let Some(cell) = data.cell.as_mut() {
            cell.behavior = Some(behavior);
            cell.state = state;
        }
    }

    /// Mounts `element` (and its whole subtree) under `host_parent`.
    pub(crate) fn mount(
        &self,
        element: Element,
        host_parent: HostHandle,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            if element.is_composite() {
                this.mount_composite(element, host_parent, context, on_error)
                    .await
            } else {
                this.mount_primitive(element, host_parent, context, on_error)
                    .await
            }
        })
    }

    async fn mount_primitive(
        &self,
        element: Element,
        host_parent: HostHandle,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> Result<()> {
        let (kind, props, handlers, ref_hook) = {
            let data = element.data();
            (
                data.kind.clone(),
                data.props.clone(),
                data.handlers.clone(),
                data.ref_hook.clone(),
            )
        };

        let handle = self.scene.create_object(&kind, Some(&host_parent), &props)?;
        element.data_mut().mounted = Some(Mounted {
            handle,
            host_parent,
            scene: self.scene.clone(),
        });

        for event in EventKind::ALL {
            if let Some(callback) = handlers.get(&event) {
                self.scene
                    .register_event_handler(&handle, event, callback.clone());
            }
        }

        if let Some(hook) = ref_hook {
            hook(Some(&element));
        }

        let children: Vec<Element> = element.data().children.iter().flatten().cloned().collect();
        for child in children {
            self.mount(child.clone(), handle, context.clone(), on_error.clone())
                .await?;
            child.data_mut().parent = Some(element.downgrade());
        }
        Ok(())
    }

    async fn mount_composite(
        &self,
        element: Element,
        host_parent: HostHandle,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> Result<()> {
        let kind = element.kind();
        match self
            .mount_composite_inner(&element, host_parent, context, on_error.clone())
            .await
        {
            Ok(()) => Ok(()),
            // Bookkeeping violations are fatal, never absorbed.
            Err(error @ Error::Structural(_)) => Err(error),
            Err(error) => {
                log::error!("error mounting component `{kind}`: {error}");
                match on_error {
                    Some(handler) => {
                        handler(error);
                        Ok(())
                    }
                    None => Err(error),
                }
            }
        }
    }

    async fn mount_composite_inner(
        &self,
        element: &Element,
        host_parent: HostHandle,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> Result<()> {
        // Record inherited context and boundary, grab the module request.
        let request = {
            let mut data = element.data_mut();
            let cell = data
                .cell
                .as_mut()
                .ok_or_else(|| Error::structural("expected a composite element"))?;
            cell.context = context.clone();
            cell.error = on_error.clone();
            cell.behavior
                .as_ref()
                .ok_or_else(|| Error::structural("component hook re-entered"))?
                .modules()
        };
        let resolved = modules::resolve(self.scene.as_ref(), &element.kind(), request).await?;

        let mut co = self.checkout(element)?;
        if !resolved.is_empty() {
            co.behavior.modules_resolved(&resolved);
            if let Some(cell) = element.data_mut().cell.as_mut() {
                cell.modules = resolved.clone();
            }
            co.modules = resolved;
        }

        // will_mount: state merges apply to the snapshot this first render
        // sees, without scheduling a pass.
        co.gate.set(StateGate::Immediate);
        let mut state = co.state.clone();
        let will = {
            let mut cx = UpdateCx::new(
                &co.props, &co.context, &co.passed, &co.modules, &mut state, &co.handle,
            );
            co.behavior.will_mount(&mut cx)
        };
        co.gate.set(StateGate::Disabled);
        if let Err(error) = will {
            Self::checkin(element, co.behavior, state);
            return Err(error);
        }

        let rendered = {
            let cx = RenderCx::new(
                &co.props, &state, &co.context, &co.passed, &co.modules, &co.handle,
            );
            co.behavior.render(&cx)
        };
        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(error) => {
                Self::checkin(element, co.behavior, state);
                return Err(error);
            }
        };

        let child_context = {
            let cx = RenderCx::new(
                &co.props, &state, &co.context, &co.passed, &co.modules, &co.handle,
            );
            merged(&context, &co.behavior.child_context(&cx))
        };
        // A boundary handles its descendants' errors, never its own.
        let child_on_error = if co.behavior.is_error_boundary() {
            Some(self.catch_handler(element))
        } else {
            on_error.clone()
        };
        Self::checkin(element, co.behavior, state);

        // The rendered root is the composite's sole child.
        element.data_mut().children = smallvec::smallvec![Some(rendered.clone())];
        rendered.data_mut().parent = Some(element.downgrade());

        self.mount(rendered.clone(), host_parent, child_context, child_on_error)
            .await?;

        // Adopt the rendered root's handle. If a boundary absorbed the
        // child's mount the handle is missing; leave this node unmounted.
        let child_mounted = rendered.data().mounted.clone();
        let Some(child_mounted) = child_mounted else {
            log::debug!("child mount of `{}` was absorbed by a boundary", element.kind());
            return Ok(());
        };
        element.data_mut().mounted = Some(Mounted {
            handle: child_mounted.handle,
            host_parent,
            scene: self.scene.clone(),
        });

        let mut co = self.checkout(element)?;
        co.gate.set(StateGate::Deferred);
        let mut state = co.state;
        let did = {
            let mut cx = UpdateCx::new(
                &co.props, &co.context, &co.passed, &co.modules, &mut state, &co.handle,
            );
            co.behavior.did_mount(&mut cx)
        };
        Self::checkin(element, co.behavior, state);
        log::debug!("did_mount `{}`", element.kind());
        did?;

        if let Some(hook) = element.data().ref_hook.clone() {
            hook(Some(element));
        }
        Ok(())
    }

    /// Diffs `old` against the freshly declared `new` and applies the
    /// difference to the host. Kind mismatch replaces the whole subtree.
    pub(crate) fn update(
        &self,
        old: Element,
        new: Element,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            if old.kind() != new.kind() {
                return this.replace(&old, &new, context, on_error).await;
            }
            if old.is_composite() {
                this.update_composite(&old, &new, context).await
            } else {
                this.update_primitive(&old, &new, context, on_error).await
            }
        })
    }

    async fn update_composite(&self, old: &Element, new: &Element, context: PropMap) -> Result<()> {
        let next_props = new.data().props.clone();
        let incoming_ref = new.data().ref_hook.clone();

        // The new declaration's passed children supersede the old ones,
        // and the freshly passed-down context replaces the stored one.
        {
            let passed = new
                .data_mut()
                .cell
                .as_mut()
                .map(|cell| std::mem::take(&mut cell.passed_children))
                .unwrap_or_default();
            if let Some(cell) = old.data_mut().cell.as_mut() {
                cell.passed_children = passed;
                cell.context = context;
            }
        }

        // will_receive_props: state merges apply immediately, so the pass
        // about to run renders with them instead of queuing another one.
        let mut co = self.checkout(old)?;
        co.gate.set(StateGate::Immediate);
        let mut state = co.state;
        let received = {
            let mut cx = UpdateCx::new(
                &co.props, &co.context, &co.passed, &co.modules, &mut state, &co.handle,
            );
            co.behavior.will_receive_props(&next_props, &mut cx)
        };
        co.gate.set(StateGate::Deferred);
        Self::checkin(old, co.behavior, state.clone());

        let outcome = match received {
            Ok(()) => {
                self.update_component(old.clone(), next_props, state, false, Some(incoming_ref))
                    .await
            }
            Err(error) => Err(error),
        };
        match outcome {
            Ok(()) => Ok(()),
            Err(error @ Error::Structural(_)) => Err(error),
            Err(error) => {
                log::error!("error updating component `{}`: {error}", old.kind());
                let handler = old.data().cell.as_ref().and_then(|cell| cell.error.clone());
                match handler {
                    Some(handler) => {
                        handler(error);
                        Ok(())
                    }
                    None => Err(error),
                }
            }
        }
    }

    async fn update_primitive(
        &self,
        old: &Element,
        new: &Element,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> Result<()> {
        // No keyed reconciliation: an arity change replaces the subtree.
        let (old_len, new_len) = (old.data().children.len(), new.data().children.len());
        if old_len != new_len {
            return self.replace(old, new, context, on_error).await;
        }

        let mounted = old.data().mounted.clone().ok_or(Error::Unmounted)?;

        // Swap the full handler set rather than diffing closures.
        let old_handlers = old.data().handlers.clone();
        for event in EventKind::ALL {
            if let Some(callback) = old_handlers.get(&event) {
                self.scene
                    .unregister_event_handler(&mounted.handle, event, callback);
            }
        }

        let (new_props, new_handlers, new_ref) = {
            let data = new.data();
            (data.props.clone(), data.handlers.clone(), data.ref_hook.clone())
        };

        // Write only keys the host object already carries. Keys that
        // disappeared from the declaration keep their last host value.
        for (key, value) in &new_props {
            if self.scene.has_property(&mounted.handle, key) {
                self.scene.set_property(&mounted.handle, key, value.clone())?;
            }
        }

        for event in EventKind::ALL {
            if let Some(callback) = new_handlers.get(&event) {
                self.scene
                    .register_event_handler(&mounted.handle, event, callback.clone());
            }
        }

        let prev_ref = old.data().ref_hook.clone();
        let ref_changed = match (&prev_ref, &new_ref) {
            (Some(prev), Some(next)) => !Rc::ptr_eq(prev, next),
            (None, None) => false,
            _ => true,
        };
        if ref_changed {
            if let Some(prev) = prev_ref {
                prev(None);
            }
        }

        // Retain the new declaration on the kept node so the next diff
        // and unmount see current props and handlers.
        {
            let mut data = old.data_mut();
            data.props = new_props;
            data.handlers = new_handlers;
            data.ref_hook = new_ref.clone();
        }
        if ref_changed {
            if let Some(next) = new_ref {
                next(Some(old));
            }
        }

        // Strictly positional child recursion.
        let pairs: Vec<(Element, Element)> = {
            let old_data = old.data();
            let new_data = new.data();
            old_data
                .children
                .iter()
                .zip(new_data.children.iter())
                .filter_map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                    _ => None,
                })
                .collect()
        };
        for (old_child, new_child) in pairs {
            self.update(old_child, new_child, context.clone(), on_error.clone())
                .await?;
        }
        Ok(())
    }

    /// Re-renders a composite against pending props/state. `incoming_ref`
    /// is `Some` only for declaration-driven updates, where the ref hook
    /// may have changed identity.
    pub(crate) fn update_component(
        &self,
        element: Element,
        next_props: PropMap,
        next_state: PropMap,
        force: bool,
        incoming_ref: Option<Option<RefHook>>,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let this = self.clone();
        Box::pin(async move {
            // A queued update can outlive its subtree: an ancestor deletion
            // vacates the child slot, and the stale pass must no-op.
            let old_child = {
                let data = element.data();
                match data.children.first() {
                    Some(Some(child)) => child.clone(),
                    _ => {
                        log::debug!("skipping update for removed `{}`", data.kind);
                        return Ok(());
                    }
                }
            };

            let (prev_props, prev_state) = {
                let data = element.data();
                let cell = data
                    .cell
                    .as_ref()
                    .ok_or_else(|| Error::structural("expected a composite element"))?;
                (data.props.clone(), cell.state.clone())
            };

            let mut co = this.checkout(&element)?;

            if !force {
                let proceed = {
                    let cx = RenderCx::new(
                        &co.props, &co.state, &co.context, &co.passed, &co.modules, &co.handle,
                    );
                    co.behavior.should_update(&next_props, &next_state, &cx)
                };
                if !proceed {
                    // Commit without rendering; no further lifecycle calls.
                    element.data_mut().props = next_props;
                    Self::checkin(&element, co.behavior, next_state);
                    return Ok(());
                }
            }

            co.gate.set(StateGate::Disabled);
            let will = {
                let cx = RenderCx::new(
                    &co.props, &co.state, &co.context, &co.passed, &co.modules, &co.handle,
                );
                co.behavior.will_update(&next_props, &next_state, &cx)
            };
            co.gate.set(StateGate::Deferred);
            if let Err(error) = will {
                Self::checkin(&element, co.behavior, co.state);
                return Err(error);
            }

            // Commit, then render with the committed values.
            element.data_mut().props = next_props.clone();

            co.gate.set(StateGate::Disabled);
            let rendered = {
                let cx = RenderCx::new(
                    &next_props, &next_state, &co.context, &co.passed, &co.modules, &co.handle,
                );
                co.behavior.render(&cx)
            };
            co.gate.set(StateGate::Deferred);
            let rendered = match rendered {
                Ok(rendered) => rendered,
                Err(error) => {
                    Self::checkin(&element, co.behavior, next_state);
                    return Err(error);
                }
            };

            let child_context = {
                let cx = RenderCx::new(
                    &next_props, &next_state, &co.context, &co.passed, &co.modules, &co.handle,
                );
                merged(&co.context, &co.behavior.child_context(&cx))
            };
            let child_on_error = if co.behavior.is_error_boundary() {
                Some(this.catch_handler(&element))
            } else {
                element.data().cell.as_ref().and_then(|cell| cell.error.clone())
            };
            Self::checkin(&element, co.behavior, next_state);

            this.update(old_child, rendered, child_context, child_on_error)
                .await?;

            let mut co = this.checkout(&element)?;
            let mut state = co.state;
            let did = {
                let mut cx = UpdateCx::new(
                    &co.props, &co.context, &co.passed, &co.modules, &mut state, &co.handle,
                );
                co.behavior.did_update(&prev_props, &prev_state, &mut cx)
            };
            Self::checkin(&element, co.behavior, state);
            log::debug!("did_update `{}`", element.kind());
            did?;

            // Ref hooks fire on update only when their identity changed:
            // the old hook is released with `None` before the new one
            // receives the element.
            if let Some(next_hook) = incoming_ref {
                let prev_hook = element.data().ref_hook.clone();
                let changed = match (&prev_hook, &next_hook) {
                    (Some(prev), Some(next)) => !Rc::ptr_eq(prev, next),
                    (None, None) => false,
                    _ => true,
                };
                if changed {
                    if let Some(prev) = prev_hook {
                        prev(None);
                    }
                    element.data_mut().ref_hook = next_hook.clone();
                    if let Some(next) = next_hook {
                        next(Some(&element));
                    }
                }
            }
            Ok(())
        })
    }

    /// Tears down `old` and mounts `new` into the vacated slot. The host
    /// removal always precedes the creation of the successor, so outgoing
    /// refs are released before new ones are taken.
    async fn replace(
        &self,
        old: &Element,
        new: &Element,
        context: PropMap,
        on_error: Option<ErrorHandler>,
    ) -> Result<()> {
        let parent = old
            .data()
            .parent
            .clone()
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| Error::structural("replaced element has no parent"))?;
        let host_parent = old
            .data()
            .mounted
            .as_ref()
            .map(|mounted| mounted.host_parent)
            .ok_or(Error::Unmounted)?;
        let slot = parent
            .data()
            .children
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|el| el.ptr_eq(old)))
            .ok_or_else(|| Error::structural("could not find element to replace within parent"))?;

        unmount(old);
        parent.data_mut().children[slot] = None;

        match self
            .mount(new.clone(), host_parent, context, on_error.clone())
            .await
        {
            Ok(()) => {
                parent.data_mut().children[slot] = Some(new.clone());
                new.data_mut().parent = Some(parent.downgrade());
                Ok(())
            }
            Err(error @ Error::Structural(_)) => Err(error),
            Err(error) => {
                log::error!("error mounting replacement `{}`: {error}", new.kind());
                match on_error {
                    Some(handler) => {
                        handler(error);
                        Ok(())
                    }
                    None => Err(error),
                }
            }
        }
    }

    /// Builds the error intake routed to a boundary's `did_catch`.
    fn catch_handler(&self, element: &Element) -> ErrorHandler {
        let weak = element.downgrade();
        let runtime = self.runtime.clone();
        Rc::new(move |error: Error| {
            let Some(element) = weak.upgrade() else {
                log::warn!("error reached an unmounted boundary: {error}");
                return;
            };
            log::error!("boundary `{}` caught: {error}", element.kind());
            let checkout = {
                let mut data = element.data_mut();
                let props = data.props.clone();
                let Some(cell) = data.cell.as_mut() else {
                    return;
                };
                let Some(behavior) = cell.behavior.take() else {
                    log::warn!("boundary busy; dropping caught error: {error}");
                    return;
                };
                (
                    behavior,
                    props,
                    cell.state.clone(),
                    cell.context.clone(),
                    cell.modules.clone(),
                    cell.passed_children.clone(),
                    cell.gate.clone(),
                )
            };
            let (mut behavior, props, mut state, context, modules, passed, gate) = checkout;
            let handle = ComponentHandle::new(weak.clone(), runtime.clone(), gate);
            {
                let mut cx =
                    UpdateCx::new(&props, &context, &passed, &modules, &mut state, &handle);
                behavior.did_catch(&error, &mut cx);
            }
            let mut data = element.data_mut();
            if let Some(cell) = data.cell.as_mut() {
                cell.behavior = Some(behavior);
                cell.state = state;
            }
        })
    }
}

/// Tears down an element subtree: children first (reverse order), slots
/// vacated, handlers detached, will-unmount delivered, refs released with
/// `None`, host objects removed. Primitives own their host object and
/// remove it; a composite's handle is the delegated one, already freed by
/// the primitive at its render root.
pub(crate) fn unmount(element: &Element) {
    let children: Vec<Element> = element.data().children.iter().flatten().cloned().collect();
    for child in children.iter().rev() {
        unmount(child);
    }
    for slot in element.data_mut().children.iter_mut() {
        *slot = None;
    }

    let is_composite = element.is_composite();
    if is_composite {
        let taken = {
            let mut data = element.data_mut();
            data.cell.as_mut().and_then(|cell| {
                cell.gate.set(StateGate::Disabled);
                cell.behavior.take()
            })
        };
        if let Some(mut behavior) = taken {
            behavior.will_unmount();
            if let Some(cell) = element.data_mut().cell.as_mut() {
                cell.behavior = Some(behavior);
            }
        }
    } else if let Some(mounted) = element.data().mounted.clone() {
        let handlers = element.data().handlers.clone();
        for event in EventKind::ALL {
            if let Some(callback) = handlers.get(&event) {
                mounted
                    .scene
                    .unregister_event_handler(&mounted.handle, event, callback);
            }
        }
    }

    if let Some(hook) = element.data().ref_hook.clone() {
        hook(None);
    }

    let mounted = element.data_mut().mounted.take();
    if let (Some(mounted), false) = (mounted, is_composite) {
        mounted.scene.remove_object(&mounted.handle);
    }
}

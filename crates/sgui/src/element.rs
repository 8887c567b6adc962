//! The element tree.
//!
//! An [`Element`] is one node in the declared UI tree: either a
//! primitive that maps 1:1 onto a host scene object, or a composite
//! whose appearance is produced by a [`Component`](crate::component::Component).
//! Elements are shared handles (`Rc<RefCell<..>>`); the engine, the
//! component handles it mints, and user ref hooks all point at the same
//! node.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::component::{Component, StateGate};
use crate::error::{Error, Result};
use crate::event::{EventCallback, EventKind, HostEvent};
use crate::host::{AnimateParams, AnimationHandle, HostHandle, HostScene, ModuleMap};
use crate::props::{PropMap, PropValue};

/// A user callback notified when the element it was declared on is
/// attached to or detached from the live tree. Receives `Some` on mount
/// and `None` on unmount.
pub type RefHook = Rc<dyn Fn(Option<&Element>)>;

/// The nearest error boundary's intake, captured at mount time.
pub(crate) type ErrorHandler = Rc<dyn Fn(Error)>;

/// Host bookkeeping for a mounted primitive or delegating composite.
#[derive(Clone)]
pub(crate) struct Mounted {
    /// The host object this element renders as. For composites this is
    /// the handle delegated up from the primitive at the render root.
    pub handle: HostHandle,
    /// The host object it was created under. Recorded so replacements
    /// can mount the successor into the same slot.
    pub host_parent: HostHandle,
    pub scene: Rc<dyn HostScene>,
}

/// State carried only by composite elements.
pub(crate) struct CompositeCell {
    /// The component instance. Checked out (taken) while hooks run so no
    /// node borrow is held across user code, then checked back in.
    pub behavior: Option<Box<dyn Component>>,
    pub state: PropMap,
    /// Context visible to this component: ancestors' child context,
    /// merged nearest-wins.
    pub context: PropMap,
    /// Modules this component requested, resolved before mount.
    pub modules: ModuleMap,
    /// Children declared on the composite by its parent, for the
    /// component to place via its render output.
    pub passed_children: Vec<Element>,
    /// The nearest enclosing error boundary's intake, if any.
    pub error: Option<ErrorHandler>,
    /// Controls how `set_state` behaves for this instance. Lives outside
    /// the node's `RefCell` so handles can consult it mid-borrow.
    pub gate: Rc<Cell<StateGate>>,
}

pub(crate) struct ElementData {
    pub kind: String,
    pub props: PropMap,
    pub handlers: HashMap<EventKind, EventCallback>,
    pub ref_hook: Option<RefHook>,
    pub parent: Option<WeakElement>,
    /// Rendered children, positional. A `None` slot marks a child that
    /// was unmounted by a replacement already in flight; updates queued
    /// against it become no-ops.
    pub children: SmallVec<[Option<Element>; 2]>,
    pub mounted: Option<Mounted>,
    pub cell: Option<CompositeCell>,
}

/// A node in the declared UI tree.
#[derive(Clone)]
pub struct Element {
    inner: Rc<RefCell<ElementData>>,
}

/// A non-owning handle to an element.
#[derive(Clone)]
pub struct WeakElement {
    inner: Weak<RefCell<ElementData>>,
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.inner.upgrade().map(|inner| Element { inner })
    }
}

impl Element {
    /// Declares a primitive element of the given host object kind.
    pub fn primitive(kind: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ElementData {
                kind: kind.into(),
                props: PropMap::new(),
                handlers: HashMap::new(),
                ref_hook: None,
                parent: None,
                children: SmallVec::new(),
                mounted: None,
                cell: None,
            })),
        }
    }

    /// Declares a composite element backed by a component instance.
    pub fn composite(component: impl Component + 'static) -> Self {
        let kind = component.kind().to_string();
        let state = component.initial_state();
        Self {
            inner: Rc::new(RefCell::new(ElementData {
                kind,
                props: PropMap::new(),
                handlers: HashMap::new(),
                ref_hook: None,
                parent: None,
                children: SmallVec::new(),
                mounted: None,
                cell: Some(CompositeCell {
                    behavior: Some(Box::new(component)),
                    state,
                    context: PropMap::new(),
                    modules: ModuleMap::new(),
                    passed_children: Vec::new(),
                    error: None,
                    gate: Rc::new(Cell::new(StateGate::Disabled)),
                }),
            })),
        }
    }

    /// Sets a declared property. Builder-style; used before the element
    /// is handed to the engine.
    pub fn prop(self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.inner.borrow_mut().props.insert(key.into(), value.into());
        self
    }

    /// Merges a whole property map into the declaration.
    pub fn props(self, props: PropMap) -> Self {
        self.inner.borrow_mut().props.extend(props);
        self
    }

    /// Subscribes to a host event. At most one handler per event kind.
    pub fn on(self, event: EventKind, callback: impl Fn(&HostEvent) + 'static) -> Self {
        self.inner
            .borrow_mut()
            .handlers
            .insert(event, Rc::new(callback));
        self
    }

    /// Attaches a ref hook, called with `Some(element)` when this node
    /// mounts and `None` when it unmounts or is replaced.
    pub fn with_ref(self, hook: impl Fn(Option<&Element>) + 'static) -> Self {
        self.inner.borrow_mut().ref_hook = Some(Rc::new(hook));
        self
    }

    /// Appends a child. On primitives the child renders underneath this
    /// node's host object; on composites it is passed through for the
    /// component to place.
    pub fn child(self, child: impl Into<Element>) -> Self {
        {
            let mut data = self.inner.borrow_mut();
            let child = child.into();
            match data.cell.as_mut() {
                Some(cell) => cell.passed_children.push(child),
                None => data.children.push(Some(child)),
            }
        }
        self
    }

    /// Appends several children. See [`Element::child`].
    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        for child in children {
            self = self.child(child);
        }
        self
    }

    pub fn kind(&self) -> String {
        self.inner.borrow().kind.clone()
    }

    pub fn is_composite(&self) -> bool {
        self.inner.borrow().cell.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().mounted.is_some()
    }

    /// The host object this element currently renders as.
    pub fn host_handle(&self) -> Option<HostHandle> {
        self.inner.borrow().mounted.as_ref().map(|m| m.handle)
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Reads a declared (staged) property, ignoring the host.
    pub fn staged_prop(&self, key: &str) -> Option<PropValue> {
        self.inner.borrow().props.get(key).cloned()
    }

    /// Sets a declared property without touching the host. Takes effect
    /// on the next mount or update of this declaration.
    pub fn set_staged_prop(&self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.inner.borrow_mut().props.insert(key.into(), value.into());
    }

    /// Reads a property: from the live host object when mounted, from
    /// the declared map otherwise.
    pub fn read_prop(&self, key: &str) -> Option<PropValue> {
        let data = self.inner.borrow();
        match &data.mounted {
            Some(mounted) => mounted.scene.get_property(&mounted.handle, key),
            None => data.props.get(key).cloned(),
        }
    }

    /// Writes a property through to the live host object.
    pub fn write_prop(&self, key: &str, value: impl Into<PropValue>) -> Result<()> {
        let data = self.inner.borrow();
        let mounted = data.mounted.as_ref().ok_or(Error::Unmounted)?;
        mounted.scene.set_property(&mounted.handle, key, value.into())
    }

    /// Starts a host animation on this element's object.
    pub fn animate(&self, target: PropMap, params: AnimateParams) -> Result<AnimationHandle> {
        let data = self.inner.borrow();
        let mounted = data.mounted.as_ref().ok_or(Error::Unmounted)?;
        mounted.scene.animate(&mounted.handle, target, params)
    }

    /// Modules resolved for this composite, keyed by requested name.
    pub fn modules(&self) -> ModuleMap {
        self.inner
            .borrow()
            .cell
            .as_ref()
            .map(|cell| cell.modules.clone())
            .unwrap_or_default()
    }

    pub(crate) fn data(&self) -> Ref<'_, ElementData> {
        self.inner.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, ElementData> {
        self.inner.borrow_mut()
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Element")
            .field("kind", &data.kind)
            .field("composite", &data.cell.is_some())
            .field("mounted", &data.mounted.is_some())
            .finish()
    }
}

//! The fixed set of host events elements can subscribe to.

use std::rc::Rc;

use crate::props::PropMap;

/// Events the host can deliver to a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    MouseDown,
    MouseUp,
    MouseMove,
    MouseEnter,
    MouseLeave,
    Focus,
    Blur,
    KeyDown,
    KeyUp,
    Char,
    Resize,
}

impl EventKind {
    /// Every supported event, in registration order.
    pub const ALL: [Self; 11] = [
        Self::MouseDown,
        Self::MouseUp,
        Self::MouseMove,
        Self::MouseEnter,
        Self::MouseLeave,
        Self::Focus,
        Self::Blur,
        Self::KeyDown,
        Self::KeyUp,
        Self::Char,
        Self::Resize,
    ];

    /// The host-side callback name for this event.
    pub fn name(self) -> &'static str {
        match self {
            Self::MouseDown => "onMouseDown",
            Self::MouseUp => "onMouseUp",
            Self::MouseMove => "onMouseMove",
            Self::MouseEnter => "onMouseEnter",
            Self::MouseLeave => "onMouseLeave",
            Self::Focus => "onFocus",
            Self::Blur => "onBlur",
            Self::KeyDown => "onKeyDown",
            Self::KeyUp => "onKeyUp",
            Self::Char => "onChar",
            Self::Resize => "onResize",
        }
    }
}

/// An event payload delivered by the host. The data map is host-defined
/// (key codes, pointer coordinates, etc).
#[derive(Clone, Debug)]
pub struct HostEvent {
    pub kind: EventKind,
    pub data: PropMap,
}

impl HostEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            data: PropMap::new(),
        }
    }

    pub fn with_data(mut self, data: PropMap) -> Self {
        self.data = data;
        self
    }
}

/// A registered event callback. `Rc` so the reconciler can unregister by
/// identity (`Rc::ptr_eq`) when handlers are detached during updates.
pub type EventCallback = Rc<dyn Fn(&HostEvent)>;

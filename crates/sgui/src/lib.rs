//! sgui: a retained-mode UI reconciler for external scene graphs.
//!
//! Declarative component trees (props, state, lifecycle hooks) drive a
//! mutable scene graph owned by a host rendering engine. The host is
//! consumed through the narrow [`HostScene`] trait; the reconciler turns
//! element trees into create/update/remove calls against it, with all
//! mutations serialized through a width-1 FIFO job queue.
//!
//! # Core concepts
//!
//! - **Element**: one declared node, either a primitive (maps 1:1 onto a
//!   host object) or a composite backed by a [`Component`]
//! - **Component**: stateful behavior rendering exactly one element,
//!   with React-style lifecycle hooks, context, and error boundaries
//! - **SceneRuntime**: owns the host adapter, the job queue, and the
//!   single tracked root element; the application pumps it with
//!   `run_until_stalled`
//! - **TestScene** (in [`testing`]): a recording fake host for asserting
//!   on host-call ordering
//!
//! # Example
//!
//! ```rust,ignore
//! use sgui::{primitives::Rect, SceneRuntime};
//! use std::rc::Rc;
//!
//! let runtime = SceneRuntime::new(Rc::new(my_host));
//! runtime.render(Rect::new().w(100.0).h(50.0).into(), None).detach();
//! loop {
//!     runtime.run_until_stalled();
//!     // host frame loop
//! }
//! ```

mod component;
mod element;
mod engine;
mod error;
mod event;
mod host;
mod modules;
mod props;
mod queue;
mod runtime;

pub mod constants;
pub mod primitives;
pub mod testing;

pub use component::{Component, ComponentHandle, RenderCx, StateGate, UpdateCx};
pub use element::{Element, RefHook, WeakElement};
pub use error::{Error, Result};
pub use event::{EventCallback, EventKind, HostEvent};
pub use host::{
    AnimateParams, AnimationHandle, HostHandle, HostScene, Module, ModuleMap, ModuleSpec,
};
pub use props::{PropMap, PropValue, merged};
pub use queue::{JobQueue, Task};
pub use runtime::SceneRuntime;

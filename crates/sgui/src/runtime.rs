//! The scene runtime: owns the host adapter, the job queue, and the
//! single tracked root element.
//!
//! One `SceneRuntime` exists per host scene. It initializes the scene
//! exactly once, queues the root mount and every subsequent update pass,
//! and tears the whole tree down when the host signals closure. The
//! embedding application pumps it with [`SceneRuntime::run_until_stalled`]
//! from its frame loop.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::element::{Element, ErrorHandler};
use crate::engine::{self, Reconciler};
use crate::error::{Error, Result};
use crate::host::{HostHandle, HostScene, Module, ModuleSpec};
use crate::props::{PropMap, PropValue, merged};
use crate::queue::{JobQueue, Task};

/// Name under which the scene module is requested at bootstrap.
const SCENE_MODULE_NAME: &str = "scene";
/// Host locator for the scene module.
const SCENE_MODULE_LOCATOR: &str = "px:scene.1.js";

/// Delay between a state-change request and its enqueued update pass,
/// forwarded to [`HostScene::defer`]. Gives the host time to release
/// event-queue locks before handlers are detached and reattached.
const DEFAULT_UPDATE_DELAY: Duration = Duration::from_millis(50);

struct RuntimeInner {
    host: Rc<dyn HostScene>,
    queue: JobQueue,
    root: RefCell<Option<Element>>,
    scene_module: RefCell<Option<Module>>,
    update_delay: Cell<Duration>,
    weak_self: RefCell<Weak<RuntimeInner>>,
}

/// Handle to the runtime. Clones share the same underlying state.
#[derive(Clone)]
pub struct SceneRuntime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning runtime reference held by component handles.
#[derive(Clone)]
pub(crate) struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<SceneRuntime> {
        self.inner.upgrade().map(|inner| SceneRuntime { inner })
    }
}

impl SceneRuntime {
    pub fn new(host: Rc<dyn HostScene>) -> Self {
        let inner = Rc::new(RuntimeInner {
            host,
            queue: JobQueue::new(),
            root: RefCell::new(None),
            scene_module: RefCell::new(None),
            update_delay: Cell::new(DEFAULT_UPDATE_DELAY),
            weak_self: RefCell::new(Weak::new()),
        });
        *inner.weak_self.borrow_mut() = Rc::downgrade(&inner);
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.inner.host.clone(), self.downgrade())
    }

    pub fn set_update_delay(&self, delay: Duration) {
        self.inner.update_delay.set(delay);
    }

    /// Runs queued engine work until everything is done or the front job
    /// is waiting on the host.
    pub fn run_until_stalled(&self) {
        self.inner.queue.run_until_stalled();
    }

    /// Whether all queued engine work has finished.
    pub fn is_idle(&self) -> bool {
        self.inner.queue.is_idle()
    }

    /// Initializes the scene: imports the scene module and subscribes to
    /// the host close signal. Idempotent; a second call finds the cached
    /// module and issues no further host import.
    pub fn init_scene(&self) -> Task<Result<()>> {
        let runtime = self.clone();
        self.inner.queue.submit(async move {
            let inner = &runtime.inner;
            if inner.scene_module.borrow().is_some() {
                log::info!("scene instance already initialized");
                return Ok(());
            }
            log::info!("initializing scene instance");

            let request = ModuleSpec::new().with(SCENE_MODULE_NAME, SCENE_MODULE_LOCATOR);
            let imports = inner.host.import_modules(request).await?;
            let module = imports.get(SCENE_MODULE_NAME).cloned().ok_or_else(|| {
                Error::SceneInit("no scene module in imported modules".to_string())
            })?;
            *inner.scene_module.borrow_mut() = Some(module);

            // The host delivers the close signal at most once; subscribing
            // here keeps the subscription tied to the single init.
            let weak = inner.weak_self.borrow().clone();
            inner.host.on_close(Box::new(move || {
                log::info!("scene instance closing");
                if let Some(inner) = weak.upgrade() {
                    SceneRuntime { inner }.teardown_root();
                }
            }));

            log::info!("scene instance initialized");
            Ok(())
        })
    }

    /// Mounts `element` as the root of the scene, under `parent` or the
    /// host root. Initializes the scene first if needed. Intended to be
    /// called once per application.
    pub fn render(&self, element: Element, parent: Option<HostHandle>) -> Task<Result<()>> {
        self.init_scene().detach();

        let runtime = self.clone();
        self.inner.queue.submit(async move {
            let inner = &runtime.inner;
            if inner.scene_module.borrow().is_none() {
                return Err(Error::SceneNotInitialized);
            }
            let host_parent = parent.unwrap_or_else(|| inner.host.root());

            // Errors not handled by any boundary delete the entire tree:
            // an empty scene over a partially broken one.
            let weak = inner.weak_self.borrow().clone();
            let on_error: ErrorHandler = Rc::new(move |error: Error| {
                log::error!("unhandled error; deleting root element: {error}");
                if let Some(inner) = weak.upgrade() {
                    SceneRuntime { inner }.teardown_root();
                }
            });

            runtime
                .reconciler()
                .mount(element.clone(), host_parent, PropMap::new(), Some(on_error))
                .await?;
            *inner.root.borrow_mut() = Some(element);
            Ok(())
        })
    }

    /// Unmounts the tracked root element, if any.
    pub fn teardown_root(&self) {
        let root = self.inner.root.borrow_mut().take();
        if let Some(root) = root {
            engine::unmount(&root);
        }
    }

    /// The root element currently mounted, if any.
    pub fn root_element(&self) -> Option<Element> {
        self.inner.root.borrow().clone()
    }

    /// Queues a state merge and update pass for a composite. Changes are
    /// folded into the state when the pass actually runs, after any
    /// in-flight passes settle.
    pub(crate) fn schedule_set_state(&self, element: Element, changes: PropMap) {
        self.schedule_update(element, Some(changes), false);
    }

    /// Queues an update pass that bypasses `should_update`.
    pub(crate) fn schedule_force_update(&self, element: Element) {
        self.schedule_update(element, None, true);
    }

    fn schedule_update(&self, element: Element, changes: Option<PropMap>, force: bool) {
        let delay = self.inner.update_delay.get();
        let host = self.inner.host.clone();
        let weak = self.inner.weak_self.borrow().clone();
        self.inner
            .queue
            .spawn(async move {
                host.defer(delay).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let runtime = SceneRuntime { inner };
                runtime.submit_update_pass(element, changes, force);
            })
            .detach();
    }

    fn submit_update_pass(&self, element: Element, changes: Option<PropMap>, force: bool) {
        let runtime = self.clone();
        self.inner
            .queue
            .submit(async move {
                // Next props/state are computed now, not at request time,
                // so earlier queued passes contribute their merges first.
                let (next_props, next_state) = {
                    let data = element.data();
                    let Some(cell) = data.cell.as_ref() else {
                        log::warn!("update scheduled for non-composite `{}`", data.kind);
                        return;
                    };
                    let next_state = match &changes {
                        Some(changes) => merged(&cell.state, changes),
                        None => cell.state.clone(),
                    };
                    (data.props.clone(), next_state)
                };

                let outcome = runtime
                    .reconciler()
                    .update_component(element.clone(), next_props, next_state, force, None)
                    .await;
                if let Err(error) = outcome {
                    log::error!("error updating component `{}`: {error}", element.kind());
                    let handler = element.data().cell.as_ref().and_then(|cell| cell.error.clone());
                    if let Some(handler) = handler {
                        handler(error);
                    }
                }
            })
            .detach();
    }

    /// Creates a shareable font resource: a parentless host object of the
    /// `fontResource` kind.
    pub fn create_font_resource(&self, props: PropMap) -> Result<HostHandle> {
        self.create_resource("fontResource", props)
    }

    /// Creates a shareable image resource: a parentless host object of
    /// the `imageResource` kind.
    pub fn create_image_resource(&self, props: PropMap) -> Result<HostHandle> {
        self.create_resource("imageResource", props)
    }

    fn create_resource(&self, kind: &str, props: PropMap) -> Result<HostHandle> {
        if self.inner.scene_module.borrow().is_none() {
            return Err(Error::SceneNotInitialized);
        }
        self.inner.host.create_object(kind, None, &props)
    }

    /// The scene's current width, once initialized.
    pub fn scene_width(&self) -> Option<f64> {
        self.scene_metric("w")
    }

    /// The scene's current height, once initialized.
    pub fn scene_height(&self) -> Option<f64> {
        self.scene_metric("h")
    }

    fn scene_metric(&self, key: &str) -> Option<f64> {
        if self.inner.scene_module.borrow().is_none() {
            return None;
        }
        let root = self.inner.host.root();
        self.inner
            .host
            .get_property(&root, key)
            .as_ref()
            .and_then(PropValue::as_float)
    }
}

//! End-to-end reconciliation tests against the recording fake host.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use sgui::testing::{HostCall, TestScene};
use sgui::{
    Component, ComponentHandle, Element, Error, EventKind, HostEvent, HostScene, ModuleSpec,
    PropMap, PropValue, RenderCx, Result, SceneRuntime, UpdateCx,
};

type Log = Rc<RefCell<Vec<String>>>;
type HandleSlot = Rc<RefCell<Option<ComponentHandle>>>;

fn setup() -> (Rc<TestScene>, SceneRuntime) {
    let scene = Rc::new(TestScene::new());
    let runtime = SceneRuntime::new(scene.clone());
    (scene, runtime)
}

fn map1(key: &str, value: impl Into<PropValue>) -> PropMap {
    let mut map = PropMap::new();
    map.insert(key.to_string(), value.into());
    map
}

fn state_int(cx_state: &PropMap, key: &str) -> i64 {
    cx_state.get(key).and_then(PropValue::as_int).unwrap_or(0)
}

// ---------------------------------------------------------------- //
// Counter end to end
// ---------------------------------------------------------------- //

struct Counter {
    log: Log,
    handle: HandleSlot,
}

impl Component for Counter {
    fn kind(&self) -> &str {
        "Counter"
    }

    fn initial_state(&self) -> PropMap {
        map1("count", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let count = state_int(cx.state, "count");
        Ok(Element::primitive("text").prop("text", count.to_string()))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }

    fn did_update(
        &mut self,
        _prev_props: &PropMap,
        prev_state: &PropMap,
        _cx: &mut UpdateCx<'_>,
    ) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("did_update prev_count={}", state_int(prev_state, "count")));
        Ok(())
    }
}

#[test]
fn test_counter_set_state_updates_host_exactly_once() {
    let (scene, runtime) = setup();
    let log: Log = Rc::default();
    let handle: HandleSlot = Rc::default();

    let mut task = runtime.render(
        Element::composite(Counter {
            log: log.clone(),
            handle: handle.clone(),
        }),
        None,
    );
    runtime.run_until_stalled();
    assert_eq!(format!("{:?}", task.try_take()), "Some(Ok(()))");

    let text_handle = match &scene.calls()[..] {
        [HostCall::Import { .. }, HostCall::Create { handle, kind }] if kind == "text" => *handle,
        calls => panic!("unexpected call sequence: {calls:?}"),
    };
    assert_eq!(
        scene.object_prop(&text_handle, "text"),
        Some(PropValue::Str("0".into()))
    );
    scene.clear_calls();

    let handle = handle.borrow().clone().expect("handle captured");
    handle.set_state(map1("count", 1));
    runtime.run_until_stalled();

    assert_eq!(
        scene.set_calls("text"),
        vec![(text_handle, PropValue::Str("1".into()))]
    );
    assert_eq!(*log.borrow(), vec!["did_update prev_count=0".to_string()]);
}

// ---------------------------------------------------------------- //
// Queued merges apply in call order
// ---------------------------------------------------------------- //

struct Pair {
    states: Rc<RefCell<Vec<(i64, Option<i64>)>>>,
    handle: HandleSlot,
}

impl Component for Pair {
    fn kind(&self) -> &str {
        "Pair"
    }

    fn initial_state(&self) -> PropMap {
        map1("x", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let x = state_int(cx.state, "x");
        Ok(Element::primitive("text").prop("text", x.to_string()))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }

    fn did_update(
        &mut self,
        _prev_props: &PropMap,
        _prev_state: &PropMap,
        cx: &mut UpdateCx<'_>,
    ) -> Result<()> {
        let state = cx.state();
        self.states.borrow_mut().push((
            state_int(state, "x"),
            state.get("y").and_then(PropValue::as_int),
        ));
        Ok(())
    }
}

#[test]
fn test_two_queued_set_states_merge_in_call_order() {
    let (_scene, runtime) = setup();
    let states = Rc::new(RefCell::new(Vec::new()));
    let handle: HandleSlot = Rc::default();

    runtime
        .render(
            Element::composite(Pair {
                states: states.clone(),
                handle: handle.clone(),
            }),
            None,
        )
        .detach();
    runtime.run_until_stalled();

    let handle = handle.borrow().clone().expect("handle captured");
    handle.set_state(map1("x", 1));
    handle.set_state(map1("y", 2));
    runtime.run_until_stalled();

    // First pass commits {x:1}; the second folds {y:2} into that.
    assert_eq!(*states.borrow(), vec![(1, None), (1, Some(2))]);
}

// ---------------------------------------------------------------- //
// Kind change replaces, removing before creating
// ---------------------------------------------------------------- //

struct Swapper {
    handle: HandleSlot,
}

impl Component for Swapper {
    fn kind(&self) -> &str {
        "Swapper"
    }

    fn initial_state(&self) -> PropMap {
        map1("use_rect", true)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let use_rect = cx
            .state
            .get("use_rect")
            .and_then(PropValue::as_bool)
            .unwrap_or(true);
        if use_rect {
            Ok(Element::primitive("rect").prop("w", 10))
        } else {
            Ok(Element::primitive("text").prop("text", "swapped"))
        }
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_kind_change_removes_old_before_creating_new() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Swapper { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();

    let rect_handle = scene
        .calls()
        .iter()
        .find_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "rect" => Some(*handle),
            _ => None,
        })
        .expect("rect created");
    scene.clear_calls();

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("use_rect", false));
    runtime.run_until_stalled();

    let calls = scene.calls();
    let remove_at = calls
        .iter()
        .position(|call| *call == HostCall::Remove { handle: rect_handle })
        .expect("old rect removed");
    let create_at = calls
        .iter()
        .position(|call| matches!(call, HostCall::Create { kind, .. } if kind == "text"))
        .expect("new text created");
    assert!(remove_at < create_at, "remove must precede create: {calls:?}");
    assert!(scene.is_removed(&rect_handle));
    assert_eq!(scene.live_object_count(), 1);
}

// ---------------------------------------------------------------- //
// Child arity change replaces the whole subtree
// ---------------------------------------------------------------- //

struct Listy {
    handle: HandleSlot,
}

impl Component for Listy {
    fn kind(&self) -> &str {
        "Listy"
    }

    fn initial_state(&self) -> PropMap {
        map1("n", 2)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let n = state_int(cx.state, "n");
        let mut root = Element::primitive("object");
        for i in 0..n {
            root = root.child(Element::primitive("rect").prop("x", i * 10));
        }
        Ok(root)
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_child_count_change_replaces_subtree() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Listy { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();
    assert_eq!(scene.live_object_count(), 3);
    scene.clear_calls();

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("n", 3));
    runtime.run_until_stalled();

    let calls = scene.calls();
    let first_remove = calls
        .iter()
        .position(|call| matches!(call, HostCall::Remove { .. }))
        .expect("old subtree removed");
    let first_create = calls
        .iter()
        .position(|call| matches!(call, HostCall::Create { .. }))
        .expect("new subtree created");
    assert!(first_remove < first_create);
    assert_eq!(
        calls.iter().filter(|c| matches!(c, HostCall::Remove { .. })).count(),
        3
    );
    assert_eq!(
        calls.iter().filter(|c| matches!(c, HostCall::Create { .. })).count(),
        4
    );
    assert_eq!(scene.live_object_count(), 4);
}

// ---------------------------------------------------------------- //
// Unchanged arity diffs children positionally in place
// ---------------------------------------------------------------- //

struct Labels {
    handle: HandleSlot,
}

impl Component for Labels {
    fn kind(&self) -> &str {
        "Labels"
    }

    fn initial_state(&self) -> PropMap {
        map1("suffix", 1)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let suffix = state_int(cx.state, "suffix");
        Ok(Element::primitive("object")
            .child(Element::primitive("text").prop("text", format!("a{suffix}")))
            .child(Element::primitive("text").prop("text", format!("b{suffix}"))))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_same_arity_updates_children_in_place_and_in_order() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Labels { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();

    let text_handles: Vec<_> = scene
        .calls()
        .iter()
        .filter_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "text" => Some(*handle),
            _ => None,
        })
        .collect();
    assert_eq!(text_handles.len(), 2);
    scene.clear_calls();

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("suffix", 2));
    runtime.run_until_stalled();

    assert!(!scene.calls().iter().any(|c| matches!(c, HostCall::Create { .. })));
    assert!(!scene.calls().iter().any(|c| matches!(c, HostCall::Remove { .. })));
    assert_eq!(
        scene.set_calls("text"),
        vec![
            (text_handles[0], PropValue::Str("a2".into())),
            (text_handles[1], PropValue::Str("b2".into())),
        ]
    );
}

// ---------------------------------------------------------------- //
// Error boundaries contain descendant failures
// ---------------------------------------------------------------- //

struct Bomb;

impl Component for Bomb {
    fn kind(&self) -> &str {
        "Bomb"
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let explode = cx
            .props
            .get("explode")
            .and_then(PropValue::as_bool)
            .unwrap_or(false);
        if explode {
            Err(Error::render("Bomb", "boom"))
        } else {
            Ok(Element::primitive("rect").prop("w", 1))
        }
    }
}

struct Boundary {
    handle: HandleSlot,
    caught: Rc<RefCell<Vec<String>>>,
}

impl Component for Boundary {
    fn kind(&self) -> &str {
        "Boundary"
    }

    fn initial_state(&self) -> PropMap {
        let mut state = map1("explode", false);
        state.insert("failed".to_string(), PropValue::Bool(false));
        state
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let failed = cx
            .state
            .get("failed")
            .and_then(PropValue::as_bool)
            .unwrap_or(false);
        if failed {
            return Ok(Element::primitive("text").prop("text", "fallback"));
        }
        let explode = cx
            .state
            .get("explode")
            .and_then(PropValue::as_bool)
            .unwrap_or(false);
        Ok(Element::composite(Bomb).prop("explode", explode))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }

    fn is_error_boundary(&self) -> bool {
        true
    }

    fn did_catch(&mut self, error: &Error, cx: &mut UpdateCx<'_>) {
        self.caught.borrow_mut().push(error.to_string());
        cx.set_state(map1("failed", true));
    }
}

#[test]
fn test_boundary_catches_descendant_render_error_and_recovers() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();
    let caught = Rc::new(RefCell::new(Vec::new()));

    runtime
        .render(
            Element::composite(Boundary {
                handle: handle.clone(),
                caught: caught.clone(),
            }),
            None,
        )
        .detach();
    runtime.run_until_stalled();
    assert_eq!(scene.live_object_count(), 1);

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("explode", true));
    runtime.run_until_stalled();

    // The error reached the boundary, not the root handler: the tree is
    // still mounted and now shows the fallback.
    assert_eq!(caught.borrow().len(), 1);
    assert!(caught.borrow()[0].contains("boom"));
    assert!(runtime.root_element().is_some());
    let fallback = scene
        .calls()
        .iter()
        .any(|call| matches!(call, HostCall::Create { kind, .. } if kind == "text"));
    assert!(fallback, "fallback text should have been mounted");
}

// ---------------------------------------------------------------- //
// Stale queued updates no-op after their subtree is deleted
// ---------------------------------------------------------------- //

struct Inner {
    handle: HandleSlot,
}

impl Component for Inner {
    fn kind(&self) -> &str {
        "Inner"
    }

    fn initial_state(&self) -> PropMap {
        map1("x", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::primitive("rect").prop("x", state_int(cx.state, "x")))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

struct Outer {
    handle: HandleSlot,
    inner_handle: HandleSlot,
}

impl Component for Outer {
    fn kind(&self) -> &str {
        "Outer"
    }

    fn initial_state(&self) -> PropMap {
        map1("show_inner", true)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let show = cx
            .state
            .get("show_inner")
            .and_then(PropValue::as_bool)
            .unwrap_or(true);
        if show {
            Ok(Element::composite(Inner {
                handle: self.inner_handle.clone(),
            }))
        } else {
            Ok(Element::primitive("rect").prop("w", 5))
        }
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_stale_queued_update_noops_after_subtree_deletion() {
    let (scene, runtime) = setup();
    let outer: HandleSlot = Rc::default();
    let inner: HandleSlot = Rc::default();

    runtime
        .render(
            Element::composite(Outer {
                handle: outer.clone(),
                inner_handle: inner.clone(),
            }),
            None,
        )
        .detach();
    runtime.run_until_stalled();
    scene.clear_calls();

    // The deletion is queued first; the inner update runs after it and
    // must find its slot vacated.
    outer
        .borrow()
        .clone()
        .expect("outer handle")
        .set_state(map1("show_inner", false));
    inner
        .borrow()
        .clone()
        .expect("inner handle")
        .set_state(map1("x", 99));
    runtime.run_until_stalled();

    assert_eq!(scene.live_object_count(), 1);
    let creates = scene
        .calls()
        .iter()
        .filter(|c| matches!(c, HostCall::Create { .. }))
        .count();
    assert_eq!(creates, 1, "the stale update must not re-create anything");
    assert!(scene.set_calls("x").is_empty());
}

// ---------------------------------------------------------------- //
// Scene init and teardown
// ---------------------------------------------------------------- //

#[test]
fn test_init_scene_is_idempotent() {
    let (scene, runtime) = setup();

    let mut first = runtime.init_scene();
    let mut second = runtime.init_scene();
    runtime.run_until_stalled();

    assert!(matches!(first.try_take(), Some(Ok(()))));
    assert!(matches!(second.try_take(), Some(Ok(()))));
    assert_eq!(scene.import_count(), 1);
}

#[test]
fn test_close_signal_unmounts_root_and_releases_refs() {
    let (scene, runtime) = setup();
    let ref_log: Log = Rc::default();

    let log = ref_log.clone();
    runtime
        .render(
            Element::primitive("rect").prop("w", 10).with_ref(move |el| {
                log.borrow_mut().push(match el {
                    Some(_) => "mounted".to_string(),
                    None => "unmounted".to_string(),
                });
            }),
            None,
        )
        .detach();
    runtime.run_until_stalled();
    assert_eq!(*ref_log.borrow(), vec!["mounted".to_string()]);
    assert_eq!(scene.live_object_count(), 1);

    scene.close();
    assert_eq!(
        *ref_log.borrow(),
        vec!["mounted".to_string(), "unmounted".to_string()]
    );
    assert!(runtime.root_element().is_none());
    assert_eq!(scene.live_object_count(), 0);
}

#[test]
fn test_scene_metrics_read_from_root() {
    let (scene, runtime) = setup();
    let root = scene.root();
    scene.seed_prop(&root, "w", 1280.0);
    scene.seed_prop(&root, "h", 720.0);

    assert_eq!(runtime.scene_width(), None);
    runtime.init_scene().detach();
    runtime.run_until_stalled();

    assert_eq!(runtime.scene_width(), Some(1280.0));
    assert_eq!(runtime.scene_height(), Some(720.0));
}

// ---------------------------------------------------------------- //
// should_update gating and forced updates
// ---------------------------------------------------------------- //

struct Stubborn {
    handle: HandleSlot,
}

impl Component for Stubborn {
    fn kind(&self) -> &str {
        "Stubborn"
    }

    fn initial_state(&self) -> PropMap {
        map1("x", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::primitive("text").prop("text", state_int(cx.state, "x").to_string()))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }

    fn should_update(
        &self,
        _next_props: &PropMap,
        _next_state: &PropMap,
        _cx: &RenderCx<'_>,
    ) -> bool {
        false
    }
}

#[test]
fn test_declined_update_commits_state_and_force_update_renders_it() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Stubborn { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();
    scene.clear_calls();

    let handle = handle.borrow().clone().expect("handle captured");
    handle.set_state(map1("x", 5));
    runtime.run_until_stalled();
    assert!(scene.set_calls("text").is_empty(), "declined update must not render");

    handle.force_update();
    runtime.run_until_stalled();
    let sets = scene.set_calls("text");
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].1, PropValue::Str("5".into()));
}

// ---------------------------------------------------------------- //
// Immediate set_state inside will_receive_props
// ---------------------------------------------------------------- //

struct Derived;

impl Component for Derived {
    fn kind(&self) -> &str {
        "Derived"
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::primitive("text").prop("text", state_int(cx.state, "seen").to_string()))
    }

    fn will_receive_props(&mut self, next_props: &PropMap, cx: &mut UpdateCx<'_>) -> Result<()> {
        let value = state_int(next_props, "value");
        cx.set_state(map1("seen", value));
        Ok(())
    }
}

struct Feeder {
    handle: HandleSlot,
}

impl Component for Feeder {
    fn kind(&self) -> &str {
        "Feeder"
    }

    fn initial_state(&self) -> PropMap {
        map1("v", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::composite(Derived).prop("value", state_int(cx.state, "v")))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_immediate_set_state_in_will_receive_props_joins_current_pass() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Feeder { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();
    scene.clear_calls();

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("v", 5));
    runtime.run_until_stalled();

    // One pass, one write: the merge applied inside will_receive_props
    // instead of queuing a second pass.
    let sets = scene.set_calls("text");
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].1, PropValue::Str("5".into()));
    assert!(runtime.is_idle());
}

// ---------------------------------------------------------------- //
// will_mount merges apply to the first render
// ---------------------------------------------------------------- //

struct EarlyBird;

impl Component for EarlyBird {
    fn kind(&self) -> &str {
        "EarlyBird"
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::primitive("text").prop("text", state_int(cx.state, "ready").to_string()))
    }

    fn will_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        cx.set_state(map1("ready", 1));
        Ok(())
    }
}

#[test]
fn test_will_mount_state_merge_lands_in_first_render() {
    let (scene, runtime) = setup();

    runtime.render(Element::composite(EarlyBird), None).detach();
    runtime.run_until_stalled();

    let text = scene
        .calls()
        .iter()
        .find_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "text" => Some(*handle),
            _ => None,
        })
        .expect("text created");
    assert_eq!(
        scene.object_prop(&text, "text"),
        Some(PropValue::Str("1".into()))
    );
    assert!(scene.set_calls("text").is_empty(), "no update pass expected");
}

// ---------------------------------------------------------------- //
// Event handler swap on in-place primitive update
// ---------------------------------------------------------------- //

struct Clicky {
    handle: HandleSlot,
    clicks: Rc<RefCell<u32>>,
}

impl Component for Clicky {
    fn kind(&self) -> &str {
        "Clicky"
    }

    fn initial_state(&self) -> PropMap {
        map1("gen", 0)
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let clicks = self.clicks.clone();
        Ok(Element::primitive("rect")
            .prop("w", state_int(cx.state, "gen"))
            .on(EventKind::MouseDown, move |_| {
                *clicks.borrow_mut() += 1;
            }))
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_primitive_update_swaps_event_handlers() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();
    let clicks = Rc::new(RefCell::new(0));

    runtime
        .render(
            Element::composite(Clicky {
                handle: handle.clone(),
                clicks: clicks.clone(),
            }),
            None,
        )
        .detach();
    runtime.run_until_stalled();

    let rect = scene
        .calls()
        .iter()
        .find_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "rect" => Some(*handle),
            _ => None,
        })
        .expect("rect created");
    assert_eq!(scene.handler_count(&rect, EventKind::MouseDown), 1);
    scene.clear_calls();

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("gen", 1));
    runtime.run_until_stalled();

    let calls = scene.calls();
    let unregister_at = calls
        .iter()
        .position(|c| matches!(c, HostCall::Unregister { event: EventKind::MouseDown, .. }))
        .expect("old handler detached");
    let register_at = calls
        .iter()
        .position(|c| matches!(c, HostCall::Register { event: EventKind::MouseDown, .. }))
        .expect("new handler attached");
    assert!(unregister_at < register_at);
    assert_eq!(scene.handler_count(&rect, EventKind::MouseDown), 1);

    scene.fire(&rect, HostEvent::new(EventKind::MouseDown));
    assert_eq!(*clicks.borrow(), 1);
}

// ---------------------------------------------------------------- //
// Context propagation through intermediate composites
// ---------------------------------------------------------------- //

struct Leaf;

impl Component for Leaf {
    fn kind(&self) -> &str {
        "Leaf"
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let theme = cx
            .context
            .get("theme")
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| "missing".to_string());
        Ok(Element::primitive("text").prop("text", theme))
    }
}

struct Middle;

impl Component for Middle {
    fn kind(&self) -> &str {
        "Middle"
    }

    fn render(&self, _cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::composite(Leaf))
    }
}

struct Provider;

impl Component for Provider {
    fn kind(&self) -> &str {
        "Provider"
    }

    fn render(&self, _cx: &RenderCx<'_>) -> Result<Element> {
        Ok(Element::composite(Middle))
    }

    fn child_context(&self, _cx: &RenderCx<'_>) -> PropMap {
        map1("theme", "dark")
    }
}

#[test]
fn test_child_context_reaches_deep_descendants() {
    let (scene, runtime) = setup();

    runtime.render(Element::composite(Provider), None).detach();
    runtime.run_until_stalled();

    let text = scene
        .calls()
        .iter()
        .find_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "text" => Some(*handle),
            _ => None,
        })
        .expect("text created");
    assert_eq!(
        scene.object_prop(&text, "text"),
        Some(PropValue::Str("dark".into()))
    );
}

// ---------------------------------------------------------------- //
// Module resolution before first mount
// ---------------------------------------------------------------- //

struct NetThing;

impl Component for NetThing {
    fn kind(&self) -> &str {
        "NetThing"
    }

    fn modules(&self) -> ModuleSpec {
        ModuleSpec::new().with("ws", "px:ws.js")
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let status = if cx.modules.contains_key("ws") { "ok" } else { "missing" };
        Ok(Element::primitive("text").prop("text", status))
    }
}

#[test]
fn test_component_modules_resolve_before_first_render() {
    let (scene, runtime) = setup();
    scene.provide_module("ws", 42_u32);

    runtime.render(Element::composite(NetThing), None).detach();
    runtime.run_until_stalled();

    // One import for the scene bootstrap, one for the component.
    assert_eq!(scene.import_count(), 2);
    let text = scene
        .calls()
        .iter()
        .find_map(|call| match call {
            HostCall::Create { handle, kind } if kind == "text" => Some(*handle),
            _ => None,
        })
        .expect("text created");
    assert_eq!(
        scene.object_prop(&text, "text"),
        Some(PropValue::Str("ok".into()))
    );
}

// ---------------------------------------------------------------- //
// Unhandled errors fail closed
// ---------------------------------------------------------------- //

struct Flaky {
    handle: HandleSlot,
}

impl Component for Flaky {
    fn kind(&self) -> &str {
        "Flaky"
    }

    fn initial_state(&self) -> PropMap {
        let mut state = PropMap::new();
        state.insert("fail".to_string(), PropValue::Bool(false));
        state
    }

    fn render(&self, cx: &RenderCx<'_>) -> Result<Element> {
        let fail = cx
            .state
            .get("fail")
            .and_then(PropValue::as_bool)
            .unwrap_or(false);
        if fail {
            Err(Error::render("Flaky", "render failed"))
        } else {
            Ok(Element::primitive("rect").prop("w", 1))
        }
    }

    fn did_mount(&mut self, cx: &mut UpdateCx<'_>) -> Result<()> {
        *self.handle.borrow_mut() = Some(cx.handle());
        Ok(())
    }
}

#[test]
fn test_unhandled_error_deletes_the_whole_root() {
    let (scene, runtime) = setup();
    let handle: HandleSlot = Rc::default();

    runtime
        .render(Element::composite(Flaky { handle: handle.clone() }), None)
        .detach();
    runtime.run_until_stalled();
    assert!(runtime.root_element().is_some());
    assert_eq!(scene.live_object_count(), 1);

    handle
        .borrow()
        .clone()
        .expect("handle captured")
        .set_state(map1("fail", true));
    runtime.run_until_stalled();

    // No boundary anywhere: prefer an empty scene over a broken one.
    assert!(runtime.root_element().is_none());
    assert_eq!(scene.live_object_count(), 0);
}

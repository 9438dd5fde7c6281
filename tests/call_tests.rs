//! Calls through the bridge into scripted mock methods.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use gdbind::sys::{ObjectPtr, VariantType};
use gdbind::value::{Color, Rect2, Rid, StringRaw, Transform2D, Vector2};
use gdbind::{Arena, BindingConfig, Bridge, CallFrame, LazyMethod, RawValue};
use gdbind_core::MethodFlags;
use gdbind_core::mock::{self, MockEngine};

fn instance() -> ObjectPtr {
    ObjectPtr(0x5000 as *mut std::ffi::c_void)
}

fn setup() -> (Arc<MockEngine>, Bridge) {
    mock::reset_ledger();
    let engine = Arc::new(MockEngine::new());
    let bridge = Bridge::new(engine.clone(), BindingConfig::default()).unwrap();
    (engine, bridge)
}

// =============================================================================
// Frames
// =============================================================================

#[test]
fn test_float_and_bool_frame() {
    let mut frame = CallFrame::new(2);
    frame.arg(&1.5f64).arg(&true);
    let finished = frame.finish();

    assert_eq!(finished.arg_count, 2);
    let table = finished.arg_table();
    assert_eq!(table.len(), 2);
    unsafe {
        assert_eq!(std::slice::from_raw_parts(table[0].0 as *const u8, 8), &1.5f64.to_ne_bytes());
        assert_eq!(*(table[1].0 as *const u8), 1);
    }
}

#[test]
fn test_return_slot_holds_what_the_callee_wrote() {
    let (engine, bridge) = setup();
    engine.define("RenderingServer", "canvas_item_get_rect", 11, |_, args, ret| unsafe {
        let item: Rid = mock::arg(args, 0);
        let scale: f64 = mock::arg(args, 1);
        let side = item.0 as f32 * scale as f32;
        mock::ret(ret, Rect2::new(Vector2::new(-1.0, -1.0), Vector2::new(side, side)));
    });

    let binding = bridge.resolve("RenderingServer", "canvas_item_get_rect", 11);
    let mut frame = CallFrame::new(2);
    frame.arg(&Rid(4)).arg(&0.5f64);
    let ret = frame.ret::<Rect2>();
    unsafe { bridge.call(binding, instance(), &mut frame) };

    assert_eq!(frame.read(&ret), Rect2::new(Vector2::new(-1.0, -1.0), Vector2::new(2.0, 2.0)));
    // Arguments are untouched by the return write.
    assert_eq!(frame.arg_bytes(0), Some(&4u64.to_ne_bytes()[..]));
    assert_eq!(frame.arg_bytes(1), Some(&0.5f64.to_ne_bytes()[..]));
}

#[test]
fn test_callee_sees_every_argument_in_order() {
    let (engine, bridge) = setup();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    engine.define("RenderingServer", "canvas_item_add_rect", 3, move |this, args, _| unsafe {
        assert_eq!(this, instance());
        let item: Rid = mock::arg(args, 0);
        let rect: Rect2 = mock::arg(args, 1);
        let color: Color = mock::arg(args, 2);
        let antialiased: u8 = mock::arg(args, 3);
        sink.lock().push((args.len(), item, rect, color, antialiased));
    });

    let binding = bridge.resolve("RenderingServer", "canvas_item_add_rect", 3);
    let rect = Rect2::new(Vector2::ZERO, Vector2::new(64.0, 32.0));
    let mut frame = CallFrame::new(4);
    frame.arg(&Rid(9)).arg(&rect).arg(&Color::WHITE).arg(&false);
    unsafe { bridge.call(binding, instance(), &mut frame) };

    assert_eq!(*seen.lock(), vec![(4, Rid(9), rect, Color::WHITE, 0)]);
}

#[test]
fn test_raw_values_cross_the_boundary() {
    let (engine, bridge) = setup();
    engine.define("CanvasItem", "get_transform", 5, |_, args, ret| unsafe {
        assert!(args.is_empty());
        mock::ret(ret, Transform2D::IDENTITY);
    });

    let binding = bridge.resolve("CanvasItem", "get_transform", 5);
    let mut frame = CallFrame::new(0);
    let ret = frame.ret_raw(VariantType::Transform2D);
    unsafe { bridge.call(binding, instance(), &mut frame) };
    assert_eq!(frame.read_raw(&ret), Ok(RawValue::Transform2D(Transform2D::IDENTITY)));
}

#[test]
fn test_static_methods_take_a_null_instance() {
    let (engine, bridge) = setup();
    engine.define("Time", "get_ticks_usec", 2, |this, _, ret| unsafe {
        assert!(this.is_null());
        mock::ret(ret, 1_000_000i64);
    });

    static GET_TICKS_USEC: LazyMethod = LazyMethod::new("Time", "get_ticks_usec", 2).with_flags(MethodFlags::STATIC);
    let mut frame = CallFrame::new(0);
    let ret = frame.ret::<i64>();
    unsafe { bridge.call(GET_TICKS_USEC.get(&bridge), ObjectPtr::NULL, &mut frame) };
    assert_eq!(frame.read(&ret), 1_000_000);
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_resolution_happens_once_per_method() {
    let (engine, bridge) = setup();
    engine.define("RenderingServer", "free_rid", 2722037293, |_, _, _| {});
    engine.define("RenderingServer", "canvas_item_create", 529393457, |_, _, _| {});

    let a = bridge.resolve("RenderingServer", "free_rid", 2722037293);
    let b = bridge.resolve("RenderingServer", "free_rid", 2722037293);
    assert_eq!(a, b);
    assert_eq!(engine.method_lookups(), 1);

    let c = bridge.resolve("RenderingServer", "canvas_item_create", 529393457);
    assert_ne!(a.ptr, c.ptr);
    assert_eq!(engine.method_lookups(), 2);
    assert_eq!(bridge.resolved_count(), 2);
}

#[test]
fn test_lookups_with_another_hash_are_distinct() {
    let (engine, bridge) = setup();
    engine.define("RenderingServer", "free_rid", 2722037293, |_, _, _| {});
    assert!(bridge.try_resolve("RenderingServer", "free_rid", 1).is_err());
    assert!(bridge.try_resolve("RenderingServer", "free_rid", 2722037293).is_ok());
    assert_eq!(engine.method_lookups(), 2);
}

#[test]
fn test_repeated_calls_reuse_the_binding() {
    let (engine, bridge) = setup();
    let counter = Arc::new(AtomicI64::new(0));
    let hits = counter.clone();
    engine.define("Engine", "get_frames_drawn", 4, move |_, _, ret| unsafe {
        mock::ret(ret, hits.fetch_add(1, Ordering::SeqCst) + 1);
    });

    static GET_FRAMES_DRAWN: LazyMethod = LazyMethod::new("Engine", "get_frames_drawn", 4);
    let frames: Vec<i64> = (0..3)
        .map(|_| {
            let mut frame = CallFrame::new(0);
            let ret = frame.ret::<i64>();
            unsafe { bridge.call(GET_FRAMES_DRAWN.get(&bridge), instance(), &mut frame) };
            frame.read(&ret)
        })
        .collect();

    assert_eq!(frames, vec![1, 2, 3]);
    assert_eq!(engine.method_lookups(), 1);
    assert_eq!(engine.method_calls(), 3);
}

// =============================================================================
// Ownership across a call
// =============================================================================

#[test]
fn test_string_return_is_transferred_in() {
    let (engine, bridge) = setup();
    engine.define("RenderingServer", "get_video_adapter_name", 201670096, |_, _, ret| unsafe {
        mock::ret(ret, mock::new_string("llvmpipe (LLVM 17.0.6, 256 bits)"));
    });

    let binding = bridge.resolve("RenderingServer", "get_video_adapter_name", 201670096);
    let tmp = bridge.lifetime();
    let name = {
        let mut frame = CallFrame::new(0);
        let ret = frame.ret::<StringRaw>();
        unsafe { bridge.call(binding, instance(), &mut frame) };
        tmp.transfer_in(&bridge, frame.read(&ret))
    };
    assert_eq!(tmp.len(), 1);
    assert_eq!(name.to_string(&bridge).unwrap(), "llvmpipe (LLVM 17.0.6, 256 bits)");

    tmp.release();
    assert_eq!(mock::frees_of(VariantType::String).len(), 1);
    assert_eq!(mock::outstanding(), 0);
}

#[test]
fn test_borrowed_argument_stays_owned_by_the_caller() {
    let (engine, bridge) = setup();
    engine.define("Label", "set_text", 8, |_, args, _| unsafe {
        assert_eq!(mock::read_text(args[0]), "score: 10");
    });

    let binding = bridge.resolve("Label", "set_text", 8);
    let tmp = bridge.lifetime();
    let text = tmp.new_string(&bridge, "score: 10");
    let mut frame = CallFrame::new(1);
    frame.arg(&text);
    unsafe { bridge.call(binding, instance(), &mut frame) };

    assert_eq!(tmp.len(), 1);
    assert!(text.is_live());
    drop(tmp);
    assert_eq!(mock::outstanding(), 0);
}

//! The sample `RenderingServer` wrappers driven through the process-wide
//! engine.
//!
//! All tests in this binary share one engine. Recorded calls go to a
//! thread-local log, which keeps parallel tests apart: a mock method runs on
//! the thread that called it.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use gdbind::classes::RenderingServer;
use gdbind::engine;
use gdbind::sys::{ObjectPtr, VariantType};
use gdbind::value::{Color, Rect2, Rid, Transform2D, Transform3D, VariantRaw, Vector2, Vector3};
use gdbind::{Arena, BindingConfig};
use gdbind_core::mock::{self, MockEngine};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SetTransform(Rid, Transform2D),
    AddRect(Rid, Rect2, Color, bool),
    AddLine(Rid, f64, bool),
    AddPolyline(Rid, Vec<Vector2>, Vec<Color>),
    InstanceTransform(Rid, Vector3),
    ShaderParameter(Rid, String, VariantType, u64),
    Free(Rid),
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
}

fn record(call: Call) {
    CALLS.with(|calls| calls.borrow_mut().push(call));
}

fn recorded() -> Vec<Call> {
    CALLS.with(|calls| calls.borrow().clone())
}

fn server_object() -> ObjectPtr {
    ObjectPtr(0x1000 as *mut std::ffi::c_void)
}

const TEST_TEXTURE: Rid = Rid(0xFEED);

fn define_rendering_server(mock: &MockEngine) {
    static NEXT_RID: AtomicU64 = AtomicU64::new(1);
    const CLASS: &str = "RenderingServer";

    mock.define(CLASS, "canvas_item_create", 529393457, |this, _, ret| unsafe {
        assert_eq!(this, server_object());
        mock::ret(ret, Rid(NEXT_RID.fetch_add(1, Ordering::SeqCst)));
    });
    mock.define(CLASS, "canvas_item_set_transform", 1246044741, |_, args, _| unsafe {
        record(Call::SetTransform(mock::arg(args, 0), mock::arg(args, 1)));
    });
    mock.define(CLASS, "canvas_item_add_rect", 3523446176, |_, args, _| unsafe {
        let antialiased: u8 = mock::arg(args, 3);
        record(Call::AddRect(mock::arg(args, 0), mock::arg(args, 1), mock::arg(args, 2), antialiased != 0));
    });
    mock.define(CLASS, "canvas_item_add_line", 1819681853, |_, args, _| unsafe {
        let antialiased: u8 = mock::arg(args, 5);
        record(Call::AddLine(mock::arg(args, 0), mock::arg(args, 4), antialiased != 0));
    });
    mock.define(CLASS, "canvas_item_add_polyline", 3098767073, |_, args, _| unsafe {
        record(Call::AddPolyline(
            mock::arg(args, 0),
            mock::read_packed(args[1]),
            mock::read_packed(args[2]),
        ));
    });
    mock.define(CLASS, "instance_set_transform", 3935195649, |_, args, _| unsafe {
        let transform: Transform3D = mock::arg(args, 1);
        record(Call::InstanceTransform(mock::arg(args, 0), transform.origin));
    });
    mock.define(CLASS, "instance_geometry_set_shader_parameter", 3477296213, |_, args, _| unsafe {
        let value: VariantRaw = mock::arg(args, 2);
        record(Call::ShaderParameter(
            mock::arg(args, 0),
            mock::read_text(args[1]),
            value.variant_type().unwrap(),
            value.0[1],
        ));
    });
    mock.define(CLASS, "instance_geometry_get_shader_parameter", 2621281810, |_, args, ret| unsafe {
        let instance: Rid = mock::arg(args, 0);
        let len = mock::read_text(args[1]).len() as u64;
        mock::ret(ret, VariantRaw([VariantType::Int as u64, instance.0 * 100 + len, 0]));
    });
    mock.define(CLASS, "get_test_texture", 529393457, |_, _, ret| unsafe {
        mock::ret(ret, TEST_TEXTURE);
    });
    mock.define(CLASS, "get_video_adapter_name", 201670096, |_, _, ret| unsafe {
        mock::ret(ret, mock::new_string("Mock Adapter 3000"));
    });
    mock.define(CLASS, "free_rid", 2722037293, |_, args, _| unsafe {
        record(Call::Free(mock::arg(args, 0)));
    });
}

fn mock_engine() -> &'static Arc<MockEngine> {
    static MOCK: OnceLock<Arc<MockEngine>> = OnceLock::new();
    MOCK.get_or_init(|| {
        let mock = Arc::new(MockEngine::new());
        mock.register_singleton("RenderingServer", server_object());
        define_rendering_server(&mock);
        engine::init(mock.clone(), BindingConfig::default()).unwrap();
        mock
    })
}

fn server() -> RenderingServer {
    mock_engine();
    RenderingServer::singleton()
}

// =============================================================================
// Singleton and resolution
// =============================================================================

#[test]
fn test_singleton_is_looked_up_once() {
    let first = server();
    let second = RenderingServer::singleton();
    assert_eq!(first.as_object(), second.as_object());
    assert_eq!(first.as_object().as_ptr(), server_object());
}

#[test]
fn test_wrappers_resolve_through_the_shared_bridge() {
    let rs = server();
    let item = rs.canvas_item_create();
    rs.free_rid(item);

    let bridge = engine::get().bridge();
    assert!(bridge.try_resolve("RenderingServer", "canvas_item_create", 529393457).is_ok());
    assert!(bridge.try_resolve("RenderingServer", "canvas_item_create", 1).is_err());
    assert_eq!(mock::outstanding(), 0);
}

// =============================================================================
// Canvas items
// =============================================================================

#[test]
fn test_canvas_item_lifecycle() {
    let rs = server();
    let item = rs.canvas_item_create();
    let other = rs.canvas_item_create();
    assert!(item.is_valid());
    assert_ne!(item, other);

    let moved = Transform2D {
        origin: Vector2::new(16.0, 8.0),
        ..Transform2D::IDENTITY
    };
    rs.canvas_item_set_transform(item, moved);
    let rect = Rect2::new(Vector2::ZERO, Vector2::new(32.0, 32.0));
    rs.canvas_item_add_rect(item, rect, Color::WHITE, None);
    rs.canvas_item_add_rect(item, rect, Color::BLACK, Some(true));
    rs.free_rid(other);
    rs.free_rid(item);

    assert_eq!(
        recorded(),
        vec![
            Call::SetTransform(item, moved),
            Call::AddRect(item, rect, Color::WHITE, false),
            Call::AddRect(item, rect, Color::BLACK, true),
            Call::Free(other),
            Call::Free(item),
        ]
    );
}

#[test]
fn test_omitted_arguments_get_engine_defaults() {
    let rs = server();
    let item = rs.canvas_item_create();
    rs.canvas_item_add_line(item, Vector2::ZERO, Vector2::new(1.0, 1.0), Color::WHITE, None, None);
    rs.canvas_item_add_line(item, Vector2::ZERO, Vector2::new(1.0, 1.0), Color::WHITE, Some(2.5), Some(true));

    assert_eq!(recorded(), vec![Call::AddLine(item, -1.0, false), Call::AddLine(item, 2.5, true)]);
}

#[test]
fn test_polyline_borrows_its_arrays() {
    let rs = server();
    let bridge = engine::get().bridge();
    let item = rs.canvas_item_create();
    {
        let tmp = bridge.lifetime();
        let points = [Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), Vector2::new(10.0, 10.0)];
        let colors = [Color::WHITE];
        let packed_points = tmp.new_packed(bridge, &points);
        let packed_colors = tmp.new_packed(bridge, &colors);
        rs.canvas_item_add_polyline(item, &packed_points, &packed_colors, None, None);

        assert_eq!(tmp.len(), 2);
        assert!(packed_points.is_live());
        assert_eq!(recorded(), vec![Call::AddPolyline(item, points.to_vec(), colors.to_vec())]);
    }
    assert_eq!(mock::outstanding(), 0);
}

// =============================================================================
// Instances and shader parameters
// =============================================================================

#[test]
fn test_instance_transform() {
    let rs = server();
    let instance = Rid(77);
    rs.instance_set_transform(instance, Transform3D::IDENTITY.translated(Vector3::new(0.0, 1.0, -5.0)));
    assert_eq!(recorded(), vec![Call::InstanceTransform(instance, Vector3::new(0.0, 1.0, -5.0))]);
}

#[test]
fn test_shader_parameters_round_trip_as_variants() {
    let rs = server();
    let bridge = engine::get().bridge();
    let instance = Rid(3);
    {
        let tmp = bridge.lifetime();
        let value = tmp.new_variant(bridge, &0.25f64);
        rs.instance_geometry_set_shader_parameter(instance, "albedo_mix", &value);

        let fetched = rs.instance_geometry_get_shader_parameter(&tmp, instance, "albedo_mix");
        assert_eq!(tmp.len(), 2);
        assert_eq!(fetched.get::<i64>(bridge).unwrap(), 310);
    }
    assert_eq!(
        recorded(),
        vec![Call::ShaderParameter(
            instance,
            "albedo_mix".to_string(),
            VariantType::Float,
            0.25f64.to_bits()
        )]
    );
    assert_eq!(mock::outstanding(), 0);
}

// =============================================================================
// Strings and engine-owned values
// =============================================================================

#[test]
fn test_video_adapter_name() {
    let rs = server();
    assert_eq!(rs.video_adapter_name().unwrap(), "Mock Adapter 3000");
    assert_eq!(mock::outstanding(), 0);

    let bridge = engine::get().bridge();
    let tmp = bridge.lifetime();
    let name = rs.get_video_adapter_name(&tmp);
    assert_eq!(tmp.len(), 1);
    assert_eq!(mock::outstanding(), 1);
    assert_eq!(name.to_string(bridge).unwrap(), "Mock Adapter 3000");
    tmp.release();
    assert_eq!(mock::outstanding(), 0);
}

#[test]
fn test_adapter_name_can_be_cached_statically() {
    let rs = server();
    let statics = engine::get().statics();
    let bridge = engine::get().bridge();

    let cached = {
        let tmp = bridge.lifetime();
        rs.get_video_adapter_name(&tmp).promote(statics).unwrap()
    };
    assert_eq!(cached.lifetime(), Some(statics.id()));
    assert_eq!(cached.to_string(bridge).unwrap(), "Mock Adapter 3000");
    statics.free(cached);
    assert_eq!(mock::outstanding(), 0);
}

#[test]
fn test_test_texture_is_never_released() {
    let rs = server();
    assert_eq!(rs.get_test_texture(), TEST_TEXTURE);
    assert_eq!(rs.get_test_texture(), TEST_TEXTURE);
    assert!(recorded().is_empty());
    assert_eq!(mock::outstanding(), 0);
}

// =============================================================================
// Render thread
// =============================================================================

#[test]
fn test_work_runs_on_the_render_thread() {
    let rs = server();
    let ran = Arc::new(AtomicUsize::new(0));
    let render_thread = Arc::new(OnceLock::new());

    let posters: Vec<_> = (0..3)
        .map(|_| {
            let ran = ran.clone();
            let render_thread = render_thread.clone();
            std::thread::spawn(move || {
                rs.call_on_render_thread(move || {
                    render_thread.get_or_init(|| std::thread::current().id());
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            })
        })
        .collect();
    for poster in posters {
        poster.join().unwrap();
    }
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    let drained = std::thread::spawn(|| (engine::get().drain_render_queue(), std::thread::current().id()));
    let (count, drain_thread) = drained.join().unwrap();
    assert_eq!(count, 3);
    assert_eq!(ran.load(Ordering::SeqCst), 3);
    assert_eq!(render_thread.get(), Some(&drain_thread));
}

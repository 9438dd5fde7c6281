//! Engine lifecycle and value encoding checks through the public facade.
//!
//! The process-wide engine can be installed once per test binary, so the
//! whole lifecycle lives in a single test.

use std::sync::Arc;

use gdbind::engine;
use gdbind::sys::{GetProcAddressFn, VariantType, variant_size};
use gdbind::value::{Aabb, Basis, Color, Marshal, Projection, Quaternion, Rid, StringRaw, Transform3D, VariantRaw, Vector3};
use gdbind::{Arena, BindingConfig, BindingError, BindingProperty, RawValue};
use gdbind_core::mock::{self, MockEngine};

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_int_round_trip() {
    let mut buf = [0u8; 8];
    RawValue::Int(42).encode(&mut buf);
    assert_eq!(RawValue::decode(VariantType::Int, &buf), Ok(RawValue::Int(42)));
    assert_eq!(i64::decode(&buf), 42);
}

#[test]
fn test_extreme_values_round_trip() {
    for value in [i64::MIN, -1, 0, i64::MAX] {
        let mut buf = [0u8; 8];
        value.encode(&mut buf);
        assert_eq!(i64::decode(&buf), value);
    }
    for value in [f64::MIN_POSITIVE, -0.0, f64::MAX, f64::INFINITY] {
        let mut buf = [0u8; 8];
        value.encode(&mut buf);
        assert_eq!(f64::decode(&buf).to_bits(), value.to_bits());
    }
}

#[test]
fn test_sizes_match_the_engine() {
    assert_eq!(<bool as Marshal>::SIZE, variant_size(VariantType::Bool));
    assert_eq!(Transform3D::SIZE, 48);
    assert_eq!(Basis::SIZE, 36);
    assert_eq!(Projection::SIZE, 64);
    assert_eq!(Aabb::SIZE, variant_size(VariantType::Aabb));
    assert_eq!(Quaternion::SIZE, variant_size(VariantType::Quaternion));
    assert_eq!(StringRaw::SIZE, variant_size(VariantType::String));
    assert_eq!(VariantRaw::SIZE, 24);
}

#[test]
fn test_decode_rejects_short_input() {
    assert_eq!(
        RawValue::decode(VariantType::Color, &[0u8; 8]),
        Err(BindingError::SizeMismatch {
            ty: VariantType::Color,
            expected: 16,
            actual: 8,
        })
    );
}

#[test]
fn test_defaults_match_engine_defaults() {
    assert_eq!(Rid::default(), Rid::INVALID);
    assert!(!Rid::INVALID.is_valid());
    assert_eq!(Transform3D::default(), Transform3D::IDENTITY);
    assert_eq!(Color::default(), Color::BLACK);
    assert_eq!(Transform3D::IDENTITY.origin, Vector3::ZERO);
}

// =============================================================================
// Engine lifecycle
// =============================================================================

unsafe extern "C" fn no_procs(_name: *const std::ffi::c_char) -> Option<gdbind::sys::InterfaceFn> {
    None
}

#[test]
fn test_engine_lifecycle() {
    assert!(engine::try_get().is_none());
    assert_eq!(engine::deinitialize().err(), Some(BindingError::NotInitialized));

    let loader: GetProcAddressFn = no_procs;
    let err = unsafe { engine::initialize_from_proc_address(loader, BindingConfig::default()) }.err();
    assert!(matches!(err, Some(BindingError::MissingProc(_))));
    assert!(engine::try_get().is_none());

    // A failed init leaves neither an engine nor a logger behind.
    let broken = Arc::new(MockEngine::new().without_destructor(VariantType::String));
    let forwarding = BindingConfig::default().with(BindingProperty::ForwardLogsToEngine, 1);
    let err = engine::init(broken, forwarding).err();
    assert_eq!(err, Some(BindingError::MissingDestructor { ty: VariantType::String }));
    assert!(engine::try_get().is_none());

    let mock = Arc::new(MockEngine::new());
    let config = BindingConfig::default()
        .with(BindingProperty::ForwardLogsToEngine, 0)
        .with(BindingProperty::RenderQueueCapacity, 1);
    let engine = engine::init(mock.clone(), config.clone()).unwrap();
    assert!(std::ptr::eq(engine, engine::get()));
    assert_eq!(engine::init(mock.clone(), config).err(), Some(BindingError::AlreadyInitialized));

    // Values shared with later calls live in the static scope.
    let bridge = engine.bridge();
    let tmp = bridge.lifetime();
    let kept = tmp.new_string(bridge, "kept").promote(engine.statics()).unwrap();
    drop(tmp);
    assert_eq!(kept.to_string(bridge).unwrap(), "kept");
    assert_eq!(mock::outstanding(), 1);

    engine.call_on_render_thread(|| {}).unwrap();
    assert_eq!(engine.call_on_render_thread(|| {}), Err(BindingError::RenderQueueFull));
    assert_eq!(engine.drain_render_queue(), 1);

    engine::deinitialize().unwrap();
    assert!(engine.is_shut_down());
    assert!(engine.statics().is_released());
    assert_eq!(mock::outstanding(), 0);
    assert_eq!(engine.call_on_render_thread(|| {}), Err(BindingError::RenderQueueClosed));

    engine::deinitialize().unwrap();
    assert_eq!(mock::frees_of(VariantType::String).len(), 1);

    // Neither init above installed a logger: the first one failed and the
    // second did not forward logs.
    assert!(gdbind_core::install_logger(mock, &BindingConfig::default()));
}

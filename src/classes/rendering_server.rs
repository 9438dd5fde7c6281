//! Hand-written sample of the generated `RenderingServer` wrappers.
//!
//! Each method resolves its bind once through a `static` [`LazyMethod`],
//! packs its arguments into a [`CallFrame`] in declaration order and reads
//! the return slot before the frame is dropped. Omitted trailing parameters
//! get the engine's own defaults.

use std::sync::OnceLock;

use gdbind_core::lifetime::Arena;
use gdbind_core::value::{Color, PackedColorArrayRaw, PackedVector2ArrayRaw, Rect2, Rid, StringRaw, Transform2D, Transform3D, VariantRaw, Vector2};
use gdbind_core::{BindingResult, CallFrame, Handle, LazyMethod, ObjectRef, fatal};

use crate::engine;

const CLASS: &str = "RenderingServer";

static SINGLETON: OnceLock<ObjectRef> = OnceLock::new();

static CANVAS_ITEM_CREATE: LazyMethod = LazyMethod::new(CLASS, "canvas_item_create", 529393457);
static CANVAS_ITEM_SET_TRANSFORM: LazyMethod = LazyMethod::new(CLASS, "canvas_item_set_transform", 1246044741);
static CANVAS_ITEM_ADD_RECT: LazyMethod = LazyMethod::new(CLASS, "canvas_item_add_rect", 3523446176);
static CANVAS_ITEM_ADD_LINE: LazyMethod = LazyMethod::new(CLASS, "canvas_item_add_line", 1819681853);
static CANVAS_ITEM_ADD_POLYLINE: LazyMethod = LazyMethod::new(CLASS, "canvas_item_add_polyline", 3098767073);
static INSTANCE_SET_TRANSFORM: LazyMethod = LazyMethod::new(CLASS, "instance_set_transform", 3935195649);
static INSTANCE_GEOMETRY_SET_SHADER_PARAMETER: LazyMethod =
    LazyMethod::new(CLASS, "instance_geometry_set_shader_parameter", 3477296213);
static INSTANCE_GEOMETRY_GET_SHADER_PARAMETER: LazyMethod =
    LazyMethod::new(CLASS, "instance_geometry_get_shader_parameter", 2621281810);
static GET_TEST_TEXTURE: LazyMethod = LazyMethod::new(CLASS, "get_test_texture", 529393457);
static GET_VIDEO_ADAPTER_NAME: LazyMethod = LazyMethod::new(CLASS, "get_video_adapter_name", 201670096);
static FREE_RID: LazyMethod = LazyMethod::new(CLASS, "free_rid", 2722037293);

/// The engine's rendering server singleton.
#[derive(Debug, Clone, Copy)]
pub struct RenderingServer(ObjectRef);

impl RenderingServer {
    /// Looked up on first use and cached for the life of the process.
    pub fn singleton() -> Self {
        let object = SINGLETON.get_or_init(|| {
            ObjectRef::singleton(engine::get().bridge(), CLASS).unwrap_or_else(|err| fatal(err))
        });
        Self(*object)
    }

    pub fn as_object(&self) -> ObjectRef {
        self.0
    }

    pub fn canvas_item_create(&self) -> Rid {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(0);
        let ret = frame.ret::<Rid>();
        unsafe { bridge.call(CANVAS_ITEM_CREATE.get(bridge), self.0.as_ptr(), &mut frame) };
        frame.read(&ret)
    }

    pub fn canvas_item_set_transform(&self, item: Rid, transform: Transform2D) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(2);
        frame.arg(&item).arg(&transform);
        unsafe { bridge.call(CANVAS_ITEM_SET_TRANSFORM.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    /// `antialiased` defaults to `false`.
    pub fn canvas_item_add_rect(&self, item: Rid, rect: Rect2, color: Color, antialiased: Option<bool>) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(4);
        frame
            .arg(&item)
            .arg(&rect)
            .arg(&color)
            .arg(&antialiased.unwrap_or(false));
        unsafe { bridge.call(CANVAS_ITEM_ADD_RECT.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    /// `width` defaults to `-1.0` (a thin line) and `antialiased` to `false`.
    pub fn canvas_item_add_line(
        &self,
        item: Rid,
        from: Vector2,
        to: Vector2,
        color: Color,
        width: Option<f64>,
        antialiased: Option<bool>,
    ) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(6);
        frame
            .arg(&item)
            .arg(&from)
            .arg(&to)
            .arg(&color)
            .arg(&width.unwrap_or(-1.0))
            .arg(&antialiased.unwrap_or(false));
        unsafe { bridge.call(CANVAS_ITEM_ADD_LINE.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    /// The callee borrows both arrays.
    pub fn canvas_item_add_polyline(
        &self,
        item: Rid,
        points: &Handle<'_, PackedVector2ArrayRaw>,
        colors: &Handle<'_, PackedColorArrayRaw>,
        width: Option<f64>,
        antialiased: Option<bool>,
    ) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(5);
        frame
            .arg(&item)
            .arg(points)
            .arg(colors)
            .arg(&width.unwrap_or(-1.0))
            .arg(&antialiased.unwrap_or(false));
        unsafe { bridge.call(CANVAS_ITEM_ADD_POLYLINE.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    pub fn instance_set_transform(&self, instance: Rid, transform: Transform3D) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(2);
        frame.arg(&instance).arg(&transform);
        unsafe { bridge.call(INSTANCE_SET_TRANSFORM.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    pub fn instance_geometry_set_shader_parameter(&self, instance: Rid, parameter: &str, value: &Handle<'_, VariantRaw>) {
        let bridge = engine::get().bridge();
        let tmp = bridge.lifetime();
        let parameter = tmp.new_string_name(bridge, parameter);
        let mut frame = CallFrame::new(3);
        frame.arg(&instance).arg(&parameter).arg(value);
        unsafe { bridge.call(INSTANCE_GEOMETRY_SET_SHADER_PARAMETER.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    /// The returned value is owned by `lifetime`.
    pub fn instance_geometry_get_shader_parameter<'l, A: Arena>(
        &self,
        lifetime: &'l A,
        instance: Rid,
        parameter: &str,
    ) -> Handle<'l, VariantRaw> {
        let bridge = engine::get().bridge();
        let tmp = bridge.lifetime();
        let parameter = tmp.new_string_name(bridge, parameter);
        let mut frame = CallFrame::new(2);
        frame.arg(&instance).arg(&parameter);
        let ret = frame.ret::<VariantRaw>();
        unsafe { bridge.call(INSTANCE_GEOMETRY_GET_SHADER_PARAMETER.get(bridge), self.0.as_ptr(), &mut frame) };
        lifetime.transfer_in(bridge, frame.read(&ret))
    }

    /// The engine's built-in test texture. The engine keeps ownership; the
    /// same RID comes back on every call and must not be freed.
    pub fn get_test_texture(&self) -> Rid {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(0);
        let ret = frame.ret::<Rid>();
        unsafe { bridge.call(GET_TEST_TEXTURE.get(bridge), self.0.as_ptr(), &mut frame) };
        frame.read(&ret)
    }

    /// The returned string is owned by `lifetime`.
    pub fn get_video_adapter_name<'l, A: Arena>(&self, lifetime: &'l A) -> Handle<'l, StringRaw> {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(0);
        let ret = frame.ret::<StringRaw>();
        unsafe { bridge.call(GET_VIDEO_ADAPTER_NAME.get(bridge), self.0.as_ptr(), &mut frame) };
        lifetime.transfer_in(bridge, frame.read(&ret))
    }

    /// [`RenderingServer::get_video_adapter_name`] copied into a host string.
    pub fn video_adapter_name(&self) -> BindingResult<String> {
        let bridge = engine::get().bridge();
        let tmp = bridge.lifetime();
        self.get_video_adapter_name(&tmp).to_string(bridge)
    }

    /// Frees any RID this server created. RIDs are never released by a
    /// lifetime.
    pub fn free_rid(&self, rid: Rid) {
        let bridge = engine::get().bridge();
        let mut frame = CallFrame::new(1);
        frame.arg(&rid);
        unsafe { bridge.call(FREE_RID.get(bridge), self.0.as_ptr(), &mut frame) };
    }

    /// Runs `task` on the render thread the next time it drains its queue.
    pub fn call_on_render_thread<F>(&self, task: F) -> BindingResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        engine::get().call_on_render_thread(task)
    }
}

//! The native invocation bridge.
//!
//! [`Bridge`] owns the engine interface and everything resolved from it:
//! method binds, per-type destructors, constructors and builtin methods.
//! [`Bridge::invoke`] is the one place a native method is actually called.

mod method;

use std::sync::Arc;

use gdbind_sys::*;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::api::NativeApi;
use crate::config::BindingConfig;
use crate::error::{BindingError, BindingResult, fatal};
use crate::frame::CallFrame;
use crate::lifetime::{Arena, Lifetime};

pub use method::{LazyMethod, MethodBinding, MethodFlags, MethodKey};

use method::MethodCache;

type BuiltinKey = (VariantType, &'static str, i64);

/// Resolved view of the engine interface.
///
/// Thread-agnostic: every cache is internally synchronized and no scratch
/// state is shared between concurrent calls.
pub struct Bridge {
    api: Arc<dyn NativeApi>,
    config: BindingConfig,
    destructors: [Option<DestructorFn>; VariantType::COUNT as usize],
    methods: MethodCache,
    builtins: RwLock<FxHashMap<BuiltinKey, BuiltinMethodFn>>,
}

impl Bridge {
    /// Resolves the destructor of every reference type up front. Any gap
    /// means the engine does not match these bindings.
    pub fn new(api: Arc<dyn NativeApi>, config: BindingConfig) -> BindingResult<Self> {
        let mut destructors = [None; VariantType::COUNT as usize];
        for ty in VariantType::REFERENCE_TYPES {
            let destructor = api.destructor(ty).ok_or(BindingError::MissingDestructor { ty })?;
            destructors[ty as usize] = Some(destructor);
        }
        Ok(Self {
            api,
            config,
            destructors,
            methods: MethodCache::default(),
            builtins: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn api(&self) -> &dyn NativeApi {
        &*self.api
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// A fresh transient lifetime honoring this bridge's configuration.
    pub fn lifetime(&self) -> Lifetime {
        Lifetime::with_config(&self.config)
    }

    /// Release function for values of `ty`.
    pub fn destructor(&self, ty: VariantType) -> DestructorFn {
        self.destructors[ty as usize]
            .unwrap_or_else(|| fatal(BindingError::MissingDestructor { ty }))
    }

    pub fn constructor(&self, ty: VariantType, index: i32) -> ConstructorFn {
        self.api
            .constructor(ty, index)
            .unwrap_or_else(|| fatal(BindingError::MissingConstructor { ty, index }))
    }

    pub fn variant_from_type(&self, ty: VariantType) -> VariantFromTypeFn {
        self.api
            .variant_from_type(ty)
            .unwrap_or_else(|| fatal(BindingError::MissingVariantConversion { ty }))
    }

    pub fn variant_to_type(&self, ty: VariantType) -> VariantToTypeFn {
        self.api
            .variant_to_type(ty)
            .unwrap_or_else(|| fatal(BindingError::MissingVariantConversion { ty }))
    }

    /// Builtin method of a value type, looked up once per (type, name, hash).
    pub fn builtin_method(&self, ty: VariantType, name: &'static str, hash: i64) -> BuiltinMethodFn {
        let key = (ty, name, hash);
        if let Some(method) = self.builtins.read().get(&key) {
            return *method;
        }
        let tmp = self.lifetime();
        let name_raw = tmp.new_string_name(self, name).raw();
        // SAFETY: `name_raw` lives until `tmp` is dropped below.
        let method = unsafe { self.api.builtin_method(ty, ConstTypePtr(std::ptr::from_ref(&name_raw).cast()), hash) }
            .unwrap_or_else(|| fatal(BindingError::MissingBuiltinMethod { ty, method: name }));
        self.builtins.write().insert(key, method);
        method
    }

    /// Looks up a method bind, caching the outcome for the process.
    ///
    /// Failures are cached as well; the engine is asked at most once per key.
    /// Every call takes the cache's read lock. Call sites that run repeatedly
    /// hold a [`LazyMethod`] instead, whose reads after the first take no lock.
    pub fn try_resolve(&self, class: &str, method: &str, hash: i64) -> BindingResult<MethodBinding> {
        let key = MethodKey::new(class, method, hash);
        let slot = self.methods.slot(key);
        let binding = slot.get_or_init(|| self.lookup(class, method, hash, key));
        binding.ok_or_else(|| BindingError::missing_method(class, method, hash))
    }

    /// Like [`Bridge::try_resolve`], but a missing method is fatal.
    pub fn resolve(&self, class: &str, method: &str, hash: i64) -> MethodBinding {
        self.try_resolve(class, method, hash).unwrap_or_else(|err| fatal(err))
    }

    /// Number of distinct methods resolved so far, successful or not.
    pub fn resolved_count(&self) -> usize {
        self.methods.len()
    }

    fn lookup(&self, class: &str, method: &str, hash: i64, key: MethodKey) -> Option<MethodBinding> {
        let tmp = self.lifetime();
        let class_name = tmp.new_string_name(self, class).raw();
        let method_name = tmp.new_string_name(self, method).raw();
        // SAFETY: both names stay attached to `tmp` for the whole call.
        let ptr = unsafe {
            self.api.get_method_bind(
                ConstTypePtr(std::ptr::from_ref(&class_name).cast()),
                ConstTypePtr(std::ptr::from_ref(&method_name).cast()),
                hash,
            )
        };
        if ptr.is_null() {
            log::error!("engine has no method bind for {class}::{method} (hash {hash})");
            return None;
        }
        log::trace!("resolved {class}::{method} -> {:p}", ptr.0);
        Some(MethodBinding {
            ptr,
            key,
            flags: MethodFlags::NORMAL,
        })
    }

    /// Calls a resolved method.
    ///
    /// # Safety
    ///
    /// `args` must hold `arg_count` pointers laid out exactly as the method's
    /// parameters, `ret` must point at storage of the return type (or be null
    /// for methods returning nothing), and `instance` must be a live object of
    /// the method's class, or null for static methods.
    #[cfg_attr(feature = "profiling", profiling::function)]
    #[inline]
    pub unsafe fn invoke(
        &self,
        binding: MethodBinding,
        instance: ObjectPtr,
        args: *const ConstTypePtr,
        arg_count: usize,
        ret: TypePtr,
    ) {
        debug_assert_eq!(
            binding.is_static(),
            instance.is_null(),
            "static methods take a null instance, others a live one"
        );
        unsafe { self.api.method_bind_ptrcall(binding.ptr, instance, args, arg_count, ret) }
    }

    /// Finishes `frame` and invokes `binding` with it.
    ///
    /// # Safety
    ///
    /// As for [`Bridge::invoke`]: the frame's arguments and return slot must
    /// match the method's signature.
    #[inline]
    pub unsafe fn call(&self, binding: MethodBinding, instance: ObjectPtr, frame: &mut CallFrame) {
        let finished = frame.finish();
        unsafe { self.invoke(binding, instance, finished.args, finished.arg_count, finished.ret) }
    }
}

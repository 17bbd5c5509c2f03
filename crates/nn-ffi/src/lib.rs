mod types;
mod error;
mod context;

pub use types::*;
pub use error::*;
pub use context::*;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

use nn_runtime::{
    ContextHandle, ExecutionTarget, GraphEncoding, GraphHandle, NnError, RuntimeConfig, Tensor,
    TensorType, TensorView,
};

/// Execute a closure that returns an `NNStatus`, catching any panics
/// and converting them into `NNStatus::ErrorInternal`.
///
/// Runtime locks do not poison and every call commits in one step, so a
/// caught panic leaves the runtime usable.
fn catch_panic<F: FnOnce() -> NNStatus>(f: F) -> NNStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            tracing::error!("panic caught at the C boundary");
            set_last_error("internal panic".to_string());
            NNStatus::ErrorInternal
        }
    }
}

fn invalid_argument(msg: &str) -> NNStatus {
    set_last_error(msg.to_string());
    NNStatus::ErrorInvalidArgument
}

/// Borrow `len` elements at `ptr`. A zero length never dereferences, so
/// null is accepted there.
unsafe fn raw_slice<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        return Some(&[]);
    }
    if ptr.is_null() {
        return None;
    }
    Some(std::slice::from_raw_parts(ptr, len))
}

fn into_owned(tensor: Tensor) -> Result<NNOwnedTensor, NnError> {
    let dims = tensor
        .dims()
        .iter()
        .map(|&d| u32::try_from(d))
        .collect::<Result<Box<[u32]>, _>>()
        .map_err(|_| NnError::InvalidArgument(format!("output dims {} exceed u32", tensor.shape())))?;
    let rank = dims.len() as u32;
    let ty = tensor.ty().to_id();
    let data = tensor.into_data().into_boxed_slice();
    let data_len = data.len();
    Ok(NNOwnedTensor {
        dims: Box::into_raw(dims) as *mut u32,
        rank,
        ty,
        data: Box::into_raw(data) as *mut u8,
        data_len,
    })
}

/// Create a new runtime with the reference backend registered.
///
/// `config` may be null for defaults. On success, writes a heap-allocated
/// `NNRuntime` pointer into `*rt_out`. The caller must later call
/// `nn_runtime_destroy` to free it.
#[no_mangle]
pub unsafe extern "C" fn nn_runtime_create(
    config: *const NNRuntimeConfig,
    rt_out: *mut *mut NNRuntime,
) -> NNStatus {
    catch_panic(|| {
        if rt_out.is_null() {
            return invalid_argument("rt_out is null");
        }
        let config = if config.is_null() {
            RuntimeConfig::default()
        } else {
            RuntimeConfig::from(unsafe { &*config })
        };
        tracing::debug!(?config, "creating runtime");
        let rt = Box::new(NNRuntime::new(config));
        unsafe {
            *rt_out = Box::into_raw(rt);
        }
        NNStatus::Ok
    })
}

/// Destroy a runtime, releasing every graph and context it owns.
///
/// Passing a null pointer is a no-op and returns `NNStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn nn_runtime_destroy(rt: *mut NNRuntime) -> NNStatus {
    if rt.is_null() {
        return NNStatus::Ok;
    }
    catch_panic(|| {
        drop(unsafe { Box::from_raw(rt) });
        NNStatus::Ok
    })
}

/// Load an encoded graph and write its handle into `*graph_out`.
///
/// `encoding`: 0 = unknown, 1 = reference, other ids = registered custom
/// backends. `target`: 0 = cpu, 1 = gpu, 2 = tpu.
#[no_mangle]
pub unsafe extern "C" fn nn_load(
    rt: *const NNRuntime,
    bytes: *const u8,
    len: usize,
    encoding: u32,
    target: u32,
    graph_out: *mut u64,
) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() || graph_out.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        let Some(bytes) = (unsafe { raw_slice(bytes, len) }) else {
            return invalid_argument("bytes is null");
        };
        let Some(target) = ExecutionTarget::from_id(target) else {
            return invalid_argument(&format!("unknown execution target id {}", target));
        };
        match rt.runtime.load(bytes, GraphEncoding::from_id(encoding), target) {
            Ok(graph) => {
                unsafe { *graph_out = graph.to_bits() };
                NNStatus::Ok
            }
            Err(e) => report(e),
        }
    })
}

/// Release a graph handle.
#[no_mangle]
pub unsafe extern "C" fn nn_graph_release(rt: *const NNRuntime, graph: u64) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        match rt.runtime.release_graph(GraphHandle::from_bits(graph)) {
            Ok(()) => NNStatus::Ok,
            Err(e) => report(e),
        }
    })
}

/// Create an execution context for `graph` and write its handle into
/// `*ctx_out`.
#[no_mangle]
pub unsafe extern "C" fn nn_init_execution_context(
    rt: *const NNRuntime,
    graph: u64,
    ctx_out: *mut u64,
) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() || ctx_out.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        match rt.runtime.init_execution_context(GraphHandle::from_bits(graph)) {
            Ok(ctx) => {
                unsafe { *ctx_out = ctx.to_bits() };
                NNStatus::Ok
            }
            Err(e) => report(e),
        }
    })
}

/// Release an execution context handle.
#[no_mangle]
pub unsafe extern "C" fn nn_context_release(rt: *const NNRuntime, ctx: u64) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        match rt.runtime.release_context(ContextHandle::from_bits(ctx)) {
            Ok(()) => NNStatus::Ok,
            Err(e) => report(e),
        }
    })
}

/// Bind a copy of `*tensor` as input `index`. The tensor's memory is not
/// referenced after the call returns.
#[no_mangle]
pub unsafe extern "C" fn nn_set_input(
    rt: *const NNRuntime,
    ctx: u64,
    index: u32,
    tensor: *const NNTensor,
) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() || tensor.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        let tensor = unsafe { &*tensor };

        let Some(raw_dims) = (unsafe { raw_slice(tensor.dims, tensor.rank as usize) }) else {
            return invalid_argument("tensor dims is null");
        };
        let Some(data) = (unsafe { raw_slice(tensor.data, tensor.data_len) }) else {
            return invalid_argument("tensor data is null");
        };
        let Some(ty) = TensorType::from_id(tensor.ty) else {
            return report(nn_tensor::TensorError::UnknownType(tensor.ty).into());
        };
        let dims: Vec<usize> = raw_dims.iter().map(|&d| d as usize).collect();

        let view = TensorView::new(&dims, ty, data);
        match rt.runtime.set_input(ContextHandle::from_bits(ctx), index, &view) {
            Ok(()) => NNStatus::Ok,
            Err(e) => report(e),
        }
    })
}

/// Run inference, blocking until it completes.
#[no_mangle]
pub unsafe extern "C" fn nn_compute(rt: *const NNRuntime, ctx: u64) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        match rt.runtime.compute(ContextHandle::from_bits(ctx)) {
            Ok(()) => NNStatus::Ok,
            Err(e) => report(e),
        }
    })
}

/// Copy output `index` into `*out`. The caller must free it with
/// `nn_tensor_free`.
#[no_mangle]
pub unsafe extern "C" fn nn_get_output(
    rt: *const NNRuntime,
    ctx: u64,
    index: u32,
    out: *mut NNOwnedTensor,
) -> NNStatus {
    catch_panic(|| {
        if rt.is_null() || out.is_null() {
            return invalid_argument("null argument");
        }
        let rt = unsafe { &*rt };
        let owned = rt
            .runtime
            .get_output(ContextHandle::from_bits(ctx), index)
            .and_then(into_owned);
        match owned {
            Ok(t) => {
                unsafe { *out = t };
                NNStatus::Ok
            }
            Err(e) => report(e),
        }
    })
}

/// Free the buffers of a tensor filled by `nn_get_output` and reset it.
///
/// Passing null, or a tensor that was already freed, is a no-op.
#[no_mangle]
pub unsafe extern "C" fn nn_tensor_free(tensor: *mut NNOwnedTensor) {
    if tensor.is_null() {
        return;
    }
    let t = &mut *tensor;
    if !t.dims.is_null() {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
            t.dims,
            t.rank as usize,
        )));
    }
    if !t.data.is_null() {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
            t.data,
            t.data_len,
        )));
    }
    *t = NNOwnedTensor::empty();
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `nn_free_string`.
#[no_mangle]
pub extern "C" fn nn_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `nn_last_error`.
#[no_mangle]
pub unsafe extern "C" fn nn_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

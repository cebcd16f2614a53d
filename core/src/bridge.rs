//! Blocking entry points over the async client.
//!
//! # Design
//! Blocking calls never drive the future on the caller's thread. The future is
//! spawned onto a small process-wide runtime and the caller only waits for the
//! task handle, so a blocking call made from inside another runtime (or from a
//! thread that already owns one) cannot deadlock on its own executor.
//!
//! Work spawned here runs inside the `ON_BRIDGE` task-local scope. Transports
//! check it to keep pooled connections owned by the bridge runtime apart from
//! connections owned by a caller's runtime, which may be frozen while it
//! waits. When the caller sits on a multi-thread runtime (including a bridge
//! worker making a nested blocking call), the wait happens in
//! `block_in_place` so that runtime keeps scheduling its other tasks.

use std::future::Future;

use once_cell::sync::OnceCell;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use crate::error::PartnerError;

static BRIDGE_RUNTIME: OnceCell<Runtime> = OnceCell::new();

tokio::task_local! {
    static ON_BRIDGE: ();
}

/// Whether the current task was spawned by `synchronous_execute`.
pub(crate) fn on_bridge() -> bool {
    ON_BRIDGE.try_with(|_| ()).is_ok()
}

fn bridge_runtime() -> Result<&'static Runtime, PartnerError> {
    BRIDGE_RUNTIME
        .get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("partner-sync-bridge")
                .enable_all()
                .build()
        })
        .map_err(PartnerError::Runtime)
}

/// Run `operation` to completion and block the calling thread for its result.
///
/// Errors are returned exactly as the operation produced them. A panic inside
/// the operation is resumed on the calling thread.
pub fn synchronous_execute<T, Fut>(operation: Fut) -> Result<T, PartnerError>
where
    Fut: Future<Output = Result<T, PartnerError>> + Send + 'static,
    T: Send + 'static,
{
    let runtime = bridge_runtime()?;
    let task = runtime.spawn(ON_BRIDGE.scope((), operation));
    let joined = match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| futures::executor::block_on(task))
        }
        _ => futures::executor::block_on(task),
    };
    match joined {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            std::panic::resume_unwind(join_error.into_panic())
        }
        Err(_) => Err(PartnerError::Cancelled),
    }
}

// Runtime bootstrap - Current-thread runtime with a bounded shutdown
use std::future::Future;
use std::time::Duration;

/// Drive `future` to completion, then shut the runtime down waiting at most
/// `grace` for leftover blocking work such as a pending stdin read.
pub fn block_on_with_grace<F>(future: F, grace: Duration) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    result
}

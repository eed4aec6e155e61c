pub mod change;
pub mod serve;
pub mod status;
pub mod submit;
pub mod sync;
pub mod task;

/// Run one future to completion on a fresh runtime.
pub fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(future))
}

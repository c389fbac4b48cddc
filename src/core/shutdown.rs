//! OS signal handling for the fleet runtime.
//!
//! Provides a single async helper [`wait_for_shutdown_signal`] that
//! completes when the supervising process itself receives a termination
//! signal. The signals sent *to nodes* go the other way (see
//! [`NodeSupervisor::shutdown`](crate::NodeSupervisor::shutdown)); this is
//! only about the supervisor's own lifetime.
//!
//! Handled signals:
//! - **SIGINT** (Ctrl-C in terminal)
//! - **SIGTERM** (default kill signal, used by systemd/Kubernetes)
//! - **SIGQUIT** (hard-stop variant)
//!
//! Additionally, [`tokio::signal::ctrl_c`] is awaited as a fallback.

pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

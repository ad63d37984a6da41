use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Install a shutdown handler that listens for SIGTERM and SIGINT.
///
/// Returns a `CancellationToken` that is cancelled on the first signal.
/// Further signals are logged and otherwise ignored, so the fleet is drained
/// exactly once no matter how often the operator presses Ctrl-C.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                received = sigterm.recv() => match received {
                    Some(()) => "SIGTERM",
                    None => break,
                },
                received = sigint.recv() => match received {
                    Some(()) => "SIGINT",
                    None => break,
                },
            };

            if token_clone.is_cancelled() {
                tracing::warn!(signal = name, "Shutdown already in progress, ignoring signal");
            } else {
                tracing::info!(signal = name, "Received signal, initiating graceful shutdown");
                token_clone.cancel();
            }
        }
    });

    Ok(token)
}

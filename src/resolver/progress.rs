use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::maven::coordinates::Status;
use crate::resolver::context::ResolutionContext;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Periodic status line while a resolution is running. The ticker stops when `stop()` is called or
///  when this is dropped, whichever happens first.
pub struct Progress {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}
impl Progress {
    pub fn start(context: Arc<ResolutionContext>, interval: Duration) -> Progress {
        let token = CancellationToken::new();
        let handle = if context.config().quiet {
            None
        }
        else {
            Some(tokio::spawn(tick(context, interval, token.clone())))
        };

        Progress {
            token,
            handle,
        }
    }

    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn tick(context: Arc<ResolutionContext>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let line = status_line(&context);
                info!("{}", line);
            }
        }
    }
}

/// e.g. "12 artifacts: 3 resolving, 2 downloading, 7 done - 1.2 MB downloaded (4s)"
pub fn status_line(context: &ResolutionContext) -> String {
    let artifacts = context.artifacts();
    let mut resolving = 0;
    let mut downloading = 0;
    let mut downloaded = 0;

    for artifact in &artifacts {
        let state = artifact.state();
        match state.status {
            Status::Undefined | Status::Resolving | Status::Resolved => resolving += 1,
            Status::Downloading => downloading += 1,
            _ => {}
        }
        downloaded += state.downloaded;
    }

    format!(
        "{} artifacts: {} resolving, {} downloading, {} done - {} downloaded ({}s)",
        artifacts.len(),
        resolving,
        downloading,
        artifacts.len() - resolving - downloading,
        crate::resolver::report::format_size(downloaded),
        context.elapsed().as_secs(),
    )
}

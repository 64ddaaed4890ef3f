use crate::error::ViewerError;
use crate::events::{LoadOutcome, LoadRequest};
use crate::media::{self, LoadedMedia, MediaFetcher, MediaSource};
use crate::session::LoadTicket;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Loads one source at a time:
/// - Each request gets its own child cancellation token.
/// - A newer request cancels the token of the one still in flight, so at most
///   one load does real work; anything that still slips through is dropped by
///   the session's ticket check.
/// - At most one finished outcome waits for the viewer. It is handed over once
///   the viewer has room; a newer request discards it. Requests keep being
///   received while it waits.
pub async fn run(
    mut load_rx: Receiver<LoadRequest>,
    to_viewer: Sender<LoadOutcome>,
    fetcher: Arc<dyn MediaFetcher>,
    cancel: CancellationToken,
    load_timeout: Option<Duration>,
) -> Result<()> {
    let mut tasks: JoinSet<Option<LoadOutcome>> = JoinSet::new();
    let mut in_flight: Option<(LoadTicket, CancellationToken)> = None;
    let mut ready: Option<LoadOutcome> = None;
    let mut requests_open = true;

    loop {
        if !requests_open && tasks.is_empty() && ready.is_none() {
            break;
        }
        select! {
            _ = cancel.cancelled() => break,

            maybe_req = load_rx.recv(), if requests_open => {
                let Some(LoadRequest { ticket, source }) = maybe_req else {
                    requests_open = false;
                    continue;
                };
                if let Some((prev, token)) = in_flight.take() {
                    debug!(superseded = prev.generation(), by = ticket.generation(), "cancelling load");
                    token.cancel();
                }
                if let Some(stale) = ready.take() {
                    debug!(generation = stale.ticket.generation(), "discarding undelivered outcome");
                }
                let token = cancel.child_token();
                in_flight = Some((ticket, token.clone()));
                let fetcher = Arc::clone(&fetcher);
                tasks.spawn(async move {
                    select! {
                        _ = token.cancelled() => None,
                        result = load_with_timeout(&source, fetcher.as_ref(), load_timeout) => {
                            Some(LoadOutcome { ticket, result })
                        }
                    }
                });
            }

            Some(joined) = tasks.join_next() => {
                match joined {
                    Ok(Some(outcome)) => {
                        if in_flight.as_ref().is_some_and(|(t, _)| *t == outcome.ticket) {
                            in_flight = None;
                            log_outcome(&outcome);
                            ready = Some(outcome);
                        } else {
                            debug!(generation = outcome.ticket.generation(), "dropping superseded outcome");
                        }
                    }
                    Ok(None) => debug!("load cancelled before completion"),
                    Err(err) => warn!("load task failed: {err}"),
                }
            }

            permit = to_viewer.reserve(), if ready.is_some() => {
                let Ok(permit) = permit else {
                    warn!("viewer channel closed");
                    break;
                };
                if let Some(outcome) = ready.take() {
                    permit.send(outcome);
                }
            }
        }
    }
    tasks.shutdown().await;
    Ok(())
}

async fn load_with_timeout(
    source: &MediaSource,
    fetcher: &dyn MediaFetcher,
    timeout: Option<Duration>,
) -> Result<LoadedMedia, ViewerError> {
    let Some(limit) = timeout else {
        return media::load_source(source, fetcher).await;
    };
    match tokio::time::timeout(limit, media::load_source(source, fetcher)).await {
        Ok(result) => result,
        Err(_) => Err(ViewerError::NetworkFailure(format!(
            "load of {source} timed out after {limit:?}"
        ))),
    }
}

fn log_outcome(outcome: &LoadOutcome) {
    let generation = outcome.ticket.generation();
    match &outcome.result {
        Ok(LoadedMedia::Image(img)) => {
            info!(generation, width = img.width(), height = img.height(), "image decoded")
        }
        Ok(LoadedMedia::Video { info: video, .. }) => {
            info!(generation, container = ?video.container, duration = ?video.duration_secs, "video probed")
        }
        Err(err) => debug!(generation, error = %err, "load failed"),
    }
}

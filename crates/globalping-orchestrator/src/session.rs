use std::sync::Arc;

use globalping_api::{ApiError, Measurement, MeasurementApi, MeasurementCreate, MeasurementStatus};
use globalping_session::{resolve_locator, SessionHistory, SessionRecord};
use globalping_view::{Context, FrameRenderer};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::{CooperativeCancellationToken, RunError};

pub const MAX_CONSECUTIVE_POLL_FAILURES: usize = 3;

/// Drives measurements for one process, owning its session history.
pub struct MeasurementSession {
    api: Arc<dyn MeasurementApi>,
    history: SessionHistory,
}

impl MeasurementSession {
    pub fn new(api: Arc<dyn MeasurementApi>) -> Self {
        Self {
            api,
            history: SessionHistory::new(),
        }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    /// Runs one measurement to a terminal state.
    ///
    /// Locator and submission failures return before anything is rendered.
    /// Once submitted, every exit path renders exactly one final frame of
    /// whatever was accumulated.
    pub async fn run(
        &mut self,
        ctx: &Context,
        mut request: MeasurementCreate,
        renderer: &mut dyn FrameRenderer,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<Measurement, RunError> {
        ctx.validate()?;

        let resolved =
            resolve_locator(&ctx.from, ctx.limit, &self.history, self.api.as_ref()).await?;
        request.locations = resolved.locations;
        request.limit = Some(resolved.limit);
        request.in_progress_updates = !ctx.ci_mode;

        if cancellation.is_cancelled() {
            return Err(RunError::Interrupted { id: None });
        }

        let created = self
            .api
            .create_measurement(&request)
            .await
            .map_err(|error| match error {
                ApiError::AuthRefreshFailed(message) => RunError::AuthRefreshFailed(message),
                other => RunError::SubmissionFailed(other),
            })?;
        debug!(id = %created.id, probes = created.probes_count, "measurement submitted");

        let mut accumulated = Measurement {
            id: created.id.clone(),
            kind: Some(request.kind),
            target: request.target.clone(),
            probes_count: created.probes_count,
            ..Measurement::default()
        };

        if let Err(error) = self
            .poll_until_terminal(ctx, &mut accumulated, renderer, cancellation)
            .await
        {
            render_final_best_effort(renderer, ctx, &accumulated);
            return Err(error);
        }

        if !accumulated.results.is_empty() {
            self.history.append(SessionRecord {
                id: accumulated.id.clone(),
                probes: accumulated.probes(),
            });
        }
        renderer.render_frame(ctx, &accumulated, true)?;
        Ok(accumulated)
    }

    async fn poll_until_terminal(
        &self,
        ctx: &Context,
        accumulated: &mut Measurement,
        renderer: &mut dyn FrameRenderer,
        cancellation: &CooperativeCancellationToken,
    ) -> Result<(), RunError> {
        let id = accumulated.id.clone();
        let mut consecutive_failures = 0_usize;

        loop {
            let poll_started = Instant::now();
            match self.api.get_measurement(&id).await {
                Ok(snapshot) => {
                    consecutive_failures = 0;
                    let changed = merge_snapshot(accumulated, snapshot);
                    debug!(
                        id = %id,
                        status = ?accumulated.status,
                        results = accumulated.results.len(),
                        changed,
                        "measurement polled"
                    );
                    match accumulated.status {
                        MeasurementStatus::Finished => return Ok(()),
                        MeasurementStatus::Failed => {
                            return Err(RunError::MeasurementFailed {
                                id,
                                message: accumulated
                                    .error
                                    .clone()
                                    .unwrap_or_else(|| "measurement failed".to_string()),
                            });
                        }
                        _ => {}
                    }
                    if changed && !ctx.ci_mode {
                        renderer.render_frame(ctx, accumulated, false)?;
                    }
                }
                Err(ApiError::AuthRefreshFailed(message)) => {
                    return Err(RunError::AuthRefreshFailed(message));
                }
                Err(error) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_POLL_FAILURES {
                        return Err(RunError::PollFailed {
                            id,
                            attempts: consecutive_failures,
                            source: error,
                        });
                    }
                    warn!(
                        id = %id,
                        %error,
                        consecutive_failures,
                        "measurement poll failed; retrying at next interval"
                    );
                }
            }

            tokio::select! {
                _ = sleep_until(poll_started + ctx.api_min_interval) => {}
                _ = cancellation.cancelled() => {
                    debug!(id = %id, "measurement polling interrupted");
                    return Err(RunError::Interrupted { id: Some(id) });
                }
            }
        }
    }
}

/// Folds `snapshot` into `accumulated`; returns whether any probe result changed.
///
/// Results are matched by position and never removed, so a short or
/// reordered snapshot cannot shrink what was already shown.
fn merge_snapshot(accumulated: &mut Measurement, snapshot: Measurement) -> bool {
    let Measurement {
        kind,
        status,
        created_at,
        updated_at,
        target,
        probes_count,
        error,
        results,
        ..
    } = snapshot;

    accumulated.status = status;
    accumulated.kind = kind.or(accumulated.kind);
    accumulated.created_at = created_at.or(accumulated.created_at.take());
    accumulated.updated_at = updated_at.or(accumulated.updated_at.take());
    if !target.is_empty() {
        accumulated.target = target;
    }
    accumulated.probes_count = accumulated.probes_count.max(probes_count);
    accumulated.error = error.or(accumulated.error.take());

    let mut changed = false;
    for (index, result) in results.into_iter().enumerate() {
        match accumulated.results.get_mut(index) {
            Some(existing) if *existing == result => {}
            Some(existing) => {
                *existing = result;
                changed = true;
            }
            None => {
                accumulated.results.push(result);
                changed = true;
            }
        }
    }
    changed
}

fn render_final_best_effort(
    renderer: &mut dyn FrameRenderer,
    ctx: &Context,
    accumulated: &Measurement,
) {
    if let Err(error) = renderer.render_frame(ctx, accumulated, true) {
        warn!(%error, "failed to render partial measurement results");
    }
}

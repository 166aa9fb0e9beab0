mod helpers;
mod log;
mod metrics;
mod profile;
mod queue;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiClient;
use nutrack_core::queue::ReplayRouter;
use nutrack_core::service::NutrackService;

pub(crate) use log::{cmd_log_exercise, cmd_log_food, cmd_log_water, cmd_log_weight, cmd_post};
pub(crate) use metrics::{cmd_bmi, cmd_targets};
pub(crate) use profile::{ProfileArgs, cmd_profile_clear, cmd_profile_set, cmd_profile_show};
pub(crate) use queue::{
    cmd_queue_add, cmd_queue_clear, cmd_queue_drain, cmd_queue_list, cmd_queue_offline,
    cmd_queue_online, cmd_queue_retry,
};

/// Run `f` on a blocking thread with a router that replays to the backend.
///
/// Replays block on HTTP calls, which is only allowed outside async code.
pub(super) async fn with_replayer<T, F>(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    f: F,
) -> Result<T>
where
    F: FnOnce(&NutrackService, &ReplayRouter) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let svc = Arc::clone(svc);
    let api = Arc::clone(api);
    tokio::task::spawn_blocking(move || {
        let router = api.router();
        f(&svc, &router)
    })
    .await
    .context("Replay task failed")?
}

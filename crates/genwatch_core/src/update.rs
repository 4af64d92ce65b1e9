use crate::failure::synthesize_disconnect;
use crate::state::MISSING_PORTFOLIO;
use crate::{Effect, GenerationProgressEvent, Msg, ProgressState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ProgressState, msg: Msg) -> (ProgressState, Vec<Effect>) {
    let effects = match msg {
        Msg::PortfolioSelected(portfolio_id) => {
            state.select_portfolio(portfolio_id);
            Vec::new()
        }
        Msg::GenerateRequested => match state.portfolio_id().map(ToOwned::to_owned) {
            Some(portfolio_id) => {
                state.begin_trigger();
                vec![Effect::TriggerJob { portfolio_id }]
            }
            None => {
                state.record_trigger_error(MISSING_PORTFOLIO);
                Vec::new()
            }
        },
        Msg::WatchRequested {
            job_id,
            portfolio_id,
        } => {
            if portfolio_id.is_some() {
                state.select_portfolio(portfolio_id);
            }
            switch_job(&mut state, job_id, None)
        }
        Msg::JobStarted(job) => {
            let job_id = job.id.clone();
            switch_job(&mut state, job_id, Some(job))
        }
        Msg::TriggerFailed { message } => {
            state.record_trigger_error(message);
            Vec::new()
        }
        Msg::ProgressReceived { job_id, event } => {
            if state.is_active_job(&job_id) {
                accept(&mut state, event)
            } else {
                Vec::new()
            }
        }
        Msg::ChannelFailed { job_id, .. } => {
            if state.is_active_job(&job_id) && state.mark_channel_failed() {
                accept(&mut state, synthesize_disconnect(&job_id))
            } else {
                Vec::new()
            }
        }
        Msg::ChannelClosed { job_id } => {
            if state.is_active_job(&job_id) {
                state.mark_channel_closed();
            }
            Vec::new()
        }
        Msg::PreviewLoaded(preview) => {
            if state.preview_portfolio_id().as_deref() == Some(preview.portfolio_id.as_str()) {
                state.set_preview(preview);
            }
            Vec::new()
        }
        Msg::PreviewFailed { .. } | Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// Starts tracking `job_id`, releasing the channel of any previous job.
fn switch_job(
    state: &mut ProgressState,
    job_id: String,
    seed: Option<crate::GenerationJob>,
) -> Vec<Effect> {
    let previous = state.track_job(job_id.clone(), seed);
    let mut effects = Vec::with_capacity(2);
    if let Some(previous) = previous.filter(|previous| *previous != job_id) {
        effects.push(Effect::CloseChannel { job_id: previous });
    }
    effects.push(Effect::OpenChannel { job_id });
    effects
}

/// Last received wins: the event becomes `latest` and joins the history.
fn accept(state: &mut ProgressState, event: GenerationProgressEvent) -> Vec<Effect> {
    if !state.admits(&event) {
        return Vec::new();
    }
    let status_changed = state.latest().map(|latest| &latest.status) != Some(&event.status);
    state.accept_event(event);

    match state.preview_portfolio_id() {
        Some(portfolio_id) if status_changed => vec![Effect::FetchPreview { portfolio_id }],
        _ => Vec::new(),
    }
}

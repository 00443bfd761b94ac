//! Phase mask task
//!
//! Renders a new mask whenever the trap set changes. Requests that arrive
//! while a mask is being computed are coalesced into one follow-up render.

use core::sync::atomic::Ordering;

use embassy_futures::select::select;
use embassy_time::{Duration, Timer};
use tracing::{debug, info, warn};

use tweezer_core::traits::{HologramService, SlmError};
use tweezer_sim::SimSlm;

use crate::channels::PHASEMASK_REQUEST;
use crate::store::ControlState;

/// Recheck period when no request arrives
const IDLE_RECHECK: Duration = Duration::from_millis(500);

/// Render the current active traps, returning how many were sent
pub fn render<H: HologramService>(state: &ControlState, slm: &mut H) -> Result<usize, SlmError> {
    let generation = state.phasemask_generation();
    let (traps, settings) = state.hologram_input();

    let result = slm.render(&traps, &settings);
    state.set_slm_connected(!matches!(result, Err(SlmError::NotConnected)));
    result?;

    state.finish_phasemask(generation);
    debug!(traps = traps.len(), generation, "Phase mask displayed");
    Ok(traps.len())
}

/// SLM task
#[embassy_executor::task]
pub async fn slm_task(state: &'static ControlState, mut slm: SimSlm, render_time: Duration) {
    let _guard = state.register_task("slm");
    info!("SLM task started");

    while state.is_running() {
        select(PHASEMASK_REQUEST.wait(), Timer::after(IDLE_RECHECK)).await;
        if !state.phasemask_pending.load(Ordering::Acquire) {
            continue;
        }
        // Mask computation time
        Timer::after(render_time).await;
        if let Err(e) = render(state, &mut slm) {
            warn!(error = ?e, "Phase mask render failed");
        }
    }

    info!(renders = slm.renders(), "SLM task stopped");
}

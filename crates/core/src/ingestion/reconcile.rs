use tracing::{debug, error, info, warn};

use crate::artifacts::{ArtifactError, ArtifactLayout};
use crate::event::{Event, EventState};
use crate::store::EventStore;

/// Build an [`EventState`] for `event` from whatever submission and
/// resolution artifacts exist on disk.
pub async fn read_event_entry(
    layout: &ArtifactLayout,
    event: Event,
) -> Result<EventState, ArtifactError> {
    let mut state = EventState::new(event);
    if let Some(request) = layout.read_service_request(&state.event.id).await? {
        state.has_resolution = layout.has_resolution(&state.event.id).await?;
        state.service_request_status = layout.read_resolution(&state.event.id).await?;
        state.service_request = Some(request);
    }
    Ok(state)
}

/// Index every saved event directory that the store does not know about.
///
/// Events whose artifacts cannot be read are logged and skipped. Returns the
/// number of events added.
pub async fn reconcile(store: &EventStore, layout: &ArtifactLayout) -> usize {
    let ids = match layout.saved_event_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list saved events");
            return 0;
        }
    };

    let mut added = 0;
    for id in ids {
        if store.exists(&id) {
            continue;
        }
        debug!(event_id = %id, "Indexing event");

        let state = match layout.read_metadata(&id).await {
            Ok(event) => read_event_entry(layout, event).await,
            Err(e) => Err(e),
        };
        match state {
            Ok(state) => match store.create(&id, state) {
                Ok(()) => added += 1,
                Err(e) => warn!(event_id = %id, error = %e, "Skipping event"),
            },
            Err(e) => warn!(event_id = %id, error = %e, "Error loading event, skipping"),
        }
    }

    info!(added, total = store.len(), "Event database reconciled");
    added
}

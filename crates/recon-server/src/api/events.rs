//! Server-sent stream of a tenant's pipeline events.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream};

use crate::middleware::RequestId;

use super::{require_tenant, ApiError, AppState};

/// GET /api/v1/tenants/{tenant}/events
///
/// The subscription lives as long as the stream. Once the client goes away
/// the receiver is dropped and the broadcaster prunes it on its next publish.
pub(super) async fn stream_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(tenant_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    require_tenant(&state, &req_id.0, &tenant_id).await?;
    let subscription = state.pipeline.events.subscribe(&tenant_id);
    tracing::debug!(tenant = %tenant_id, subscription = subscription.id, "event stream opened");

    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.receiver.recv().await?;
        let frame = Event::default().event(event.name()).json_data(&event);
        Some((frame, subscription))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

use axum::response::sse::Event;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use tokio::sync::mpsc::Receiver;
use tracing::error;

use crate::pipeline::PipelineEvent;
use crate::segment::Segment;

use super::models::SegmentPayload;

pub(crate) type EventStream = BoxStream<'static, Result<Event, Infallible>>;

pub(crate) fn connected() -> Event {
    Event::default().event("connected").data("ok")
}

pub(crate) fn failure(message: &str) -> Event {
    Event::default().event("error").data(message)
}

fn done() -> Event {
    Event::default().event("done").data("all done")
}

pub(crate) fn segment_payload(segment: &Segment) -> SegmentPayload {
    SegmentPayload {
        ques_number: segment.label.clone(),
        img_src: BASE64.encode(&segment.png),
    }
}

fn to_event(event: PipelineEvent) -> Option<Event> {
    match event {
        PipelineEvent::Segment(segment) => {
            match serde_json::to_string(&segment_payload(&segment)) {
                Ok(json) => Some(Event::default().data(json)),
                Err(err) => {
                    error!(label = %segment.label, error = %err, "failed to serialize segment");
                    None
                }
            }
        }
        PipelineEvent::Done => Some(done()),
    }
}

/// `connected` followed by a terminal `error`.
pub(crate) fn rejected(message: String) -> EventStream {
    stream::iter([Ok(connected()), Ok(failure(&message))]).boxed()
}

/// `connected` followed by whatever the run pushes, ending when the run drops its sender.
/// Dropping the returned stream closes the receiver, which stops the run.
pub(crate) fn streamed(rx: Receiver<PipelineEvent>) -> EventStream {
    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event, rx))
    })
    .filter_map(|event| async move { to_event(event).map(Ok) });
    stream::once(async { Ok(connected()) }).chain(events).boxed()
}

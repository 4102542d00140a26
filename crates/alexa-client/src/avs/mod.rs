mod context;
mod event;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, COOKIE, USER_AGENT};
use tracing::debug;

pub use context::device_context;
pub use event::{
    Event, EventIds, TextMessageOutcome, multipart_body, multipart_content_type,
    parse_text_message_response,
};

use crate::config::Endpoints;
use crate::error::AlexaError;
use crate::session::Session;
use crate::transport::{RawResponse, Transport};

pub(crate) const EVENTS_PATH: &str = "/v20160207/events";
pub(crate) const CONVERSATIONS_PATH: &str = "/v1/conversations";
pub(crate) const APP_USER_AGENT: &str = "Alexa/2.2.696573 CFNetwork/3860.200.71 Darwin/25.1.0";

pub(crate) fn fragments_path(conversation_id: &str) -> String {
    format!(
        "{CONVERSATIONS_PATH}/{conversation_id}/fragments/synchronize"
    )
}

pub(crate) async fn post_event(
    transport: &Transport,
    endpoints: &Endpoints,
    session: &Session,
    bearer_token: &str,
    event: &Event,
) -> Result<RawResponse, AlexaError> {
    let ids = EventIds::generate();
    let envelope = event.envelope(&ids, session.conversation_id());
    let body = multipart_body(&ids.boundary, &envelope);

    let (operation, priority) = match event {
        Event::TextMessage { .. } => ("text message event", "u=1, i"),
        Event::SynchronizeState => ("synchronize state event", "u=3"),
    };
    debug!(
        operation,
        message_id = %ids.message_id,
        body_len = body.len(),
        "posting conversational event"
    );

    let mut request = transport
        .http()
        .post(format!("{}{EVENTS_PATH}", endpoints.avs))
        .header(AUTHORIZATION, format!("Bearer {bearer_token}"))
        .header(CONTENT_TYPE, multipart_content_type(&ids.boundary))
        .header(ACCEPT, "*/*")
        .header(USER_AGENT, APP_USER_AGENT)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .header("priority", priority)
        .body(body);
    if !session.cookies().is_empty() {
        request = request.header(COOKIE, session.cookies());
    }

    transport.execute(operation, request).await
}

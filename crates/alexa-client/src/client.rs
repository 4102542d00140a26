use std::time::Duration;

use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::avs::{
    self, CONVERSATIONS_PATH, Event, TextMessageOutcome, fragments_path,
    parse_text_message_response,
};
use crate::config::{ClientConfig, ConfigError};
use crate::correlation::{
    Clock, HISTORY_SAFETY_BUFFER_MS, PollPolicy, SystemClock, history_window, match_agent_reply,
    match_history_answer, poll_until,
};
use crate::dispatch::{
    AUTOMATIONS_PATH, BEHAVIOR_PREVIEW_PATH, Command, command_sequence, find_routine,
    preview_payload, routine_payload,
};
use crate::error::AlexaError;
use crate::extract::ExtractionStrategy;
use crate::models::{
    Conversation, ConversationListResponse, ConversationResponse, Device, DeviceListResponse,
    HistoryRecord, HistoryResponse, PhoenixResponse, RawRoutine, Routine, SmartHomeDevice,
};
use crate::session::{ACTIVITY_PAGE_PATH, Session};
use crate::smart_home::{
    PHOENIX_PATH, PHOENIX_STATE_PATH, SmartHomeAction, control_payload, find_device,
    flatten_appliances,
};
use crate::transport::{BROWSER_USER_AGENT, CSRF_HEADER, Transport, decode};

const DEVICES_PATH: &str = "/api/devices-v2/device?cached=true";
const HISTORY_PATH: &str = "/alexa-privacy/apd/rvh/customer-history-records-v2/";
const ANTI_CSRF_HEADER: &str = "anti-csrftoken-a2z";
const CONVERSATION_ID_PREFIX: &str = "amzn1.conversation.";

pub struct AlexaClient<C: Clock = SystemClock> {
    config: ClientConfig,
    transport: Transport,
    session: Session,
    clock: C,
    activity_csrf_strategy: ExtractionStrategy,
}

impl AlexaClient<SystemClock> {
    pub async fn connect(config: ClientConfig) -> Result<Self, AlexaError> {
        Self::connect_with_clock(config, SystemClock).await
    }
}

impl<C: Clock> AlexaClient<C> {
    pub async fn connect_with_clock(config: ClientConfig, clock: C) -> Result<Self, AlexaError> {
        let transport = Transport::new(config.http_timeout)?;
        let mut session = Session::default();
        session
            .ensure_cookies(
                &transport,
                &config.endpoints,
                &config.amazon_domain,
                &config.refresh_secret,
            )
            .await?;
        session.ensure_csrf(&transport, &config.endpoints).await?;

        Ok(Self {
            config,
            transport,
            session,
            clock,
            activity_csrf_strategy: ExtractionStrategy::activity_csrf(),
        })
    }

    pub fn with_activity_csrf_strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.activity_csrf_strategy = strategy;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn poll_policy(&self, timeout: Duration) -> PollPolicy {
        PollPolicy::new(self.config.poll_interval, timeout)
    }

    pub async fn devices(&mut self) -> Result<Vec<Device>, AlexaError> {
        let url = format!("{}{DEVICES_PATH}", self.config.endpoints.api);
        let request = self
            .transport
            .authenticated(&self.session, Method::GET, &url);
        let response: DeviceListResponse = self.transport.json("device list", request).await?;

        if let Some(first) = response.devices.first() {
            self.session.remember_customer_id(&first.customer_id);
        }
        Ok(response.devices)
    }

    pub async fn dispatch(&mut self, device: &Device, command: &Command) -> Result<(), AlexaError> {
        if let Command::Automation { routine } = command {
            return self.execute_routine(routine).await;
        }

        self.session.remember_customer_id(&device.customer_id);
        let customer_id = self
            .session
            .customer_id()
            .ok_or_else(|| {
                AlexaError::InvalidArgument(format!(
                    "no customer id known for device {}",
                    device.serial_number
                ))
            })?
            .to_string();

        let sequence = command_sequence(command, device, &customer_id).ok_or_else(|| {
            AlexaError::InvalidArgument(format!("{} has no sequence template", command.kind()))
        })?;

        self.post_behavior("behavior preview", &preview_payload(&sequence))
            .await?;
        debug!(
            command = command.kind(),
            device = %device.serial_number,
            "command dispatched"
        );
        Ok(())
    }

    async fn post_behavior(
        &self,
        operation: &'static str,
        payload: &Value,
    ) -> Result<(), AlexaError> {
        let url = format!("{}{BEHAVIOR_PREVIEW_PATH}", self.config.endpoints.api);
        let request = self
            .transport
            .authenticated(&self.session, Method::POST, &url)
            .json(payload);
        self.transport.execute_checked(operation, request).await?;
        Ok(())
    }

    pub async fn routines(&self) -> Result<Vec<Routine>, AlexaError> {
        let url = format!("{}{AUTOMATIONS_PATH}", self.config.endpoints.web);
        let request = self
            .transport
            .authenticated(&self.session, Method::GET, &url);
        let raw: Vec<RawRoutine> = self.transport.json("routine list", request).await?;
        Ok(raw.into_iter().map(Routine::from).collect())
    }

    pub async fn execute_routine(&self, name: &str) -> Result<(), AlexaError> {
        let routines = self.routines().await?;
        let routine = find_routine(&routines, name).ok_or_else(|| AlexaError::NotFound {
            kind: "routine",
            name: name.to_string(),
        })?;

        self.post_behavior("routine execution", &routine_payload(routine))
            .await?;
        debug!(routine = %routine.name, "routine triggered");
        Ok(())
    }

    pub async fn smart_home_devices(&self) -> Result<Vec<SmartHomeDevice>, AlexaError> {
        let url = format!("{}{PHOENIX_PATH}", self.config.endpoints.api);
        let request = self
            .transport
            .authenticated(&self.session, Method::GET, &url);
        let response: PhoenixResponse = self
            .transport
            .json("smart home topology", request)
            .await?;
        Ok(flatten_appliances(response))
    }

    pub async fn find_smart_home_device(&self, name: &str) -> Result<SmartHomeDevice, AlexaError> {
        let devices = self.smart_home_devices().await?;
        find_device(&devices, name)
            .cloned()
            .ok_or_else(|| AlexaError::NotFound {
                kind: "smart home device",
                name: name.to_string(),
            })
    }

    pub async fn control_smart_home(
        &self,
        entity_id: &str,
        action: SmartHomeAction,
    ) -> Result<(), AlexaError> {
        let payload = control_payload(entity_id, action)?;
        let url = format!("{}{PHOENIX_STATE_PATH}", self.config.endpoints.api);
        let request = self
            .transport
            .authenticated(&self.session, Method::PUT, &url)
            .json(&payload);
        self.transport
            .execute_checked("smart home control", request)
            .await?;
        Ok(())
    }

    pub async fn history_records(
        &mut self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<HistoryRecord>, AlexaError> {
        self.session
            .ensure_activity_csrf(
                &self.transport,
                &self.config.endpoints,
                &self.activity_csrf_strategy,
            )
            .await?;

        let privacy = &self.config.endpoints.privacy;
        let url = history_url(privacy, start_ms, end_ms)?;
        let mut request = self
            .transport
            .http()
            .post(url)
            .header(COOKIE, self.session.cookies())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(ORIGIN, privacy.as_str())
            .header(REFERER, format!("{privacy}{ACTIVITY_PAGE_PATH}"))
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .json(&json!({"previousRequestToken": null}));
        if let Some(csrf) = self.session.csrf() {
            request = request.header(CSRF_HEADER, csrf);
        }
        if let Some(activity_csrf) = self.session.activity_csrf() {
            request = request.header(ANTI_CSRF_HEADER, activity_csrf);
        }

        let response = self
            .transport
            .execute_checked("voice history", request)
            .await?;
        let parsed: HistoryResponse = decode("voice history", &response.body)?;
        Ok(parsed
            .customer_history_records
            .into_iter()
            .map(HistoryRecord::from)
            .collect())
    }

    pub async fn ask(
        &mut self,
        device: &Device,
        question: &str,
        timeout: Duration,
    ) -> Result<String, AlexaError> {
        let lower_bound = self.clock.unix_millis() - HISTORY_SAFETY_BUFFER_MS;
        self.dispatch(device, &Command::text_command(question))
            .await?;
        info!(device = %device.serial_number, "question sent; polling voice history");

        let clock = self.clock.clone();
        let policy = self.poll_policy(timeout);
        poll_until(&clock, policy, "voice history answer", async || {
            let (start, end) = history_window(lower_bound, clock.unix_millis());
            let records = self.history_records(start, end).await?;
            debug!(records = records.len(), "voice history fetched");
            Ok(
                match_history_answer(&records, &device.serial_number, lower_bound, question)
                    .map(ToString::to_string),
            )
        })
        .await
    }

    async fn bearer_token(&mut self) -> Result<String, AlexaError> {
        self.session
            .ensure_bearer_token(
                &self.transport,
                &self.config.endpoints,
                &self.config.refresh_secret,
            )
            .await
    }

    pub async fn synchronize_state(&mut self) -> Result<(), AlexaError> {
        let bearer_token = self.bearer_token().await?;
        let response = avs::post_event(
            &self.transport,
            &self.config.endpoints,
            &self.session,
            &bearer_token,
            &Event::SynchronizeState,
        )
        .await?;

        if response.status != StatusCode::OK && response.status != StatusCode::NO_CONTENT {
            return Err(AlexaError::Backend {
                status: response.status.as_u16(),
                body: response.body,
            });
        }
        Ok(())
    }

    pub async fn send_text_message(
        &mut self,
        text: &str,
    ) -> Result<TextMessageOutcome, AlexaError> {
        let bearer_token = self.bearer_token().await?;
        let response = avs::post_event(
            &self.transport,
            &self.config.endpoints,
            &self.session,
            &bearer_token,
            &Event::TextMessage {
                text: text.to_string(),
            },
        )
        .await?;

        parse_text_message_response(response.status, &response.body, text)
    }

    pub async fn conversations(&mut self) -> Result<Vec<Conversation>, AlexaError> {
        let bearer_token = self.bearer_token().await?;
        let url = format!("{}{CONVERSATIONS_PATH}", self.config.endpoints.avs);
        let mut request = self
            .transport
            .http()
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {bearer_token}"))
            .header(ACCEPT, "application/json");
        if !self.session.cookies().is_empty() {
            request = request.header(COOKIE, self.session.cookies());
        }

        let response = self
            .transport
            .execute_ok("conversation list", request)
            .await?;
        let parsed: ConversationListResponse = decode("conversation list", &response.body)?;
        Ok(parsed.into_conversations())
    }

    pub async fn conversation_fragments(&mut self) -> Result<ConversationResponse, AlexaError> {
        let Some(conversation_id) = self.session.conversation_id().map(ToString::to_string) else {
            return Err(AlexaError::NoConversation);
        };

        let bearer_token = self.bearer_token().await?;
        let url = format!(
            "{}{}",
            self.config.endpoints.avs,
            fragments_path(&conversation_id)
        );
        let request = self
            .transport
            .http()
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {bearer_token}"))
            .header(COOKIE, self.session.cookies())
            .header(ACCEPT, "application/json");

        let response = self
            .transport
            .execute_ok("conversation fragments", request)
            .await?;
        decode("conversation fragments", &response.body)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.session.conversation_id()
    }

    pub fn set_conversation_id(&mut self, conversation_id: impl Into<String>) {
        self.session.set_conversation_id(conversation_id);
    }

    pub fn start_conversation(&mut self) -> &str {
        if self.session.conversation_id().is_none() {
            self.session
                .set_conversation_id(format!("{CONVERSATION_ID_PREFIX}{}", Uuid::new_v4()));
        }
        self.session.conversation_id().unwrap_or_default()
    }

    pub async fn ask_plus(
        &mut self,
        question: &str,
        timeout: Duration,
    ) -> Result<String, AlexaError> {
        if let Err(err) = self.synchronize_state().await {
            warn!(error = %err, "synchronize state failed; continuing");
        }

        let outcome = self.send_text_message(question).await?;
        if let Some(reply) = outcome.reply {
            debug!("reply returned inline");
            return Ok(reply);
        }

        if let Some(conversation_id) = outcome.conversation_id {
            self.session.set_conversation_id(conversation_id);
        }
        if self.session.conversation_id().is_none() {
            return Err(AlexaError::NoConversation);
        }
        info!("message sent; polling conversation fragments");

        let clock = self.clock.clone();
        let policy = self.poll_policy(timeout);
        poll_until(&clock, policy, "conversation reply", async || {
            let response = self.conversation_fragments().await?;
            debug!(
                fragments = response.fragments.len(),
                "conversation fragments fetched"
            );
            Ok(match_agent_reply(&response.fragments))
        })
        .await
    }
}

fn history_url(privacy_base: &str, start_ms: i64, end_ms: i64) -> Result<String, AlexaError> {
    let mut url = Url::parse(&format!("{privacy_base}{HISTORY_PATH}")).map_err(|err| {
        AlexaError::Config(ConfigError::InvalidConfiguration(format!(
            "invalid privacy base url: {err}"
        )))
    })?;
    url.query_pairs_mut()
        .append_pair("startTime", &start_ms.to_string())
        .append_pair("endTime", &end_ms.to_string())
        .append_pair("pageType", "VOICE_HISTORY");
    Ok(url.to_string())
}

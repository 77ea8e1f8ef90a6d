//! Scripted provider, exchanger, and cipher fakes.
//!
//! Queues of scripted results drive each call; when a queue is empty the
//! fake answers with a benign default so unexercised paths stay quiet.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tutorlane_core::{CalendarProviderApi, OAuthTokenExchanger, ProviderDirectory, TokenCipher};
use tutorlane_domain::{
    CalendarProviderKind, DeleteOutcome, EventPayload, EventStatus, ProviderEvent,
    ProviderEventRef, RefreshedToken, Result, TimeWindow, TutorlaneError, UpdateOutcome,
};
use uuid::Uuid;

fn event_from_payload(event_id: &str, calendar_id: &str, payload: &EventPayload) -> ProviderEvent {
    ProviderEvent {
        event_id: event_id.to_string(),
        calendar_id: calendar_id.to_string(),
        start: payload.start,
        end: payload.end,
        summary: Some(payload.summary.clone()),
        status: EventStatus::Confirmed,
        recurrence_master_id: None,
        is_all_day: false,
    }
}

/// Scripted `CalendarProviderApi`.
#[derive(Default)]
pub struct ScriptedProvider {
    list_queue: Mutex<VecDeque<Result<Vec<ProviderEvent>>>>,
    create_queue: Mutex<VecDeque<Result<ProviderEvent>>>,
    update_queue: Mutex<VecDeque<Result<UpdateOutcome>>>,
    delete_queue: Mutex<VecDeque<Result<DeleteOutcome>>>,
    list_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub seen_tokens: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn push_list(&self, result: Result<Vec<ProviderEvent>>) {
        self.list_queue.lock().unwrap().push_back(result);
    }

    pub fn push_create(&self, result: Result<ProviderEvent>) {
        self.create_queue.lock().unwrap().push_back(result);
    }

    pub fn push_update(&self, result: Result<UpdateOutcome>) {
        self.update_queue.lock().unwrap().push_back(result);
    }

    pub fn push_delete(&self, result: Result<DeleteOutcome>) {
        self.delete_queue.lock().unwrap().push_back(result);
    }

    /// Make listings hang for `delay`, for timeout tests under paused time.
    pub fn delay_listings(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_call_count(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarProviderApi for ScriptedProvider {
    async fn list_busy_events(
        &self,
        access_token: &str,
        _range: &TimeWindow,
    ) -> Result<Vec<ProviderEvent>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(access_token.to_string());
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.list_queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }

    async fn create_event(
        &self,
        access_token: &str,
        payload: &EventPayload,
    ) -> Result<ProviderEvent> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(access_token.to_string());
        match self.create_queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(event_from_payload(&Uuid::now_v7().to_string(), "primary", payload)),
        }
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
        payload: &EventPayload,
    ) -> Result<UpdateOutcome> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(access_token.to_string());
        match self.update_queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(UpdateOutcome::Updated(event_from_payload(
                &event_ref.event_id,
                &event_ref.calendar_id,
                payload,
            ))),
        }
    }

    async fn delete_event(
        &self,
        access_token: &str,
        _event_ref: &ProviderEventRef,
    ) -> Result<DeleteOutcome> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_tokens.lock().unwrap().push(access_token.to_string());
        match self.delete_queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(DeleteOutcome::Deleted),
        }
    }
}

/// Fixed provider → adapter mapping.
#[derive(Default)]
pub struct StaticDirectory {
    adapters: HashMap<CalendarProviderKind, Arc<dyn CalendarProviderApi>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        provider: CalendarProviderKind,
        adapter: Arc<dyn CalendarProviderApi>,
    ) -> Self {
        self.adapters.insert(provider, adapter);
        self
    }
}

impl ProviderDirectory for StaticDirectory {
    fn adapter_for(
        &self,
        provider: CalendarProviderKind,
    ) -> Option<Arc<dyn CalendarProviderApi>> {
        self.adapters.get(&provider).cloned()
    }
}

/// Scripted `OAuthTokenExchanger`. Defaults to a successful exchange.
#[derive(Default)]
pub struct ScriptedExchanger {
    queue: Mutex<VecDeque<Result<RefreshedToken>>>,
    pub calls: AtomicUsize,
}

impl ScriptedExchanger {
    pub fn push(&self, result: Result<RefreshedToken>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthTokenExchanger for ScriptedExchanger {
    async fn refresh_access_token(
        &self,
        _provider: CalendarProviderKind,
        _refresh_token: &str,
    ) -> Result<RefreshedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.queue.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(RefreshedToken {
                access_token: "refreshed-access".to_string(),
                expires_in: 3600,
                refresh_token: None,
            }),
        }
    }
}

/// Reversible cipher so tests can assert on stored ciphertext.
pub struct PlainTextCipher;

impl TokenCipher for PlainTextCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        ciphertext
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| TutorlaneError::Security("ciphertext missing test prefix".into()))
    }
}

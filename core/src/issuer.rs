//! Request issuance: serialize, send, parse, validate, deliver.
//!
//! # Design
//! `RequestIssuer` owns one transport (the shared session) and a pipeline
//! configuration. `issue` returns a `TaskHandle` immediately and drives the
//! issuance on a spawned tokio task, which ends by calling exactly one of the
//! two continuations, or neither if the issuance was cancelled first.
//!
//! The handle and the task share an atomic `IssueState`. Every transition is
//! a compare-and-swap, and `TaskHandle::cancel` only succeeds while the state
//! is at or before `AwaitingCompletion`. Whichever side moves the state first
//! wins: a transport result that was already taken (`Parsing` or later)
//! finishes normally, otherwise the cancellation stands and nothing fires.
//!
//! Each issuance gets a child of the issuer's cancellation token, so dropping
//! the issuer cancels everything still in flight.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use crate::body::{default_serializer, Body, BodyParser, BodySerializer, ContentTypeParser, Payload};
use crate::error::{BuildError, ParseError, RequestError, SerializationError, ValidationError};
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::request::{assemble_request, parse_url, Request};
use crate::response::Response;
use crate::transport::Transport;
use crate::validate::{DefaultValidator, ResponseValidator};

/// Instance-wide pipeline pieces. Unset pieces fall back to content-type
/// driven defaults.
#[derive(Clone, Default)]
pub struct PipelineConfig {
    pub serializer: Option<Arc<dyn BodySerializer>>,
    pub parser: Option<Arc<dyn BodyParser>>,
    pub validator: Option<Arc<dyn ResponseValidator>>,
}

impl PipelineConfig {
    pub fn with_serializer(mut self, serializer: impl BodySerializer + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn with_parser(mut self, parser: impl BodyParser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn with_validator(mut self, validator: impl ResponseValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("serializer", &self.serializer.is_some())
            .field("parser", &self.parser.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Per-call overrides; set fields replace the instance configuration.
#[derive(Clone, Default)]
pub struct IssueOptions {
    pub parser: Option<Arc<dyn BodyParser>>,
    pub validator: Option<Arc<dyn ResponseValidator>>,
}

impl IssueOptions {
    pub fn with_parser(mut self, parser: impl BodyParser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn with_validator(mut self, validator: impl ResponseValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for IssueOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueOptions")
            .field("parser", &self.parser.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Where an issuance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum IssueState {
    Built = 0,
    Serializing = 1,
    Sent = 2,
    AwaitingCompletion = 3,
    Parsing = 4,
    Validating = 5,
    Completed = 6,
    Failed = 7,
    Cancelled = 8,
}

impl IssueState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => IssueState::Built,
            1 => IssueState::Serializing,
            2 => IssueState::Sent,
            3 => IssueState::AwaitingCompletion,
            4 => IssueState::Parsing,
            5 => IssueState::Validating,
            6 => IssueState::Completed,
            7 => IssueState::Failed,
            _ => IssueState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IssueState::Completed | IssueState::Failed | IssueState::Cancelled
        )
    }

    /// Cancellation is only honoured until the transport result is taken.
    pub fn is_cancellable(self) -> bool {
        self <= IssueState::AwaitingCompletion
    }
}

/// Cancellable reference to one in-flight issuance.
///
/// Clones refer to the same issuance. `cancel` is idempotent and may be
/// called from any thread.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

struct TaskInner {
    id: Uuid,
    state: AtomicU8,
    token: CancellationToken,
}

impl TaskHandle {
    fn new(token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: Uuid::new_v4(),
                state: AtomicU8::new(IssueState::Built as u8),
                token,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn state(&self) -> IssueState {
        IssueState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == IssueState::Cancelled
    }

    /// Cancel the issuance. Returns `true` if this call moved it to
    /// `Cancelled`, `false` if it was already cancelled or past the point
    /// where the transport result was taken.
    pub fn cancel(&self) -> bool {
        if self.mark_cancelled() {
            self.inner.token.cancel();
            true
        } else {
            false
        }
    }

    fn mark_cancelled(&self) -> bool {
        let mut current = self.inner.state.load(Ordering::Acquire);
        loop {
            if !IssueState::from_u8(current).is_cancellable() {
                return false;
            }
            match self.inner.state.compare_exchange_weak(
                current,
                IssueState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn advance(&self, from: IssueState, to: IssueState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Only valid once past `AwaitingCompletion`, where cancellation no
    /// longer competes for the state.
    fn set(&self, state: IssueState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// The pipeline pieces resolved for one issuance.
#[derive(Clone, Default)]
struct Pipeline {
    serializer: Option<Arc<dyn BodySerializer>>,
    parser: Option<Arc<dyn BodyParser>>,
    validator: Option<Arc<dyn ResponseValidator>>,
}

impl Pipeline {
    fn serialize(&self, headers: &Headers, body: Option<&Body>) -> Result<Payload, SerializationError> {
        match body {
            None | Some(Body::Empty) => Ok(Payload::empty()),
            Some(body) => match &self.serializer {
                Some(serializer) => serializer.serialize(body),
                None => default_serializer(headers.content_type()).serialize(body),
            },
        }
    }

    fn prepare(&self, request: Request) -> Result<HttpRequest, SerializationError> {
        let payload = self.serialize(&request.headers, request.body.as_ref())?;
        Ok(assemble_request(
            request.method,
            request.url,
            request.headers,
            payload,
        ))
    }

    /// A panicking parser fails the issuance with a parse error.
    fn parse(&self, raw: &HttpResponse) -> Result<Body, ParseError> {
        let parser: &dyn BodyParser = match &self.parser {
            Some(parser) => &**parser,
            None => &ContentTypeParser,
        };
        panic::catch_unwind(AssertUnwindSafe(|| {
            parser.parse(raw.status, &raw.headers, &raw.body)
        }))
        .unwrap_or_else(|payload| {
            Err(ParseError::new(format!(
                "parser panicked: {}",
                panic_message(&*payload)
            )))
        })
    }

    /// A panicking validator rejects the response.
    fn validate(&self, raw: HttpResponse, body: Body) -> Result<Response, RequestError> {
        let validator: &dyn ResponseValidator = match &self.validator {
            Some(validator) => &**validator,
            None => &DefaultValidator,
        };
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| {
            validator.validate(raw.status, &raw.headers, &body)
        }))
        .unwrap_or_else(|payload| {
            Err(ValidationError::new(
                raw.status,
                format!("validator panicked: {}", panic_message(&*payload)),
            ))
        });
        verdict?;
        Ok(Response {
            status: raw.status,
            headers: raw.headers,
            raw_body: raw.body,
            body,
        })
    }

    fn finish(&self, raw: HttpResponse) -> Result<Response, RequestError> {
        let body = self.parse(&raw)?;
        self.validate(raw, body)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Issues requests over one shared transport.
///
/// The transport is owned for the issuer's whole lifetime. Dropping the
/// issuer cancels every issuance it started that has not yet taken its
/// transport result.
pub struct RequestIssuer<T: Transport> {
    transport: Arc<T>,
    config: PipelineConfig,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl<T: Transport> RequestIssuer<T> {
    /// Create an issuer that spawns onto the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(transport: T) -> Self {
        Self::with_runtime(transport, Handle::current())
    }

    pub fn with_runtime(transport: T, runtime: Handle) -> Self {
        Self {
            transport: Arc::new(transport),
            config: PipelineConfig::default(),
            runtime,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Cancel every issuance started so far. Later issuances are cancelled
    /// before they reach the transport.
    pub fn shutdown(&self) {
        debug!("shutting down issuer");
        self.shutdown.cancel();
    }

    /// Issue with the instance configuration.
    pub fn issue<S, E>(&self, request: impl Into<Request>, on_success: S, on_error: E) -> TaskHandle
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_with(request, IssueOptions::default(), on_success, on_error)
    }

    /// Issue with a per-call parser and/or validator.
    ///
    /// A parser or validator that panics fails the issuance like any other
    /// parse or validation error. The handle is already terminal when a
    /// continuation runs, so a panicking continuation only ends its own task.
    pub fn issue_with<S, E>(
        &self,
        request: impl Into<Request>,
        options: IssueOptions,
        on_success: S,
        on_error: E,
    ) -> TaskHandle
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        let request = request.into();
        let task = TaskHandle::new(self.shutdown.child_token());
        let span = debug_span!(
            "issue",
            id = %task.id(),
            method = %request.method,
            url = %request.url,
        );
        let pipeline = self.pipeline(options);
        let transport = Arc::clone(&self.transport);
        let handle = task.clone();
        self.runtime.spawn(
            async move {
                match drive(transport.as_ref(), &pipeline, request, &handle).await {
                    Some(Ok(response)) => {
                        debug!(status = response.status, "completed");
                        on_success(response);
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "failed");
                        on_error(err);
                    }
                    None => debug!("cancelled"),
                }
            }
            .instrument(span),
        );
        task
    }

    /// Run the pipeline on the caller's task and return the outcome.
    ///
    /// Dropping the returned future cancels the issuance.
    pub async fn send(
        &self,
        request: impl Into<Request>,
        options: IssueOptions,
    ) -> Result<Response, RequestError> {
        let request = request.into();
        let pipeline = self.pipeline(options);
        let http = pipeline.prepare(request)?;
        debug!(method = %http.method, url = %http.url, "sending");
        let raw = self.transport.execute(http).await?;
        pipeline.finish(raw)
    }

    pub fn get<S, E>(
        &self,
        url: &str,
        headers: Option<Headers>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_verb(HttpMethod::Get, url, headers, None, on_success, on_error)
    }

    pub fn put<S, E>(
        &self,
        url: &str,
        headers: Option<Headers>,
        body: Option<Body>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_verb(HttpMethod::Put, url, headers, body, on_success, on_error)
    }

    pub fn post<S, E>(
        &self,
        url: &str,
        headers: Option<Headers>,
        body: Option<Body>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_verb(HttpMethod::Post, url, headers, body, on_success, on_error)
    }

    pub fn patch<S, E>(
        &self,
        url: &str,
        headers: Option<Headers>,
        body: Option<Body>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_verb(HttpMethod::Patch, url, headers, body, on_success, on_error)
    }

    pub fn delete<S, E>(
        &self,
        url: &str,
        headers: Option<Headers>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        self.issue_verb(HttpMethod::Delete, url, headers, None, on_success, on_error)
    }

    fn issue_verb<S, E>(
        &self,
        method: HttpMethod,
        url: &str,
        headers: Option<Headers>,
        body: Option<Body>,
        on_success: S,
        on_error: E,
    ) -> Result<TaskHandle, BuildError>
    where
        S: FnOnce(Response) + Send + 'static,
        E: FnOnce(RequestError) + Send + 'static,
    {
        let mut request = Request::from_parts(method, parse_url(url)?);
        request.headers = headers.unwrap_or_default();
        request.body = body;
        Ok(self.issue(request, on_success, on_error))
    }

    fn pipeline(&self, options: IssueOptions) -> Pipeline {
        Pipeline {
            serializer: self.config.serializer.clone(),
            parser: options.parser.or_else(|| self.config.parser.clone()),
            validator: options.validator.or_else(|| self.config.validator.clone()),
        }
    }
}

impl<T: Transport> Drop for RequestIssuer<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<T: Transport + fmt::Debug> fmt::Debug for RequestIssuer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIssuer")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .finish()
    }
}

/// Walk one issuance through its states. `None` means it was cancelled and
/// no continuation may run.
async fn drive<T: Transport>(
    transport: &T,
    pipeline: &Pipeline,
    request: Request,
    task: &TaskHandle,
) -> Option<Result<Response, RequestError>> {
    if task.inner.token.is_cancelled() {
        task.mark_cancelled();
        return None;
    }
    if !task.advance(IssueState::Built, IssueState::Serializing) {
        return None;
    }
    let http = match pipeline.prepare(request) {
        Ok(http) => http,
        Err(err) => {
            return task
                .advance(IssueState::Serializing, IssueState::Failed)
                .then(|| Err(err.into()));
        }
    };
    if !task.advance(IssueState::Serializing, IssueState::Sent) {
        return None;
    }
    let exchange = transport.execute(http);
    if !task.advance(IssueState::Sent, IssueState::AwaitingCompletion) {
        return None;
    }
    debug!("awaiting completion");

    let result = tokio::select! {
        biased;
        result = exchange => result,
        () = task.inner.token.cancelled() => {
            task.mark_cancelled();
            return None;
        }
    };

    let raw = match result {
        Ok(raw) => raw,
        Err(err) => {
            return task
                .advance(IssueState::AwaitingCompletion, IssueState::Failed)
                .then(|| Err(err.into()));
        }
    };
    if !task.advance(IssueState::AwaitingCompletion, IssueState::Parsing) {
        return None;
    }
    debug!(status = raw.status, "response received");

    let body = match pipeline.parse(&raw) {
        Ok(body) => body,
        Err(err) => {
            task.set(IssueState::Failed);
            return Some(Err(err.into()));
        }
    };
    task.set(IssueState::Validating);
    let outcome = pipeline.validate(raw, body);
    task.set(if outcome.is_ok() {
        IssueState::Completed
    } else {
        IssueState::Failed
    });
    Some(outcome)
}

//! Preview controller: keeps a display region in step with the latest input.
//!
//! Every input gets a fresh [`RequestId`] from a monotonic sequence. A result
//! is applied only while its id is still the latest issued one, so the
//! display follows issuance order whatever order responses arrive in.
//! Aborting the superseded call is a best-effort extra on transports that
//! support it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::render::escape_text;
use crate::domain::preview::{PreviewBootstrap, PreviewCall, PreviewRequest, RequestId};

/// Successful reply of a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewReply {
    /// Sanitized markup to place in the display region.
    Markup(String),
    /// Neutral message for empty input.
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call was superseded; never shown to the user.
    #[error("request cancelled")]
    Cancelled,
    #[error("server responded with {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Channel from the controller to the render endpoint.
#[async_trait]
pub trait PreviewTransport: Send + Sync + 'static {
    async fn send(&self, call: PreviewCall) -> Result<PreviewReply, TransportError>;

    /// Whether dropping an outstanding `send` future aborts the call.
    fn cancels_in_flight(&self) -> bool {
        true
    }
}

/// What the display region currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Loading,
    Markup(String),
    Message(String),
    Error(String),
}

impl DisplayState {
    pub fn to_html(&self) -> String {
        match self {
            Self::Loading => {
                r#"<div class="toric spinner-container"><div id="spinner-preloader"></div></div>"#
                    .to_string()
            }
            Self::Markup(markup) => markup.clone(),
            Self::Message(message) => escape_text(message),
            Self::Error(message) => format!(
                r#"<div class="toric preview-error">{}</div>"#,
                escape_text(message)
            ),
        }
    }
}

/// The single element the controller owns for output.
///
/// `show` runs while the controller holds its request lock. Calling
/// [`PreviewController::on_input`] or [`PreviewController::on_result`] from
/// inside `show` deadlocks; hand the state to another task instead.
pub trait DisplayRegion: Send + Sync + 'static {
    fn show(&self, state: DisplayState);
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub action: String,
    pub nonce: String,
    /// Shown in place of any failure other than cancellation.
    pub error_message: String,
    /// Quiet period before a call is sent. Zero sends immediately.
    pub debounce: Duration,
}

impl ControllerOptions {
    pub fn from_bootstrap(bootstrap: PreviewBootstrap, debounce: Duration) -> Self {
        Self {
            action: bootstrap.action,
            nonce: bootstrap.nonce,
            error_message: bootstrap.code_retrieval_error_message,
            debounce,
        }
    }
}

/// How [`PreviewController::on_result`] treated a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultDisposition {
    /// The display region was updated.
    Applied,
    /// A newer request had been issued; the result was dropped.
    Superseded,
    /// A cancellation; nothing changed.
    Ignored,
}

struct InFlight {
    id: RequestId,
    handle: JoinHandle<()>,
}

struct Inner<T, D> {
    transport: T,
    display: D,
    options: ControllerOptions,
    latest: AtomicU64,
    // Guards issuance and display updates so a stale result cannot land
    // between a newer input and its loading state.
    in_flight: Mutex<Option<InFlight>>,
}

/// Cheap to clone; clones share the same sequence and display.
pub struct PreviewController<T, D> {
    inner: Arc<Inner<T, D>>,
}

impl<T, D> Clone for PreviewController<T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, D> PreviewController<T, D>
where
    T: PreviewTransport,
    D: DisplayRegion,
{
    pub fn new(transport: T, display: D, options: ControllerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                display,
                options,
                latest: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn from_bootstrap(
        transport: T,
        display: D,
        bootstrap: PreviewBootstrap,
        debounce: Duration,
    ) -> Self {
        Self::new(
            transport,
            display,
            ControllerOptions::from_bootstrap(bootstrap, debounce),
        )
    }

    /// Id of the most recently issued request, if any.
    pub fn latest(&self) -> Option<RequestId> {
        match self.inner.latest.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RequestId::new(id)),
        }
    }

    /// Record `text` as the latest input, supersede the outstanding request,
    /// show the loading state and issue a new call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_input(&self, text: impl Into<String>) -> RequestId {
        let mut in_flight = self.lock_in_flight();

        let id = RequestId::new(self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1);
        if let Some(previous) = in_flight.take() {
            debug!(superseded = %previous.id, by = %id, "superseding preview request");
            if self.inner.transport.cancels_in_flight() {
                previous.handle.abort();
            }
        }

        self.inner.display.show(DisplayState::Loading);

        let request = PreviewRequest {
            id,
            input: text.into(),
        };
        let controller = self.clone();
        let handle = tokio::spawn(async move { controller.dispatch(request).await });
        *in_flight = Some(InFlight { id, handle });

        id
    }

    /// Apply `result` if `id` is still the latest request.
    pub fn on_result(
        &self,
        id: RequestId,
        result: Result<PreviewReply, TransportError>,
    ) -> ResultDisposition {
        let mut in_flight = self.lock_in_flight();

        if self.latest() != Some(id) {
            debug!(request = %id, latest = ?self.latest(), "discarding superseded preview result");
            return ResultDisposition::Superseded;
        }

        let state = match result {
            Ok(PreviewReply::Markup(markup)) => DisplayState::Markup(markup),
            Ok(PreviewReply::Empty(message)) => DisplayState::Message(message),
            Err(err) if err.is_cancelled() => {
                debug!(request = %id, "preview request cancelled");
                return ResultDisposition::Ignored;
            }
            Err(err) => {
                warn!(request = %id, error = %err, "preview request failed");
                DisplayState::Error(self.inner.options.error_message.clone())
            }
        };

        self.inner.display.show(state);
        if in_flight.as_ref().is_some_and(|current| current.id == id) {
            *in_flight = None;
        }
        ResultDisposition::Applied
    }

    /// Wait until no request is outstanding.
    pub async fn settle(&self) {
        loop {
            let Some(current) = self.lock_in_flight().take() else {
                return;
            };
            match current.handle.await {
                Err(err) if !err.is_cancelled() => {
                    warn!(request = %current.id, error = %err, "preview task failed");
                }
                _ => {}
            }
        }
    }

    async fn dispatch(&self, request: PreviewRequest) {
        let debounce = self.inner.options.debounce;
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
            if self.latest() != Some(request.id) {
                debug!(request = %request.id, "input superseded during debounce");
                return;
            }
        }

        let call = PreviewCall::new(
            self.inner.options.action.clone(),
            self.inner.options.nonce.clone(),
            request.input,
        );
        let result = self.inner.transport.send(call).await;
        self.on_result(request.id, result);
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        // A poisoned lock only means a display callback panicked; the guarded
        // value is still consistent.
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::pending;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::{mpsc, oneshot};

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingDisplay {
        states: Arc<Mutex<Vec<DisplayState>>>,
    }

    impl RecordingDisplay {
        fn states(&self) -> Vec<DisplayState> {
            self.states.lock().unwrap().clone()
        }

        fn last(&self) -> Option<DisplayState> {
            self.states().last().cloned()
        }
    }

    impl DisplayRegion for RecordingDisplay {
        fn show(&self, state: DisplayState) {
            self.states.lock().unwrap().push(state);
        }
    }

    /// Replies `<svg>{value}</svg>` immediately and records what was sent.
    #[derive(Clone, Default)]
    struct EchoTransport {
        sent: Arc<Mutex<Vec<String>>>,
        cancels: bool,
    }

    #[async_trait]
    impl PreviewTransport for EchoTransport {
        async fn send(&self, call: PreviewCall) -> Result<PreviewReply, TransportError> {
            let value = call.value.unwrap_or_default();
            self.sent.lock().unwrap().push(value.clone());
            Ok(PreviewReply::Markup(format!("<svg>{value}</svg>")))
        }

        fn cancels_in_flight(&self) -> bool {
            self.cancels
        }
    }

    /// Holds each call until the test releases the gate registered for its value.
    #[derive(Clone, Default)]
    struct GatedTransport {
        gates: Arc<Mutex<HashMap<String, oneshot::Receiver<Result<PreviewReply, TransportError>>>>>,
        dropped: Arc<AtomicUsize>,
        cancels: bool,
    }

    impl GatedTransport {
        fn gate(&self, value: &str) -> oneshot::Sender<Result<PreviewReply, TransportError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(value.to_string(), rx);
            tx
        }
    }

    struct DropCounter(Arc<AtomicUsize>, bool);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            if !self.1 {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl PreviewTransport for GatedTransport {
        async fn send(&self, call: PreviewCall) -> Result<PreviewReply, TransportError> {
            let value = call.value.unwrap_or_default();
            let gate = self.gates.lock().unwrap().remove(&value);
            let mut guard = DropCounter(Arc::clone(&self.dropped), false);
            let result = match gate {
                Some(rx) => rx.await.unwrap_or(Err(TransportError::Cancelled)),
                None => pending().await,
            };
            guard.1 = true;
            result
        }

        fn cancels_in_flight(&self) -> bool {
            self.cancels
        }
    }

    fn options(debounce: Duration) -> ControllerOptions {
        ControllerOptions {
            action: "toric_admin".to_string(),
            nonce: "v1.0.00".to_string(),
            error_message: "Failed to retrieve the code".to_string(),
            debounce,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn out_of_order_responses_show_only_the_latest_input() {
        let transport = GatedTransport::default();
        let release_a = transport.gate("AAA");
        let release_b = transport.gate("BBB");
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(transport, display.clone(), options(Duration::ZERO));

        controller.on_input("AAA");
        let b = controller.on_input("BBB");
        tokio::task::yield_now().await;

        release_b
            .send(Ok(PreviewReply::Markup("<svg>BBB</svg>".into())))
            .unwrap();
        controller.settle().await;
        assert_eq!(display.last(), Some(DisplayState::Markup("<svg>BBB</svg>".into())));
        assert_eq!(controller.latest(), Some(b));

        // A's call was never aborted; its late reply must still be dropped.
        let before = display.states().len();
        let _ = release_a.send(Ok(PreviewReply::Markup("<svg>AAA</svg>".into())));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(display.states().len(), before);
        assert!(
            !display
                .states()
                .contains(&DisplayState::Markup("<svg>AAA</svg>".into()))
        );
    }

    #[tokio::test]
    async fn late_result_for_superseded_request_is_discarded() {
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(
            GatedTransport::default(),
            display.clone(),
            options(Duration::ZERO),
        );

        let a = controller.on_input("AAA");
        let b = controller.on_input("BBB");

        assert_eq!(
            controller.on_result(b, Ok(PreviewReply::Markup("BBB".into()))),
            ResultDisposition::Applied
        );
        assert_eq!(
            controller.on_result(a, Ok(PreviewReply::Markup("AAA".into()))),
            ResultDisposition::Superseded
        );
        assert_eq!(display.last(), Some(DisplayState::Markup("BBB".into())));
    }

    #[tokio::test]
    async fn new_input_aborts_the_outstanding_call() {
        let transport = GatedTransport {
            cancels: true,
            ..GatedTransport::default()
        };
        let dropped = Arc::clone(&transport.dropped);
        let controller = PreviewController::new(
            transport,
            RecordingDisplay::default(),
            options(Duration::ZERO),
        );

        controller.on_input("AAA");
        tokio::task::yield_now().await;
        controller.on_input("BBB");

        wait_until(|| dropped.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn input_shows_loading_immediately() {
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(
            GatedTransport::default(),
            display.clone(),
            options(Duration::ZERO),
        );

        controller.on_input("AAA");

        assert_eq!(display.states(), vec![DisplayState::Loading]);
    }

    #[tokio::test]
    async fn cancellation_is_never_displayed() {
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(
            GatedTransport::default(),
            display.clone(),
            options(Duration::ZERO),
        );

        let id = controller.on_input("AAA");

        assert_eq!(
            controller.on_result(id, Err(TransportError::Cancelled)),
            ResultDisposition::Ignored
        );
        assert_eq!(display.states(), vec![DisplayState::Loading]);
    }

    #[tokio::test]
    async fn other_failures_show_the_configured_message() {
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(
            GatedTransport::default(),
            display.clone(),
            options(Duration::ZERO),
        );

        let id = controller.on_input("AAA");
        let disposition = controller.on_result(
            id,
            Err(TransportError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: "data too long".into(),
            }),
        );

        assert_eq!(disposition, ResultDisposition::Applied);
        assert_eq!(
            display.last(),
            Some(DisplayState::Error("Failed to retrieve the code".into()))
        );
    }

    #[tokio::test]
    async fn empty_reply_shows_the_neutral_message() {
        let display = RecordingDisplay::default();
        let controller = PreviewController::new(
            GatedTransport::default(),
            display.clone(),
            options(Duration::ZERO),
        );

        let id = controller.on_input("  ");
        controller.on_result(id, Ok(PreviewReply::Empty("Please enter details".into())));

        assert_eq!(
            display.last(),
            Some(DisplayState::Message("Please enter details".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_sends_only_the_last_input() {
        for cancels in [false, true] {
            let transport = EchoTransport {
                cancels,
                ..EchoTransport::default()
            };
            let sent = Arc::clone(&transport.sent);
            let display = RecordingDisplay::default();
            let controller = PreviewController::new(
                transport,
                display.clone(),
                options(Duration::from_millis(150)),
            );

            controller.on_input("H");
            controller.on_input("HE");
            controller.on_input("HELLO");
            controller.settle().await;

            assert_eq!(sent.lock().unwrap().clone(), vec!["HELLO".to_string()]);
            assert_eq!(
                display.last(),
                Some(DisplayState::Markup("<svg>HELLO</svg>".into()))
            );
        }
    }

    struct ChannelDisplay(mpsc::UnboundedSender<DisplayState>);

    impl DisplayRegion for ChannelDisplay {
        fn show(&self, state: DisplayState) {
            let _ = self.0.send(state);
        }
    }

    #[tokio::test]
    async fn follow_up_input_is_issued_outside_show() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = PreviewController::new(
            EchoTransport::default(),
            ChannelDisplay(tx),
            options(Duration::ZERO),
        );

        controller.on_input("HELLO");
        let mut follow_up_sent = false;
        while let Some(state) = rx.recv().await {
            match state {
                DisplayState::Markup(markup) if !follow_up_sent => {
                    assert_eq!(markup, "<svg>HELLO</svg>");
                    controller.on_input("HELLO WORLD");
                    follow_up_sent = true;
                }
                DisplayState::Markup(markup) => {
                    assert_eq!(markup, "<svg>HELLO WORLD</svg>");
                    break;
                }
                _ => {}
            }
        }

        controller.settle().await;
        assert!(follow_up_sent);
        assert_eq!(
            controller.latest().map(|id| id.to_string()),
            Some("#2".to_string())
        );
    }

    #[test]
    fn display_states_render_as_html() {
        assert_eq!(
            DisplayState::Loading.to_html(),
            r#"<div class="toric spinner-container"><div id="spinner-preloader"></div></div>"#
        );
        assert_eq!(
            DisplayState::Error("<b>Failed to retrieve</b>".into()).to_html(),
            r#"<div class="toric preview-error">&lt;b&gt;Failed to retrieve&lt;/b&gt;</div>"#
        );
        assert_eq!(
            DisplayState::Message("Please enter details".into()).to_html(),
            "Please enter details"
        );
        assert_eq!(DisplayState::Markup("<svg></svg>".into()).to_html(), "<svg></svg>");
    }
}

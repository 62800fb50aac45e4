//! Checkout orchestration.
//!
//! Drives one counter's cart from "confirmed" to "receipt ready":
//!
//! - **Cash**: create the order, complete immediately.
//! - **UPI (gateway)**: create the order, load the gateway widget, create a
//!   gateway order for the stored grand total, open the widget and wait for
//!   exactly one terminal callback (success / failure / dismiss). Success is
//!   verified with the backend; failure and dismissal delete the provisional
//!   order (compensating delete).
//! - **UPI (shop QR)**: the cashier confirms the customer paid by scanning
//!   the shop's QR code; the order is created and completed directly.
//!
//! Only one attempt may be in flight per session. Progress, user-facing
//! notifications and the finished receipt are delivered on the
//! [`CheckoutEvent`] channel returned by [`Checkout::new`].

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ApiError;
use crate::cart::SessionHandle;
use crate::models::{
    GatewayOrder, GatewayOrderRequest, GatewayPayment, OrderRequest, PaymentDetails,
    PaymentMethod, SavedOrder, VerifyRequest,
};
use crate::settings::Settings;
use crate::totals::{minor_units, Totals};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Order persistence on the backend.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<SavedOrder, ApiError>;
    async fn delete_order(&self, order_id: &str) -> Result<(), ApiError>;
}

/// Server side of the payment gateway.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_gateway_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, ApiError>;
    async fn verify_payment(&self, request: &VerifyRequest) -> Result<(), ApiError>;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unable to load payment gateway: {0}")]
    Load(String),

    #[error("Unable to open payment gateway: {0}")]
    Open(String),
}

/// Client-side payment widget hosted by the embedding shell.
#[async_trait]
pub trait GatewayWidget: Send + Sync {
    /// Load the widget's client library. May be slow; may fail.
    async fn load(&self) -> Result<(), GatewayError>;

    /// Show the payment UI. The widget reports the outcome through
    /// `callbacks`, possibly after this call has returned.
    async fn open(
        &self,
        options: GatewayCheckoutOptions,
        callbacks: GatewayCallbacks,
    ) -> Result<(), GatewayError>;
}

/// Options handed to the gateway widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayCheckoutOptions {
    pub key: String,
    /// Minor units, as returned by the gateway order.
    pub amount: i64,
    pub currency: String,
    pub order_id: String,
    pub name: String,
    pub description: String,
    pub prefill_name: String,
    pub prefill_contact: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Succeeded(GatewayPayment),
    Failed { reason: String },
    Dismissed,
}

/// Attempt-scoped terminal handlers for the gateway widget.
///
/// Clones share one slot: whichever handler fires first wins, later calls
/// are ignored and return `false`. Dropping every clone without firing reads
/// as a dismissal.
#[derive(Debug, Clone)]
pub struct GatewayCallbacks {
    attempt: Uuid,
    slot: Arc<Mutex<Option<oneshot::Sender<GatewayOutcome>>>>,
}

impl GatewayCallbacks {
    fn new(attempt: Uuid) -> (Self, oneshot::Receiver<GatewayOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                attempt,
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn on_success(&self, payment: GatewayPayment) -> bool {
        self.fire(GatewayOutcome::Succeeded(payment))
    }

    pub fn on_failure(&self, reason: &str) -> bool {
        self.fire(GatewayOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    pub fn on_dismiss(&self) -> bool {
        self.fire(GatewayOutcome::Dismissed)
    }

    fn fire(&self, outcome: GatewayOutcome) -> bool {
        let sender = lock(&self.slot).take();
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                debug!(attempt = %self.attempt, ?outcome, "ignoring repeated gateway callback");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// State / events / errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Submitting,
    AwaitingGateway,
    Compensating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    StateChanged(CheckoutState),
    Notify { level: NotifyLevel, message: String },
    /// A completed order ready for the receipt presenter.
    ReceiptReady(SavedOrder),
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),

    #[error("Another checkout is already in progress")]
    Busy,

    #[error("Order could not be placed: {0}")]
    Network(#[source] ApiError),

    #[error(transparent)]
    GatewayLoad(GatewayError),

    #[error("Payment gateway order failed: {0}")]
    GatewayOrder(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment cancelled")]
    PaymentCancelled,

    #[error("Payment verification failed for order {order_id}: {source}")]
    Verification {
        order_id: String,
        #[source]
        source: ApiError,
    },
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutConfig {
    pub gateway_key: String,
    pub currency: String,
    pub shop_name: String,
    pub qr_configured: bool,
    /// Acknowledge the receipt automatically after this delay.
    pub receipt_auto_close: Option<Duration>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            gateway_key: String::new(),
            currency: "INR".to_string(),
            shop_name: "My Retail Shop".to_string(),
            qr_configured: false,
            receipt_auto_close: None,
        }
    }
}

impl CheckoutConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            gateway_key: settings.payment.gateway_key.clone(),
            currency: settings.payment.currency.clone(),
            shop_name: settings.business.shop_name.clone(),
            qr_configured: settings.payment.qr_configured(),
            receipt_auto_close: settings.receipt.auto_close_secs.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StateCell {
    state: CheckoutState,
    /// Attempt whose receipt is on screen while `Completed`.
    displayed: Option<Uuid>,
}

/// Per-attempt bookkeeping.
struct Attempt {
    id: Uuid,
    compensated: bool,
}

pub struct Checkout {
    orders: Arc<dyn OrderBackend>,
    payments: Arc<dyn PaymentBackend>,
    widget: Arc<dyn GatewayWidget>,
    session: SessionHandle,
    config: CheckoutConfig,
    state: Arc<Mutex<StateCell>>,
    events: mpsc::UnboundedSender<CheckoutEvent>,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Checkout {
    pub fn new(
        orders: Arc<dyn OrderBackend>,
        payments: Arc<dyn PaymentBackend>,
        widget: Arc<dyn GatewayWidget>,
        session: SessionHandle,
        config: CheckoutConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CheckoutEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let checkout = Self {
            orders,
            payments,
            widget,
            session,
            config,
            state: Arc::new(Mutex::new(StateCell {
                state: CheckoutState::Idle,
                displayed: None,
            })),
            events,
        };
        (checkout, rx)
    }

    pub fn state(&self) -> CheckoutState {
        lock(&self.state).state
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Confirm the current cart with `method`.
    pub async fn confirm(&self, method: PaymentMethod) -> Result<SavedOrder, CheckoutError> {
        if !matches!(method, PaymentMethod::Cash | PaymentMethod::Upi) {
            let err = CheckoutError::Validation(format!(
                "{method} payments are not accepted at the counter"
            ));
            self.notify(NotifyLevel::Error, &err.to_string());
            return Err(err);
        }
        let (request, totals) = self.prepare(method.clone())?;
        let mut attempt = self.begin()?;
        info!(
            attempt = %attempt.id,
            method = %method,
            amount = totals.grand_total,
            items = request.cart_items.len(),
            "Checkout started"
        );

        let saved = self.submit(&attempt, &request, &totals).await?;

        match method {
            PaymentMethod::Upi => self.collect_gateway_payment(&mut attempt, saved).await,
            _ => {
                self.notify(NotifyLevel::Success, "Cash received");
                Ok(self.complete(&attempt, saved))
            }
        }
    }

    /// Record a UPI payment the customer made by scanning the shop QR code.
    pub async fn confirm_qr_payment(&self) -> Result<SavedOrder, CheckoutError> {
        if !self.config.qr_configured {
            let err = CheckoutError::Validation(
                "Please configure QR code in Settings to use this option".to_string(),
            );
            self.notify(NotifyLevel::Error, &err.to_string());
            return Err(err);
        }
        let (request, totals) = self.prepare(PaymentMethod::Upi)?;
        let attempt = self.begin()?;
        info!(attempt = %attempt.id, amount = totals.grand_total, "QR checkout started");

        let saved = self.submit(&attempt, &request, &totals).await?;
        self.notify(NotifyLevel::Success, "Payment received successfully");
        Ok(self.complete(&attempt, saved))
    }

    /// Close the receipt: clear the session and return to `Idle`. Returns
    /// `false` when no receipt is on screen.
    pub fn acknowledge_receipt(&self) -> bool {
        acknowledge(&self.state, &self.session, &self.events, None)
    }

    // -- Steps ---------------------------------------------------------------

    /// Validate the session and build the order request. No side effects
    /// beyond the notification on failure.
    fn prepare(&self, method: PaymentMethod) -> Result<(OrderRequest, Totals), CheckoutError> {
        let session = self.session.snapshot();
        let problem = if session.customer_name.trim().is_empty()
            || session.phone_number.trim().is_empty()
        {
            Some("Please enter customer details")
        } else if session.cart.is_empty() {
            Some("Your cart is empty")
        } else {
            None
        };
        if let Some(message) = problem {
            self.notify(NotifyLevel::Error, message);
            return Err(CheckoutError::Validation(message.to_string()));
        }

        let totals = session.totals();
        let request = OrderRequest {
            customer_name: session.customer_name.trim().to_string(),
            phone_number: session.phone_number.trim().to_string(),
            username: session.username.clone(),
            cart_items: session.cart.lines().to_vec(),
            subtotal: totals.subtotal,
            tax: totals.tax,
            grand_total: totals.grand_total,
            payment_method: method,
        };
        Ok((request, totals))
    }

    /// `Idle -> Submitting`, or refuse.
    fn begin(&self) -> Result<Attempt, CheckoutError> {
        {
            let mut cell = lock(&self.state);
            if cell.state != CheckoutState::Idle {
                drop(cell);
                warn!("Checkout refused, another attempt is in progress");
                self.notify(NotifyLevel::Error, "Another checkout is already in progress");
                return Err(CheckoutError::Busy);
            }
            cell.state = CheckoutState::Submitting;
            cell.displayed = None;
        }
        self.emit(CheckoutEvent::StateChanged(CheckoutState::Submitting));
        Ok(Attempt {
            id: Uuid::new_v4(),
            compensated: false,
        })
    }

    async fn submit(
        &self,
        attempt: &Attempt,
        request: &OrderRequest,
        totals: &Totals,
    ) -> Result<SavedOrder, CheckoutError> {
        match self.orders.create_order(request).await {
            Ok(mut saved) => {
                saved.tax_percent = Some(totals.tax_percent);
                info!(attempt = %attempt.id, order_id = %saved.order_id, "Order created");
                Ok(saved)
            }
            Err(e) => {
                warn!(attempt = %attempt.id, error = %e, "Order creation failed");
                self.fail("Payment processing failed");
                Err(CheckoutError::Network(e))
            }
        }
    }

    async fn collect_gateway_payment(
        &self,
        attempt: &mut Attempt,
        order: SavedOrder,
    ) -> Result<SavedOrder, CheckoutError> {
        self.set_state(CheckoutState::AwaitingGateway);

        if let Err(e) = self.widget.load().await {
            warn!(attempt = %attempt.id, order_id = %order.order_id, error = %e, "Gateway widget failed to load");
            self.compensate(attempt, &order, "Unable to load payment gateway").await;
            return Err(CheckoutError::GatewayLoad(e));
        }

        let gateway_order = match self
            .payments
            .create_gateway_order(&GatewayOrderRequest {
                amount: order.grand_total,
                currency: self.config.currency.clone(),
            })
            .await
        {
            Ok(g) => g,
            Err(e) => {
                warn!(attempt = %attempt.id, order_id = %order.order_id, error = %e, "Gateway order creation failed");
                self.compensate(attempt, &order, "Payment processing failed").await;
                return Err(CheckoutError::GatewayOrder(e.to_string()));
            }
        };

        let expected = minor_units(order.grand_total);
        if gateway_order.amount != expected {
            warn!(
                attempt = %attempt.id,
                order_id = %order.order_id,
                expected,
                actual = gateway_order.amount,
                "Gateway order amount does not match order total"
            );
            self.compensate(attempt, &order, "Payment amount mismatch").await;
            return Err(CheckoutError::GatewayOrder(format!(
                "gateway amount {} does not match order total {expected}",
                gateway_order.amount
            )));
        }

        let options = GatewayCheckoutOptions {
            key: self.config.gateway_key.clone(),
            amount: gateway_order.amount,
            currency: gateway_order.currency.clone(),
            order_id: gateway_order.id.clone(),
            name: self.config.shop_name.clone(),
            description: "Order payment".to_string(),
            prefill_name: order.customer_name.clone(),
            prefill_contact: order.phone_number.clone(),
        };
        let (callbacks, mut outcome_rx) = GatewayCallbacks::new(attempt.id);
        let outcome = match self.widget.open(options, callbacks).await {
            Ok(()) => outcome_rx.await.unwrap_or(GatewayOutcome::Dismissed),
            // An outcome delivered before the error still decides the attempt.
            Err(e) => match outcome_rx.try_recv() {
                Ok(outcome) => {
                    warn!(attempt = %attempt.id, order_id = %order.order_id, error = %e, "Gateway widget errored after reporting an outcome");
                    outcome
                }
                Err(_) => {
                    warn!(attempt = %attempt.id, order_id = %order.order_id, error = %e, "Gateway widget failed to open");
                    self.compensate(attempt, &order, "Unable to load payment gateway").await;
                    return Err(CheckoutError::GatewayLoad(e));
                }
            },
        };
        match outcome {
            GatewayOutcome::Succeeded(payment) => self.verify(attempt, order, payment).await,
            GatewayOutcome::Failed { reason } => {
                warn!(attempt = %attempt.id, order_id = %order.order_id, %reason, "Gateway reported payment failure");
                self.compensate(attempt, &order, "Payment failed").await;
                Err(CheckoutError::PaymentDeclined(reason))
            }
            GatewayOutcome::Dismissed => {
                info!(attempt = %attempt.id, order_id = %order.order_id, "Gateway dismissed");
                self.compensate(attempt, &order, "Payment cancelled").await;
                Err(CheckoutError::PaymentCancelled)
            }
        }
    }

    async fn verify(
        &self,
        attempt: &Attempt,
        mut order: SavedOrder,
        payment: GatewayPayment,
    ) -> Result<SavedOrder, CheckoutError> {
        let request = VerifyRequest::new(&payment, &order.order_id);
        match self.payments.verify_payment(&request).await {
            Ok(()) => {
                info!(
                    attempt = %attempt.id,
                    order_id = %order.order_id,
                    payment_id = %payment.gateway_payment_id,
                    "Payment verified"
                );
                order.payment_details = Some(PaymentDetails::from(&payment));
                self.notify(NotifyLevel::Success, "Payment successful");
                Ok(self.complete(attempt, order))
            }
            Err(e) => {
                // The order stays persisted without a confirmed payment and
                // is left for manual reconciliation.
                warn!(
                    attempt = %attempt.id,
                    order_id = %order.order_id,
                    payment_id = %payment.gateway_payment_id,
                    error = %e,
                    "Payment verification failed, order left unconfirmed"
                );
                self.fail("Payment verification failed");
                Err(CheckoutError::Verification {
                    order_id: order.order_id,
                    source: e,
                })
            }
        }
    }

    /// Best-effort delete of the provisional order, at most once per attempt.
    async fn compensate(&self, attempt: &mut Attempt, order: &SavedOrder, message: &str) {
        self.set_state(CheckoutState::Compensating);
        if !attempt.compensated {
            attempt.compensated = true;
            match self.orders.delete_order(&order.order_id).await {
                Ok(()) => info!(attempt = %attempt.id, order_id = %order.order_id, "Provisional order deleted"),
                Err(e) => {
                    warn!(
                        attempt = %attempt.id,
                        order_id = %order.order_id,
                        error = %e,
                        "Compensating delete failed, order may remain on the backend"
                    );
                    self.notify(NotifyLevel::Error, "Something went wrong");
                }
            }
        }
        self.notify(NotifyLevel::Error, message);
        self.set_state(CheckoutState::Idle);
    }

    /// `-> Failed -> Idle` with a notification.
    fn fail(&self, message: &str) {
        self.set_state(CheckoutState::Failed);
        self.notify(NotifyLevel::Error, message);
        self.set_state(CheckoutState::Idle);
    }

    /// `-> Completed`: clear the session and hand the order to the receipt
    /// presenter.
    fn complete(&self, attempt: &Attempt, order: SavedOrder) -> SavedOrder {
        self.session.lock().clear_all();
        {
            let mut cell = lock(&self.state);
            cell.state = CheckoutState::Completed;
            cell.displayed = Some(attempt.id);
        }
        info!(attempt = %attempt.id, order_id = %order.order_id, method = %order.payment_method, "Checkout completed");
        self.emit(CheckoutEvent::StateChanged(CheckoutState::Completed));
        self.emit(CheckoutEvent::ReceiptReady(order.clone()));
        self.schedule_auto_close(attempt.id);
        order
    }

    fn schedule_auto_close(&self, attempt: Uuid) {
        let Some(delay) = self.config.receipt_auto_close else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(%attempt, "no runtime, receipt auto-close skipped");
            return;
        };
        let state = Arc::clone(&self.state);
        let session = self.session.clone();
        let events = self.events.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if acknowledge(&state, &session, &events, Some(attempt)) {
                debug!(%attempt, "receipt closed automatically");
            }
        });
    }

    fn set_state(&self, state: CheckoutState) {
        lock(&self.state).state = state;
        self.emit(CheckoutEvent::StateChanged(state));
    }

    fn notify(&self, level: NotifyLevel, message: &str) {
        self.emit(CheckoutEvent::Notify {
            level,
            message: message.to_string(),
        });
    }

    fn emit(&self, event: CheckoutEvent) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }
}

/// `Completed -> Idle`. With `only` set, acknowledges just that attempt.
fn acknowledge(
    state: &Mutex<StateCell>,
    session: &SessionHandle,
    events: &mpsc::UnboundedSender<CheckoutEvent>,
    only: Option<Uuid>,
) -> bool {
    {
        let mut cell = lock(state);
        if cell.state != CheckoutState::Completed {
            return false;
        }
        if only.is_some() && cell.displayed != only {
            return false;
        }
        cell.state = CheckoutState::Idle;
        cell.displayed = None;
    }
    session.lock().clear_all();
    let _ = events.send(CheckoutEvent::StateChanged(CheckoutState::Idle));
    true
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Order;

use super::{CheckoutSession, CheckoutSessionStatus};

#[derive(Debug, Clone)]
struct SimulatedSession {
    order_id: String,
    paid: bool,
    payment_intent: Option<String>,
}

/// In-process stand-in for hosted checkout, used when no Stripe key is set.
///
/// Sessions live only in memory. The checkout URL points at the dev
/// endpoint that marks a session paid.
#[derive(Debug, Clone)]
pub struct SimulatedCheckout {
    base_url: String,
    sessions: Arc<Mutex<HashMap<String, SimulatedSession>>>,
}

impl SimulatedCheckout {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SimulatedSession>>> {
        self.sessions
            .lock()
            .map_err(|_| AppError::Internal("Simulated checkout state poisoned".into()))
    }

    pub fn create_checkout_session(&self, order: &Order) -> Result<CheckoutSession> {
        let id = format!("cs_sim_{}", Uuid::new_v4().as_simple());
        self.lock()?.insert(
            id.clone(),
            SimulatedSession {
                order_id: order.id.clone(),
                paid: false,
                payment_intent: None,
            },
        );
        Ok(CheckoutSession {
            url: format!("{}/dev/checkout/{}", self.base_url, id),
            id,
        })
    }

    pub fn retrieve_checkout_session(&self, session_id: &str) -> Result<Option<CheckoutSessionStatus>> {
        Ok(self.lock()?.get(session_id).map(|s| CheckoutSessionStatus {
            id: session_id.to_string(),
            payment_status: if s.paid { "paid" } else { "unpaid" }.to_string(),
            payment_intent: s.payment_intent.clone(),
            order_id: Some(s.order_id.clone()),
        }))
    }

    /// Mark a session paid. Returns the order id, or None for unknown sessions.
    /// Paying twice keeps the first payment intent.
    pub fn mark_paid(&self, session_id: &str) -> Result<Option<String>> {
        let mut sessions = self.lock()?;
        let Some(session) = sessions.get_mut(session_id) else {
            return Ok(None);
        };
        if !session.paid {
            session.paid = true;
            session.payment_intent = Some(format!("pi_sim_{}", Uuid::new_v4().as_simple()));
        }
        Ok(Some(session.order_id.clone()))
    }
}

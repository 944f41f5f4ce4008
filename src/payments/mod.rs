mod simulated;
mod stripe;

pub use simulated::*;
pub use stripe::*;

use serde::Serialize;

use crate::error::Result;
use crate::models::Order;

/// A freshly opened checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Gateway view of an existing checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSessionStatus {
    pub id: String,
    /// Stripe vocabulary: "paid", "unpaid" or "no_payment_required".
    pub payment_status: String,
    pub payment_intent: Option<String>,
    pub order_id: Option<String>,
}

impl CheckoutSessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Where checkout sessions are opened.
#[derive(Debug, Clone)]
pub enum CheckoutGateway {
    Stripe(StripeClient),
    Simulated(SimulatedCheckout),
}

impl CheckoutGateway {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stripe(_) => "stripe",
            Self::Simulated(_) => "simulated",
        }
    }

    /// Open a checkout session for an order. `base_url` builds the return URLs.
    pub async fn create_checkout_session(
        &self,
        order: &Order,
        base_url: &str,
    ) -> Result<CheckoutSession> {
        match self {
            Self::Stripe(client) => {
                let success_url = format!(
                    "{}/orders/{}?session_id={{CHECKOUT_SESSION_ID}}",
                    base_url, order.id
                );
                let cancel_url = format!("{}/order?cancelled={}", base_url, order.id);
                client
                    .create_checkout_session(order, &success_url, &cancel_url)
                    .await
            }
            Self::Simulated(sim) => sim.create_checkout_session(order),
        }
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionStatus>> {
        match self {
            Self::Stripe(client) => client.retrieve_checkout_session(session_id).await,
            Self::Simulated(sim) => sim.retrieve_checkout_session(session_id),
        }
    }

    pub fn simulated(&self) -> Option<&SimulatedCheckout> {
        match self {
            Self::Simulated(sim) => Some(sim),
            Self::Stripe(_) => None,
        }
    }
}

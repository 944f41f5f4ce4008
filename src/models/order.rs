use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{FieldError, msg};
use crate::pricing::{Complexity, Feature, Timeline};

use super::is_valid_email;

/// Order lifecycle state.
///
/// Happy path: `pending_payment → paid → building → completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Building,
    Completed,
    PaymentFailed,
    BuildFailed,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    /// No transition ever leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Paid)
                | (PendingPayment, PaymentFailed)
                | (PendingPayment, Cancelled)
                | (Paid, Building)
                | (Paid, Cancelled)
                | (Paid, Refunded)
                | (Building, Completed)
                | (Building, BuildFailed)
                | (Building, Refunded)
                | (BuildFailed, Building)
                | (BuildFailed, Refunded)
                | (PaymentFailed, Cancelled)
        )
    }

    /// States that may move into `next`. Used to guard store updates.
    pub fn sources_for(next: OrderStatus) -> Vec<OrderStatus> {
        ALL_STATUSES
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// True once payment has been captured (and not given back).
    pub fn is_paid_or_later(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Building | Self::Completed | Self::BuildFailed
        )
    }
}

pub const ALL_STATUSES: [OrderStatus; 8] = [
    OrderStatus::PendingPayment,
    OrderStatus::Paid,
    OrderStatus::Building,
    OrderStatus::Completed,
    OrderStatus::PaymentFailed,
    OrderStatus::BuildFailed,
    OrderStatus::Refunded,
    OrderStatus::Cancelled,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppType {
    Web,
    Mobile,
    Desktop,
    Api,
    Fullstack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryMethod {
    Github,
    Zip,
    Deployed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub progress: i64,
    pub current_stage: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub app_name: String,
    pub app_description: String,
    pub app_type: AppType,
    pub platforms: Vec<String>,
    pub complexity: Complexity,
    pub timeline: Timeline,
    pub features: Vec<Feature>,
    pub design_style: Option<String>,
    pub color_scheme: Option<String>,
    pub integrations: Vec<String>,
    pub reference_urls: Vec<String>,
    pub delivery_method: DeliveryMethod,
    pub github_username: Option<String>,
    pub subdomain: Option<String>,
    pub additional_notes: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub delivery_url: Option<String>,
    pub admin_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub paid_at: Option<i64>,
    pub build_started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub failed_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    pub refunded_at: Option<i64>,
}

/// Order plus its build log, for detail views.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLogs {
    #[serde(flatten)]
    pub order: Order,
    pub build_logs: Vec<String>,
}

/// The customer-facing order form payload.
///
/// Enumerated fields arrive as strings so every problem can be reported
/// in one response instead of failing on the first unknown value.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub app_description: String,
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub design_style: Option<String>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    #[serde(default)]
    pub integrations: Vec<String>,
    #[serde(default)]
    pub reference_urls: Vec<String>,
    #[serde(default)]
    pub delivery_method: String,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    /// Client-computed price in dollars.
    #[serde(default)]
    pub price: Option<f64>,
}

/// A validated order form, ready for pricing and storage.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub app_name: String,
    pub app_description: String,
    pub app_type: AppType,
    pub platforms: Vec<String>,
    pub complexity: Complexity,
    pub timeline: Timeline,
    pub features: Vec<Feature>,
    pub design_style: Option<String>,
    pub color_scheme: Option<String>,
    pub integrations: Vec<String>,
    pub reference_urls: Vec<String>,
    pub delivery_method: DeliveryMethod,
    pub github_username: Option<String>,
    pub subdomain: Option<String>,
    pub additional_notes: Option<String>,
    pub client_price: f64,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_field<T: std::str::FromStr>(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    what: &str,
) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{} is required", what)));
        return None;
    }
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(FieldError::new(field, format!("Unknown {}: {}", what.to_lowercase(), value)));
            None
        }
    }
}

/// DNS label: lowercase alphanumerics and hyphens, 3-63 chars, no edge hyphens.
pub fn is_valid_subdomain(s: &str) -> bool {
    (3..=63).contains(&s.len())
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

impl CreateOrderRequest {
    /// Check every field and collect all problems.
    pub fn validate(&self) -> Result<NewOrder, Vec<FieldError>> {
        let mut errors = Vec::new();

        let customer_name = self.customer_name.trim().to_string();
        if customer_name.is_empty() {
            errors.push(FieldError::new("customer_name", msg::NAME_EMPTY));
        } else if customer_name.chars().count() > 100 {
            errors.push(FieldError::new("customer_name", "Name must be at most 100 characters"));
        }

        let customer_email = self.customer_email.trim().to_lowercase();
        if !is_valid_email(&customer_email) {
            errors.push(FieldError::new("customer_email", msg::INVALID_EMAIL_FORMAT));
        }

        let app_name = self.app_name.trim().to_string();
        if app_name.is_empty() {
            errors.push(FieldError::new("app_name", "App name is required"));
        } else if app_name.chars().count() > 100 {
            errors.push(FieldError::new("app_name", "App name must be at most 100 characters"));
        }

        let app_description = self.app_description.trim().to_string();
        if app_description.chars().count() < 10 {
            errors.push(FieldError::new(
                "app_description",
                "Description must be at least 10 characters",
            ));
        }

        let app_type = parse_field::<AppType>(&mut errors, "app_type", &self.app_type, "App type");
        let complexity =
            parse_field::<Complexity>(&mut errors, "complexity", &self.complexity, "Complexity");
        let timeline = parse_field::<Timeline>(&mut errors, "timeline", &self.timeline, "Timeline");
        let delivery_method = parse_field::<DeliveryMethod>(
            &mut errors,
            "delivery_method",
            &self.delivery_method,
            "Delivery method",
        );

        let mut features = Vec::with_capacity(self.features.len());
        for (i, raw) in self.features.iter().enumerate() {
            match raw.trim().parse::<Feature>() {
                Ok(f) if !features.contains(&f) => features.push(f),
                Ok(_) => {}
                Err(_) => errors.push(FieldError::new(
                    format!("features[{}]", i),
                    format!("Unknown feature: {}", raw),
                )),
            }
        }

        let github_username = trimmed(&self.github_username);
        if delivery_method == Some(DeliveryMethod::Github) && github_username.is_none() {
            errors.push(FieldError::new(
                "github_username",
                "GitHub username is required for GitHub delivery",
            ));
        }

        let subdomain = trimmed(&self.subdomain).map(|s| s.to_lowercase());
        if let Some(ref s) = subdomain
            && !is_valid_subdomain(s)
        {
            errors.push(FieldError::new(
                "subdomain",
                "Subdomain must be 3-63 characters of a-z, 0-9 and '-'",
            ));
        }

        let client_price = match self.price {
            Some(p) if p.is_finite() && p > 0.0 => Some(p),
            Some(_) => {
                errors.push(FieldError::new("price", "Price must be a positive number"));
                None
            }
            None => {
                errors.push(FieldError::new("price", "Price is required"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        // All parsed options are Some when no errors were recorded.
        match (app_type, complexity, timeline, delivery_method, client_price) {
            (Some(app_type), Some(complexity), Some(timeline), Some(delivery_method), Some(client_price)) => {
                Ok(NewOrder {
                    customer_name,
                    customer_email,
                    company: trimmed(&self.company),
                    phone: trimmed(&self.phone),
                    app_name,
                    app_description,
                    app_type,
                    platforms: clean_list(&self.platforms),
                    complexity,
                    timeline,
                    features,
                    design_style: trimmed(&self.design_style),
                    color_scheme: trimmed(&self.color_scheme),
                    integrations: clean_list(&self.integrations),
                    reference_urls: clean_list(&self.reference_urls),
                    delivery_method,
                    github_username,
                    subdomain,
                    additional_notes: trimmed(&self.additional_notes),
                    client_price,
                })
            }
            _ => Err(vec![FieldError::new("request", msg::VALIDATION_FAILED)]),
        }
    }
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// Admin filter for order listings.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "Ada Lovelace".into(),
            customer_email: "ada@example.com".into(),
            company: None,
            phone: None,
            app_name: "Recipe Box".into(),
            app_description: "A place to store family recipes".into(),
            app_type: "web".into(),
            platforms: vec!["browser".into()],
            complexity: "simple".into(),
            timeline: "1w".into(),
            features: vec![],
            design_style: None,
            color_scheme: None,
            integrations: vec![],
            reference_urls: vec![],
            delivery_method: "zip".into(),
            github_username: None,
            subdomain: None,
            additional_notes: None,
            price: Some(1500.0),
        }
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(terminal.is_terminal());
            for next in ALL_STATUSES {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} -> {:?} should be rejected",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Building));
        assert!(OrderStatus::Building.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::PendingPayment.can_transition_to(OrderStatus::Building));
        assert!(!OrderStatus::Building.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_side_exits() {
        assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::PaymentFailed));
        assert!(OrderStatus::Building.can_transition_to(OrderStatus::BuildFailed));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!OrderStatus::PendingPayment.can_transition_to(OrderStatus::BuildFailed));
    }

    #[test]
    fn test_sources_for_paid_is_only_pending() {
        assert_eq!(
            OrderStatus::sources_for(OrderStatus::Paid),
            vec![OrderStatus::PendingPayment]
        );
        assert_eq!(
            OrderStatus::sources_for(OrderStatus::Building),
            vec![OrderStatus::Paid, OrderStatus::BuildFailed]
        );
    }

    #[test]
    fn test_status_string_round_trip() {
        assert_eq!(OrderStatus::PendingPayment.as_ref(), "pending_payment");
        assert_eq!("build_failed".parse::<OrderStatus>().unwrap(), OrderStatus::BuildFailed);
    }

    #[test]
    fn test_valid_request_passes() {
        let order = valid_request().validate().expect("should validate");
        assert_eq!(order.complexity, Complexity::Simple);
        assert_eq!(order.timeline, Timeline::OneWeek);
        assert_eq!(order.delivery_method, DeliveryMethod::Zip);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut req = valid_request();
        req.customer_name = "  ".into();
        req.customer_email = "not-an-email".into();
        req.complexity = "galactic".into();
        req.features = vec!["payments".into(), "teleport".into()];
        req.price = None;

        let errors = req.validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"customer_name"));
        assert!(fields.contains(&"customer_email"));
        assert!(fields.contains(&"complexity"));
        assert!(fields.contains(&"features[1]"));
        assert!(fields.contains(&"price"));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_github_delivery_requires_username() {
        let mut req = valid_request();
        req.delivery_method = "github".into();
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "github_username");

        req.github_username = Some("ada".into());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_subdomain_rules() {
        assert!(is_valid_subdomain("recipes"));
        assert!(is_valid_subdomain("my-app-2"));
        assert!(!is_valid_subdomain("ab"));
        assert!(!is_valid_subdomain("-edge"));
        assert!(!is_valid_subdomain("edge-"));
        assert!(!is_valid_subdomain("has_underscore"));
    }
}

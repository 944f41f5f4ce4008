//! Delivery URL synthesis for finished builds.

use serde::Serialize;

use crate::config::DeliveryConfig;
use crate::models::{DeliveryMethod, Order};

const MAX_SLUG_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryUrls {
    pub delivery_url: String,
    pub admin_url: Option<String>,
}

/// URL-safe slug: lowercase alphanumerics separated by single hyphens.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    out.truncate(MAX_SLUG_LEN);
    let out = out.trim_end_matches('-');
    if out.is_empty() {
        "app".to_string()
    } else {
        out.to_string()
    }
}

/// Last six characters of the id's hex tail, used to keep hostnames unique.
fn short_id(id: &str) -> &str {
    let start = id.len().saturating_sub(6);
    id.get(start..).unwrap_or(id)
}

/// Where a completed order is delivered. Deterministic for a given order.
pub fn delivery_urls(order: &Order, config: &DeliveryConfig, base_url: &str) -> DeliveryUrls {
    match order.delivery_method {
        DeliveryMethod::Github => {
            let owner = order
                .github_username
                .as_deref()
                .unwrap_or(&config.github_org);
            DeliveryUrls {
                delivery_url: format!("https://github.com/{}/{}", owner, slug(&order.app_name)),
                admin_url: None,
            }
        }
        DeliveryMethod::Zip => DeliveryUrls {
            delivery_url: format!(
                "{}/api/downloads/{}",
                base_url.trim_end_matches('/'),
                order.id
            ),
            admin_url: None,
        },
        DeliveryMethod::Deployed => {
            let host = match order.subdomain.as_deref() {
                Some(sub) => sub.to_string(),
                None => format!("{}-{}", slug(&order.app_name), short_id(&order.id)),
            };
            let url = format!("https://{}.{}", host, config.deploy_domain);
            DeliveryUrls {
                admin_url: Some(format!("{}/admin", url)),
                delivery_url: url,
            }
        }
    }
}

//! Order pricing.
//!
//! The order form computes a price client-side; the server recomputes it
//! with the same table and rejects the order when the two disagree by more
//! than one cent.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Maximum allowed difference between client and server price, in dollars.
pub const PRICE_TOLERANCE: f64 = 0.01;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
    Enterprise,
}

impl Complexity {
    /// Base price in dollars.
    pub fn base_price(&self) -> f64 {
        match self {
            Self::Simple => 1500.0,
            Self::Medium => 3500.0,
            Self::Complex => 7500.0,
            Self::Enterprise => 15000.0,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
pub enum Timeline {
    #[serde(rename = "3d")]
    #[strum(serialize = "3d")]
    Rush,
    #[serde(rename = "1w")]
    #[strum(serialize = "1w")]
    OneWeek,
    #[serde(rename = "2w")]
    #[strum(serialize = "2w")]
    TwoWeeks,
    #[serde(rename = "1m")]
    #[strum(serialize = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    #[strum(serialize = "3m")]
    ThreeMonths,
}

impl Timeline {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Rush => 1.5,
            Self::OneWeek => 1.0,
            Self::TwoWeeks => 0.95,
            Self::OneMonth => 0.9,
            Self::ThreeMonths => 0.85,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Authentication,
    Payments,
    AdminPanel,
    ApiIntegration,
    RealTime,
    Analytics,
    Notifications,
    FileUpload,
    Search,
    MultiLanguage,
    OfflineMode,
    AiFeatures,
}

impl Feature {
    /// Add-on price in dollars.
    pub fn price(&self) -> f64 {
        match self {
            Self::Authentication => 500.0,
            Self::Payments => 800.0,
            Self::AdminPanel => 1000.0,
            Self::ApiIntegration => 600.0,
            Self::RealTime => 900.0,
            Self::Analytics => 400.0,
            Self::Notifications => 300.0,
            Self::FileUpload => 350.0,
            Self::Search => 450.0,
            Self::MultiLanguage => 550.0,
            Self::OfflineMode => 700.0,
            Self::AiFeatures => 1200.0,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price in dollars for the given selection. Duplicate features count once.
pub fn calculate_price(complexity: Complexity, timeline: Timeline, features: &[Feature]) -> f64 {
    let mut seen = Vec::with_capacity(features.len());
    let mut add_ons = 0.0;
    for feature in features {
        if !seen.contains(feature) {
            seen.push(*feature);
            add_ons += feature.price();
        }
    }
    round2((complexity.base_price() + add_ons) * timeline.multiplier())
}

pub fn prices_match(server: f64, client: f64) -> bool {
    (server - client).abs() <= PRICE_TOLERANCE + f64::EPSILON
}

pub fn to_cents(dollars: f64) -> i64 {
    (dollars * 100.0).round() as i64
}

//! AppForge - order intake, payment and simulated build pipeline for custom apps
//!
//! Customers price and order an application, pay through Stripe (or a
//! simulated checkout in dev), and watch a staged build run to delivery.
//! Admins manage orders, customers and delivered apps through a session-
//! authenticated JSON API.

pub mod build;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod pricing;
pub mod rate_limit;
pub mod util;

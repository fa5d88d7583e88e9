//! Merchant-facing payment gateway aggregator: one HTTP contract in front of
//! many upstream payment providers.
//!
//! # Overview
//!
//! A merchant calls `POST /api/v1/payments/initialize` once; the gateway
//! routes the call to the right provider adapter, persists a canonical
//! `Transaction`, and reconciles the upstream's final status either by a
//! later `verify` call or by a provider-pushed webhook.
//!
//! # Modules
//!
//! - [`config`] — server configuration (`clap`-derived CLI args, env-var
//!   fallback).
//! - [`state`] — `AppState`: the wired-up core services and provider
//!   registry shared across every handler.
//! - [`auth`] — the `X-API-Key` extractor every merchant endpoint sits
//!   behind.
//! - [`audit_context`] — builds the per-request `AuditContext` (client IP,
//!   user agent, authenticated account id) recorded on every audit write.
//! - [`errors`] — `GatewayError` → HTTP status mapping and the response
//!   envelope.
//! - [`handlers`] — the HTTP endpoints themselves.
//! - [`telemetry`] — OpenTelemetry/tracing setup.
//! - [`sig_down`] — graceful shutdown on SIGTERM/SIGINT.
//!
//! The actual domain logic — the state machine, the webhook pipeline, the
//! provider adapters, the crypto primitives — lives in the `paygate-*`
//! library crates this binary depends on; this crate is the thin HTTP shell
//! around them.

pub mod audit_context;
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod sig_down;
pub mod state;
pub mod telemetry;

//! REST client for the freight platform API.
//!
//! [`config::ClientConfig`] reads connection settings from the
//! environment, [`api::ApiClient`] wraps every consumed endpoint and
//! [`orders::OrderService`] drives the operator status-update flow over
//! an [`orders::OrderBackend`].

pub mod api;
pub mod config;
pub mod orders;

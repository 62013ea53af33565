//! Prickly Pear Core - Shared types library.
//!
//! This crate provides the domain types used across the Prickly Pear cart
//! engine:
//! - `cart` - the cart state engine (versioned cache, hydration, persistence)
//! - the embedding storefront UI, which consumes cart/summary projections
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no timers.
//! Everything here is plain data with validation, so it can be serialized
//! into durable client storage and shipped across the order-service wire
//! format without pulling in the engine's runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money, and tokens, plus
//!   the cart/identity/summary domain model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

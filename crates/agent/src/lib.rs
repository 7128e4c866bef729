//! Order Intake - turning free-form installer speak into structured orders
//!
//! This crate is the "brain" of the smeta bot. It takes a foreman's message
//! ("Ivan, Tver 0.8, sandy soil, about 15 meters of pipe, we'll need to
//! drill the foundation") and produces a structured `Order` the estimate
//! builder can price.
//!
//! # Architecture
//!
//! Two extraction strategies sit behind the `OrderExtractor` trait:
//! 1. **LLM extraction** (`extract`) - the primary strategy; a chat
//!    completion with a fixed instruction set returns Order-schema JSON.
//! 2. **Rule-based extraction** (`fallback`) - keyword and token rules,
//!    used when the LLM is unconfigured or fails. Fresh orders only.
//!
//! `OrderIntake` (`intake`) selects between them by availability, never by
//! exception-driven control flow, and applies corrections as field-level
//! patches.
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. It never invents prices for catalog
//! services and never computes totals; pricing is the deterministic job of
//! `smeta-core::estimate`.

pub mod extract;
pub mod fallback;
pub mod intake;
pub mod llm;

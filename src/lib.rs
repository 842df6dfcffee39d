#![doc = "deckgen: generation and export orchestration for slide decks."]

//! This crate holds the asynchronous core of the deck editor: the slide store,
//! generation task tracking with model fallback, and the capture/export pipeline.
//! Presentation concerns (layout, theming, forms) live elsewhere and only meet
//! this crate through the traits in [`contract`].
//!
//! # Usage
//! Build a [`store::SlideStore`], hand it to a [`generation::GenerationService`]
//! together with a [`contract::GenerationClient`], and drive exports through an
//! [`export::ExportCoordinator`].

pub mod capture;
pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod fallback;
pub mod generation;
pub mod persistence;
pub mod render;
pub mod slide;
pub mod store;
pub mod tracker;

pub use config::OrchestrationConfig;
pub use slide::{SlideId, SlideRecord};
pub use store::SlideStore;

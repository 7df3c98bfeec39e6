/*!
 * # lingodoc
 *
 * An async Rust client library for remote machine-translation services.
 *
 * ## Features
 *
 * - Text translation with typed results
 * - Document translation: upload, cancellable poll-until-done, download
 * - Resilient request pipeline with exponential backoff and jitter
 * - Archive minification for oversized office documents (strip embedded
 *   media before upload, restore it after translation)
 * - Glossary management with local entry validation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `client`: The `Translator` client, configuration and text endpoints
 * - `document`: Document translation workflow and its wire models
 * - `pipeline`: Retrying request pipeline and status-code mapping
 * - `retry`: Retry policy and backoff schedule
 * - `minifier`: Archive minification for oversized documents
 * - `glossary`: Glossary entry table and delimited codec
 * - `errors`: Custom error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod client;
pub mod document;
pub mod errors;
pub mod glossary;
pub mod minifier;
pub mod retry;

pub(crate) mod pipeline;

// Re-export main types for easier usage
pub use client::{TextOptions, TextTranslation, Translator, TranslatorConfig, Usage};
pub use document::{DocumentHandle, DocumentOptions, DocumentState, DocumentStatus};
pub use errors::{DocumentError, GlossaryError, MinifyError, TranslationError};
pub use glossary::GlossaryEntries;
pub use minifier::DocumentMinifier;
pub use retry::RetryPolicy;

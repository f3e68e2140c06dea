//! Pipeline stages for slide-to-PDF assembly.
//!
//! Each submodule implements one step; the orchestration that strings them
//! together lives in [`crate::convert`] and [`crate::stream`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ segment ──▶ fetch ──▶ normalize ──▶ layout ──▶ assemble
//! (base URL) (split)    (HTTP)    (decode/JPEG)  (fit)      (lopdf worker)
//! ```
//!
//! 1. [`input`]    : the slide set: base URL, page count, file name
//! 2. [`segment`]  : partition the pages into documents of bounded size
//! 3. [`fetch`]    : download slides with a concurrency limit; result
//!    order follows request order
//! 4. [`normalize`]: decode and re-encode each slide; runs in
//!    `spawn_blocking` because it is CPU-bound
//! 5. [`layout`]   : page box from the first slide, fit-and-centre for the
//!    rest
//! 6. [`assemble`] : build one PDF per segment on a dedicated worker thread

pub mod assemble;
pub mod fetch;
pub mod input;
pub mod layout;
pub mod normalize;
pub mod segment;

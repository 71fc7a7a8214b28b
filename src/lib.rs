#![deny(unsafe_code)]
//! `conduit-core`: a strongly-typed, push-based reactive dataflow graph.
//!
//! # 设计背景（Why）
//! Producers emit [`item::Item`] values terminated by at most one
//! [`item::EndReason`]; processors transform them; subscribers observe
//! them. Every node is bound to an [`exec::ExecContext`] that guarantees
//! per-node serialization without requiring the handler itself to
//! suspend — see §5 of the design notes in `SPEC_FULL.md` for the full
//! concurrency model this crate implements.
//!
//! # 模块总览（What）
//! - [`item`] / [`error`]: the wire data model and error taxonomy.
//! - [`activation`]: per-node generation counters and the replayable
//!   caches a [`node::multi::Multi`] maintains across them.
//! - [`exec`] / [`time`]: the execution and clock capability abstractions.
//! - [`node`]: the concrete node kinds — producers (`Generator`,
//!   `Preclosed`, `Interval`, `Timer`), processors (`Transform`,
//!   `Combine2..5`, `MergedInput`), multi-output broadcast (`Multi`),
//!   rewiring primitives (`Junction`, `Capture`), and sinks
//!   (`Subscriber`, `SignalLatest`, `peek`).
//! - [`operators`]: `retry`/`zip`, built on the node kinds above rather
//!   than being primitive themselves.
//! - [`prelude`]: a curated, shallow-path import surface.

pub mod activation;
pub mod error;
pub mod exec;
pub mod item;
pub mod node;
pub mod operators;
pub mod time;

pub mod prelude;

//! eddyscan: portable Eddystone beacon scan engine.
//!
//! Runs bounded-duration BLE discovery windows, keeps one aggregate record
//! per beacon address and decodes Eddystone UID/URL/TLM/EID frames. The
//! crate is `no_std` with no allocator; the BLE stack is plugged in through
//! the [`scanner::BleRadio`] and [`scanner::AdvertisementHandler`] traits and
//! results leave as NDJSON lines ([`protocol`]).
//!
//! - `scanner`: radio traits, advertisement model, AD-structure parser
//! - `filter`: acceptance filter and per-advertisement routing
//! - `frame`: Eddystone frame decoding
//! - `record`: per-device aggregate
//! - `session`: scan state machine and result snapshot
//! - `protocol`: JSON output messages
//! - `trouble` (feature `trouble`): trouble-host `EventHandler` bridge

#![cfg_attr(not(test), no_std)]

pub mod defaults;
pub mod filter;
pub mod frame;
pub mod protocol;
pub mod record;
pub mod scanner;
pub mod session;

#[cfg(feature = "trouble")]
pub mod trouble;

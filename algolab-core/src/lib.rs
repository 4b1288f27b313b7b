//! AlgoLab Core: domain types, indicators, signal functions, position tracker, bar loop.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (bars, price windows, positions, closed trades, equity points)
//! - Indicator library (SMA, EMA, ATR, RSI, MACD, ADX, VWAP)
//! - Signal-function contract, typed parameter overrides, built-in strategies
//! - Single-position tracker with the ratchet invariant
//! - Bar-by-bar engine loop
//! - Price-history providers (in-memory, CSV, seeded synthetic)

pub mod components;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod position_management;
pub mod rng;

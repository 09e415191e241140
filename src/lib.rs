//! Ratekeeper - Fixed-Window Request Quota Service
//!
//! This crate enforces a per-key request quota: each caller may perform at
//! most `limit` operations per window. Counting happens either in process
//! memory or in a Redis instance shared by many processes, behind the same
//! [`ratelimit::RateLimiter`] trait.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;

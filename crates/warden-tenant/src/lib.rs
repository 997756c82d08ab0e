//! Tenant Governance Core
//!
//! Per-tenant safety rules and consumption quotas across three resource
//! classes (language-model calls, vector-store operations, tool
//! executions), with time-windowed counting and best-effort usage
//! snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     TENANT GOVERNANCE CORE                        │
//! │                                                                   │
//! │   ┌───────────────┐          ┌──────────────────────────────┐    │
//! │   │ LimitResolver │          │        UsageRegistry         │    │
//! │   │ override map  │          │  tenant_id -> TenantUsage    │    │
//! │   │  + defaults   │          │  (tumbling minute/hour/day)  │    │
//! │   └──────┬────────┘          └──────────────┬───────────────┘    │
//! │          │                                  │                    │
//! │   ┌──────▼──────────┐             ┌─────────▼────────┐           │
//! │   │ SafetyEnforcer  │             │  QuotaEnforcer   │           │
//! │   │ per-call rules  │             │ aggregate quotas │           │
//! │   └──────┬──────────┘             └─────────┬────────┘           │
//! │          │       violations + audit         │                    │
//! │          └──────────────┬───────────────────┘                    │
//! │                         ▼                                        │
//! │          caller / incident manager / audit sink                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers invoke `check_*` before an operation, perform it, then invoke
//! `record_*`. The pair is deliberately not atomic: the external call runs
//! outside any lock, so concurrent requests can transiently over-admit by
//! the number of requests in flight at check time.

#![allow(dead_code)]

pub mod context;
pub mod limits;
pub mod model;
pub mod quota;
pub mod safety;
pub mod usage;

pub use context::{GovernanceConfig, GovernanceContext};
pub use limits::LimitResolver;
pub use model::{QuotaLimits, SafetyLimits, TenantTier};
pub use quota::{QuotaEnforcer, QuotaUsage, UsageSummary};
pub use safety::SafetyEnforcer;
pub use usage::{TenantUsage, UsageRegistry, WindowedCounter};

//! # Request Guard
//!
//! 请求守卫：每个工作单元绑定一个 Monitor，捕获下游的所有故障。
//!
//! - [`RequestGuard`]: 与宿主无关的守卫，通过 [`RequestScope`] 取得 Monitor
//! - [`RequestMonitorLayer`]: 基于 tower 的 `http` 中间件
//!
//! 故障只记录一次 (Fatal)，状态码强制为 500；`SwallowErrors` 决定是否继续向上抛出。
//! 取消不是故障：Monitor 以 "Request canceled." 关闭。

pub mod fault;
pub mod guard;
pub mod layer;

pub use fault::{fault_info, unwrap_single, AggregateFault, Canceled};
pub use guard::{
    GuardError, GuardOptions, RequestGuard, RequestOutcome, RequestScope, UnitOfWork,
    REQUEST_CANCELED_REASON, REQUEST_ERROR_REASON, REQUEST_ERROR_TAG, SYNCHRONOUS_ERROR_TEXT,
};
pub use layer::{RequestMonitorLayer, RequestMonitorService};

//! 监控组件 - 健康检查和资源状态轮询

pub mod connectivity;
pub mod resource;

pub use connectivity::{
    ConnectivityHandle, ConnectivityMonitor, ConnectivityStatus, ConnectivityTracker, HealthProbe,
    NetworkSignal, SignalOutcome,
};
pub use resource::{
    ResourceChange, ResourceHandle, ResourceStatus, ResourceStatusMonitor, ResourceTracker,
    StatusSnapshot, StatusSource,
};

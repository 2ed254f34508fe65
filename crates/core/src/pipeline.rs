//! 파이프라인 trait -- 생명주기 확장 포인트 정의

use std::fmt;
use std::future::Future;

use crate::error::GatewatchError;

/// 모듈의 건강 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작은 하지만 일부 기능이 저하됨
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지/헬스 체크 생명주기를 가지는 파이프라인
///
/// 데몬은 이 trait을 통해 수집 파이프라인을 관리합니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), GatewatchError>> + Send;

    /// 파이프라인을 정지하고 보유한 자원을 해제합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), GatewatchError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("1 of 3 workers exited".to_owned()).to_string(),
            "degraded: 1 of 3 workers exited"
        );
    }
}

//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`GatewatchConfig`](gatewatch_core::config::GatewatchConfig)에서
//! 파생되며, 초 단위 정수와 문자열로 된 파일 설정을 `Duration`과 열거형으로 변환합니다.
//!
//! # 사용 예시
//! ```ignore
//! use gatewatch_core::config::GatewatchConfig;
//! use gatewatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = GatewatchConfig::load("gatewatch.toml").await?;
//! let config = PipelineConfig::from_core(&core_config)?;
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gatewatch_core::config::GatewatchConfig;

use crate::alert::DEFAULT_ALERT_TITLE;
use crate::dedup::DedupCacheConfig;
use crate::dispatch::{DispatcherConfig, EndpointSelection};
use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 구독할 토픽
    pub topic: String,
    /// 중복 제거 캐시 설정
    pub cache: DedupCacheConfig,
    /// 알림 전송 설정
    pub dispatch: DispatcherConfig,
    /// 알림에 포함할 멘션 대상
    pub mention: String,
    /// 알림 제목
    pub alert_title: String,
    /// 정지 시 워커 종료를 기다리는 최대 시간
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic: "nginx-access".to_owned(),
            cache: DedupCacheConfig::default(),
            dispatch: DispatcherConfig::default(),
            mention: String::new(),
            alert_title: DEFAULT_ALERT_TITLE.to_owned(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// 선택 전략 문자열이 알 수 없는 값이면 에러를 반환합니다.
    pub fn from_core(core: &GatewatchConfig) -> Result<Self, LogPipelineError> {
        Ok(Self {
            topic: core.source.topic.clone(),
            cache: DedupCacheConfig {
                shards: core.cache.shards,
                ttl: Duration::from_secs(core.cache.ttl_secs),
                clean_interval: Duration::from_secs(core.cache.clean_interval_secs),
                max_entry_size: core.cache.max_entry_size,
                max_entries_per_shard: core.cache.max_entries_per_shard,
            },
            dispatch: DispatcherConfig {
                endpoints: core.dispatch.endpoints.clone(),
                selection: EndpointSelection::parse(&core.dispatch.selection)?,
                timeout: Duration::from_secs(core.dispatch.timeout_secs),
                max_retries: core.dispatch.max_retries,
            },
            mention: core.dispatch.mention.clone(),
            alert_title: core.dispatch.alert_title.clone(),
            ..Self::default()
        })
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(300);

        if self.topic.is_empty() {
            return Err(LogPipelineError::Config {
                field: "source.topic".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.shutdown_timeout.is_zero() || self.shutdown_timeout > MAX_SHUTDOWN_TIMEOUT {
            return Err(LogPipelineError::Config {
                field: "shutdown_timeout".to_owned(),
                reason: format!("must be 1-{}s", MAX_SHUTDOWN_TIMEOUT.as_secs()),
            });
        }

        self.cache.validate()?;
        self.dispatch.validate()?;
        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 토픽을 설정합니다.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.config.topic = topic.into();
        self
    }

    /// 웹훅 엔드포인트 목록을 설정합니다.
    pub fn endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.dispatch.endpoints = endpoints;
        self
    }

    /// 엔드포인트 선택 전략을 설정합니다.
    pub fn selection(mut self, selection: EndpointSelection) -> Self {
        self.config.dispatch.selection = selection;
        self
    }

    /// 전송 타임아웃을 설정합니다.
    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatch.timeout = timeout;
        self
    }

    /// 최대 재시도 횟수를 설정합니다.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.dispatch.max_retries = retries;
        self
    }

    /// 멘션 대상을 설정합니다.
    pub fn mention(mut self, mention: impl Into<String>) -> Self {
        self.config.mention = mention.into();
        self
    }

    /// 알림 제목을 설정합니다.
    pub fn alert_title(mut self, title: impl Into<String>) -> Self {
        self.config.alert_title = title.into();
        self
    }

    /// 캐시 설정을 지정합니다.
    pub fn cache(mut self, cache: DedupCacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// 캐시 TTL을 설정합니다.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.ttl = ttl;
        self
    }

    /// 캐시 엔트리 최대 크기를 설정합니다.
    pub fn max_entry_size(mut self, size: usize) -> Self {
        self.config.cache.max_entry_size = size;
        self
    }

    /// 정지 대기 시간을 설정합니다.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Vec<String> {
        vec![
            "https://hook.test/a".to_owned(),
            "https://hook.test/b".to_owned(),
        ]
    }

    #[test]
    fn default_config_needs_endpoints() {
        let err = PipelineConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("dispatch.endpoints"));
    }

    #[test]
    fn from_core_converts_units_and_selection() {
        let mut core = GatewatchConfig::default();
        core.source.topic = "gw-logs".to_owned();
        core.cache.ttl_secs = 120;
        core.cache.shards = 4;
        core.dispatch.endpoints = endpoints();
        core.dispatch.selection = "all".to_owned();
        core.dispatch.timeout_secs = 3;
        core.dispatch.max_retries = 2;
        core.dispatch.mention = "13800000000".to_owned();

        let config = PipelineConfig::from_core(&core).unwrap();
        assert_eq!(config.topic, "gw-logs");
        assert_eq!(config.cache.ttl, Duration::from_secs(120));
        assert_eq!(config.cache.shards, 4);
        assert_eq!(config.dispatch.selection, EndpointSelection::All);
        assert_eq!(config.dispatch.timeout, Duration::from_secs(3));
        assert_eq!(config.dispatch.max_retries, 2);
        assert_eq!(config.mention, "13800000000");
        assert_eq!(config.alert_title, DEFAULT_ALERT_TITLE);
        // core에 없는 필드는 기본값
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn from_core_rejects_unknown_selection() {
        let mut core = GatewatchConfig::default();
        core.dispatch.selection = "random".to_owned();
        assert!(PipelineConfig::from_core(&core).is_err());
    }

    #[test]
    fn validate_rejects_empty_topic() {
        let config = PipelineConfig {
            topic: String::new(),
            ..PipelineConfigBuilder::new().endpoints(endpoints()).build().unwrap()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .topic("edge-logs")
            .endpoints(endpoints())
            .selection(EndpointSelection::All)
            .max_retries(1)
            .cache_ttl(Duration::from_secs(30))
            .alert_title("[edge]")
            .build()
            .unwrap();
        assert_eq!(config.topic, "edge-logs");
        assert_eq!(config.dispatch.max_retries, 1);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.alert_title, "[edge]");
    }

    #[test]
    fn builder_rejects_single_endpoint_with_all_but_last() {
        let result = PipelineConfigBuilder::new()
            .endpoints(vec!["https://hook.test/a".to_owned()])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_invalid_cache() {
        let result = PipelineConfigBuilder::new()
            .endpoints(endpoints())
            .cache_ttl(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }
}

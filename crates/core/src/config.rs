//! 설정 관리 -- gatewatch.toml 파싱 및 런타임 설정
//!
//! [`GatewatchConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`GATEWATCH_SOURCE_TOPIC=nginx-access` 형식)
//! 3. 설정 파일 (`gatewatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), gatewatch_core::error::GatewatchError> {
//! use gatewatch_core::config::GatewatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GatewatchConfig::load("gatewatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GatewatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GatewatchError};

/// 엔드포인트 선택 전략: 마지막 엔드포인트를 제외하고 균등 선택
pub const SELECTION_ALL_BUT_LAST: &str = "all_but_last";

/// 엔드포인트 선택 전략: 전체 엔드포인트에서 균등 선택
pub const SELECTION_ALL: &str = "all";

/// gatewatch 통합 설정
///
/// `gatewatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메시지 소스(Kafka) 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 중복 제거 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 알림 전송 설정
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl GatewatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GatewatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GatewatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GatewatchError> {
        toml::from_str(toml_str).map_err(|e| {
            GatewatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GATEWATCH_{SECTION}_{FIELD}`, 목록은 쉼표 구분.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GATEWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GATEWATCH_GENERAL_LOG_FORMAT");

        // Source
        override_csv(&mut self.source.brokers, "GATEWATCH_SOURCE_BROKERS");
        override_string(&mut self.source.topic, "GATEWATCH_SOURCE_TOPIC");
        override_string(&mut self.source.client_id, "GATEWATCH_SOURCE_CLIENT_ID");
        override_usize(
            &mut self.source.channel_capacity,
            "GATEWATCH_SOURCE_CHANNEL_CAPACITY",
        );
        override_u64(&mut self.source.max_wait_ms, "GATEWATCH_SOURCE_MAX_WAIT_MS");
        override_u64(
            &mut self.source.connect_timeout_secs,
            "GATEWATCH_SOURCE_CONNECT_TIMEOUT_SECS",
        );

        // Cache
        override_usize(&mut self.cache.shards, "GATEWATCH_CACHE_SHARDS");
        override_u64(&mut self.cache.ttl_secs, "GATEWATCH_CACHE_TTL_SECS");
        override_u64(
            &mut self.cache.clean_interval_secs,
            "GATEWATCH_CACHE_CLEAN_INTERVAL_SECS",
        );
        override_usize(
            &mut self.cache.max_entry_size,
            "GATEWATCH_CACHE_MAX_ENTRY_SIZE",
        );
        override_usize(
            &mut self.cache.max_entries_per_shard,
            "GATEWATCH_CACHE_MAX_ENTRIES_PER_SHARD",
        );

        // Dispatch
        override_csv(&mut self.dispatch.endpoints, "GATEWATCH_DISPATCH_ENDPOINTS");
        override_string(&mut self.dispatch.mention, "GATEWATCH_DISPATCH_MENTION");
        override_string(&mut self.dispatch.selection, "GATEWATCH_DISPATCH_SELECTION");
        override_u64(
            &mut self.dispatch.timeout_secs,
            "GATEWATCH_DISPATCH_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.dispatch.max_retries,
            "GATEWATCH_DISPATCH_MAX_RETRIES",
        );
        override_string(
            &mut self.dispatch.alert_title,
            "GATEWATCH_DISPATCH_ALERT_TITLE",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "GATEWATCH_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "GATEWATCH_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "GATEWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 숫자 범위 검증은 파이프라인 설정(`PipelineConfig::validate`)에서 수행합니다.
    pub fn validate(&self) -> Result<(), GatewatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.source.brokers.is_empty() || self.source.brokers.iter().any(|b| b.is_empty()) {
            return Err(invalid(
                "source.brokers",
                "at least one non-empty broker address is required",
            ));
        }

        if self.source.topic.is_empty() {
            return Err(invalid("source.topic", "topic must not be empty"));
        }

        if self.source.connect_timeout_secs == 0 || self.source.connect_timeout_secs > 300 {
            return Err(invalid("source.connect_timeout_secs", "must be 1-300"));
        }

        if self.dispatch.endpoints.iter().any(|e| e.is_empty()) {
            return Err(invalid("dispatch.endpoints", "endpoint URL must not be empty"));
        }

        match self.dispatch.selection.as_str() {
            SELECTION_ALL_BUT_LAST => {
                if self.dispatch.endpoints.len() < 2 {
                    return Err(invalid(
                        "dispatch.endpoints",
                        "selection 'all_but_last' needs at least 2 endpoints",
                    ));
                }
            }
            SELECTION_ALL => {
                if self.dispatch.endpoints.is_empty() {
                    return Err(invalid(
                        "dispatch.endpoints",
                        "at least one endpoint is required",
                    ));
                }
            }
            other => {
                return Err(invalid(
                    "dispatch.selection",
                    format!(
                        "unknown selection '{other}', expected '{SELECTION_ALL_BUT_LAST}' or '{SELECTION_ALL}'"
                    ),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is currently supported",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> GatewatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 메시지 소스(Kafka) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 부트스트랩 브로커 주소 목록 (`host:port`)
    pub brokers: Vec<String>,
    /// 소비할 토픽
    pub topic: String,
    /// Kafka 클라이언트 ID
    pub client_id: String,
    /// 파티션별 메시지 채널 용량
    pub channel_capacity: usize,
    /// fetch 요청 최대 대기 시간 (밀리초)
    pub max_wait_ms: u64,
    /// 브로커 연결/파티션 조회 제한 시간 (초). 초과하면 시작 실패
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["127.0.0.1:9092".to_owned()],
            topic: "nginx-access".to_owned(),
            client_id: "gatewatch".to_owned(),
            channel_capacity: 1024,
            max_wait_ms: 500,
            connect_timeout_secs: 10,
        }
    }
}

/// 중복 제거 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 샤드 수 (2의 거듭제곱)
    pub shards: usize,
    /// 엔트리 수명 (초, 삽입 시점 기준)
    pub ttl_secs: u64,
    /// 만료 엔트리 정리 주기 (초)
    pub clean_interval_secs: u64,
    /// 엔트리 최대 크기 (바이트, 키 + 값)
    pub max_entry_size: usize,
    /// 샤드당 최대 엔트리 수
    pub max_entries_per_shard: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: 2,
            ttl_secs: 600,
            clean_interval_secs: 1,
            max_entry_size: 500,
            max_entries_per_shard: 8192,
        }
    }
}

/// 알림 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// webhook URL 목록
    pub endpoints: Vec<String>,
    /// 알림에서 멘션할 휴대폰 번호 (빈 문자열 허용)
    pub mention: String,
    /// 엔드포인트 선택 전략 (all_but_last, all)
    pub selection: String,
    /// 요청당 타임아웃 (초)
    pub timeout_secs: u64,
    /// 실패 시 재시도 횟수 (0 = 재시도 없음)
    pub max_retries: u32,
    /// 알림 메시지 제목
    pub alert_title: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            mention: String::new(),
            selection: SELECTION_ALL_BUT_LAST.to_owned(),
            timeout_secs: 10,
            max_retries: 0,
            alert_title: "[Gateway 5xx alert]".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

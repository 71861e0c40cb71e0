use crate::error::{AuditResult, ConfigError};
use serde::Deserialize;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时执行的审计数量上限
    pub max_concurrent_audits: usize,
    /// 浏览器调试端口（0 表示启动无头浏览器而不是连接已有实例）
    pub browser_debug_port: u16,
    /// 无头模式下的浏览器可执行文件路径（留空自动探测）
    pub chrome_executable: Option<String>,
    /// 单次抓取超时（秒）
    pub fetch_timeout_secs: u64,
    /// 抓取重试次数上限
    pub fetch_max_retries: u32,
    /// 抓取重试退避基数（毫秒，指数退避）
    pub fetch_backoff_ms: u64,
    /// 正文短于该字符数时视为疑似拦截页
    pub min_body_chars: usize,
    /// 单次评审调用超时（秒）
    pub judge_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 输入 token 单价（美元 / 百万 token）
    pub input_price_per_mtok: f64,
    /// 输出 token 单价（美元 / 百万 token）
    pub output_price_per_mtok: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_audits: 4,
            browser_debug_port: 0,
            chrome_executable: None,
            fetch_timeout_secs: 30,
            fetch_max_retries: 3,
            fetch_backoff_ms: 500,
            min_body_chars: 200,
            judge_timeout_secs: 120,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            input_price_per_mtok: 3.0,
            output_price_per_mtok: 15.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_audits: std::env::var("MAX_CONCURRENT_AUDITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_audits),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            fetch_timeout_secs: std::env::var("FETCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fetch_timeout_secs),
            fetch_max_retries: std::env::var("FETCH_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fetch_max_retries),
            fetch_backoff_ms: std::env::var("FETCH_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fetch_backoff_ms),
            min_body_chars: std::env::var("MIN_BODY_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_body_chars),
            judge_timeout_secs: std::env::var("JUDGE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.judge_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            input_price_per_mtok: std::env::var("INPUT_PRICE_PER_MTOK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.input_price_per_mtok),
            output_price_per_mtok: std::env::var("OUTPUT_PRICE_PER_MTOK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.output_price_per_mtok),
        }
    }

    /// 从 TOML 配置文件加载（缺失的字段取默认值）
    pub fn from_file(path: &str) -> AuditResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::FileParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        Ok(config)
    }
}

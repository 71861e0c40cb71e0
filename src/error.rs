use crate::models::audit::AuditStatus;
use crate::store::StoreError;
use std::fmt;

/// 审计系统错误类型
#[derive(Debug)]
pub enum AuditError {
    /// 请求校验错误（在创建任何状态之前被拒绝）
    Validation(ValidationError),
    /// 内容抓取错误
    Fetch(FetchError),
    /// AI 评审错误
    Judgment(JudgmentError),
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 存储错误
    Store(StoreError),
    /// 配置错误
    Config(ConfigError),
    /// 非法状态流转（retry / proceed 只能在 blocked 状态下调用）
    InvalidTransition {
        status: AuditStatus,
        operation: &'static str,
    },
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::Validation(e) => write!(f, "请求校验失败: {}", e),
            AuditError::Fetch(e) => write!(f, "抓取错误: {}", e),
            AuditError::Judgment(e) => write!(f, "评审错误: {}", e),
            AuditError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AuditError::Store(e) => write!(f, "存储错误: {}", e),
            AuditError::Config(e) => write!(f, "配置错误: {}", e),
            AuditError::InvalidTransition { status, operation } => {
                write!(f, "当前状态 {} 不允许执行 {} 操作", status.as_str(), operation)
            }
            AuditError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AuditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuditError::Validation(e) => Some(e),
            AuditError::Fetch(e) => Some(e),
            AuditError::Judgment(e) => Some(e),
            AuditError::Browser(e) => Some(e),
            AuditError::Store(e) => Some(e),
            AuditError::Config(e) => Some(e),
            AuditError::InvalidTransition { .. } | AuditError::Other(_) => None,
        }
    }
}

/// 请求校验错误
///
/// 不同审计模式的必填字段不同，全部在创建审计记录之前检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// comparison 模式缺少源定位器
    MissingSourceLocator,
    /// 缺少目标定位器
    MissingTargetLocator,
    /// standalone 模式缺少源语言
    MissingSourceLanguage,
    /// proficiency 模式缺少目标语言
    MissingTargetLanguage,
    /// image_upload 模式图片数量必须是 1–3 张
    ImageCountOutOfRange { count: usize },
    /// image_upload 模式至少需要一张 target 标签的图片
    MissingTargetImage,
    /// comparison + image_upload 模式至少需要一张 source 标签的图片
    MissingSourceImage,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingSourceLocator => {
                write!(f, "comparison 模式必须提供源页面 URL 或源图片")
            }
            ValidationError::MissingTargetLocator => {
                write!(f, "必须提供目标页面 URL 或目标图片")
            }
            ValidationError::MissingSourceLanguage => {
                write!(f, "standalone 模式必须指定源语言")
            }
            ValidationError::MissingTargetLanguage => {
                write!(f, "proficiency 模式必须指定目标语言")
            }
            ValidationError::ImageCountOutOfRange { count } => {
                write!(f, "image_upload 模式需要 1–3 张图片，实际提供 {} 张", count)
            }
            ValidationError::MissingTargetImage => {
                write!(f, "image_upload 模式至少需要一张标记为 target 的图片")
            }
            ValidationError::MissingSourceImage => {
                write!(f, "comparison 模式至少需要一张标记为 source 的图片")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// 内容抓取错误
///
/// 注意：反爬拦截（blocked）不属于错误，它是一等公民状态，
/// 通过 `FetchOutcome::blocked` 传递，不走这里。
#[derive(Debug)]
pub enum FetchError {
    /// 网络请求失败
    RequestFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 非 2xx 响应（重试耗尽后）
    BadStatus { url: String, status: u16 },
    /// 页面无可用文本内容
    EmptyContent { url: String },
    /// 抓取超时
    Timeout { url: String, seconds: u64 },
    /// 重试耗尽
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::RequestFailed { url, source } => {
                write!(f, "请求失败 ({}): {}", url, source)
            }
            FetchError::BadStatus { url, status } => {
                write!(f, "非 2xx 响应 ({}): HTTP {}", url, status)
            }
            FetchError::EmptyContent { url } => {
                write!(f, "页面无可用文本内容: {}", url)
            }
            FetchError::Timeout { url, seconds } => {
                write!(f, "抓取超时 ({}): 超过 {} 秒", url, seconds)
            }
            FetchError::RetriesExhausted {
                url,
                attempts,
                last_error,
            } => {
                write!(f, "重试 {} 次后仍然失败 ({}): {}", attempts, url, last_error)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::RequestFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// AI 评审错误
#[derive(Debug)]
pub enum JudgmentError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    EmptyResponse { model: String },
    /// 无法从响应中解析出结构化结果
    MalformedResponse {
        dimension: &'static str,
        detail: String,
    },
    /// 分数超出 [0, 100] 范围
    ScoreOutOfRange {
        dimension: &'static str,
        score: i64,
    },
    /// 某个维度重试一次后仍然失败
    DimensionFailed {
        dimension: &'static str,
        detail: String,
    },
}

impl fmt::Display for JudgmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JudgmentError::ApiCallFailed { model, source } => {
                write!(f, "评审 API 调用失败 (模型: {}): {}", model, source)
            }
            JudgmentError::EmptyResponse { model } => {
                write!(f, "评审返回内容为空 (模型: {})", model)
            }
            JudgmentError::MalformedResponse { dimension, detail } => {
                write!(f, "维度 {} 返回结果无法解析: {}", dimension, detail)
            }
            JudgmentError::ScoreOutOfRange { dimension, score } => {
                write!(f, "维度 {} 分数 {} 超出 [0, 100] 范围", dimension, score)
            }
            JudgmentError::DimensionFailed { dimension, detail } => {
                write!(f, "维度 {} 评审失败（已重试一次）: {}", dimension, detail)
            }
        }
    }
}

impl std::error::Error for JudgmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JudgmentError::ApiCallFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 连接浏览器失败
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动无头浏览器失败
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    NavigationFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 截图失败
    CaptureFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ConnectionFailed { port, source } => {
                write!(f, "无法连接到浏览器 (端口: {}): {}", port, source)
            }
            BrowserError::LaunchFailed { source } => {
                write!(f, "启动无头浏览器失败: {}", source)
            }
            BrowserError::NavigationFailed { url, source } => {
                write!(f, "导航到 {} 失败: {}", url, source)
            }
            BrowserError::CaptureFailed { source } => {
                write!(f, "页面截图失败: {}", source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ConnectionFailed { source, .. }
            | BrowserError::LaunchFailed { source }
            | BrowserError::NavigationFailed { source, .. }
            | BrowserError::CaptureFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    FileReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::FileReadFailed { path, source } => {
                write!(f, "配置文件读取失败 ({}): {}", path, source)
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileReadFailed { source, .. }
            | ConfigError::FileParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<ValidationError> for AuditError {
    fn from(err: ValidationError) -> Self {
        AuditError::Validation(err)
    }
}

impl From<FetchError> for AuditError {
    fn from(err: FetchError) -> Self {
        AuditError::Fetch(err)
    }
}

impl From<JudgmentError> for AuditError {
    fn from(err: JudgmentError) -> Self {
        AuditError::Judgment(err)
    }
}

impl From<BrowserError> for AuditError {
    fn from(err: BrowserError) -> Self {
        AuditError::Browser(err)
    }
}

impl From<StoreError> for AuditError {
    fn from(err: StoreError) -> Self {
        AuditError::Store(err)
    }
}

impl From<ConfigError> for AuditError {
    fn from(err: ConfigError) -> Self {
        AuditError::Config(err)
    }
}

impl From<chromiumoxide::error::CdpError> for AuditError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AuditError::Browser(BrowserError::CaptureFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AuditError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuditError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建抓取请求错误
    pub fn fetch_request_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuditError::Fetch(FetchError::RequestFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建评审 API 调用错误
    pub fn judge_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AuditError::Judgment(JudgmentError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否为"记录不存在"错误（删除后的审计会命中这里）
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuditError::Store(StoreError::NotFound(_)))
    }
}

// ========== Result 类型别名 ==========

/// 审计系统结果类型
pub type AuditResult<T> = Result<T, AuditError>;

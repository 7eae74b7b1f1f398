//! 定义文件解析
//!
//! TOML 为主，JSON 与之等价 (同一 serde 模型)。

use std::path::Path;

use contracts::{MorphDefinition, MorphError};

/// 定义文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 按扩展名识别 (大小写不敏感)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// 按文件路径识别；无扩展名或扩展名未知时报错
    pub fn from_path(path: &Path) -> Result<Self, MorphError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            MorphError::config_parse("cannot determine file format from extension")
        })?;
        Self::from_extension(ext)
            .ok_or_else(|| MorphError::config_parse(format!("unsupported config format: .{ext}")))
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

fn parse_error<E>(format: ConfigFormat, err: E) -> MorphError
where
    E: std::error::Error + Send + Sync + 'static,
{
    MorphError::ConfigParse {
        message: format!("{} parse error: {err}", format.label()),
        source: Some(Box::new(err)),
    }
}

/// 解析定义文本 (不做变量替换与校验)
pub fn parse(content: &str, format: ConfigFormat) -> Result<MorphDefinition, MorphError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(format, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(format, e)),
    }
}

//! ZSphere 文件格式处理
//!
//! 支持：
//! - `.zsph` 原生格式（MessagePack + Zstd）
//! - `.json` 文本格式（完整文档或裸脚本数组）

pub mod document;
pub mod error;
pub mod json;
pub mod native;

pub use document::{ConstructionDocument, DocumentMetadata};
pub use error::FileError;

use std::path::Path;

/// 文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Native,
    Json,
}

impl FileFormat {
    /// 按扩展名判断格式（不区分大小写）
    pub fn from_path(path: &Path) -> Result<Self, FileError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("zsph") => Ok(FileFormat::Native),
            Some("json") => Ok(FileFormat::Json),
            _ => Err(FileError::InvalidFormat(format!(
                "Unknown file extension: {}",
                path.display()
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Native => "zsph",
            FileFormat::Json => "json",
        }
    }
}

/// 按扩展名选择格式保存
pub fn save(document: &ConstructionDocument, path: &Path) -> Result<(), FileError> {
    match FileFormat::from_path(path)? {
        FileFormat::Native => native::save(document, path),
        FileFormat::Json => json::save(document, path),
    }
}

/// 按扩展名选择格式加载
pub fn load(path: &Path) -> Result<ConstructionDocument, FileError> {
    match FileFormat::from_path(path)? {
        FileFormat::Native => native::load(path),
        FileFormat::Json => json::load(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("a/b/scene.ZSPH")).unwrap(),
            FileFormat::Native
        );
        assert_eq!(
            FileFormat::from_path(Path::new("scene.json")).unwrap(),
            FileFormat::Json
        );
        assert!(FileFormat::from_path(Path::new("scene.dxf")).is_err());
        assert!(FileFormat::from_path(Path::new("scene")).is_err());
    }

    #[test]
    fn test_convert_between_formats() {
        let temp_dir = std::env::temp_dir();
        let json_path = temp_dir.join("test_zsphere_convert.json");
        let native_path = temp_dir.join("test_zsphere_convert.zsph");

        let mut document = ConstructionDocument::new("Convert");
        document.script = vec![zsphere_core::script::ScriptEntry::Single(
            "AddPoint&objectName=P1".to_string(),
        )];

        save(&document, &json_path).expect("Failed to save json");
        let from_json = load(&json_path).expect("Failed to load json");
        save(&from_json, &native_path).expect("Failed to save native");
        let from_native = load(&native_path).expect("Failed to load native");

        assert_eq!(from_native.metadata, document.metadata);
        assert_eq!(from_native.script, document.script);

        std::fs::remove_file(&json_path).ok();
        std::fs::remove_file(&native_path).ok();
    }
}

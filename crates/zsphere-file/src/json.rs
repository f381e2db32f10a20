//! JSON 格式（.json）
//!
//! 可读的文本格式，便于版本管理和手工编辑。
//! 除完整文档外，也接受只含脚本数组的文件。

use crate::document::ConstructionDocument;
use crate::error::FileError;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use zsphere_core::script::ScriptEntry;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonContent {
    Document(ConstructionDocument),
    Script(Vec<ScriptEntry>),
}

/// 序列化为带缩进的 JSON 字符串
pub fn to_string(document: &ConstructionDocument) -> Result<String, FileError> {
    Ok(serde_json::to_string_pretty(document)?)
}

/// 从 JSON 字符串解析文档
pub fn from_str(text: &str) -> Result<ConstructionDocument, FileError> {
    let content: JsonContent = serde_json::from_str(text)
        .map_err(|e| FileError::InvalidFormat(format!("not a construction document: {e}")))?;
    Ok(match content {
        JsonContent::Document(document) => document,
        JsonContent::Script(script) => ConstructionDocument {
            script,
            ..ConstructionDocument::new("Untitled")
        },
    })
}

/// 保存文档到 JSON 文件
pub fn save(document: &ConstructionDocument, path: &Path) -> Result<(), FileError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    tracing::info!(
        "Saved {} script entries to {}",
        document.script.len(),
        path.display()
    );
    Ok(())
}

/// 从 JSON 文件加载文档
pub fn load(path: &Path) -> Result<ConstructionDocument, FileError> {
    let mut text = String::new();
    BufReader::new(File::open(path)?).read_to_string(&mut text)?;
    let document = from_str(&text)?;

    tracing::info!(
        "Loaded {} script entries from {}",
        document.script.len(),
        path.display()
    );
    Ok(document)
}

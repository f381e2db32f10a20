//! 构造文档
//!
//! 文档只保存构造脚本和元数据；几何状态由回放脚本重建。

use crate::error::FileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zsphere_core::config::KernelConfig;
use zsphere_core::script::ScriptEntry;
use zsphere_core::session::Session;

/// 文档元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// 文档唯一标识
    pub id: Uuid,
    /// 标题
    pub title: String,
    /// 作者
    #[serde(default)]
    pub author: String,
    /// 描述
    #[serde(default)]
    pub description: String,
    /// 创建时间
    pub created: DateTime<Utc>,
    /// 最后修改时间
    pub modified: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            author: String::new(),
            description: String::new(),
            created: now,
            modified: now,
        }
    }
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// 构造文档
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionDocument {
    pub metadata: DocumentMetadata,
    /// 回放时使用的内核参数
    #[serde(default)]
    pub config: KernelConfig,
    pub script: Vec<ScriptEntry>,
}

impl ConstructionDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            metadata: DocumentMetadata::new(title),
            config: KernelConfig::default(),
            script: Vec::new(),
        }
    }

    /// 从会话的撤销栈生成文档
    pub fn from_session(session: &Session, title: impl Into<String>) -> Self {
        let mut document = Self::new(title);
        document.capture(session);
        document
    }

    /// 用会话当前的脚本覆盖文档内容
    pub fn capture(&mut self, session: &Session) {
        self.config = session.config().clone();
        self.script = session.script();
        self.metadata.modified = Utc::now();
    }

    /// 脚本中的操作码总数
    pub fn opcode_count(&self) -> usize {
        self.script.iter().map(ScriptEntry::len).sum()
    }

    /// 在给定会话上回放（会先清空会话）
    pub fn replay_into(&self, session: &mut Session) -> Result<(), FileError> {
        session.replay(&self.script)?;
        Ok(())
    }

    /// 以文档自带的参数新建会话并回放
    pub fn to_session(&self) -> Result<Session, FileError> {
        let mut session = Session::new(self.config.clone());
        self.replay_into(&mut session)?;
        tracing::debug!(
            "Rebuilt session for '{}' with {} nodes",
            self.metadata.title,
            session.graph().attached().count()
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsphere_core::math::Vector3;

    fn sample_session() -> Session {
        let mut session = Session::default();
        let a = session.free_point(Vector3::x()).unwrap();
        let p1 = a.created().unwrap();
        session.execute(a).unwrap();
        let b = session.free_point(Vector3::y()).unwrap();
        let p2 = b.created().unwrap();
        session.execute(b).unwrap();
        let line = session.line(p1, p2).unwrap();
        session.execute(line).unwrap();
        session
    }

    #[test]
    fn test_from_session_captures_script() {
        let session = sample_session();
        let document = ConstructionDocument::from_session(&session, "Equator");
        assert_eq!(document.metadata.title, "Equator");
        assert_eq!(document.script.len(), 3);
        assert_eq!(document.opcode_count(), 3);
        assert!(document.metadata.modified >= document.metadata.created);
    }

    #[test]
    fn test_to_session_rebuilds_nodes() {
        let session = sample_session();
        let document = ConstructionDocument::from_session(&session, "Equator");
        let rebuilt = document.to_session().unwrap();
        assert_eq!(rebuilt.script(), session.script());
        assert!(rebuilt.find("Li1").is_some());
    }

    #[test]
    fn test_bad_script_is_kernel_error() {
        let mut document = ConstructionDocument::new("Broken");
        document
            .script
            .push(ScriptEntry::Single("NoSuchCommand&objectName=X".to_string()));
        assert!(matches!(document.to_session(), Err(FileError::Kernel(_))));
    }
}

//! 构造脚本
//!
//! 脚本是有序的条目列表；每个条目是一条操作码或一个命令组（操作码列表）。
//! JSON 形式中，单条操作码是字符串，命令组是字符串数组。

use crate::command::{Command, Reversible};
use crate::error::{KernelError, Result};
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// 脚本条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptEntry {
    Single(String),
    Group(Vec<String>),
}

impl ScriptEntry {
    /// 条目中全部操作码（命令组以 `;` 连接，用于错误报告）
    pub fn describe(&self) -> String {
        match self {
            ScriptEntry::Single(opcode) => opcode.clone(),
            ScriptEntry::Group(opcodes) => opcodes.join(";"),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ScriptEntry::Single(_) => 1,
            ScriptEntry::Group(opcodes) => opcodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Session {
    /// 把撤销栈（最早的在前）序列化为脚本，跳过没有操作码的命令
    pub fn script(&self) -> Vec<ScriptEntry> {
        self.history()
            .executed()
            .iter()
            .filter_map(|command| match command {
                Command::Group(_) => {
                    let opcodes = command.member_opcodes(self);
                    (!opcodes.is_empty()).then_some(ScriptEntry::Group(opcodes))
                }
                other => other.opcode(self).map(ScriptEntry::Single),
            })
            .collect()
    }

    /// 清空会话后逐条解析并执行脚本
    ///
    /// 失败时报告条目序号与操作码；之前的条目保持已执行状态
    pub fn replay(&mut self, script: &[ScriptEntry]) -> Result<()> {
        self.reset();
        for (index, entry) in script.iter().enumerate() {
            let wrap = |source: KernelError| KernelError::Replay {
                entry: index,
                opcode: entry.describe(),
                source: Box::new(source),
            };
            let command = match entry {
                ScriptEntry::Single(opcode) => Command::parse(opcode, self),
                ScriptEntry::Group(opcodes) => Command::parse_group(opcodes, self),
            }
            .map_err(wrap)?;
            self.execute(command).map_err(wrap)?;
        }
        tracing::info!(
            entries = script.len(),
            nodes = self.graph().attached().count(),
            "script replayed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let script = vec![
            ScriptEntry::Single("AddPoint&objectName=P1".to_string()),
            ScriptEntry::Group(vec!["AddLine&objectName=Li1".to_string()]),
        ];
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, r#"["AddPoint&objectName=P1",["AddLine&objectName=Li1"]]"#);
        let back: Vec<ScriptEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }

    #[test]
    fn test_replay_reports_entry() {
        let mut session = Session::default();
        let script = vec![ScriptEntry::Single("DeleteNode&objectName=P9".to_string())];
        let err = session.replay(&script).unwrap_err();
        match err {
            KernelError::Replay { entry, opcode, .. } => {
                assert_eq!(entry, 0);
                assert!(opcode.starts_with("DeleteNode"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

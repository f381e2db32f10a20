//! 撤销/重做栈

use crate::command::Command;

/// 命令历史
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<Command>,
    redo: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_undo(&mut self, command: Command) {
        self.undo.push(command);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Command> {
        self.undo.pop()
    }

    pub(crate) fn push_redo(&mut self, command: Command) {
        self.redo.push(command);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Command> {
        self.redo.pop()
    }

    pub(crate) fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// 已执行的命令（最早的在前）
    pub fn executed(&self) -> &[Command] {
        &self.undo
    }
}

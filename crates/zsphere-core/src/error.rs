//! 内核错误定义
//!
//! 几何退化不是错误（实体只会被标记为不存在）；这里只包含：
//! - 图完整性错误（致命，中止当前命令或回放）
//! - 操作码解析错误（对当前脚本条目致命）
//! - 表达式求值错误（在度量节点边界可恢复）

use crate::expression::ExprError;
use crate::node::NodeId;
use thiserror::Error;

/// 依赖图完整性错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("registering {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is not attached to the graph")]
    NotAttached(NodeId),

    #[error("node {0} is already attached to the graph")]
    AlreadyAttached(NodeId),

    #[error("node {0} has the wrong kind for this operation")]
    WrongKind(NodeId),

    #[error("node {0} still has attached dependents")]
    HasDependents(NodeId),

    #[error("curve pair {first}/{second} is already recorded on {point}")]
    DuplicatePair {
        point: NodeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("curve pair {first}/{second} is not recorded on {point}")]
    MissingPair {
        point: NodeId,
        first: NodeId,
        second: NodeId,
    },
}

/// 操作码解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpcodeError {
    #[error("empty opcode")]
    Empty,

    #[error("unknown command tag: {0}")]
    UnknownTag(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {value}")]
    BadValue { field: String, value: String },

    #[error("opcode references unknown name: {0}")]
    UnknownName(String),

    #[error("malformed percent escape in: {0}")]
    BadEscape(String),
}

/// 撤销/重做错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// 内核顶层错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("graph integrity violation: {0}")]
    Graph(#[from] GraphError),

    #[error("opcode error: {0}")]
    Opcode(#[from] OpcodeError),

    #[error("expression error: {0}")]
    Expression(#[from] ExprError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("script entry {entry} failed ({opcode}): {source}")]
    Replay {
        entry: usize,
        opcode: String,
        #[source]
        source: Box<KernelError>,
    },
}

pub type Result<T> = std::result::Result<T, KernelError>;

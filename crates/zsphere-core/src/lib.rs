//! ZSphere 球面几何约束内核
//!
//! 在单位球面上维护一张几何实体的依赖图，提供：
//! - 更新传播：按依赖顺序重算派生实体
//! - 交点引擎：任意两类一维曲线求交、分类与去重
//! - 命令层：每次修改都可撤销/重做，并可序列化为文本脚本回放
//!
//! # 示例
//!
//! ```rust
//! use zsphere_core::prelude::*;
//!
//! let mut session = Session::default();
//! let a = session.free_point(Vector3::x())?;
//! let p1 = a.created().unwrap();
//! session.execute(a)?;
//! let b = session.free_point(Vector3::y())?;
//! let p2 = b.created().unwrap();
//! session.execute(b)?;
//!
//! let line = session.line(p1, p2)?;
//! session.execute(line)?;
//! assert_eq!(session.script().len(), 3);
//! # Ok::<(), zsphere_core::error::KernelError>(())
//! ```

pub mod command;
pub mod config;
pub mod curve;
pub mod error;
pub mod expression;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod intersection;
pub mod math;
pub mod node;
pub mod opcode;
pub mod script;
pub mod session;
pub mod solver;
pub mod store;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::command::{Command, CommandGroup, Reversible};
    pub use crate::config::KernelConfig;
    pub use crate::curve::{Curve, OneDimensional};
    pub use crate::error::{GraphError, KernelError, OpcodeError, Result};
    pub use crate::expression::{Expr, ExprError};
    pub use crate::geometry::{
        AngleDef, Axis, IntersectionData, MeasurementDef, OtherParent, PointDef, PointTransform,
    };
    pub use crate::graph::{Graph, UpdateMode};
    pub use crate::math::Vector3;
    pub use crate::node::{EntityKind, Node, NodeId, NodeKind, Style};
    pub use crate::script::ScriptEntry;
    pub use crate::session::{Session, ViewState};
    pub use crate::store::{Collections, EntityStore};
}

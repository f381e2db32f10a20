//! 命令层
//!
//! 所有对依赖图的修改都必须经过命令。每个命令：
//! - `save_state` 记录撤销所需的状态
//! - `apply` 执行修改并触发更新传播
//! - `restore_state` 撤销修改
//! - `opcode` 输出可回放的文本形式（纯视图操作返回 None）
//!
//! 命令在构造时只分配未挂入的节点，不产生可见副作用；
//! [`Session::execute`](crate::session::Session::execute) 负责真正执行。

mod add;
mod delete;
mod edit;
mod parents;

pub use add::AddNode;
pub(crate) use add::resolve_tokens;
pub use delete::DeleteNode;
pub use edit::{MovePoint, RotateView, SetExpression, SetStyle, SetVisibility};
pub use parents::{AddOtherParent, ConvertToUserCreated, RemoveOtherParent, SwapPrincipalParent};

use crate::error::{OpcodeError, Result};
use crate::node::NodeId;
use crate::opcode::OpcodeFields;
use crate::session::Session;

/// 可撤销的修改
pub trait Reversible {
    fn save_state(&mut self, session: &mut Session) -> Result<()>;
    fn apply(&mut self, session: &mut Session) -> Result<()>;
    fn restore_state(&mut self, session: &mut Session) -> Result<()>;

    /// 操作码；不可序列化的命令返回 None
    fn opcode(&self, session: &Session) -> Option<String>;
}

/// 命令
#[derive(Debug, Clone)]
pub enum Command {
    AddNode(AddNode),
    AddOtherParent(AddOtherParent),
    RemoveOtherParent(RemoveOtherParent),
    SwapPrincipalParent(SwapPrincipalParent),
    ConvertToUserCreated(ConvertToUserCreated),
    DeleteNode(DeleteNode),
    MovePoint(MovePoint),
    SetVisibility(SetVisibility),
    SetStyle(SetStyle),
    SetExpression(SetExpression),
    RotateView(RotateView),
    Group(CommandGroup),
}

impl Command {
    /// 由操作码重建命令（不执行）
    pub fn parse(text: &str, session: &mut Session) -> Result<Command> {
        let fields = OpcodeFields::parse(text)?;
        let command = match fields.tag() {
            "AddPoint" | "AddIntersectionPoint" | "AddLine" | "AddSegment" | "AddCircle"
            | "AddEllipse" | "AddParametric" | "AddPolygon" | "AddAngleMarker"
            | "AddMeasurement" => Command::AddNode(AddNode::parse(&fields, session)?),
            "AddIntersectionPointOtherParent" => {
                Command::AddOtherParent(AddOtherParent::parse(&fields, session)?)
            }
            "RemoveIntersectionPointOtherParent" => {
                Command::RemoveOtherParent(RemoveOtherParent::parse(&fields, session)?)
            }
            "ChangeIntersectionPointPrincipalParent" => {
                Command::SwapPrincipalParent(SwapPrincipalParent::parse(&fields, session)?)
            }
            "ConvertInterPtToUserCreated" => {
                Command::ConvertToUserCreated(ConvertToUserCreated::parse(&fields, session)?)
            }
            "DeleteNode" => Command::DeleteNode(DeleteNode::parse(&fields, session)?),
            "MovePoint" => Command::MovePoint(MovePoint::parse(&fields, session)?),
            "SetNoduleDisplay" => Command::SetVisibility(SetVisibility::parse(&fields, session)?),
            "StyleNodule" => Command::SetStyle(SetStyle::parse(&fields, session)?),
            "SetCalculationExpression" => {
                Command::SetExpression(SetExpression::parse(&fields, session)?)
            }
            other => return Err(OpcodeError::UnknownTag(other.to_string()).into()),
        };
        Ok(command)
    }

    /// 由一组操作码重建命令组
    pub fn parse_group<S: AsRef<str>>(opcodes: &[S], session: &mut Session) -> Result<Command> {
        let commands = opcodes
            .iter()
            .map(|text| Command::parse(text.as_ref(), session))
            .collect::<Result<Vec<_>>>()?;
        Ok(Command::Group(CommandGroup::new(commands)))
    }

    /// 命令创建的节点
    pub fn created(&self) -> Option<NodeId> {
        match self {
            Command::AddNode(add) => Some(add.id()),
            Command::Group(group) => group.commands.first().and_then(Command::created),
            _ => None,
        }
    }

    /// 组内成员的操作码（展开嵌套组，跳过不可序列化的成员）
    pub fn member_opcodes(&self, session: &Session) -> Vec<String> {
        match self {
            Command::Group(group) => group
                .commands
                .iter()
                .flat_map(|c| c.member_opcodes(session))
                .collect(),
            other => other.opcode(session).into_iter().collect(),
        }
    }

    fn as_reversible(&mut self) -> &mut dyn Reversible {
        match self {
            Command::AddNode(c) => c,
            Command::AddOtherParent(c) => c,
            Command::RemoveOtherParent(c) => c,
            Command::SwapPrincipalParent(c) => c,
            Command::ConvertToUserCreated(c) => c,
            Command::DeleteNode(c) => c,
            Command::MovePoint(c) => c,
            Command::SetVisibility(c) => c,
            Command::SetStyle(c) => c,
            Command::SetExpression(c) => c,
            Command::RotateView(c) => c,
            Command::Group(c) => c,
        }
    }
}

impl Reversible for Command {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.as_reversible().save_state(session)
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        self.as_reversible().apply(session)
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        self.as_reversible().restore_state(session)
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        match self {
            Command::AddNode(c) => c.opcode(session),
            Command::AddOtherParent(c) => c.opcode(session),
            Command::RemoveOtherParent(c) => c.opcode(session),
            Command::SwapPrincipalParent(c) => c.opcode(session),
            Command::ConvertToUserCreated(c) => c.opcode(session),
            Command::DeleteNode(c) => c.opcode(session),
            Command::MovePoint(c) => c.opcode(session),
            Command::SetVisibility(c) => c.opcode(session),
            Command::SetStyle(c) => c.opcode(session),
            Command::SetExpression(c) => c.opcode(session),
            Command::RotateView(c) => c.opcode(session),
            Command::Group(c) => c.opcode(session),
        }
    }
}

/// 原子命令组
///
/// 成员按顺序逐个保存状态并执行，撤销时逆序恢复。
/// 某个成员失败时，已执行的成员会被逆序撤销。
#[derive(Debug, Clone, Default)]
pub struct CommandGroup {
    commands: Vec<Command>,
}

impl CommandGroup {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Reversible for CommandGroup {
    fn save_state(&mut self, _session: &mut Session) -> Result<()> {
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        for i in 0..self.commands.len() {
            let step = self.commands[i]
                .save_state(session)
                .and_then(|_| self.commands[i].apply(session));
            if let Err(err) = step {
                tracing::warn!(member = i, "command group failed, rolling back: {}", err);
                for done in self.commands[..i].iter_mut().rev() {
                    done.restore_state(session)?;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        for command in self.commands.iter_mut().rev() {
            command.restore_state(session)?;
        }
        Ok(())
    }

    /// 组本身没有单条操作码，脚本按成员列表输出
    fn opcode(&self, _session: &Session) -> Option<String> {
        None
    }
}

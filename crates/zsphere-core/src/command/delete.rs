//! 删除命令

use super::Reversible;
use crate::error::Result;
use crate::graph::UpdateMode;
use crate::node::{NodeId, NodeSnapshot};
use crate::opcode::{OpcodeBuilder, OpcodeFields};
use crate::session::Session;
use std::collections::BTreeSet;

/// 删除一个节点及其全部后代
///
/// 执行前以 `RecordState` 模式更新一次，得到目标与后代（拓扑顺序）的快照；
/// 执行时按逆序摘下，撤销时按正序重新挂入并写回快照。
#[derive(Debug, Clone)]
pub struct DeleteNode {
    target: NodeId,
    log: Vec<NodeSnapshot>,
    /// 因删除而解除的对径耦合：(存活的一方, 被删除的一方)
    unlinked: Vec<(NodeId, NodeId)>,
}

impl DeleteNode {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            log: Vec::new(),
            unlinked: Vec::new(),
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// 最近一次执行删除的节点（拓扑顺序）
    pub fn removed(&self) -> Vec<NodeId> {
        self.log.iter().map(|s| s.id).collect()
    }

    pub(crate) fn parse(fields: &OpcodeFields, session: &mut Session) -> Result<Self> {
        Ok(Self::new(session.resolve(&fields.text("objectName")?)?))
    }
}

impl Reversible for DeleteNode {
    fn save_state(&mut self, session: &mut Session) -> Result<()> {
        self.log.clear();
        session
            .graph
            .update(self.target, UpdateMode::RecordState, &mut self.log)?;
        Ok(())
    }

    fn apply(&mut self, session: &mut Session) -> Result<()> {
        let doomed: BTreeSet<NodeId> = self.log.iter().map(|s| s.id).collect();
        for snapshot in self.log.iter().rev() {
            session.graph.detach(snapshot.id)?;
            session
                .store
                .remove(snapshot.prior.entity_kind(), snapshot.id);
        }

        // 存活的交点不再指向被删除的对径点
        self.unlinked.clear();
        let survivors: Vec<(NodeId, NodeId)> = session
            .graph
            .attached()
            .filter_map(|n| {
                let partner = n.kind.intersection()?.antipode?;
                doomed.contains(&partner).then_some((n.id, partner))
            })
            .collect();
        for (survivor, partner) in survivors {
            if let Some(data) = session.graph.node_mut(survivor)?.kind.intersection_mut() {
                data.antipode = None;
            }
            self.unlinked.push((survivor, partner));
        }

        tracing::debug!(target = %self.target, removed = doomed.len(), "nodes deleted");
        Ok(())
    }

    fn restore_state(&mut self, session: &mut Session) -> Result<()> {
        for snapshot in &self.log {
            session.graph.restore_values(std::slice::from_ref(snapshot))?;
            session.graph.attach(snapshot.id)?;
            session
                .store
                .insert(snapshot.prior.entity_kind(), snapshot.id);
        }
        for (survivor, partner) in self.unlinked.drain(..) {
            if let Some(data) = session.graph.node_mut(survivor)?.kind.intersection_mut() {
                data.antipode = Some(partner);
            }
        }
        Ok(())
    }

    fn opcode(&self, session: &Session) -> Option<String> {
        Some(
            OpcodeBuilder::new("DeleteNode", session.precision())
                .text("objectName", &session.name_of(self.target))
                .build(),
        )
    }
}

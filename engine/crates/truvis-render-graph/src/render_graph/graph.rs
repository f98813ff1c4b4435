//! 依赖图构建、剔除和调度
//!
//! 分析 Pass 之间的资源依赖关系，构建 DAG。
//! 使用 petgraph 库提供图结构；边总是从声明顺序靠前的 Pass 指向靠后的 Pass，
//! 因此图天然无环，调度顺序就是每个队列上的声明顺序。

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::queue::RgQueueType;
use super::resource_handle::RgResourceId;

/// 依赖类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgDependencyKind {
    /// 读取之前写入的内容
    ReadAfterWrite,
    /// 覆盖之前写入的内容
    WriteAfterWrite,
    /// 写入之前必须等待读取完成
    WriteAfterRead,
}

/// 依赖边数据：资源依赖信息
#[derive(Clone, Debug, Default)]
pub struct RgEdgeData {
    pub kinds: Vec<RgDependencyKind>,
    pub resources: Vec<RgResourceId>,
}

impl RgEdgeData {
    #[inline]
    pub fn has(&self, kind: RgDependencyKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// 单个 Pass 的读写集合（资源粒度）
#[derive(Clone, Debug, Default)]
pub struct RgPassAccess {
    pub reads: Vec<RgResourceId>,
    pub writes: Vec<RgResourceId>,
}

/// 依赖图
///
/// 表示 Pass 之间的依赖关系，用于剔除和调试输出。
/// 内部使用 petgraph 的 DiGraph 实现。
pub struct RgDependencyGraph {
    /// 有向图：节点存储 pass 索引，边存储资源依赖
    graph: DiGraph<usize, RgEdgeData>,
    /// Pass 索引到图节点的映射
    node_indices: Vec<NodeIndex>,
}

impl RgDependencyGraph {
    /// 分析资源依赖，构建依赖图
    ///
    /// 规则：
    /// - RAW：reader 依赖此前**所有** writer（部分写入不会遮蔽更早的写入）
    /// - WAW：writer 依赖上一个 writer
    /// - WAR：writer 依赖上一次写入之后的所有 reader
    pub fn analyze(accesses: &[RgPassAccess]) -> Self {
        let pass_count = accesses.len();
        let mut graph = DiGraph::with_capacity(pass_count, pass_count * 2);
        let node_indices: Vec<NodeIndex> = (0..pass_count).map(|i| graph.add_node(i)).collect();
        let mut dep_graph = Self { graph, node_indices };

        let mut writers: HashMap<RgResourceId, Vec<usize>> = HashMap::new();
        let mut readers_since_write: HashMap<RgResourceId, Vec<usize>> = HashMap::new();

        for (pass_idx, access) in accesses.iter().enumerate() {
            for &resource in &access.reads {
                for &writer in writers.get(&resource).into_iter().flatten() {
                    dep_graph.add_edge(writer, pass_idx, RgDependencyKind::ReadAfterWrite, resource);
                }
            }

            for &resource in &access.writes {
                if let Some(&prev_writer) = writers.get(&resource).and_then(|w| w.last()) {
                    dep_graph.add_edge(prev_writer, pass_idx, RgDependencyKind::WriteAfterWrite, resource);
                }
                for &reader in readers_since_write.get(&resource).into_iter().flatten() {
                    dep_graph.add_edge(reader, pass_idx, RgDependencyKind::WriteAfterRead, resource);
                }
            }

            // 先处理完依赖再更新记录，Pass 不会依赖自己
            for &resource in &access.reads {
                readers_since_write.entry(resource).or_default().push(pass_idx);
            }
            for &resource in &access.writes {
                writers.entry(resource).or_default().push(pass_idx);
                readers_since_write.remove(&resource);
            }
        }

        dep_graph
    }

    /// 添加依赖边，同一对 Pass 之间的依赖合并到一条边上
    fn add_edge(&mut self, producer: usize, consumer: usize, kind: RgDependencyKind, resource: RgResourceId) {
        if producer == consumer {
            return;
        }
        let producer_node = self.node_indices[producer];
        let consumer_node = self.node_indices[consumer];

        let edge_idx = match self.graph.find_edge(producer_node, consumer_node) {
            Some(edge_idx) => edge_idx,
            None => self.graph.add_edge(producer_node, consumer_node, RgEdgeData::default()),
        };
        let edge_data = &mut self.graph[edge_idx];
        if !edge_data.kinds.contains(&kind) {
            edge_data.kinds.push(kind);
        }
        if !edge_data.resources.contains(&resource) {
            edge_data.resources.push(resource);
        }
    }

    /// 获取 Pass 的直接依赖（前驱），按声明顺序
    pub fn predecessors(&self, pass_index: usize) -> Vec<usize> {
        let mut predecessors: Vec<usize> = self
            .graph
            .neighbors_directed(self.node_indices[pass_index], Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        predecessors.sort_unstable();
        predecessors
    }

    /// 获取 Pass 的直接后继，按声明顺序
    pub fn successors(&self, pass_index: usize) -> Vec<usize> {
        let mut successors: Vec<usize> = self
            .graph
            .neighbors_directed(self.node_indices[pass_index], Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        successors.sort_unstable();
        successors
    }

    /// 两个 Pass 之间的依赖边
    pub fn edge(&self, producer: usize, consumer: usize) -> Option<&RgEdgeData> {
        let edge = self.graph.find_edge(self.node_indices[producer], self.node_indices[consumer])?;
        self.graph.edge_weight(edge)
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// 从根 Pass 出发沿 RAW 边反向遍历，返回每个 Pass 是否存活
    ///
    /// 根 Pass 是强制执行的 Pass 或写入了导入资源的 Pass。
    pub fn cull(&self, roots: &[bool]) -> Vec<bool> {
        let mut alive = vec![false; self.node_indices.len()];
        let mut stack: Vec<usize> = roots.iter().enumerate().filter(|(_, r)| **r).map(|(i, _)| i).collect();

        while let Some(pass_idx) = stack.pop() {
            if alive[pass_idx] {
                continue;
            }
            alive[pass_idx] = true;

            for edge in self.graph.edges_directed(self.node_indices[pass_idx], Direction::Incoming) {
                if edge.weight().has(RgDependencyKind::ReadAfterWrite) {
                    stack.push(self.graph[edge.source()]);
                }
            }
        }

        alive
    }
}

/// 调度结果：存活 Pass 的合并顺序，以及各队列上的顺序
#[derive(Clone, Debug, Default)]
pub struct RgSchedule {
    /// 合并后的调度序列（pass 索引，按声明顺序）
    pub order: Vec<usize>,
    /// pass 索引 -> 在 `order` 中的位置；被剔除的 Pass 为 None
    pub positions: Vec<Option<usize>>,
    /// 每个队列上依次执行的调度位置
    pub queues: [Vec<usize>; RgQueueType::COUNT],
    /// 被剔除的 pass 索引
    pub culled: Vec<usize>,
}

impl RgSchedule {
    pub fn build(queues: &[RgQueueType], alive: &[bool]) -> Self {
        let mut schedule = Self {
            positions: vec![None; queues.len()],
            ..Default::default()
        };

        for (pass_idx, queue) in queues.iter().enumerate() {
            if !alive[pass_idx] {
                schedule.culled.push(pass_idx);
                continue;
            }
            let position = schedule.order.len();
            schedule.positions[pass_idx] = Some(position);
            schedule.order.push(pass_idx);
            schedule.queues[queue.index()].push(position);
        }

        schedule
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::resource_handle::RgImageHandle;
    use slotmap::SlotMap;

    fn resources(count: usize) -> Vec<RgResourceId> {
        let mut map: SlotMap<RgImageHandle, ()> = SlotMap::with_key();
        (0..count).map(|_| RgResourceId::Image(map.insert(()))).collect()
    }

    #[test]
    fn test_dependency_kinds() {
        let r = resources(1);
        let accesses = vec![
            RgPassAccess {
                reads: vec![],
                writes: vec![r[0]],
            },
            RgPassAccess {
                reads: vec![r[0]],
                writes: vec![],
            },
            RgPassAccess {
                reads: vec![],
                writes: vec![r[0]],
            },
        ];
        let graph = RgDependencyGraph::analyze(&accesses);

        assert!(graph.edge(0, 1).unwrap().has(RgDependencyKind::ReadAfterWrite));
        assert!(graph.edge(1, 2).unwrap().has(RgDependencyKind::WriteAfterRead));
        assert!(graph.edge(0, 2).unwrap().has(RgDependencyKind::WriteAfterWrite));
        assert_eq!(graph.predecessors(2), vec![0, 1]);
        assert_eq!(graph.successors(0), vec![1, 2]);
    }

    #[test]
    fn test_cull_keeps_only_ancestors_of_roots() {
        let r = resources(3);
        // 0 写 a；1 读 a 写 b（没人读 b）；2 读 a 写 c（c 是输出）
        let accesses = vec![
            RgPassAccess {
                reads: vec![],
                writes: vec![r[0]],
            },
            RgPassAccess {
                reads: vec![r[0]],
                writes: vec![r[1]],
            },
            RgPassAccess {
                reads: vec![r[0]],
                writes: vec![r[2]],
            },
        ];
        let graph = RgDependencyGraph::analyze(&accesses);
        let alive = graph.cull(&[false, false, true]);
        assert_eq!(alive, vec![true, false, true]);

        // 剔除结果只依赖根集合，重复执行结果不变
        assert_eq!(graph.cull(&alive), alive);
    }

    #[test]
    fn test_schedule_per_queue_order() {
        let queues = [RgQueueType::Graphics, RgQueueType::Compute, RgQueueType::Graphics, RgQueueType::Transfer];
        let schedule = RgSchedule::build(&queues, &[true, true, false, true]);

        assert_eq!(schedule.order, vec![0, 1, 3]);
        assert_eq!(schedule.positions, vec![Some(0), Some(1), None, Some(2)]);
        assert_eq!(schedule.queues[RgQueueType::Graphics.index()], vec![0]);
        assert_eq!(schedule.queues[RgQueueType::Transfer.index()], vec![2]);
        assert_eq!(schedule.culled, vec![2]);
    }
}

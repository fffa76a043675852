//! アイテムツリーの構築
//!
//! フラットなアイテム列（`parent_id` 付き）から親子関係のフォレストを導出する。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::expansion::ExpansionState;
use crate::todo::{Item, ItemId};

/// フォレストの1ノード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub item: Item,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn id(&self) -> ItemId {
        self.item.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// 部分木からIDでノードを探す
    pub fn find(&self, id: ItemId) -> Option<&TreeNode> {
        if self.item.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// 子孫のID（自身を含まない、深さ優先順）
    pub fn descendant_ids(&self) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.item.id);
            ids.extend(child.descendant_ids());
        }
        ids
    }

    /// 部分木のノード数（自身を含む）
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// 表示用に平坦化した1行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRow<'a> {
    pub node: &'a TreeNode,
    pub depth: usize,
    pub expanded: bool,
}

/// 親ID -> 子アイテム（入力順）のマップを作る
fn children_by_parent(items: &[Item]) -> HashMap<Option<ItemId>, Vec<&Item>> {
    let mut children_map: HashMap<Option<ItemId>, Vec<&Item>> = HashMap::new();
    for item in items {
        children_map.entry(item.parent_id).or_default().push(item);
    }
    children_map
}

/// フラットなアイテム列からフォレストを構築
///
/// ルートは `parent_id` が `None` のアイテム。子は入力順を保つ。
/// 親の連鎖がルートに届かないアイテム（循環・リスト外の親）は到達できないため含まれない。
pub fn build_forest(items: &[Item]) -> Vec<TreeNode> {
    fn build(
        parent_id: Option<ItemId>,
        children_map: &HashMap<Option<ItemId>, Vec<&Item>>,
        placed: &mut HashSet<ItemId>,
    ) -> Vec<TreeNode> {
        let Some(children) = children_map.get(&parent_id) else {
            return Vec::new();
        };

        let mut nodes = Vec::with_capacity(children.len());
        for item in children {
            // IDは主キーなので重複は通常ありえない。重複時は最初の1件のみ配置する
            if !placed.insert(item.id) {
                continue;
            }
            nodes.push(TreeNode {
                item: (*item).clone(),
                children: build(Some(item.id), children_map, placed),
            });
        }
        nodes
    }

    let children_map = children_by_parent(items);
    let mut placed = HashSet::new();
    build(None, &children_map, &mut placed)
}

/// どのルートからも到達できないアイテム（入力順）
pub fn detached_items(items: &[Item]) -> Vec<&Item> {
    let forest = build_forest(items);
    let mut reachable = HashSet::new();
    for node in &forest {
        reachable.insert(node.id());
        reachable.extend(node.descendant_ids());
    }
    items
        .iter()
        .filter(|item| !reachable.contains(&item.id))
        .collect()
}

/// フォレスト全体のノード数
pub fn count_nodes(forest: &[TreeNode]) -> usize {
    forest.iter().map(TreeNode::size).sum()
}

/// フォレストからIDでノードを探す
pub fn find_node(forest: &[TreeNode], id: ItemId) -> Option<&TreeNode> {
    forest.iter().find_map(|node| node.find(id))
}

/// 展開状態に従って表示順（深さ優先）に平坦化
/// 折りたたまれたノードの子孫は含まない
pub fn flatten_visible<'a>(forest: &'a [TreeNode], expansion: &ExpansionState) -> Vec<VisibleRow<'a>> {
    fn collect<'a>(
        nodes: &'a [TreeNode],
        depth: usize,
        expansion: &ExpansionState,
        result: &mut Vec<VisibleRow<'a>>,
    ) {
        for node in nodes {
            let expanded = expansion.is_expanded(node.id());
            result.push(VisibleRow {
                node,
                depth,
                expanded,
            });
            if expanded {
                collect(&node.children, depth + 1, expansion, result);
            }
        }
    }

    let mut result = Vec::new();
    collect(forest, 0, expansion, &mut result);
    result
}

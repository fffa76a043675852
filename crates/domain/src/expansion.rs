//! 展開状態トラッカー
//!
//! アイテムID -> 展開/折りたたみ。ツリー構造とは独立に保持し、再構築をまたいでIDで引き継ぐ。

use std::collections::HashMap;

use crate::todo::{Item, ItemId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashMap<ItemId, bool>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全アイテムを展開状態で登録
    pub fn seeded(items: &[Item]) -> Self {
        let mut state = Self::new();
        state.reseed(items);
        state
    }

    /// 全件再取得後の再登録
    /// 残っているIDの状態は保持し、消えたIDは破棄し、新しいIDは展開状態にする
    pub fn reseed(&mut self, items: &[Item]) {
        let previous = std::mem::take(&mut self.expanded);
        self.expanded = items
            .iter()
            .map(|item| {
                let expanded = previous.get(&item.id).copied().unwrap_or(true);
                (item.id, expanded)
            })
            .collect();
    }

    /// 新しく見えたIDを登録（既知のIDは変更しない）
    pub fn observe(&mut self, id: ItemId) {
        self.expanded.entry(id).or_insert(true);
    }

    pub fn forget(&mut self, id: ItemId) {
        self.expanded.remove(&id);
    }

    /// 未登録のIDは展開扱い
    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.expanded.get(&id).copied().unwrap_or(true)
    }

    /// 1件だけ反転し、反転後の状態を返す
    pub fn toggle(&mut self, id: ItemId) -> bool {
        let next = !self.is_expanded(id);
        self.expanded.insert(id, next);
        next
    }

    pub fn set(&mut self, id: ItemId, expanded: bool) {
        self.expanded.insert(id, expanded);
    }

    pub fn expand_all(&mut self) {
        self.expanded.values_mut().for_each(|v| *v = true);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.values_mut().for_each(|v| *v = false);
    }

    pub fn is_tracked(&self, id: ItemId) -> bool {
        self.expanded.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(ids: &[i64]) -> Vec<Item> {
        ids.iter()
            .map(|&id| Item::new(ItemId::new(id), format!("Item {id}")))
            .collect()
    }

    #[test]
    fn test_seeded_defaults_to_expanded() {
        let state = ExpansionState::seeded(&items(&[1, 2, 3]));

        assert_eq!(state.len(), 3);
        assert!(state.is_expanded(ItemId::new(1)));
        assert!(state.is_expanded(ItemId::new(3)));
        // 未登録のIDも展開扱い
        assert!(state.is_expanded(ItemId::new(99)));
        assert!(!state.is_tracked(ItemId::new(99)));
    }

    #[test]
    fn test_toggle_twice_restores() {
        let mut state = ExpansionState::seeded(&items(&[1, 2]));

        assert!(!state.toggle(ItemId::new(1)));
        assert!(state.toggle(ItemId::new(1)));
        assert!(state.is_expanded(ItemId::new(1)));
    }

    #[test]
    fn test_toggle_is_isolated() {
        // Arrange
        let mut state = ExpansionState::seeded(&items(&[1, 2, 3]));
        state.set(ItemId::new(3), false);
        let before_2 = state.is_expanded(ItemId::new(2));
        let before_3 = state.is_expanded(ItemId::new(3));

        // Act
        state.toggle(ItemId::new(1));

        // Assert
        assert!(!state.is_expanded(ItemId::new(1)));
        assert_eq!(state.is_expanded(ItemId::new(2)), before_2);
        assert_eq!(state.is_expanded(ItemId::new(3)), before_3);
    }

    #[test]
    fn test_reseed_keeps_surviving_ids() {
        let mut state = ExpansionState::seeded(&items(&[1, 2, 3]));
        state.toggle(ItemId::new(2));
        state.toggle(ItemId::new(3));

        // 3 が消えて 4 が増えた
        state.reseed(&items(&[1, 2, 4]));

        assert_eq!(state.len(), 3);
        assert!(state.is_expanded(ItemId::new(1)));
        assert!(!state.is_expanded(ItemId::new(2)));
        assert!(state.is_expanded(ItemId::new(4)));
        assert!(!state.is_tracked(ItemId::new(3)));
    }

    #[test]
    fn test_observe_and_forget() {
        let mut state = ExpansionState::new();
        state.observe(ItemId::new(1));
        state.toggle(ItemId::new(1));
        // 既知のIDは上書きしない
        state.observe(ItemId::new(1));
        assert!(!state.is_expanded(ItemId::new(1)));

        state.forget(ItemId::new(1));
        assert!(state.is_empty());
    }

    #[test]
    fn test_collapse_and_expand_all() {
        let mut state = ExpansionState::seeded(&items(&[1, 2]));

        state.collapse_all();
        assert!(!state.is_expanded(ItemId::new(1)));
        assert!(!state.is_expanded(ItemId::new(2)));

        state.expand_all();
        assert!(state.is_expanded(ItemId::new(1)));
        assert!(state.is_expanded(ItemId::new(2)));
    }
}

use client::ListView;
use domain::{detached_items, ItemId, ListId, TodoList, TreeNode, User, VisibleRow};
use serde::Serialize;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListSummaryJson<'a> {
    pub id: ListId,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub done: usize,
    pub total: usize,
}

#[derive(Serialize)]
pub struct TreeJson<'a> {
    pub list: ListSummaryJson<'a>,
    pub items: &'a [TreeNode],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detached: Vec<ItemId>,
}

pub fn list_summary(list: &TodoList) -> ListSummaryJson<'_> {
    let (done, total) = list.progress();
    ListSummaryJson {
        id: list.id,
        title: &list.title,
        description: list.description.as_deref().filter(|d| !d.is_empty()),
        done,
        total,
    }
}

pub fn tree_json<'a>(view: &'a ListView, forest: &'a [TreeNode]) -> TreeJson<'a> {
    TreeJson {
        list: list_summary(&view.list),
        items: forest,
        detached: detached_items(view.items()).iter().map(|i| i.id).collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// 1行分: インデント、展開マーカー、完了チェック、タイトル、ID
pub fn format_row(row: &VisibleRow<'_>) -> String {
    let marker = match (row.node.has_children(), row.expanded) {
        (false, _) => ' ',
        (true, true) => '▼',
        (true, false) => '▶',
    };
    let check = if row.node.item.completed { 'x' } else { ' ' };
    format!(
        "{}{} [{}] {} #{}",
        "  ".repeat(row.depth),
        marker,
        check,
        row.node.item.title,
        row.node.id()
    )
}

pub fn format_tree(view: &ListView, rows: &[VisibleRow<'_>]) -> Vec<String> {
    let mut lines = vec![format_list_line(&view.list)];
    if rows.is_empty() {
        lines.push("  (no items)".to_string());
    }
    lines.extend(rows.iter().map(|row| format!("  {}", format_row(row))));

    let detached = detached_items(view.items());
    if !detached.is_empty() {
        let ids: Vec<String> = detached.iter().map(|i| format!("#{}", i.id)).collect();
        lines.push(format!(
            "  ({} item(s) not shown, parent missing: {})",
            detached.len(),
            ids.join(" ")
        ));
    }
    lines
}

pub fn format_list_line(list: &TodoList) -> String {
    let (done, total) = list.progress();
    match list.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => format!(
            "#{} {} ({}/{}) {}",
            list.id, list.title, done, total, description
        ),
        None => format!("#{} {} ({}/{})", list.id, list.title, done, total),
    }
}

pub fn format_user(user: &User) -> String {
    format!("{} <{}> (id {})", user.username, user.email, user.id)
}

//! `todo open <list>` の対話シェル
//!
//! 展開状態はシェルを抜けるまで保持される。

use std::io::Write;

use clap::{Parser, Subcommand};
use client::MutationCoordinator;
use domain::{ItemId, ListId};
use infrastructure::TodoApi;
use shared::AppError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::join_title;
use crate::output::{format_tree, tree_json};

#[derive(Parser)]
#[command(
    name = "shell",
    no_binary_name = true,
    disable_version_flag = true
)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    /// Print the tree again
    Show,
    /// Add a top-level item
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a sub-item
    Sub {
        parent: ItemId,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Toggle completion
    Toggle { item: ItemId },
    /// Delete an item
    Rm { item: ItemId },
    /// Move a top-level item to another list
    Mv { item: ItemId, to: ListId },
    /// Change title and description
    Edit {
        item: ItemId,
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Expand or collapse one item
    Fold { item: ItemId },
    /// Expand every item
    ExpandAll,
    /// Collapse every item
    CollapseAll,
    /// Fetch the list again
    Refresh,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

enum Flow {
    Render,
    Quit,
}

/// 入力が尽きるか `quit` まで1行ずつ実行する
pub async fn run<A, R, W>(
    coordinator: &mut MutationCoordinator<A>,
    input: R,
    out: &mut W,
    json: bool,
) -> anyhow::Result<()>
where
    A: TodoApi + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    render(coordinator, out, json)?;

    loop {
        write!(out, "{}> ", coordinator.view().list.title)?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        // 引用符で囲んだ語は1つの引数として扱う
        let Some(words) = shlex::split(&line) else {
            writeln!(out, "error: unbalanced quotes")?;
            continue;
        };
        if words.is_empty() {
            continue;
        }

        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                write!(out, "{e}")?;
                continue;
            }
        };

        match execute(coordinator, command).await {
            Ok(Flow::Render) => render(coordinator, out, json)?,
            Ok(Flow::Quit) => break,
            Err(e) => writeln!(out, "error: {}", e.user_message())?,
        }
    }
    Ok(())
}

async fn execute<A: TodoApi + ?Sized>(
    coordinator: &mut MutationCoordinator<A>,
    command: ShellCommand,
) -> Result<Flow, AppError> {
    match command {
        ShellCommand::Show => {}
        ShellCommand::Add { title, description } => {
            coordinator
                .create_item(&join_title(&title), description.as_deref())
                .await?;
        }
        ShellCommand::Sub {
            parent,
            title,
            description,
        } => {
            coordinator
                .create_subitem(parent, &join_title(&title), description.as_deref())
                .await?;
        }
        ShellCommand::Toggle { item } => {
            coordinator.toggle_completion(item).await?;
        }
        ShellCommand::Rm { item } => coordinator.delete_item(item).await?,
        ShellCommand::Mv { item, to } => coordinator.move_item(item, to).await?,
        ShellCommand::Edit {
            item,
            title,
            description,
        } => {
            coordinator
                .update_item(item, Some(&join_title(&title)), description.as_deref())
                .await?;
        }
        ShellCommand::Fold { item } => {
            coordinator.toggle_expanded(item)?;
        }
        ShellCommand::ExpandAll => coordinator.expand_all(),
        ShellCommand::CollapseAll => coordinator.collapse_all(),
        ShellCommand::Refresh => coordinator.refresh().await?,
        ShellCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Render)
}

fn render<A, W>(coordinator: &MutationCoordinator<A>, out: &mut W, json: bool) -> anyhow::Result<()>
where
    A: TodoApi + ?Sized,
    W: Write,
{
    let forest = coordinator.forest();
    if json {
        let value = tree_json(coordinator.view(), &forest);
        writeln!(out, "{}", serde_json::to_string(&value)?)?;
    } else {
        let rows = coordinator.visible_rows(&forest);
        for line in format_tree(coordinator.view(), &rows) {
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

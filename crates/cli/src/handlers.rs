use std::collections::BTreeSet;
use std::sync::Arc;

use client::{AuthService, ListsOverview, MutationCoordinator};
use domain::ListId;
use infrastructure::{SessionStore, TodoApi};
use serde::Serialize;
use serde_json::json;
use tokio::io::BufReader;

use crate::commands::*;
use crate::output::{format_list_line, format_tree, format_user, list_summary, tree_json};
use crate::shell;

/// コマンド実行に必要なもの
pub struct Context {
    pub api: Arc<dyn TodoApi>,
    pub sessions: Arc<dyn SessionStore>,
    pub json: bool,
}

impl Context {
    fn auth(&self) -> AuthService<dyn TodoApi> {
        AuthService::new(self.api.clone(), self.sessions.clone())
    }

    async fn open(&self, list: ListId) -> anyhow::Result<MutationCoordinator<dyn TodoApi>> {
        Ok(MutationCoordinator::open(self.api.clone(), list).await?)
    }

    fn emit<T: Serialize>(&self, value: &T, lines: Vec<String>) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            for line in lines {
                println!("{line}");
            }
        }
        Ok(())
    }

    fn emit_tree(&self, coordinator: &MutationCoordinator<dyn TodoApi>) -> anyhow::Result<()> {
        let forest = coordinator.forest();
        let rows = coordinator.visible_rows(&forest);
        self.emit(
            &tree_json(coordinator.view(), &forest),
            format_tree(coordinator.view(), &rows),
        )
    }
}

pub async fn dispatch(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        // Account commands
        Commands::Register(args) => cmd_register(ctx, args).await,
        Commands::Login(args) => cmd_login(ctx, args).await,
        Commands::Logout => cmd_logout(ctx).await,
        Commands::Whoami => cmd_whoami(ctx).await,
        Commands::Available(args) => cmd_available(ctx, args).await,

        // List commands
        Commands::Lists => cmd_lists(ctx).await,
        Commands::ListCreate(args) => cmd_list_create(ctx, args).await,
        Commands::ListEdit(args) => cmd_list_edit(ctx, args).await,
        Commands::ListDelete(args) => cmd_list_delete(ctx, args).await,

        // Item commands
        Commands::Show(args) => cmd_show(ctx, args).await,
        Commands::Add(args) => cmd_add(ctx, args).await,
        Commands::Sub(args) => cmd_sub(ctx, args).await,
        Commands::Toggle(args) => cmd_toggle(ctx, args).await,
        Commands::Rm(args) => cmd_rm(ctx, args).await,
        Commands::Mv(args) => cmd_mv(ctx, args).await,
        Commands::Edit(args) => cmd_edit(ctx, args).await,
        Commands::Open(args) => cmd_open(ctx, args).await,
    }
}

// ---------------------------------------------------------------------------
// Account commands
// ---------------------------------------------------------------------------

async fn cmd_register(ctx: &Context, args: RegisterArgs) -> anyhow::Result<()> {
    let user = ctx
        .auth()
        .register(&args.username, &args.email, &args.password)
        .await?;
    ctx.emit(&user, vec![format!("Registered and logged in as {}", format_user(&user))])
}

async fn cmd_login(ctx: &Context, args: LoginArgs) -> anyhow::Result<()> {
    let user = ctx.auth().login(&args.username, &args.password).await?;
    ctx.emit(&user, vec![format!("Logged in as {}", format_user(&user))])
}

async fn cmd_logout(ctx: &Context) -> anyhow::Result<()> {
    ctx.auth().logout().await?;
    ctx.emit(&json!({ "logged_out": true }), vec!["Logged out".to_string()])
}

/// サーバーに問い合わせ、通じなければ保存済みの情報を出す
async fn cmd_whoami(ctx: &Context) -> anyhow::Result<()> {
    let auth = ctx.auth();
    let Some(stored) = auth.current_user()? else {
        return ctx.emit(&json!({ "user": null }), vec!["Not logged in".to_string()]);
    };

    let user = match auth.refresh_profile().await {
        Ok(user) => user,
        Err(e) if e.is_retryable() => {
            tracing::warn!(error = %e, "Showing stored profile");
            stored
        }
        Err(e) => return Err(e.into()),
    };
    ctx.emit(&json!({ "user": user }), vec![format_user(&user)])
}

async fn cmd_available(ctx: &Context, args: AvailableArgs) -> anyhow::Result<()> {
    let auth = ctx.auth();
    let (field, value, available) = match (args.username, args.email) {
        (Some(username), _) => {
            let available = auth.username_available(&username).await?;
            ("username", username, available)
        }
        (None, Some(email)) => {
            let available = auth.email_available(&email).await?;
            ("email", email, available)
        }
        (None, None) => anyhow::bail!("pass --username or --email"),
    };

    let verdict = if available { "available" } else { "taken" };
    ctx.emit(
        &json!({ field: value, "available": available }),
        vec![format!("{field} '{value}' is {verdict}")],
    )
}

// ---------------------------------------------------------------------------
// List commands
// ---------------------------------------------------------------------------

async fn cmd_lists(ctx: &Context) -> anyhow::Result<()> {
    let mut overview = ListsOverview::new(ctx.api.clone());
    let lists = overview.fetch().await?;

    let summaries: Vec<_> = lists.iter().map(list_summary).collect();
    let mut lines: Vec<String> = lists.iter().map(format_list_line).collect();
    if lines.is_empty() {
        lines.push("No lists yet. Create one with `todo list-create <title>`.".to_string());
    }
    ctx.emit(&summaries, lines)
}

async fn cmd_list_create(ctx: &Context, args: ListCreateArgs) -> anyhow::Result<()> {
    let mut overview = ListsOverview::new(ctx.api.clone());
    let list = overview
        .create(&args.title, args.description.as_deref())
        .await?;
    ctx.emit(
        &list_summary(&list),
        vec![format!("Created {}", format_list_line(&list))],
    )
}

async fn cmd_list_edit(ctx: &Context, args: ListEditArgs) -> anyhow::Result<()> {
    let mut overview = ListsOverview::new(ctx.api.clone());
    let list = overview
        .update(args.id, &args.title, args.description.as_deref())
        .await?;
    ctx.emit(
        &list_summary(&list),
        vec![format!("Updated {}", format_list_line(&list))],
    )
}

async fn cmd_list_delete(ctx: &Context, args: ListDeleteArgs) -> anyhow::Result<()> {
    let mut overview = ListsOverview::new(ctx.api.clone());
    overview.delete(args.id).await?;
    ctx.emit(
        &json!({ "deleted": args.id }),
        vec![format!("Deleted list #{}", args.id)],
    )
}

// ---------------------------------------------------------------------------
// Item commands
// ---------------------------------------------------------------------------

async fn cmd_show(ctx: &Context, args: ShowArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    let collapse: BTreeSet<_> = args.collapse.into_iter().collect();
    for id in collapse {
        coordinator.toggle_expanded(id)?;
    }
    ctx.emit_tree(&coordinator)
}

async fn cmd_add(ctx: &Context, args: AddArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator
        .create_item(&join_title(&args.title), args.description.as_deref())
        .await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_sub(ctx: &Context, args: SubArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator
        .create_subitem(
            args.parent,
            &join_title(&args.title),
            args.description.as_deref(),
        )
        .await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_toggle(ctx: &Context, args: ItemRef) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator.toggle_completion(args.item).await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_rm(ctx: &Context, args: ItemRef) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator.delete_item(args.item).await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_mv(ctx: &Context, args: MvArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator.move_item(args.item, args.to).await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_edit(ctx: &Context, args: EditArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    coordinator
        .update_item(
            args.item,
            Some(&join_title(&args.title)),
            args.description.as_deref(),
        )
        .await?;
    ctx.emit_tree(&coordinator)
}

async fn cmd_open(ctx: &Context, args: OpenArgs) -> anyhow::Result<()> {
    let mut coordinator = ctx.open(args.list).await?;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    shell::run(&mut coordinator, stdin, &mut stdout, ctx.json).await
}

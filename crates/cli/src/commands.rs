use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use domain::{ItemId, ListId};

#[derive(Parser)]
#[command(name = "todo", about = "Nested todo lists from the terminal", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// REST API base URL (overrides TODO_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Where the login session is stored (overrides TODO_SESSION_FILE)
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and log in
    Register(RegisterArgs),
    /// Log in and store the session
    Login(LoginArgs),
    /// Log out and forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Check whether a username or email is still free
    Available(AvailableArgs),

    /// List all todo lists
    Lists,
    /// Create a list
    ListCreate(ListCreateArgs),
    /// Change a list's title and description
    ListEdit(ListEditArgs),
    /// Delete a list and its items
    ListDelete(ListDeleteArgs),

    /// Show the item tree of a list
    Show(ShowArgs),
    /// Add a top-level item
    Add(AddArgs),
    /// Add a sub-item under an item
    Sub(SubArgs),
    /// Toggle completion (applies to all sub-items)
    Toggle(ItemRef),
    /// Delete an item (its sub-items move to the top level)
    Rm(ItemRef),
    /// Move a top-level item to another list
    Mv(MvArgs),
    /// Change an item's title and description
    Edit(EditArgs),
    /// Work on one list interactively
    Open(OpenArgs),
}

// ---------------------------------------------------------------------------
// Account args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RegisterArgs {
    pub username: String,
    pub email: String,
    #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct LoginArgs {
    pub username: String,
    #[arg(long, env = "TODO_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
#[command(group(ArgGroup::new("field").required(true).args(["username", "email"])))]
pub struct AvailableArgs {
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// List args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListCreateArgs {
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct ListEditArgs {
    pub id: ListId,
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct ListDeleteArgs {
    pub id: ListId,
}

// ---------------------------------------------------------------------------
// Item args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ShowArgs {
    pub list: ListId,
    /// Collapse these items (repeatable)
    #[arg(long, num_args = 1..)]
    pub collapse: Vec<ItemId>,
}

#[derive(Args)]
pub struct AddArgs {
    pub list: ListId,
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct SubArgs {
    pub list: ListId,
    pub parent: ItemId,
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct ItemRef {
    pub list: ListId,
    pub item: ItemId,
}

#[derive(Args)]
pub struct MvArgs {
    pub list: ListId,
    pub item: ItemId,
    /// Destination list
    pub to: ListId,
}

#[derive(Args)]
pub struct EditArgs {
    pub list: ListId,
    pub item: ItemId,
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct OpenArgs {
    pub list: ListId,
}

/// 複数の単語をタイトルとして連結
pub fn join_title(words: &[String]) -> String {
    words.join(" ")
}

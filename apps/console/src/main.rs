use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_settings, AlwaysConfirm, AuthClient, Cities, ClientError, Companies, Confirm,
    ConfirmPrompt, ControllerEvent, Creatable, Deletable, Draft, HttpApiClient, ListController,
    LoadOutcome, Lookup, NoticeKind, RemoveOutcome, Regions, Resource, ResourceApi, Settings,
    Towns, Updatable, Users,
};
use serde_json::Value;
use shared::domain::{Page, RecordId, Session, SortDirection, SortSpec};
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(about = "Browse and edit registry records from the terminal")]
struct Cli {
    /// Overrides `api_base_url` from client.toml / APP__API_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    credentials_db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    SignIn {
        email: String,
        #[arg(long)]
        password: String,
    },
    SignOut,
    Whoami,
    ResetPassword {
        email: String,
    },
    ConfirmReset {
        key: String,
        new_password: String,
    },
    Activate {
        email: String,
    },
    List {
        resource: ResourceKind,
        /// Zero-based page index.
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value = "asc")]
        direction: SortDirection,
    },
    Create {
        resource: ResourceKind,
        /// `name=value`; values that parse as JSON are sent as JSON.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Update {
        resource: ResourceKind,
        id: i64,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    Delete {
        resource: ResourceKind,
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    Lookup {
        list: LookupKind,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResourceKind {
    Users,
    Companies,
    Towns,
    Regions,
    Cities,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LookupKind {
    Towns,
    Regions,
    Cities,
    CompanyTypes,
    Companies,
    Departments,
}

impl From<LookupKind> for Lookup {
    fn from(kind: LookupKind) -> Self {
        match kind {
            LookupKind::Towns => Lookup::Towns,
            LookupKind::Regions => Lookup::Regions,
            LookupKind::Cities => Lookup::Cities,
            LookupKind::CompanyTypes => Lookup::CompanyTypes,
            LookupKind::Companies => Lookup::Companies,
            LookupKind::Departments => Lookup::Departments,
        }
    }
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

macro_rules! for_resource {
    ($kind:expr, $run:ident($($arg:expr),* $(,)?)) => {
        match $kind {
            ResourceKind::Users => $run::<Users>($($arg),*).await,
            ResourceKind::Companies => $run::<Companies>($($arg),*).await,
            ResourceKind::Towns => $run::<Towns>($($arg),*).await,
            ResourceKind::Regions => $run::<Regions>($($arg),*).await,
            ResourceKind::Cities => $run::<Cities>($($arg),*).await,
        }
    };
}

/// Signed-in context shared by every record command.
struct SignedIn {
    api: Arc<dyn ResourceApi>,
    session: Arc<Session>,
    settings: Settings,
}

impl SignedIn {
    fn controller<R: Resource>(&self) -> Arc<ListController<R>> {
        ListController::with_options(
            Arc::clone(&self.api),
            Arc::clone(&self.session),
            self.settings.page_size,
            self.settings.restricted_role.clone(),
        )
    }
}

struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        let mut stdout = tokio::io::stdout();
        let question = format!("{}: {} [y/N] ", prompt.title, prompt.message);
        if stdout.write_all(question.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }
        let mut answer = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut answer).await {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings().context("failed to load client settings")?;
    if let Some(base_url) = cli.base_url {
        settings.api_base_url = base_url;
    }
    if let Some(db) = cli.credentials_db {
        settings.credentials_db_url = db;
    }
    debug!(?settings, "settings loaded");

    let store = Arc::new(Storage::new(&settings.credentials_db_url).await?);
    let auth = AuthClient::new(&settings.api_base_url, store)?;

    match cli.command {
        Command::SignIn { email, password } => {
            let session = auth.sign_in(&email, &password).await?;
            println!(
                "signed in as {} {} ({})",
                session.profile.name, session.profile.surname, session.role
            );
        }
        Command::SignOut => {
            auth.sign_out().await?;
            println!("signed out");
        }
        Command::Whoami => match auth.current_session().await? {
            Some(session) => print_session(&session),
            None => println!("not signed in"),
        },
        Command::ResetPassword { email } => {
            auth.request_password_reset(&email).await?;
            println!("password reset email requested for {email}");
        }
        Command::ConfirmReset { key, new_password } => {
            auth.confirm_password_reset(&key, &new_password).await?;
            println!("password changed");
        }
        Command::Activate { email } => {
            auth.activate(&email).await?;
            println!("activation email requested for {email}");
        }
        command => {
            let session = auth.require_session().await?;
            let ctx = SignedIn {
                api: Arc::new(HttpApiClient::new(&settings.api_base_url)?),
                session: Arc::new(session),
                settings,
            };
            run_record_command(&ctx, command).await?;
        }
    }

    Ok(())
}

async fn run_record_command(ctx: &SignedIn, command: Command) -> Result<()> {
    match command {
        Command::List {
            resource,
            page,
            sort,
            direction,
        } => for_resource!(resource, list(ctx, page, sort, direction)),
        Command::Create { resource, fields } => for_resource!(resource, create(ctx, fields)),
        Command::Update {
            resource,
            id,
            fields,
        } => for_resource!(resource, update(ctx, RecordId(id), fields)),
        Command::Delete { resource, id, yes } => {
            for_resource!(resource, delete(ctx, RecordId(id), yes))
        }
        Command::Lookup { list } => {
            let items = ctx
                .api
                .fetch_lookup(Lookup::from(list).path(), &ctx.session.token)
                .await?;
            for item in items {
                println!("{}\t{}", item.id, item.name);
            }
            Ok(())
        }
        other => Err(anyhow!("{other:?} does not operate on records")),
    }
}

async fn list<R: Resource>(
    ctx: &SignedIn,
    page: u32,
    sort: Option<String>,
    direction: SortDirection,
) -> Result<()> {
    let field = sort.unwrap_or_else(|| "id".to_string());
    if !R::is_sort_field(&field) {
        let known: Vec<_> = R::SORT_FIELDS.iter().map(|f| f.value).collect();
        return Err(ClientError::UnknownSortField {
            resource: R::PATH,
            field,
        })
        .with_context(|| format!("sortable fields: {}", known.join(", ")));
    }

    let controller = ctx.controller::<R>();
    match controller.load(page, SortSpec::new(field, direction)).await? {
        LoadOutcome::Loaded(page) => print_page::<R>(&page, controller.can_write()),
        LoadOutcome::Superseded | LoadOutcome::Unchanged => println!("no page loaded"),
    }
    Ok(())
}

async fn create<R: Creatable>(ctx: &SignedIn, fields: Vec<(String, Value)>) -> Result<()> {
    let controller = ctx.controller::<R>();
    let mut events = controller.subscribe_events();
    let mut draft = Draft::empty();
    for (name, value) in fields {
        draft.set(name, value);
    }
    let result = controller.create(&draft).await;
    print_notices(&mut events);
    let record = result?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn update<R: Updatable>(
    ctx: &SignedIn,
    id: RecordId,
    fields: Vec<(String, Value)>,
) -> Result<()> {
    let controller = ctx.controller::<R>();
    let mut events = controller.subscribe_events();
    let mut draft = Draft::empty();
    for (name, value) in fields {
        draft.set(name, value);
    }
    let result = controller.update(id, &draft).await;
    print_notices(&mut events);
    let record = result?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn delete<R: Deletable>(ctx: &SignedIn, id: RecordId, yes: bool) -> Result<()> {
    let controller = ctx.controller::<R>();
    let mut events = controller.subscribe_events();
    let confirm: &dyn Confirm = if yes { &AlwaysConfirm } else { &StdinConfirm };
    let result = controller.remove(id, confirm).await;
    print_notices(&mut events);
    if result? == RemoveOutcome::Cancelled {
        println!("cancelled");
    }
    Ok(())
}

fn print_notices(events: &mut broadcast::Receiver<ControllerEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::Notice(notice) = event {
            match notice.kind {
                NoticeKind::Success => println!("{}", notice.message),
                NoticeKind::Error => eprintln!("{}", notice.message),
            }
        }
    }
}

fn print_page<R: Resource>(page: &Page, can_write: bool) {
    println!(
        "{} page {}/{}{}",
        R::TITLE,
        page.index + 1,
        page.total_pages.max(1),
        if can_write { "" } else { " (read only)" }
    );
    if page.content.is_empty() {
        println!("  (no records)");
    }
    for record in &page.content {
        let id = record
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut fields = record.fields().clone();
        fields.remove("id");
        println!("  {id}\t{}", Value::Object(fields));
    }
}

fn print_session(session: &Session) {
    let profile = &session.profile;
    println!("name:       {} {}", profile.name, profile.surname);
    println!("email:      {}", profile.email);
    println!("role:       {}", session.role);
    if let Some(department) = &profile.department {
        println!("department: {department}");
    }
    if let Some(company) = &profile.company {
        println!("company:    {company}");
    }
    println!("signed in:  {}", session.signed_in_at.to_rfc3339());
}

mod config;

use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::auth::{password_strength, strength_label};
use client_core::forms::{ClientForm, ProjectForm, CURRENCY_OPTIONS};
use client_core::phone::{PhoneField, DEFAULT_COUNTRY};
use client_core::views::{self, ProjectTab};
use client_core::{
    AuthClient, CollectionController, MutationEvent, RecordApi, RecordKey, RemoteRecord,
    RestTransport, Session, SignupOutcome,
};
use shared::domain::{ClientId, ClientRecord, PaymentStatus, ProjectRecord, ProjectStatus};
use shared::protocol::{ClientPatch, ProjectPatch};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "crm", about = "Freelancer CRM terminal client")]
struct Cli {
    /// Base URL of the CRM API, e.g. http://127.0.0.1:8000/api
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account, logging straight in when possible.
    Signup { username: String, password: String },
    /// Check the given credentials against the API.
    Login,
    #[command(subcommand)]
    Clients(ClientsCommand),
    #[command(subcommand)]
    Projects(ProjectsCommand),
}

#[derive(Subcommand, Debug)]
enum ClientsCommand {
    List,
    Add {
        name: String,
        /// National part of the phone number, digits only.
        phone: String,
        #[arg(long, default_value = DEFAULT_COUNTRY)]
        country: String,
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long)]
        email: Option<String>,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = DEFAULT_COUNTRY)]
        country: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Delete {
        id: i64,
        /// Skip the confirmation step.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectsCommand {
    List {
        #[arg(long, value_enum, default_value = "all")]
        tab: TabArg,
        #[arg(long, default_value = "")]
        search: String,
    },
    Add {
        title: String,
        client_id: i64,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        due_date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "unpaid")]
        payment_status: PaymentStatusArg,
        #[arg(long, default_value_t = 0.0)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    /// Flip a project between active and completed.
    ToggleStatus {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    SetPaymentStatus {
        id: i64,
        #[arg(value_enum)]
        status: PaymentStatusArg,
    },
    SetPayment {
        id: i64,
        /// Omit to clear the recorded amount.
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long, default_value = "USD")]
        currency: String,
    },
    Delete {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TabArg {
    All,
    Active,
    Completed,
    Outstanding,
}

impl From<TabArg> for ProjectTab {
    fn from(tab: TabArg) -> Self {
        match tab {
            TabArg::All => ProjectTab::All,
            TabArg::Active => ProjectTab::Active,
            TabArg::Completed => ProjectTab::Completed,
            TabArg::Outstanding => ProjectTab::Outstanding,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaymentStatusArg {
    Paid,
    Unpaid,
    Partial,
}

impl From<PaymentStatusArg> for PaymentStatus {
    fn from(status: PaymentStatusArg) -> Self {
        match status {
            PaymentStatusArg::Paid => PaymentStatus::Paid,
            PaymentStatusArg::Unpaid => PaymentStatus::Unpaid,
            PaymentStatusArg::Partial => PaymentStatus::Partial,
        }
    }
}

/// Terminal state of the single mutation a command issued.
enum Outcome<R> {
    Saved(R),
    Deleted,
    Failed,
}

/// Waits for the mutation started just before the subscription to settle.
/// Commands issue one mutation at a time, so the first terminal event is ours.
async fn await_outcome<R: RemoteRecord>(
    rx: &mut broadcast::Receiver<MutationEvent<R>>,
) -> Result<Outcome<R>> {
    loop {
        match rx.recv().await {
            Ok(MutationEvent::Reconciled { record, .. }) => return Ok(Outcome::Saved(record)),
            Ok(MutationEvent::Removed { .. }) => return Ok(Outcome::Deleted),
            Ok(MutationEvent::MutationFailed { reason, .. }) => {
                eprintln!("error: {reason} (the change was rolled back)");
                return Ok(Outcome::Failed);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => bail!("mutation event channel closed"),
        }
    }
}

fn known_currency(currency: &str) -> bool {
    CURRENCY_OPTIONS.contains(&currency)
}

fn canonical_phone(country: &str, national: &str) -> Option<String> {
    let mut field = PhoneField::new();
    field.select_country(country);
    let value = field.set_national(national);
    value.valid.then_some(value.canonical)
}

fn payment_text(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Paid => "paid",
        PaymentStatus::Unpaid => "unpaid",
        PaymentStatus::Partial => "partial",
    }
}

fn print_projects(projects: &[&ProjectRecord], clients: &[ClientRecord], today: NaiveDate) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    for project in projects {
        let status = match project.status {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
        };
        let client = views::client_name(clients, project.client)
            .or(project.client_name.as_deref())
            .unwrap_or("-");
        let overdue = if views::is_overdue(project, today) {
            "  [overdue]"
        } else {
            ""
        };
        println!(
            "{:>4}  {:<28} {:<10} {:<8} {:<14} client: {client}{overdue}",
            project.id.0,
            project.title,
            status,
            payment_text(project.payment_status),
            views::format_money(project.payment_amount, project.payment_currency.as_deref()),
        );
    }
}

async fn run_clients(
    cmd: ClientsCommand,
    controller: Arc<CollectionController<ClientRecord>>,
) -> Result<()> {
    controller.refresh().await?;
    match cmd {
        ClientsCommand::List => {
            let clients = controller.records().await;
            if clients.is_empty() {
                println!("No clients yet.");
            }
            for client in clients {
                println!(
                    "{:>4}  {:<24} {:<16} {}",
                    client.id.0, client.name, client.phone, client.company
                );
            }
        }
        ClientsCommand::Add {
            name,
            phone,
            country,
            company,
            email,
        } => {
            let mut form = ClientForm::new();
            form.name = name;
            form.email = email.unwrap_or_default();
            form.company = company;
            form.phone.select_country(&country);
            form.phone.set_national(&phone);
            let fields = match form.validate() {
                Ok(fields) => fields,
                Err(err) => {
                    eprintln!("error: {err}");
                    return Ok(());
                }
            };
            let mut rx = controller.subscribe_events();
            controller.create(fields).await;
            if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                println!("created client {} ({})", record.id.0, record.name);
            }
        }
        ClientsCommand::Update {
            id,
            name,
            phone,
            country,
            company,
            email,
        } => {
            let mut patch = ClientPatch {
                name,
                email,
                company,
                phone: None,
            };
            if let Some(phone) = phone {
                match canonical_phone(&country, &phone) {
                    Some(canonical) => patch.phone = Some(canonical),
                    None => {
                        eprintln!("error: phone number must be between 7 and 12 digits");
                        return Ok(());
                    }
                }
            }
            let mut rx = controller.subscribe_events();
            match controller.partial_update(RecordKey::Server(id), patch).await {
                Ok(()) => {
                    if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                        println!("updated client {}", record.id.0);
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
        ClientsCommand::Delete { id, yes } => {
            if !yes {
                println!("Are you sure you want to delete client {id}? Re-run with --yes.");
                return Ok(());
            }
            let mut rx = controller.subscribe_events();
            match controller.delete(RecordKey::Server(id)).await {
                Ok(()) => {
                    if let Outcome::Deleted = await_outcome(&mut rx).await? {
                        println!("deleted client {id}");
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
    }
    Ok(())
}

async fn run_projects(
    cmd: ProjectsCommand,
    controller: Arc<CollectionController<ProjectRecord>>,
    clients: Arc<CollectionController<ClientRecord>>,
) -> Result<()> {
    controller.refresh().await?;
    let today = Local::now().date_naive();
    match cmd {
        ProjectsCommand::List { tab, search } => {
            clients.refresh().await?;
            let projects = controller.records().await;
            let client_records = clients.records().await;
            let filtered =
                views::filter_projects(&projects, &client_records, tab.into(), &search);
            print_projects(&filtered, &client_records, today);
        }
        ProjectsCommand::Add {
            title,
            client_id,
            start_date,
            due_date,
            payment_status,
            amount,
            currency,
        } => {
            if !known_currency(&currency) {
                eprintln!("error: currency must be one of {}", CURRENCY_OPTIONS.join(", "));
                return Ok(());
            }
            let form = ProjectForm {
                title,
                client: Some(ClientId(client_id)),
                start_date,
                due_date,
                payment_status: payment_status.into(),
                payment_amount: amount,
                payment_currency: currency,
            };
            let fields = match form.validate(today) {
                Ok(fields) => fields,
                Err(err) => {
                    eprintln!("error: {err}");
                    return Ok(());
                }
            };
            let mut rx = controller.subscribe_events();
            controller.create(fields).await;
            if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                println!("created project {} ({})", record.id.0, record.title);
            }
        }
        ProjectsCommand::ToggleStatus { id, yes } => {
            let key = RecordKey::Server(id);
            let Some(project) = controller.get(key).await else {
                eprintln!("error: no project with id {id}");
                return Ok(());
            };
            let next = project.status.toggled();
            if !yes {
                println!(
                    "Mark project {id} as {}? Re-run with --yes.",
                    match next {
                        ProjectStatus::Active => "active",
                        ProjectStatus::Completed => "completed",
                    }
                );
                return Ok(());
            }
            let patch = ProjectPatch {
                status: Some(next),
                ..ProjectPatch::default()
            };
            let mut rx = controller.subscribe_events();
            match controller.partial_update(key, patch).await {
                Ok(()) => {
                    if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                        println!("project {} is now {}", record.id.0, payment_text_status(record.status));
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
        ProjectsCommand::SetPaymentStatus { id, status } => {
            let patch = ProjectPatch {
                payment_status: Some(status.into()),
                ..ProjectPatch::default()
            };
            let mut rx = controller.subscribe_events();
            match controller.partial_update(RecordKey::Server(id), patch).await {
                Ok(()) => {
                    if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                        println!(
                            "project {} payment is now {}",
                            record.id.0,
                            payment_text(record.payment_status)
                        );
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
        ProjectsCommand::SetPayment {
            id,
            amount,
            currency,
        } => {
            if !known_currency(&currency) {
                eprintln!("error: currency must be one of {}", CURRENCY_OPTIONS.join(", "));
                return Ok(());
            }
            let patch = ProjectPatch {
                payment_amount: Some(amount),
                payment_currency: Some(currency),
                ..ProjectPatch::default()
            };
            let mut rx = controller.subscribe_events();
            match controller.partial_update(RecordKey::Server(id), patch).await {
                Ok(()) => {
                    if let Outcome::Saved(record) = await_outcome(&mut rx).await? {
                        println!(
                            "project {} payment set to {}",
                            record.id.0,
                            views::format_money(
                                record.payment_amount,
                                record.payment_currency.as_deref()
                            )
                        );
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
        ProjectsCommand::Delete { id, yes } => {
            if !yes {
                println!("Are you sure you want to delete project {id}? Re-run with --yes.");
                return Ok(());
            }
            let mut rx = controller.subscribe_events();
            match controller.delete(RecordKey::Server(id)).await {
                Ok(()) => {
                    if let Outcome::Deleted = await_outcome(&mut rx).await? {
                        println!("deleted project {id}");
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            }
        }
    }
    Ok(())
}

fn payment_text_status(status: ProjectStatus) -> &'static str {
    match status {
        ProjectStatus::Active => "active",
        ProjectStatus::Completed => "completed",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = config::load_settings();
    if let Some(api_base) = &cli.api_base {
        settings.api_base = api_base.clone();
    }
    let api_base = config::normalize_api_base(&settings.api_base)?;

    let session = Session::new();
    let auth = AuthClient::new(api_base.clone());

    let command = match cli.command {
        Command::Signup { username, password } => {
            match auth.sign_up(&session, &username, &password).await {
                Ok(SignupOutcome::LoggedIn) => println!("Account created; you are logged in."),
                Ok(SignupOutcome::RegisteredLoginRequired) => {
                    println!("Account created; please log in with `crm login`.")
                }
                Err(err) => {
                    if matches!(err, client_core::SignupError::WeakPassword) {
                        eprintln!(
                            "password strength: {}",
                            strength_label(password_strength(&password))
                        );
                    }
                    eprintln!("error: {err}");
                }
            }
            return Ok(());
        }
        command => command,
    };

    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        println!("Logging in...");
        auth.login(&session, username, password).await?;
    }

    match command {
        Command::Signup { .. } => {}
        Command::Login => {
            if !session.is_authenticated().await {
                bail!("provide --username and --password to log in");
            }
            println!("Logged in.");
        }
        Command::Clients(cmd) => {
            let transport = Arc::new(RestTransport::new(api_base, session.clone()));
            let controller =
                CollectionController::new(transport.clone() as Arc<dyn RecordApi<ClientRecord>>);
            run_clients(cmd, controller).await?;
        }
        Command::Projects(cmd) => {
            let transport = Arc::new(RestTransport::new(api_base, session.clone()));
            let projects =
                CollectionController::new(transport.clone() as Arc<dyn RecordApi<ProjectRecord>>);
            let clients =
                CollectionController::new(transport.clone() as Arc<dyn RecordApi<ClientRecord>>);
            run_projects(cmd, projects, clients).await?;
        }
    }

    Ok(())
}

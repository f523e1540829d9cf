use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, AddRowForm, CommitTrigger, ConfirmDelete, DeleteOutcome, RowEditSession,
    TableController, TableError,
};
use shared::domain::{Duty, DutyField, DutyKey};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "duties", about = "Manage the remote duty list")]
struct Cli {
    /// Overrides BASEURL and duties.toml.
    #[arg(long)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
    },
    Edit {
        key: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
    Delete {
        key: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// Answer collected before the delete runs, so no stdin read happens on the
/// runtime.
struct PresetAnswer(bool);

impl ConfirmDelete for PresetAnswer {
    fn confirm(&self, _row: Option<&Duty>, _key: &DutyKey) -> bool {
        self.0
    }
}

fn delete_label(row: Option<&Duty>, key: &DutyKey) -> String {
    row.map(|row| format!("{} ({})", row.name, row.id))
        .unwrap_or_else(|| format!("key {key}"))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn prompt_delete(label: &str) -> bool {
    print!("Sure to delete {label}? [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_affirmative(&answer)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(base_url) = cli.base_url.as_deref() {
        settings = settings.with_base_url(base_url);
    }
    tracing::debug!(base_url = %settings.base_url, "using duties service");

    let table = TableController::from_settings(&settings)?;
    table.refresh().await?;

    let rows = match cli.command {
        Command::List => table.rows().await,
        Command::Add { id, name } => {
            let mut form = AddRowForm::duties()?;
            form.set("id", id)?;
            form.set("name", name)?;
            table.add_row(&mut form).await.map_err(describe)?
        }
        Command::Edit { key, field, value } => {
            let field = DutyField::parse(&field)
                .ok_or_else(|| anyhow!("unknown field '{field}', expected id or name"))?;
            let key = DutyKey::new(key);
            let Some(record) = table.row(&key).await else {
                bail!("no duty with key {key}");
            };
            let mut session = RowEditSession::new(record);
            session.open(field);
            session.input(field, value);
            match table
                .commit_cell(&mut session, field, CommitTrigger::Enter)
                .await
                .map_err(describe)?
            {
                Some(rows) => rows,
                None => table.rows().await,
            }
        }
        Command::Delete { key, yes } => {
            let key = DutyKey::new(key);
            let answer = if yes {
                true
            } else {
                let label = delete_label(table.row(&key).await.as_ref(), &key);
                tokio::task::spawn_blocking(move || prompt_delete(&label)).await?
            };
            match table
                .request_delete(&key, &PresetAnswer(answer))
                .await
                .map_err(describe)?
            {
                DeleteOutcome::Cancelled => {
                    println!("Delete cancelled.");
                    table.rows().await
                }
                DeleteOutcome::Deleted(rows) => rows,
            }
        }
    };

    print_table(&rows);
    Ok(())
}

fn describe(error: TableError) -> anyhow::Error {
    if error.is_validation() {
        anyhow!("invalid input: {error}")
    } else {
        anyhow!("duties service request failed: {error}")
    }
}

fn print_table(rows: &[Duty]) {
    let key_width = column_width("key", rows.iter().map(|row| row.key.as_str()));
    let id_width = column_width("id", rows.iter().map(|row| row.id.as_str()));

    println!("{:<key_width$}  {:<id_width$}  name", "key", "id");
    for row in rows {
        println!(
            "{:<key_width$}  {:<id_width$}  {}",
            row.key.as_str(),
            row.id,
            row.name
        );
    }
    if rows.is_empty() {
        println!("(no duties)");
    }
}

fn column_width<'a>(title: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(title.len())
}

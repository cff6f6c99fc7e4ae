//! gd-contacts: command-line access to a domain's shared contacts
//!
//! Usage:
//!   gd-contacts list [--max N] [--deleted] [--query TERM]...
//!   gd-contacts get <id> [--json]
//!   gd-contacts delete <id> <etag>
//!   gd-contacts --help

use gd_contacts::prelude::*;
use gd_contacts::{ContactsError, InstantMessage, SCOPES};
use tracing_subscriber::EnvFilter;

/// Command to run
enum Command {
    List {
        max_results: Option<u32>,
        show_deleted: bool,
        query: Vec<String>,
    },
    Get {
        id: String,
        json: bool,
    },
    Delete {
        id: String,
        etag: String,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(2);
        }
    };

    match command {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("gd-contacts {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = DirectoryConfig::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
    if config.access_token.is_none() {
        tracing::warn!(
            "CONTACTS_ACCESS_TOKEN is not set; requests will be unauthenticated (scopes: {})",
            SCOPES.join(" ")
        );
    }

    let client = DirectoryClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create directory client: {}", e))?;

    match command {
        Command::List {
            max_results,
            show_deleted,
            query,
        } => run_list(&client, max_results, show_deleted, query).await,
        Command::Get { id, json } => run_get(&client, &id, json).await,
        Command::Delete { id, etag } => run_delete(&client, &id, &etag).await,
        Command::Help | Command::Version => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut args = args.into_iter();

    let Some(first) = args.next() else {
        return Ok(Command::Help);
    };

    match first.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "--version" | "-v" => Ok(Command::Version),
        "list" => {
            let mut max_results = None;
            let mut show_deleted = false;
            let mut query = Vec::new();

            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--max" | "-n" => {
                        let value = args.next().ok_or("--max needs a value")?;
                        let n = value
                            .parse()
                            .map_err(|_| format!("invalid --max value: {}", value))?;
                        max_results = Some(n);
                    }
                    "--deleted" => show_deleted = true,
                    "--query" | "-q" => query.push(args.next().ok_or("--query needs a value")?),
                    other => return Err(format!("unknown list option: {}", other)),
                }
            }

            Ok(Command::List {
                max_results,
                show_deleted,
                query,
            })
        }
        "get" => {
            let id = args.next().ok_or("get needs a contact id")?;
            let json = match args.next().as_deref() {
                None => false,
                Some("--json") => true,
                Some(other) => return Err(format!("unknown get option: {}", other)),
            };
            Ok(Command::Get { id, json })
        }
        "delete" => {
            let id = args.next().ok_or("delete needs a contact id")?;
            let etag = args.next().ok_or("delete needs the contact's etag (or *)")?;
            Ok(Command::Delete { id, etag })
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Print help message
fn print_help() {
    println!("gd-contacts - shared contacts directory client");
    println!();
    println!("Usage:");
    println!("  gd-contacts list [--max N] [--deleted] [--query TERM]...");
    println!("                                List contacts (all pages)");
    println!("  gd-contacts get <id> [--json] Show one contact");
    println!("  gd-contacts delete <id> <etag>");
    println!("                                Delete a contact (etag * skips the version check)");
    println!("  gd-contacts --help            Show this help message");
    println!("  gd-contacts --version         Show version");
    println!();
    println!("Environment Variables:");
    println!("  CONTACTS_DOMAIN        Domain whose contacts are managed (required)");
    println!("  CONTACTS_ACCESS_TOKEN  OAuth2 access token");
    println!("  CONTACTS_BASE_URL      Feeds base URL (default: https://www.google.com/m8/feeds)");
    println!("  CONTACTS_PROJECTION    Default projection (default: full)");
    println!("  CONTACTS_TIMEOUT_SECS  Request timeout (default: 30)");
    println!();
    println!("Settings are also read from ./gd-contacts.toml when present.");
}

async fn run_list(
    client: &DirectoryClient,
    max_results: Option<u32>,
    show_deleted: bool,
    query: Vec<String>,
) -> anyhow::Result<()> {
    let mut options = Vec::new();
    if let Some(n) = max_results {
        options.push(ListOption::MaxResults(n));
    }
    if show_deleted {
        options.push(ListOption::ShowDeleted(true));
    }
    if !query.is_empty() {
        options.push(ListOption::TextQuery(query));
    }

    match client.list(None, None, &options).await? {
        Listing::Changed { contacts, status } => {
            for contact in &contacts {
                let marker = if contact.is_deleted() { " (deleted)" } else { "" };
                println!(
                    "{}\t{}\t{}{}",
                    contact.id(),
                    contact.name.full_name,
                    contact.etag(),
                    marker
                );
            }
            println!();
            println!(
                "{} contacts, feed etag {}, updated {}",
                contacts.len(),
                status.etag,
                status
                    .updated
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Listing::Unchanged => println!("Feed unchanged"),
    }
    Ok(())
}

async fn run_get(client: &DirectoryClient, id: &str, json: bool) -> anyhow::Result<()> {
    let contact = match client.get(id, None, None).await? {
        Fetch::Changed(contact) => contact,
        Fetch::NotFound => anyhow::bail!("contact {} not found", id),
        Fetch::Unchanged => return Ok(()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&contact)?);
        return Ok(());
    }

    println!("id:      {}", contact.id());
    println!("etag:    {}", contact.etag());
    if let Some(updated) = contact.updated() {
        println!("updated: {}", updated.to_rfc3339());
    }
    println!("name:    {}", contact.name.full_name);
    for email in &contact.emails {
        println!("email:   {} {}", email.address, relation(&email.rel, &email.label));
    }
    for phone in &contact.phone_numbers {
        println!("phone:   {} {}", phone.number, relation(&phone.rel, &phone.label));
    }
    for address in &contact.postal_addresses {
        let text = if address.formatted_address.is_empty() {
            [address.street.as_str(), address.city.as_str(), address.country.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            address.formatted_address.replace('\n', ", ")
        };
        println!("address: {} {}", text, relation(&address.rel, &address.label));
    }
    for im in &contact.ims {
        println!("im:      {}", im_line(im));
    }
    for (name, value) in &contact.extended_properties {
        println!("prop:    {} = {}", name, value);
    }
    if !contact.content.is_empty() {
        println!();
        println!("{}", contact.content);
    }
    Ok(())
}

async fn run_delete(client: &DirectoryClient, id: &str, etag: &str) -> anyhow::Result<()> {
    match client.delete(id, etag).await {
        Ok(()) => {
            println!("Deleted {}", id);
            Ok(())
        }
        Err(ContactsError::VersionMismatch { current, .. }) => {
            anyhow::bail!("contact {} changed since it was read (current etag {})", id, current)
        }
        Err(e) => Err(e.into()),
    }
}

/// Address, protocol and relation of an IM handle.
fn im_line(im: &InstantMessage) -> String {
    let protocol = im.protocol.rsplit('#').next().unwrap_or(&im.protocol);
    let line = if protocol.is_empty() {
        im.address.clone()
    } else {
        format!("{} [{}]", im.address, protocol)
    };
    format!("{} {}", line, relation(&im.rel, &im.label))
}

/// Short form of a relation URI (`...#work` -> `work`), or the label.
fn relation(rel: &str, label: &str) -> String {
    if !rel.is_empty() {
        format!("({})", rel.rsplit('#').next().unwrap_or(rel))
    } else if !label.is_empty() {
        format!("({})", label)
    } else {
        String::new()
    }
}

//! ProcesSieve CLI: command-line interface for a running ProcesSieve server

mod client;

use clap::{Parser, Subcommand};
use client::{ClientResult, RemoteClient};
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "processieve", version, about = "ProcesSieve CLI")]
struct Cli {
    /// Server HTTP URL
    #[arg(long, default_value = "http://localhost:8000", global = true, env = "PROCESSIEVE_URL")]
    url: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of an entity type (e.g. case, narrative, case_template)
    List { entity: String },
    /// Show one record
    Get { entity: String, id: String },
    /// Create a record from inline JSON or @file.json
    Create { entity: String, body: String },
    /// Delete a record
    Delete { entity: String, id: String },
    /// Classify a case against the case templates
    EvaluateCase { id: String },
    /// Rank templates of a kind against a narrative
    Rank {
        /// Narrative text
        text: String,

        /// Template kind
        #[arg(long, default_value = "CaseTemplate")]
        kind: String,

        /// Also rank draft templates
        #[arg(long)]
        include_draft: bool,
    },
    /// Get server status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = RemoteClient::new(&cli.url);

    let result = match cli.command {
        Commands::List { entity } => run_list(&client, &entity, &cli.format).await,
        Commands::Get { entity, id } => run_show(client.get(&entity, &id).await, &cli.format),
        Commands::Create { entity, body } => run_create(&client, &entity, &body, &cli.format).await,
        Commands::Delete { entity, id } => client.delete(&entity, &id).await.map(|_| println!("Deleted {} {}", entity, id)),
        Commands::EvaluateCase { id } => run_show(client.evaluate_case(&id).await, &cli.format),
        Commands::Rank {
            text,
            kind,
            include_draft,
        } => run_rank(&client, &text, &kind, include_draft, &cli.format).await,
        Commands::Status => run_status(&client, &cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_list(client: &RemoteClient, entity: &str, format: &OutputFormat) -> ClientResult<()> {
    let records = client.list(entity).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => {
            let rows = records.as_array().cloned().unwrap_or_default();
            if rows.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            // Columns in first-seen order across all records
            let mut columns: Vec<String> = Vec::new();
            for row in &rows {
                if let Value::Object(map) = row {
                    for key in map.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&columns);
            for row in &rows {
                table.add_row(
                    columns
                        .iter()
                        .map(|c| row.get(c).map(format_table_value).unwrap_or_default()),
                );
            }

            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }
    Ok(())
}

fn run_show(record: ClientResult<Value>, format: &OutputFormat) -> ClientResult<()> {
    let record = record?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["field", "value"]);
            if let Value::Object(map) = &record {
                for (key, value) in map {
                    table.add_row(vec![key.clone(), format_table_value(value)]);
                }
            }
            println!("{}", table);
        }
    }
    Ok(())
}

async fn run_create(client: &RemoteClient, entity: &str, body: &str, format: &OutputFormat) -> ClientResult<()> {
    let text = match body.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => body.to_string(),
    };
    let body: Value = serde_json::from_str(&text)?;
    run_show(client.create(entity, &body).await, format)
}

async fn run_rank(
    client: &RemoteClient,
    text: &str,
    kind: &str,
    include_draft: bool,
    format: &OutputFormat,
) -> ClientResult<()> {
    let ranked = client.rank(text, kind, include_draft).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ranked)?),
        OutputFormat::Table => {
            let rows = ranked.as_array().cloned().unwrap_or_default();
            if rows.is_empty() {
                println!("(no candidates)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["rank", "template", "score", "record"]);
            for (i, row) in rows.iter().enumerate() {
                let score = row.get("score").and_then(Value::as_f64).unwrap_or_default();
                table.add_row(vec![
                    (i + 1).to_string(),
                    row.get("template_id").map(format_table_value).unwrap_or_default(),
                    format!("{:.3}", score),
                    row.get("record").map(format_table_value).unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

async fn run_status(client: &RemoteClient, format: &OutputFormat) -> ClientResult<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => {
            println!("Status:  {}", format_table_value(&status["status"]));
            println!("Version: {}", format_table_value(&status["version"]));
            println!("Model:   {}", format_table_value(&status["model"]));
            println!("Records: {}", format_table_value(&status["storage"]["records"]));
            if let Value::Object(categories) = &status["storage"]["categories"] {
                for (category, count) in categories {
                    println!("  {:<16} {}", category, count);
                }
            }
        }
    }
    Ok(())
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

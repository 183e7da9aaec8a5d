//! Command-line interface for eurodata
//!
//! Ask a single question with `--query`, or start an interactive session.
//!
//! # Usage
//!
//! ```bash
//! # Optional: enables model classification and summaries
//! export OPENAI_API_KEY="sk-..."
//!
//! eurodata --query "Inflation Italy vs France last 3 years"
//! eurodata --json --query "euro dollar last 6 months"
//! eurodata
//! ```

use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use eurodata_core::{DataConfig, QueryService, SeriesAnswer};
use eurodata_llm::LLMProvider;
use eurodata_llm::providers::OpenAIProvider;
use eurodata_utils::{LogFormat, env_opt, init_tracing};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "eurodata")]
#[command(about = "Ask questions about European macro statistics (ECB, Eurostat)", long_about = None)]
struct Args {
    /// Question to answer; starts an interactive session when omitted
    #[arg(short, long)]
    query: Option<String>,

    /// Skip reading the fetch cache (fresh results are still stored)
    #[arg(long)]
    no_cache: bool,

    /// Cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Print answers as JSON
    #[arg(long)]
    json: bool,

    /// Number of most recent rows to print per series
    #[arg(long, default_value_t = 12)]
    rows: usize,
}

fn print_banner() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║                eurodata: European macro statistics            ║
║                                                              ║
║  Ask in plain English, for example:                          ║
║    "Inflation Italy vs France last 3 years"                  ║
║    "Compare unemployment between Spain and Portugal"         ║
║    "EUR/USD since 2022"                                      ║
║                                                              ║
║  Commands:                                                   ║
║    /help   - Show this help                                  ║
║    /exit   - Exit                                            ║
╚══════════════════════════════════════════════════════════════╝
"#
    );
}

/// Model provider when `OPENAI_API_KEY` is set
fn llm_provider() -> anyhow::Result<Option<Arc<dyn LLMProvider>>> {
    if env_opt("OPENAI_API_KEY").is_none() {
        tracing::info!("OPENAI_API_KEY not set, running without a model");
        return Ok(None);
    }
    let provider: Arc<dyn LLMProvider> = Arc::new(OpenAIProvider::from_env()?);
    Ok(Some(provider))
}

fn render_table(answer: &SeriesAnswer, rows: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Period", "Region", "Value"]);

    let skip = answer.table.len().saturating_sub(rows);
    for obs in answer.table.iter().skip(skip) {
        table.add_row(vec![
            Cell::new(obs.time.format("%Y-%m-%d")),
            Cell::new(&obs.region),
            Cell::new(format!("{:.2}", obs.value)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn print_answers(answers: &[SeriesAnswer], args: &Args) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(answers)?);
        return Ok(());
    }

    for answer in answers {
        println!("\n{} [{}]", answer.plan.indicator(), answer.plan.provider());
        if !answer.table.is_empty() {
            println!("{}", render_table(answer, args.rows));
        }
        println!("{}\n", answer.summary);
    }
    Ok(())
}

async fn run_repl(service: &QueryService, args: &Args) -> anyhow::Result<()> {
    print_banner();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("eurodata> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!("\nGoodbye!");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                continue;
            }
        }

        let input = input.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => {
                println!("Goodbye!");
                break;
            }
            "/help" => {
                print_banner();
                continue;
            }
            _ => {}
        }

        match service.answer(input).await {
            Ok(answers) => print_answers(&answers, args)?,
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("warn,eurodata_core=info", LogFormat::from_env());

    let args = Args::parse();

    let mut builder = DataConfig::builder();
    if args.no_cache {
        builder = builder.cache_enabled(false);
    }
    if let Some(dir) = &args.cache_dir {
        builder = builder.cache_dir(dir);
    }
    let config = builder.with_env().build()?;

    let service = QueryService::from_config(&config, llm_provider()?)?;

    match &args.query {
        Some(query) => {
            let answers = service.answer(query).await?;
            print_answers(&answers, &args)?;
        }
        None => run_repl(&service, &args).await?,
    }

    Ok(())
}

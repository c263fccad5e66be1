use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hwp_assist::config::Config;
use hwp_assist::report::user_message;
use hwp_assist::{Assistant, DocumentThread, Engine, EngineError, StylePlan, TemplatePlan};
use hwp_host_local::MemoryHost;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
commands:
  open <path>                          open a document
  close | save                         close or save the open document
  select <text>                        select the first occurrence of text
  text                                 show the selection
  edit <request>                       rewrite the selection
  table                                turn the selection into a table
  style                                propose and apply a style plan
  fields                               list fields in the open document
  template create <name>               propose fields and save as a template
  template fields <name>               list a template's fields
  template use <name> key=value ...    fill a template into a new document
  templates | styles                   list stored templates or styles
  quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let style_map = config.style_map()?;
    let styles = Arc::new(config.style_store());
    let templates = Arc::new(config.template_store());
    let document = DocumentThread::spawn(move || {
        Engine::new(MemoryHost::new(), styles, templates).with_style_map(style_map)
    })?;
    let assistant = Assistant::new(document, config.generator());

    info!("Starting hwp-assist");
    info!("  Templates: {}", config.templates_dir.display());
    info!("  Styles: {}", config.styles_dir.display());
    info!("  Generator: {} --model {}", config.generator, config.model);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    if let Some(path) = config.open.clone() {
        report(dispatch(&assistant, &mut input, "open", &path.to_string_lossy()).await);
    }

    println!("Type help for commands.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = split_command(line);
        if matches!(command, "quit" | "exit") {
            break;
        }
        report(dispatch(&assistant, &mut input, command, rest).await);
    }

    info!("Shutting down");
    Ok(())
}

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    }
}

fn report(outcome: anyhow::Result<()>) {
    if let Err(e) = outcome {
        match e.downcast_ref::<EngineError>() {
            Some(engine_err) => println!("{}", user_message(engine_err)),
            None => println!("Error: {}", e),
        }
    }
}

async fn confirm(input: &mut Input, question: &str) -> anyhow::Result<bool> {
    let answer = ask(input, &format!("{} [y/N]", question)).await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn require_arg<'a>(arg: &'a str, usage: &str) -> anyhow::Result<&'a str> {
    if arg.is_empty() {
        anyhow::bail!("usage: {}", usage);
    }
    Ok(arg)
}

fn parse_assignments(args: &str) -> anyhow::Result<BTreeMap<String, String>> {
    args.split_whitespace()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => anyhow::bail!("expected key=value, got {}", pair),
        })
        .collect()
}

fn print_style_plan(plan: &StylePlan) {
    for entry in plan.entries() {
        println!(
            "  {:>3}-{:<3} {:<10} {:.2}  {}",
            entry.start_line, entry.end_line, entry.style_type, entry.confidence, entry.content_preview
        );
    }
}

fn print_template_plan(plan: &TemplatePlan) {
    for (index, field) in plan.fields().iter().enumerate() {
        println!(
            "  {:>2}. {} <- {:?}  {}",
            index + 1,
            field.field_name,
            field.located_text,
            field.description
        );
    }
}

async fn ask(input: &mut Input, question: &str) -> anyhow::Result<String> {
    print!("{} ", question);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.unwrap_or_default())
}

async fn dispatch(
    assistant: &Assistant<MemoryHost>,
    input: &mut Input,
    command: &str,
    args: &str,
) -> anyhow::Result<()> {
    match command {
        "help" => println!("{}", HELP),
        "open" => {
            let path = PathBuf::from(require_arg(args, "open <path>")?);
            let session = assistant.open(path).await?;
            println!(
                "Opened {} ({})",
                session.path().display(),
                session.document_type()
            );
        }
        "close" => {
            assistant.close().await?;
            println!("Closed.");
        }
        "save" => {
            let path = assistant.save().await?;
            println!("Saved {}", path.display());
        }
        "select" => {
            let text = require_arg(args, "select <text>")?;
            if assistant.select_text(text.to_string()).await? {
                println!("Selected.");
            } else {
                println!("Text not found.");
            }
        }
        "text" => println!("{}", assistant.selected_text().await?),
        "edit" => {
            let request = require_arg(args, "edit <request>")?;
            let proposal = assistant.propose_edit(request, None).await?;
            println!("--- before\n{}\n--- after\n{}", proposal.original, proposal.proposed);
            if confirm(input, "Apply this edit?").await? {
                assistant.apply_edit(&proposal).await?;
                println!("Applied.");
            }
        }
        "table" => {
            let grid = assistant.create_table_from_selection().await?;
            println!("Inserted a {}x{} table.", grid.rows(), grid.cols());
        }
        "style" => {
            let plan = assistant.propose_style_plan().await?;
            print_style_plan(&plan);
            if confirm(input, "Apply this style plan?").await? {
                let outcome = assistant.apply_style_plan(plan).await?;
                println!("Styled {} entries ({} failed).", outcome.applied, outcome.failed);
                if !outcome.missing_styles.is_empty() {
                    println!("Undefined styles: {}", outcome.missing_styles.join(", "));
                }
            }
        }
        "fields" => {
            let names = assistant.list_fields().await?;
            if names.is_empty() {
                println!("No fields.");
            }
            for name in names {
                println!("  {}", name);
            }
        }
        "templates" => {
            for name in assistant.list_templates().await? {
                println!("  {}", name);
            }
        }
        "styles" => {
            for name in assistant.list_styles().await? {
                println!("  {}", name);
            }
        }
        "template" => {
            let (action, rest) = split_command(args);
            dispatch_template(assistant, input, action, rest).await?;
        }
        other => println!("Unknown command {}. Type help for commands.", other),
    }
    Ok(())
}

async fn dispatch_template(
    assistant: &Assistant<MemoryHost>,
    input: &mut Input,
    action: &str,
    args: &str,
) -> anyhow::Result<()> {
    match action {
        "create" => {
            let name = require_arg(args, "template create <name>")?;
            let plan = assistant.propose_template().await?;
            print_template_plan(&plan);
            let answer = ask(input, "Fields to keep (e.g. 1,3; Enter for all, q to cancel):").await?;
            if matches!(answer.trim(), "q" | "quit") {
                return Ok(());
            }
            let plan = plan.pick(&answer)?;
            if plan.is_empty() {
                println!("No fields picked.");
            } else {
                let outcome = assistant.create_template(name.to_string(), plan).await?;
                println!(
                    "Saved template {} with {} fields.",
                    outcome.template.display(),
                    outcome.converted.len()
                );
                if !outcome.skipped.is_empty() {
                    println!("Skipped: {}", outcome.skipped.join(", "));
                }
            }
        }
        "fields" => {
            let name = require_arg(args, "template fields <name>")?;
            for field in assistant.template_fields(name.to_string()).await? {
                println!("  {}", field);
            }
        }
        "use" => {
            let (name, rest) = split_command(args);
            let name = require_arg(name, "template use <name> key=value ...")?;
            let values = parse_assignments(rest)?;
            let outcome = assistant.fill_template(name.to_string(), values).await?;
            println!(
                "Wrote {} ({} fields filled).",
                outcome.output.display(),
                outcome.written
            );
        }
        _ => anyhow::bail!("usage: template create|fields|use <name>"),
    }
    Ok(())
}

//! Command-line interface for FHIRPath Mapping Language templates
//!
//! Resolves templates against FHIR resources and evaluates single FHIRPath
//! expressions.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use octofhir_fpml::mapping::{FpOptions, FpmlValidationError, Node, resolve};
use octofhir_fpml::model::{FhirPathValue, ModelDescriptor};
use octofhir_fpml::registry::answers_function;
use octofhir_fpml::{FhirPathEngine, parse};
use serde_json::Value as JsonValue;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

/// Context key whose value becomes the resource when no resource is given
const QUESTIONNAIRE_RESPONSE: &str = "QuestionnaireResponse";

#[derive(Parser)]
#[command(name = "octofhir-fpml")]
#[command(about = "Resolve FHIRPath Mapping Language templates against FHIR resources")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a template against a resource
    Resolve {
        /// JSON file containing the template
        #[arg(short, long)]
        template: String,
        /// JSON file containing the resource (reads from stdin if not provided)
        resource: Option<String>,
        /// JSON file with an object of variables available as `%name`
        #[arg(short, long)]
        context: Option<String>,
        /// Data model: `r4` or a JSON model descriptor file
        #[arg(short, long)]
        model: Option<String>,
        /// Only allow resource access through the context
        #[arg(short, long)]
        strict: bool,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Evaluate FHIRPath expression against a FHIR resource
    Evaluate {
        /// FHIRPath expression to evaluate
        expression: String,
        /// JSON file containing FHIR resource (reads from stdin if not provided)
        #[arg(short, long)]
        file: Option<String>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Parse FHIRPath expression and print its syntax tree
    Parse {
        /// FHIRPath expression to parse
        expression: String,
    },
    /// Validate FHIRPath expression syntax
    Validate {
        /// FHIRPath expression to validate
        expression: String,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        report_error(&e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Resolve {
            template,
            resource,
            context,
            model,
            strict,
            pretty,
        } => handle_resolve(
            &template,
            resource.as_deref(),
            context.as_deref(),
            model.as_deref(),
            strict,
            pretty,
        ),
        Commands::Evaluate {
            expression,
            file,
            pretty,
        } => handle_evaluate(&expression, file.as_deref(), pretty),
        Commands::Parse { expression } => {
            let ast = parse(&expression)
                .with_context(|| format!("Invalid expression '{expression}'"))?;
            println!("{ast:#?}");
            Ok(())
        }
        Commands::Validate { expression } => {
            parse(&expression).with_context(|| format!("Invalid expression '{expression}'"))?;
            println!("VALID");
            Ok(())
        }
    }
}

fn handle_resolve(
    template_file: &str,
    resource_file: Option<&str>,
    context_file: Option<&str>,
    model: Option<&str>,
    strict: bool,
    pretty: bool,
) -> Result<()> {
    let template = Node::from(read_json(Some(template_file))?);
    let context: IndexMap<String, Node> = match context_file {
        Some(file) => serde_json::from_value(read_json(Some(file))?)
            .with_context(|| format!("Context in '{file}' must be a JSON object"))?,
        None => IndexMap::new(),
    };
    let model = load_model(model)?;

    let mut options = FpOptions::new();
    let resource = match (resource_file, context.get(QUESTIONNAIRE_RESPONSE)) {
        (None, Some(questionnaire_response)) => {
            log::debug!("using the context {QUESTIONNAIRE_RESPONSE} as the resource");
            options = options.with_user_function("answers", answers_function(model.clone()));
            questionnaire_response.clone()
        }
        (file, _) => Node::from(read_json(file)?),
    };

    let resolved = resolve(&resource, &template, &context, model, Some(options), strict)?;
    print_json(&JsonValue::from(resolved), pretty)
}

fn handle_evaluate(expression: &str, file: Option<&str>, pretty: bool) -> Result<()> {
    let resource = read_json(file)?;
    let engine = FhirPathEngine::new();
    let result = engine
        .evaluate(expression, FhirPathValue::from_json(&resource))
        .with_context(|| format!("Error evaluating '{expression}'"))?;
    let output = JsonValue::Array(result.iter().map(FhirPathValue::to_json).collect());
    print_json(&output, pretty)
}

fn load_model(model: Option<&str>) -> Result<Option<Arc<ModelDescriptor>>> {
    let descriptor = match model {
        None => return Ok(None),
        Some("r4") => ModelDescriptor::r4(),
        Some(file) => {
            let content = fs::read_to_string(file)
                .with_context(|| format!("Error reading model file '{file}'"))?;
            ModelDescriptor::from_json_str(&content)
                .with_context(|| format!("Error parsing model file '{file}'"))?
        }
    };
    Ok(Some(Arc::new(descriptor)))
}

/// Read a JSON document from a file, or from stdin without one
fn read_json(file: Option<&str>) -> Result<JsonValue> {
    let content = match file {
        Some(filename) => fs::read_to_string(filename)
            .with_context(|| format!("Error reading file '{filename}'"))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Error reading from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&content).with_context(|| match file {
        Some(filename) => format!("Error parsing JSON in '{filename}'"),
        None => "Error parsing JSON from stdin".to_string(),
    })
}

fn print_json(value: &JsonValue, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| anyhow!("Error serializing result: {e}"))?;
    println!("{output}");
    Ok(())
}

fn report_error(error: &anyhow::Error) {
    if let Some(validation) = error.downcast_ref::<FpmlValidationError>() {
        if let Ok(outcome) = serde_json::to_string_pretty(&validation.to_operation_outcome()) {
            eprintln!("{outcome}");
        }
    }

    #[cfg(feature = "terminal")]
    {
        use colored::Colorize;
        eprintln!("{}: {}", "error".red().bold(), format!("{error:#}").bold());
    }
    #[cfg(not(feature = "terminal"))]
    eprintln!("error: {error:#}");
}

//! CLI binary for offerdoc.
//!
//! A thin shim over the library: flags map onto `EngineConfig`, a
//! `LocalStore` rooted at `--root` plays the object store, and every result
//! is printed to stdout as pretty JSON. Logs go to stderr.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use offerdoc::{
    AddLineRequest, CleanQuoteRequest, CleaningRule, CustomerInfo, DeleteLineRequest,
    DisabledConverter, EngineConfig, ErrorCategory, ExtractedContent, FinalizeRequest,
    HttpPdfConverter, LocalStore, OfferDocError, PdfConverter, PrepareRequest, ProposalDetails,
    Workflow,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start a proposal from general/offre.docx
  offerdoc prepare --user "Eric FER" --template offre.docx \
      --cs-name "Jean Dupont" --cs-tel "06 12 34 56 78" --cs-email jd@example.com

  # Add and remove lines (480810003 = Service cloud)
  offerdoc add-line --user "Eric FER" --service-code 480810003 \
      --designation M365 --quantity 3 --unit-price 10
  offerdoc delete-line --user "Eric FER" --service-code 480810003 --offer-name m365

  # Publish the working document (+ PDF when a service is configured)
  offerdoc finalize --user "Eric FER" --name "ACME Q4"

  # Turn a filled quote into a blank template description
  offerdoc extract old_quote.docx > content.json
  offerdoc clean content.json --rule remove-filled-data --rule remove-empty-paragraphs

SERVICE CODES:
  480810003   Service cloud
  480810000   Services Cloud - Téléphonie
  480810004   Supports

ENVIRONMENT VARIABLES:
  OFFERDOC_ROOT                 Directory holding the containers
  OFFERDOC_TEMPLATES_CONTAINER  Templates + working files container
  OFFERDOC_DOCUMENTS_CONTAINER  Finalised documents container
  OFFERDOC_PDF_SERVICE_URL      docx → PDF conversion endpoint
  RUST_LOG                      Log filter, overrides --verbose / --quiet
"#;

/// Build commercial proposals from Word templates.
#[derive(Parser, Debug)]
#[command(
    name = "offerdoc",
    version,
    about = "Build commercial proposals from Word templates",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding one sub-directory per container.
    #[arg(long, global = true, env = "OFFERDOC_ROOT", default_value = "offerdoc-data")]
    root: PathBuf,

    /// Container with shared templates and per-user working files.
    #[arg(long, global = true, env = "OFFERDOC_TEMPLATES_CONTAINER")]
    templates_container: Option<String>,

    /// Container receiving finalised proposals.
    #[arg(long, global = true, env = "OFFERDOC_DOCUMENTS_CONTAINER")]
    documents_container: Option<String>,

    /// Download link lifetime in hours (1–168).
    #[arg(long, global = true, env = "OFFERDOC_EXPIRY_HOURS")]
    expiry_hours: Option<u32>,

    /// Largest document accepted, in bytes.
    #[arg(long, global = true, env = "OFFERDOC_MAX_FILE_SIZE")]
    max_file_size: Option<usize>,

    /// docx → PDF conversion endpoint. PDF output is off without it.
    #[arg(long, global = true, env = "OFFERDOC_PDF_SERVICE_URL")]
    pdf_service_url: Option<String>,

    /// PDF conversion timeout in seconds.
    #[arg(long, global = true, env = "OFFERDOC_PDF_TIMEOUT")]
    pdf_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OFFERDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "OFFERDOC_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract paragraphs, tables and structure of a .docx file.
    Extract {
        file: PathBuf,
        /// Identifier echoed in the output.
        #[arg(long)]
        file_id: Option<String>,
    },
    /// Clean extracted content (JSON from `extract`, or a .docx extracted on the fly).
    Clean {
        file: PathBuf,
        /// Rule to apply; repeatable. Default: remove-filled-data, normalize-tables.
        #[arg(long = "rule", value_enum)]
        rules: Vec<RuleArg>,
    },
    /// Copy general/<template> into the user's folder as the working document.
    Prepare {
        #[arg(long)]
        user: String,
        #[arg(long)]
        template: String,
        #[arg(long)]
        cs_name: Option<String>,
        #[arg(long)]
        cs_tel: Option<String>,
        #[arg(long)]
        cs_email: Option<String>,
    },
    /// Fill the customer-success placeholders of the working document.
    Customer {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        tel: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Add a priced line to a service section.
    AddLine {
        #[arg(long)]
        user: String,
        #[arg(long)]
        service_code: String,
        #[arg(long)]
        designation: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        quantity: u32,
        #[arg(long)]
        unit_price: f64,
    },
    /// Delete a line by row index or by designation.
    DeleteLine {
        #[arg(long)]
        user: String,
        #[arg(long)]
        service_code: String,
        #[arg(long)]
        offer_name: Option<String>,
        #[arg(long)]
        row_index: Option<usize>,
    },
    /// Blank every table row below the header.
    CleanQuote {
        #[arg(long)]
        user: String,
        /// Start from this object instead of the working document.
        #[arg(long)]
        source: Option<String>,
    },
    /// Merge client details into a template and write the result locally.
    Generate {
        #[arg(long)]
        template: String,
        #[arg(long)]
        client_name: String,
        #[arg(long, default_value = "")]
        contact: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long)]
        number: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Publish the working document to the documents container.
    Finalize {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: Option<String>,
        /// Skip the PDF rendition.
        #[arg(long)]
        no_pdf: bool,
    },
    /// List templates, working files or finalised documents.
    List {
        #[arg(value_enum)]
        scope: ListScope,
        #[arg(long)]
        user: Option<String>,
    },
    /// Print a time-limited download link.
    Url {
        path: String,
        #[arg(long, value_enum, default_value = "templates")]
        container: ContainerArg,
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Delete one stored object.
    Delete {
        path: String,
        #[arg(long, value_enum, default_value = "templates")]
        container: ContainerArg,
    },
    /// Remove working files older than the maximum age.
    Cleanup {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        max_age_hours: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RuleArg {
    RemoveFilledData,
    NormalizeTables,
    RemoveEmptyParagraphs,
}

impl From<RuleArg> for CleaningRule {
    fn from(v: RuleArg) -> Self {
        match v {
            RuleArg::RemoveFilledData => CleaningRule::RemoveFilledData,
            RuleArg::NormalizeTables => CleaningRule::NormalizeTables,
            RuleArg::RemoveEmptyParagraphs => CleaningRule::RemoveEmptyParagraphs,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ListScope {
    General,
    User,
    Created,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ContainerArg {
    Templates,
    Documents,
}

type CliWorkflow = Workflow<LocalStore, Box<dyn PdfConverter>>;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<OfferDocError>()
            .map(|e| exit_code(e.category()))
            .unwrap_or(1);
        std::process::exit(code);
    }
}

fn exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Validation => 2,
        ErrorCategory::NotFound => 3,
        ErrorCategory::Structural => 4,
        ErrorCategory::External => 5,
        ErrorCategory::Internal => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let workflow = build_workflow(&cli)?;
    let config = workflow.config().clone();
    let container = |c: ContainerArg| match c {
        ContainerArg::Templates => config.templates_container.clone(),
        ContainerArg::Documents => config.documents_container.clone(),
    };

    match cli.command {
        Command::Extract { file, file_id } => {
            let bytes = read_file(&file).await?;
            let extraction = workflow
                .extract(&bytes, file_id.as_deref())
                .with_context(|| format!("Failed to extract {}", file.display()))?;
            print_json(&extraction)
        }
        Command::Clean { file, rules } => {
            let content = load_content(&workflow, &file).await?;
            let rules: Vec<CleaningRule> = rules.into_iter().map(Into::into).collect();
            let outcome = workflow.clean(content, (!rules.is_empty()).then_some(rules.as_slice()));
            print_json(&outcome)
        }
        Command::Prepare {
            user,
            template,
            cs_name,
            cs_tel,
            cs_email,
        } => {
            let customer_success = (cs_name.is_some() || cs_tel.is_some() || cs_email.is_some())
                .then(|| CustomerInfo {
                    name: cs_name.unwrap_or_default(),
                    tel: cs_tel.unwrap_or_default(),
                    email: cs_email.unwrap_or_default(),
                });
            let outcome = workflow
                .prepare_template(&PrepareRequest {
                    user_folder: user,
                    template_name: template,
                    customer_success,
                })
                .await
                .context("Failed to prepare template")?;
            print_json(&outcome)
        }
        Command::Customer {
            user,
            name,
            tel,
            email,
        } => {
            let outcome = workflow
                .set_customer_info(&user, &CustomerInfo { name, tel, email })
                .await
                .context("Failed to set customer info")?;
            print_json(&outcome)
        }
        Command::AddLine {
            user,
            service_code,
            designation,
            description,
            quantity,
            unit_price,
        } => {
            let outcome = workflow
                .add_line_item(
                    &user,
                    &AddLineRequest {
                        service_code,
                        designation,
                        description,
                        quantity,
                        unit_price,
                    },
                )
                .await
                .context("Failed to add offer line")?;
            print_json(&outcome)
        }
        Command::DeleteLine {
            user,
            service_code,
            offer_name,
            row_index,
        } => {
            let outcome = workflow
                .delete_line_item(
                    &user,
                    &DeleteLineRequest {
                        service_code,
                        offer_name,
                        row_index,
                    },
                )
                .await
                .context("Failed to delete offer line")?;
            print_json(&outcome)
        }
        Command::CleanQuote { user, source } => {
            let outcome = workflow
                .clean_quote(&CleanQuoteRequest {
                    user_folder: user,
                    source_path: source,
                })
                .await
                .context("Failed to clean quote")?;
            print_json(&outcome)
        }
        Command::Generate {
            template,
            client_name,
            contact,
            email,
            number,
            output,
        } => {
            let details = ProposalDetails {
                client_name,
                contact,
                email,
                proposal_number: number,
            };
            let proposal = workflow
                .generate_proposal(&template, &details, Utc::now())
                .await
                .context("Failed to generate proposal")?;
            tokio::fs::write(&output, &proposal.document)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&proposal)
        }
        Command::Finalize { user, name, no_pdf } => {
            let outcome = workflow
                .finalize(
                    &FinalizeRequest {
                        user_folder: user,
                        proposal_name: name,
                        convert_pdf: !no_pdf,
                    },
                    Utc::now(),
                )
                .await
                .context("Failed to finalise proposal")?;
            print_json(&outcome)
        }
        Command::List { scope, user } => {
            let entries = match scope {
                ListScope::General => workflow.list_general_templates().await?,
                ListScope::User => {
                    let user = user.context("--user is required for this scope")?;
                    workflow.list_user_documents(&user).await?
                }
                ListScope::Created => {
                    let user = user.context("--user is required for this scope")?;
                    workflow.list_created_documents(&user).await?
                }
            };
            print_json(&entries)
        }
        Command::Url {
            path,
            container: c,
            hours,
        } => {
            let url = workflow
                .signed_url(&container(c), &path, hours)
                .await
                .context("Failed to generate download link")?;
            print_json(&url)
        }
        Command::Delete { path, container: c } => {
            let container = container(c);
            workflow
                .delete_document(&container, &path)
                .await
                .with_context(|| format!("Failed to delete {container}/{path}"))?;
            print_json(&serde_json::json!({ "deleted_file": path }))
        }
        Command::Cleanup {
            user,
            max_age_hours,
        } => {
            let outcome = workflow
                .cleanup_expired(user.as_deref(), max_age_hours, Utc::now())
                .await
                .context("Failed to clean up expired documents")?;
            print_json(&outcome)
        }
    }
}

/// Map CLI args to `EngineConfig` and wire the collaborators.
fn build_workflow(cli: &Cli) -> Result<CliWorkflow> {
    let mut builder = EngineConfig::builder();
    if let Some(ref c) = cli.templates_container {
        builder = builder.templates_container(c);
    }
    if let Some(ref c) = cli.documents_container {
        builder = builder.documents_container(c);
    }
    if let Some(h) = cli.expiry_hours {
        builder = builder.signed_url_expiry_hours(h);
    }
    if let Some(n) = cli.max_file_size {
        builder = builder.max_file_size(n);
    }
    if let Some(ref url) = cli.pdf_service_url {
        builder = builder.pdf_service_url(url);
    }
    if let Some(secs) = cli.pdf_timeout {
        builder = builder.pdf_timeout_secs(secs);
    }
    let config = builder.build().context("Invalid configuration")?;

    let store = LocalStore::new(&cli.root)
        .with_context(|| format!("Cannot open store at {}", cli.root.display()))?;
    let converter: Box<dyn PdfConverter> = match HttpPdfConverter::from_config(&config)? {
        Some(http) => Box::new(http),
        None => Box::new(DisabledConverter),
    };
    Ok(Workflow::new(store, converter, config))
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Extracted content from a JSON file, or from a .docx extracted on the fly.
async fn load_content(workflow: &CliWorkflow, path: &Path) -> Result<ExtractedContent> {
    let bytes = read_file(path).await?;
    let is_docx = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);
    if is_docx {
        let file_id = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(workflow.extract(&bytes, file_id.as_deref())?.content)
    } else {
        serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not extracted content JSON", path.display()))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

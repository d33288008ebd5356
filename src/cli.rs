//! Command-line surface and the per-invocation command handlers.

use std::io::{self, BufRead, Write};

use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::warn;

use crate::active::ActiveThread;
use crate::api::{ApiClient, DEFAULT_API_BASE, DEFAULT_MODEL_ID};
use crate::config::{ConfigStore, Settings};
use crate::error::{ColloquyError, Result};
use crate::paths::StoragePaths;
use crate::session::{self, ExchangeOutcome};
use crate::thread::ThreadStore;

#[derive(Debug, Parser)]
#[clap(
    name = "colloquy",
    version = "0.1.0",
    author = "Timothy Bogdala",
    about = "A command-line tool to chat with AI LLMs via cloud APIs. Conversations are stored locally as threads and can be resumed across runs."
)]
#[clap(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Option<Command>,

    /// A bare query is shorthand for the `ask` subcommand.
    #[clap(value_name = "QUERY")]
    pub query: Option<String>,

    #[clap(flatten)]
    pub exchange: ExchangeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prompt for and store the API key
    Configure {
        /// Also make plain `ask` invocations start the interactive loop
        #[clap(long)]
        prompt_mode: bool,
    },

    /// List stored threads and show which one is active
    List,

    /// Mark a stored thread as the active one
    Open {
        /// The identifier of the thread to open
        #[clap(value_name = "ID")]
        id: String,
    },

    /// Send a single query to the model (the default command)
    Ask {
        /// The query to send
        #[clap(value_name = "QUERY")]
        query: String,

        #[clap(flatten)]
        exchange: ExchangeArgs,
    },

    /// Chat interactively, one exchange per line, until /exit
    Prompt {
        #[clap(flatten)]
        exchange: ExchangeArgs,
    },
}

#[derive(Debug, Args)]
pub struct ExchangeArgs {
    #[clap(
        short('d'),
        long,
        help = "Echo the outgoing request body and a redacted API key"
    )]
    pub debug: bool,

    #[clap(
        long,
        value_name = "URL",
        help = "The API endpoint base URL to use",
        default_value = DEFAULT_API_BASE
    )]
    pub api: String,

    #[clap(
        long,
        value_name = "MODEL_ID",
        help = "The model to use for generating completions",
        default_value = DEFAULT_MODEL_ID
    )]
    pub model_id: String,
}

/// The stores a single invocation works with, rooted at one directory.
pub struct App {
    pub config: ConfigStore,
    pub threads: ThreadStore,
    pub active: ActiveThread,
}

impl App {
    pub fn new(paths: StoragePaths) -> Self {
        App {
            config: ConfigStore::new(paths.clone()),
            threads: ThreadStore::new(paths.clone()),
            active: ActiveThread::new(paths),
        }
    }

    /// Read an API key from the terminal and store it, keeping any
    /// previously stored prompt-mode flag unless the flag is being enabled.
    pub fn configure<R: BufRead, W: Write>(
        &self,
        enable_prompt_mode: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        write!(output, "Enter the API key: ")?;
        output.flush()?;

        let mut entered = String::new();
        input.read_line(&mut entered)?;
        let api_key = entered.trim().to_string();

        let prompt_mode =
            enable_prompt_mode || self.config.load()?.map_or(false, |s| s.prompt_mode);
        self.config.save(&Settings {
            api_key,
            prompt_mode,
        })?;

        writeln!(output, "Configuration saved.")?;
        Ok(())
    }

    /// Print every stored thread, marking the active one with an asterisk.
    pub fn list<W: Write>(&self, output: &mut W) -> Result<()> {
        let threads = self.threads.load_all()?;
        if threads.is_empty() {
            writeln!(output, "No stored threads.")?;
            return Ok(());
        }

        let active_id = self.active.get()?;
        for thread in &threads {
            let marker = if active_id.as_deref() == Some(thread.id.as_str()) {
                "*"
            } else {
                " "
            };
            writeln!(
                output,
                "{} {}  ({} messages)",
                marker,
                thread.id,
                thread.messages.len()
            )?;
        }
        Ok(())
    }

    /// Mark a thread as active. Unknown identifiers fail without touching
    /// the marker; a corrupt record counts as unknown.
    pub fn open<W: Write>(&self, id: &str, output: &mut W) -> Result<()> {
        let thread = match self.threads.load(id) {
            Ok(thread) => thread,
            Err(e @ ColloquyError::ThreadDecode { .. }) => {
                warn!(error = %e, "stored thread could not be decoded");
                return Err(ColloquyError::ThreadNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };
        self.active.set(&thread.id)?;
        writeln!(output, "Active thread is now {}.", thread.id)?;
        Ok(())
    }

    /// One exchange against the endpoint, or the interactive loop when the
    /// stored prompt-mode flag asks for it.
    ///
    /// The thread is persisted and made active only after the endpoint
    /// answers; a transport failure is printed and the command still exits
    /// normally, dropping the turn from durable storage.
    pub async fn ask<R: BufRead, W: Write>(
        &self,
        args: &ExchangeArgs,
        query: &str,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        if self.config.load()?.map_or(false, |s| s.prompt_mode) {
            return self.prompt(args, input, output).await;
        }

        let api_key = self.config.resolve_api_key()?;
        let client = ApiClient::new(&args.api, api_key, &args.model_id, args.debug);
        let mut thread = self
            .active
            .resolve_or_create(&self.threads, true, input, output)?;

        match session::run_exchange(&client, &mut thread, query).await {
            Ok(outcome) => {
                match &outcome {
                    ExchangeOutcome::Answered(content) => writeln!(output, "{}", content)?,
                    ExchangeOutcome::NoContent => {
                        writeln!(output, "(the model returned no completion)")?
                    }
                }
                if let Err(e) = session::commit(&self.threads, &self.active, &thread) {
                    eprintln!("ERROR: {}", e);
                }
            }
            Err(e) => eprintln!("ERROR: {}", e),
        }
        Ok(())
    }

    /// The interactive loop against the resolved thread.
    pub async fn prompt<R: BufRead, W: Write>(
        &self,
        args: &ExchangeArgs,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        let api_key = self.config.resolve_api_key()?;
        let client = ApiClient::new(&args.api, api_key, &args.model_id, args.debug);
        let mut thread = self
            .active
            .resolve_or_create(&self.threads, true, input, output)?;

        session::run_interactive(
            &client,
            &self.threads,
            &self.active,
            &mut thread,
            input,
            output,
        )
        .await
    }
}

/// Dispatch a parsed command line against the stores under `~/.colloquy`.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = App::new(StoragePaths::resolve()?);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    match cli.command {
        Some(Command::Configure { prompt_mode }) => {
            app.configure(prompt_mode, &mut input, &mut output)?
        }
        Some(Command::List) => app.list(&mut output)?,
        Some(Command::Open { id }) => app.open(&id, &mut output)?,
        Some(Command::Ask { query, exchange }) => {
            app.ask(&exchange, &query, &mut input, &mut output).await?
        }
        Some(Command::Prompt { exchange }) => {
            app.prompt(&exchange, &mut input, &mut output).await?
        }
        None => match &cli.query {
            Some(query) => app.ask(&cli.exchange, query, &mut input, &mut output).await?,
            None => {
                Cli::command().print_help()?;
                println!();
            }
        },
    }
    Ok(())
}

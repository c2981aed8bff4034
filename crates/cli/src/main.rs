use anyhow::{Context, Result, bail};
use civiclens_core::catalog::QuestionCatalog;
use civiclens_core::schema::{
    AnalysisResult, ElectionBundle, ElectionRecord, HistoryEntry, SurveyResponseSet,
};
use civiclens_core::{
    HistoryStore, KeyValueStore, OpenAiResponses, Orchestrator, Settings, SqliteStore,
    SurveyRepository, default_election_year, session,
};
use clap::{Parser, Subcommand};
use schemars::schema_for;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "civiclens")]
#[command(about = "CivicLens election lookup and candidate alignment CLI", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current session id, creating one if needed
    Session,
    /// Onboarding survey answers for this session
    Survey {
        #[command(subcommand)]
        command: SurveyCommands,
    },
    /// Look up the elections on the ballot for an address
    Elections {
        #[arg(long)]
        address: String,
        /// Election year (default: this year if even, else next year)
        #[arg(long)]
        year: Option<i32>,
        /// Also write the result to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze candidates against the survey and save the result to history
    Analyze {
        /// File written by `elections --out`
        #[arg(long)]
        elections: PathBuf,
        /// Election to analyze (default: the first one)
        #[arg(long)]
        election_id: Option<String>,
    },
    /// Saved analyses for this session
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
}

#[derive(Subcommand)]
enum SurveyCommands {
    /// List the topics and questions available
    Catalog,
    /// Set the priority topics (3 to 7 topic ids)
    Topics {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Answer one question: 1 = strongly disagree .. 5 = strongly agree
    Answer {
        topic: String,
        index: usize,
        value: u8,
    },
    /// Print the stored survey
    Show,
}

#[derive(Subcommand)]
enum HistoryCommands {
    List,
    Show { id: String },
    /// Analyze the stored election again with the current survey
    Rerun { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civiclens_core=info,civiclens=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Session => println!("{}", Workspace::open(config)?.session_id),
        Commands::Survey { command } => {
            let ws = Workspace::open(config)?;
            let catalog = load_catalog(&ws.settings)?;
            survey_command(command, &ws.survey(), &catalog)?;
        }
        Commands::Elections { address, year, out } => {
            let ws = Workspace::open(config)?;
            let year =
                year.unwrap_or_else(|| default_election_year(OffsetDateTime::now_utc().date()));
            let bundle = ws.orchestrator()?.fetch_elections(&address, year).await?;
            if let Some(path) = out {
                fs::write(&path, serde_json::to_string_pretty(&bundle)?)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "wrote election bundle");
            }
            print_json(&bundle)?;
        }
        Commands::Analyze {
            elections,
            election_id,
        } => {
            let ws = Workspace::open(config)?;
            let election = pick_election(&elections, election_id.as_deref())?;
            let survey = ws.survey().load()?;
            let analysis = ws.orchestrator()?.analyze(&election, &survey).await?;
            print_json(&ws.history().save(election, analysis)?)?;
        }
        Commands::History { command } => {
            let ws = Workspace::open(config)?;
            let history = ws.history();
            match command {
                HistoryCommands::List => print_json(&history.list()?)?,
                HistoryCommands::Show { id } => print_json(&history.select(&id)?)?,
                HistoryCommands::Rerun { id } => {
                    let survey = ws.survey().load()?;
                    let orchestrator = ws.orchestrator()?;
                    print_json(&history.rerun(&id, &orchestrator, &survey).await?)?;
                }
                HistoryCommands::Delete { id } => {
                    if !history.delete(&id)? {
                        bail!("no history entry with id {id}");
                    }
                    println!("Deleted {id}");
                }
            }
        }
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(&out_dir)?,
        },
    }
    Ok(())
}

/// Settings plus the local store and session they point at.
struct Workspace {
    settings: Settings,
    store: Arc<dyn KeyValueStore>,
    session_id: String,
}

impl Workspace {
    fn open(config: Option<&Path>) -> Result<Self> {
        let settings = Settings::load(config).context("loading settings")?;
        let store: Arc<dyn KeyValueStore> = Arc::new(
            SqliteStore::open(&settings.database_path)
                .with_context(|| format!("opening {}", settings.database_path.display()))?,
        );
        let session_id = session::current_session_id(store.as_ref())?;
        Ok(Self {
            settings,
            store,
            session_id,
        })
    }

    fn survey(&self) -> SurveyRepository {
        SurveyRepository::new(self.store.clone(), self.session_id.clone())
    }

    fn history(&self) -> HistoryStore {
        HistoryStore::new(self.store.clone(), self.session_id.clone())
    }

    fn orchestrator(&self) -> Result<Orchestrator> {
        let backend = Arc::new(OpenAiResponses::new(&self.settings)?);
        Ok(Orchestrator::new(backend, &self.settings)?)
    }
}

fn load_catalog(settings: &Settings) -> Result<QuestionCatalog> {
    match &settings.catalog_path {
        Some(path) => QuestionCatalog::load_from_path(path)
            .with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(QuestionCatalog::builtin()),
    }
}

fn survey_command(
    command: SurveyCommands,
    survey: &SurveyRepository,
    catalog: &QuestionCatalog,
) -> Result<()> {
    match command {
        SurveyCommands::Catalog => {
            for topic in &catalog.topics {
                println!("{} ({})", topic.title, topic.id);
                for (index, question) in topic.questions.iter().enumerate() {
                    println!("  [{index}] {question}");
                }
            }
        }
        SurveyCommands::Topics { ids } => {
            survey.set_priority_topics(&ids, catalog)?;
            println!("Saved {} priority topics", ids.len());
        }
        SurveyCommands::Answer {
            topic,
            index,
            value,
        } => {
            survey.record_answer(&topic, index, value, catalog)?;
            println!("Recorded {topic}_{index} = {value}");
        }
        SurveyCommands::Show => print_json(&survey.load()?)?,
    }
    Ok(())
}

fn pick_election(path: &Path, election_id: Option<&str>) -> Result<ElectionRecord> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bundle: ElectionBundle =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let election = match election_id {
        Some(id) => bundle.find(id).cloned(),
        None => bundle.elections.first().cloned(),
    };
    election.with_context(|| match election_id {
        Some(id) => format!("no election {id} in {}", path.display()),
        None => format!("{} holds no elections", path.display()),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn schema_export(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)?;

    let schemas = [
        ("ElectionBundle", schema_for!(ElectionBundle)),
        ("AnalysisResult", schema_for!(AnalysisResult)),
        ("HistoryEntry", schema_for!(HistoryEntry)),
        ("SurveyResponseSet", schema_for!(SurveyResponseSet)),
    ];
    for (name, schema) in schemas {
        let json = serde_json::to_string_pretty(&schema)?;
        fs::write(out_dir.join(format!("{name}.schema.json")), json)?;
    }

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

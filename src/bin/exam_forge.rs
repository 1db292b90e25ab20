use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use exam_forge::clients::ClientType;
use exam_forge::store::{FileStore, PYQ_QUESTIONS};
use exam_forge::{
    filter_duplicates, telemetry, CurrentAffairsRequest, CustomTestRequest, ExamService, ForgeConfig,
    GeneratedTest, GenerationError, GenerationRequest, NcertTestRequest, PyqRequest, QuestionDraft,
};

#[derive(Parser)]
#[command(author, version, about = "Exam practice question generator", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    EXAM_FORGE_PROVIDER      gemini|claude|deepseek|mock (default: gemini)
    EXAM_FORGE_MODEL         Model override for the selected provider
    EXAM_FORGE_STORE_DIR     Persist cache and PYQ records under this directory
    EXAM_FORGE_BLUEPRINTS    JSON file of exam blueprints
    EXAM_FORGE_BATCH_SIZE    Questions per batch for non-blueprint tests (default: 20)
    GEMINI_API_KEY / ANTHROPIC_API_KEY / DEEPSEEK_API_KEY

EXAMPLES:
    exam-forge mock --exam \"SSC CGL\" -s Reasoning -s \"General Awareness\" -s Quant -s English -n 100
    exam-forge custom --subject History --topic \"Mughal Empire\" -n 10
    exam-forge current-affairs --date 2024-05-01
    exam-forge --store-dir ./data import-pyq cgl_maths.json")]
struct Args {
    /// Completion provider, overrides EXAM_FORGE_PROVIDER
    #[arg(long, global = true)]
    provider: Option<ClientType>,

    /// Document store directory, overrides EXAM_FORGE_STORE_DIR
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Trace-level logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full mock test, blueprint-composed for registered multi-subject exams
    Mock {
        #[arg(long)]
        exam: String,
        #[arg(short, long = "subject", required = true)]
        subjects: Vec<String>,
        #[arg(short = 'n', long, default_value_t = 25)]
        count: usize,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        year: Option<u16>,
        /// Topic to prioritise; repeatable
        #[arg(long = "weak-topic")]
        weak_topics: Vec<String>,
        /// Overall accuracy in percent, drives the difficulty mix
        #[arg(long)]
        accuracy: Option<f64>,
        /// Only ask about the weak topics
        #[arg(long)]
        practice: bool,
    },
    /// Single-topic practice test
    Custom {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Ten questions on one day's news
    CurrentAffairs {
        /// YYYY-MM-DD, today when omitted
        #[arg(long)]
        date: Option<String>,
    },
    /// Fifteen questions from one NCERT chapter
    Ncert {
        #[arg(long)]
        class: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        chapter: String,
    },
    /// Turn a raw question (and optional image data URI) into a full question
    Question {
        text: String,
        #[arg(long)]
        image: Option<String>,
    },
    /// Previous-year questions, generated when too few are stored
    Pyq {
        #[arg(long)]
        exam: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        year: Option<u16>,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Load PYQ records from a JSON array file into the store
    ImportPyq { file: PathBuf },
    /// List the registered exam blueprints, or show one
    Blueprints {
        #[arg(long)]
        exam: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

fn print_test(test: GeneratedTest) -> anyhow::Result<()> {
    print_json(&GeneratedTest::new(filter_duplicates(test.questions)))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ForgeConfig::from_env()?;
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(dir) = args.store_dir {
        config.store_dir = Some(dir);
    }

    if let Command::ImportPyq { file } = &args.command {
        let dir = config
            .store_dir
            .clone()
            .ok_or_else(|| GenerationError::Configuration("import-pyq needs --store-dir".into()))?;
        let imported = FileStore::new(dir).import_records(PYQ_QUESTIONS, file).await?;
        eprintln!("Imported {} PYQ records", imported);
        return Ok(());
    }

    let service = ExamService::from_config(&config)?;
    match args.command {
        Command::Mock { exam, subjects, count, category, year, weak_topics, accuracy, practice } => {
            let request = GenerationRequest::new(exam, subjects, count)
                .with_category(category)
                .with_year(year)
                .with_weak_topics(weak_topics)
                .with_accuracy(accuracy)
                .with_practice_weak_topics(practice);
            print_test(service.generate_mock_test(&request).await?)
        }
        Command::Custom { subject, topic, count } => {
            print_test(service.generate_custom_test(&CustomTestRequest::new(subject, topic, count)).await?)
        }
        Command::CurrentAffairs { date } => {
            let request = CurrentAffairsRequest::for_date(date.as_deref())?;
            print_test(service.generate_current_affairs(&request).await?)
        }
        Command::Ncert { class, subject, chapter } => {
            print_test(service.generate_ncert_test(&NcertTestRequest::new(class, subject, chapter)).await?)
        }
        Command::Question { text, image } => {
            print_json(&service.create_question(&QuestionDraft::new(text).with_image(image)).await?)
        }
        Command::Pyq { exam, subject, year, limit } => {
            print_test(service.resolve_pyq_test(&PyqRequest::new(exam, subject, year, limit)).await?)
        }
        Command::Blueprints { exam: None } => print_json(service.blueprints()),
        Command::Blueprints { exam: Some(exam) } => print_json(service.blueprints().require(&exam)?),
        Command::ImportPyq { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Request failed");
            match e.downcast_ref::<GenerationError>() {
                Some(generation) => eprintln!("{}", generation.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

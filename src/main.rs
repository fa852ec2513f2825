#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # grademark
//!
//! Grades written answers against an ideal answer and a rubric.
//!
//! Set `OPENAI_API_KEY` (and optionally `OPENAI_ENDPOINT`, `OPENAI_MODEL`) in
//! the environment or a `.env` file, then run
//! `grademark grade --question "..." --ideal ideal.docx answer.pdf`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bpaf::*;
use colored::{ColoredString, Colorize};
use dotenvy::dotenv;
use grademark::{
    BackendAdapter, GraderConfig, GradingError, GradingRequest, GradingResult, OpenAiBackend,
    RawDocument, Rubric, extract,
    grade::{Grader, render_prompt},
    report::{BatchSummary, Letter, format_grade, letter_grade},
};
use serde_json::json;
use tabled::{Table, settings::Style};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Inputs shared by every submission in a run.
#[derive(Debug, Clone)]
struct Inputs {
    /// The question text.
    question: String,
    /// Path to the ideal answer document.
    ideal:    PathBuf,
    /// Rubric criteria; empty means the default rubric.
    rubric:   Vec<String>,
}

impl Inputs {
    /// Reads the ideal answer and builds the rubric.
    fn load(&self) -> Result<(String, Rubric)> {
        let ideal = RawDocument::from_path(&self.ideal)
            .and_then(|doc| extract(&doc))
            .with_context(|| format!("Could not read the ideal answer `{}`", self.ideal.display()))?;
        let rubric = if self.rubric.is_empty() {
            Rubric::default()
        } else {
            Rubric::new(self.rubric.clone())?
        };
        Ok((ideal, rubric))
    }

    /// Builds the request for one submission document.
    fn request(&self, ideal: &str, rubric: &Rubric, submission: RawDocument) -> GradingRequest {
        GradingRequest::builder()
            .question(self.question.clone())
            .ideal_answer(ideal)
            .rubric(rubric.clone())
            .submission(submission)
            .build()
    }
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Grade one or more submissions
    Grade {
        /// Shared inputs
        inputs:      Inputs,
        /// Print JSON instead of tables
        json:        bool,
        /// Maximum concurrent backend calls
        concurrency: usize,
        /// Submission files
        submissions: Vec<PathBuf>,
    },
    /// Print the prompt for a submission without calling the backend
    Prompt {
        /// Shared inputs
        inputs:     Inputs,
        /// Submission file
        submission: PathBuf,
    },
    /// Check that the backend answers
    Check,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the question, ideal answer and rubric
    fn inputs() -> impl Parser<Inputs> {
        let question = short('q')
            .long("question")
            .help("The question the students answered")
            .argument::<String>("TEXT");
        let ideal = short('i')
            .long("ideal")
            .help("Path to the ideal answer (.txt, .md, .docx or .pdf)")
            .argument::<PathBuf>("PATH");
        let rubric = short('r')
            .long("rubric")
            .help("A rubric criterion; repeat for more. Defaults to Keyword Match, Coherence, Fluency, Semantic Similarity")
            .argument::<String>("NAME")
            .many();
        construct!(Inputs {
            question,
            ideal,
            rubric
        })
    }

    let json = long("json").help("Print results as JSON").switch();
    let concurrency = long("concurrency")
        .help("How many submissions to grade at once")
        .argument::<usize>("N")
        .fallback(4);
    let submissions = positional::<PathBuf>("SUBMISSION")
        .help("Submission files to grade")
        .some("at least one submission is required");
    let grade = {
        let inputs = inputs();
        construct!(Cmd::Grade {
            inputs,
            json,
            concurrency,
            submissions
        })
        .to_options()
        .command("grade")
        .help("Grade submissions against the ideal answer and rubric")
    };

    let prompt = {
        let inputs = inputs();
        let submission = positional::<PathBuf>("SUBMISSION").help("Submission file");
        construct!(Cmd::Prompt { inputs, submission })
            .to_options()
            .command("prompt")
            .help("Print the grading prompt without calling the backend")
    };

    let check = pure(Cmd::Check)
        .to_options()
        .command("check")
        .help("Check that the grading backend is reachable");

    let cmd = construct!([grade, prompt, check]);

    cmd.to_options()
        .descr("Rubric-guided answer grading")
        .run()
}

/// Colours a percentage by its letter grade.
fn colored_grade(percentage: f64) -> ColoredString {
    let text = format_grade(percentage);
    let colored = match letter_grade(percentage) {
        Letter::A => text.green(),
        Letter::B => text.blue(),
        Letter::C => text.yellow(),
        Letter::D => text.red(),
        Letter::F => text.bright_red(),
    };
    colored.bold()
}

/// Prints one outcome for humans.
fn show_outcome(path: &Path, outcome: &Result<GradingResult, GradingError>) {
    println!("{}", path.display().to_string().bold());
    match outcome {
        Ok(result) => {
            println!(
                "Score: {:.1}/10  {}",
                result.overall_score(),
                colored_grade(result.percentage())
            );
            println!("{}", Table::new(result.per_criterion()).with(Style::rounded()));
            println!("{}\n", result.reasoning_summary());
        }
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            if let Some(raw) = e.raw_text() {
                eprintln!("Backend replied:\n{raw}");
            }
            println!();
        }
    }
}

/// Prints the batch summary for humans.
fn show_summary(summary: &BatchSummary) {
    println!("{}", "Summary".bold());
    println!("Submissions: {}", summary.total_submissions);
    println!("Average:     {}", colored_grade(summary.average));
    println!("Median:      {:.1}%", summary.median);
    println!("Range:       {:.1}% - {:.1}%", summary.lowest, summary.highest);
    println!("Std. dev.:   {:.1}", summary.standard_deviation);
    println!("Pass rate:   {:.1}%", summary.pass_rate);
    println!("{}", Table::new([summary.distribution]).with(Style::rounded()));
}

/// Grades every submission and prints the outcomes.
async fn run_grade(
    inputs: Inputs,
    json: bool,
    concurrency: usize,
    submissions: Vec<PathBuf>,
) -> Result<()> {
    let config = GraderConfig::from_env()?;
    let (ideal, rubric) = inputs.load()?;
    let grader = Grader::new(OpenAiBackend::new(&config), config.request().clone());

    // Files that cannot even be loaded keep their slot so output order matches
    // the command line.
    let mut slots = Vec::with_capacity(submissions.len());
    let mut requests = Vec::new();
    for path in submissions {
        match RawDocument::from_path(&path) {
            Ok(doc) => {
                requests.push(inputs.request(&ideal, &rubric, doc));
                slots.push((path, None));
            }
            Err(e) => slots.push((path, Some(Err(e)))),
        }
    }

    let mut graded = grader.grade_batch(&requests, concurrency).await.into_iter();
    let outcomes: Vec<(PathBuf, Result<GradingResult, GradingError>)> = slots
        .into_iter()
        .filter_map(|(path, early)| match early {
            Some(outcome) => Some((path, outcome)),
            None => graded.next().map(|outcome| (path, outcome)),
        })
        .collect();

    let summary = BatchSummary::from_results(outcomes.iter().filter_map(|(_, o)| o.as_ref().ok()));

    if json {
        let results: Vec<_> = outcomes
            .iter()
            .map(|(path, outcome)| match outcome {
                Ok(result) => json!({ "file": path, "result": result }),
                Err(e) => json!({ "file": path, "error": e.to_string(), "raw_text": e.raw_text() }),
            })
            .collect();
        let body = json!({ "results": results, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        for (path, outcome) in &outcomes {
            show_outcome(path, outcome);
        }
        if outcomes.len() > 1
            && let Some(summary) = &summary
        {
            show_summary(summary);
        }
    }

    let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
    if failed > 0 {
        bail!("{failed} of {} submissions could not be graded", outcomes.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(Level::INFO);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();

    match cmd {
        Cmd::Grade {
            inputs,
            json,
            concurrency,
            submissions,
        } => run_grade(inputs, json, concurrency, submissions).await?,
        Cmd::Prompt { inputs, submission } => {
            let (ideal, rubric) = inputs.load()?;
            let doc = RawDocument::from_path(&submission)?;
            let prompt = render_prompt(&inputs.request(&ideal, &rubric, doc))?;
            println!("{prompt}");
        }
        Cmd::Check => {
            let config = GraderConfig::from_env()?;
            let adapter = BackendAdapter::new(OpenAiBackend::new(&config), config.request().clone());
            match adapter.ping().await {
                Ok(()) => println!(
                    "{} {} at {}",
                    "Backend reachable:".green().bold(),
                    adapter.service().model(),
                    config.openai().api_base()
                ),
                Err(e) => bail!("Backend check failed: {e}"),
            }
        }
    };

    Ok(())
}

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cadence::collection::Collection;
use cadence::config::Config;
use cadence::interleave::Pattern;
use cadence::review::{self, ReviewSubmission, SessionRequest};
use cadence::schedule::Quality;

#[derive(Parser)]
#[command(name = "cadence", version, about = "SM-2 flashcard scheduler")]
struct Cli {
    /// TOML file overriding the scheduling constants.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review cards in the terminal.
    Drill(Selection),
    /// Print the next session's queue without reviewing anything.
    Queue(Selection),
    /// Serve the JSON API.
    Serve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Args)]
struct Selection {
    /// Deck files, or directories to search for them.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Only study this deck.
    #[arg(long)]
    deck: Option<String>,
    /// Session size.
    #[arg(short, long)]
    size: Option<usize>,
    /// Mix topics: low, medium or high.
    #[arg(long)]
    interleave: Option<Pattern>,
    /// How many topics to mix when interleaving.
    #[arg(long)]
    topics: Option<usize>,
    /// A tag to prioritise when interleaving. Repeatable.
    #[arg(long = "weak")]
    weak_topics: Vec<String>,
}

impl Selection {
    fn request(&self) -> SessionRequest {
        SessionRequest {
            deck: self.deck.clone(),
            size: self.size,
            pattern: self.interleave,
            topics: self.topics,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("loading config")?;

    match cli.command {
        Command::Drill(selection) => {
            config.session.weak_topics.extend(selection.weak_topics.iter().cloned());
            drill(&selection, &config)
        }
        Command::Queue(selection) => {
            config.session.weak_topics.extend(selection.weak_topics.iter().cloned());
            print_queue(&selection, &config)
        }
        Command::Serve { paths, port } => {
            let collection = load(&paths, &config)?;
            tokio::runtime::Runtime::new()
                .context("starting runtime")?
                .block_on(cadence::web::serve(collection, config, port))
                .context("serving")
        }
    }
}

fn load(paths: &[PathBuf], config: &Config) -> Result<Collection> {
    let collection = Collection::load(paths, Utc::now(), config);
    if collection.is_empty() {
        bail!("no cards found");
    }
    Ok(collection)
}

fn print_queue(selection: &Selection, config: &Config) -> Result<()> {
    let collection = load(&selection.paths, config)?;
    let order = review::session_queue(&collection.cards, &selection.request(), Utc::now(), config);
    for i in order {
        let card = &collection.cards[i];
        println!(
            "{}\t{}\t{}\t{}",
            card.id,
            card.deck,
            card.scheduling.stage.name(),
            card.scheduling.due.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn drill(selection: &Selection, config: &Config) -> Result<()> {
    let mut collection = load(&selection.paths, config)?;
    let now = Utc::now();

    println!("Decks:");
    for s in review::deck_summaries(&collection.cards, now) {
        println!(
            "  {}: {} due, {} new, {} relearning / {} total",
            s.name, s.due, s.new, s.relearning, s.total
        );
    }
    println!();

    let order = review::session_queue(&collection.cards, &selection.request(), now, config);
    if order.is_empty() {
        println!("No cards to study.");
        return Ok(());
    }
    println!("{} cards in this session.\n", order.len());

    let mut counts = [0u32; 5];
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut buf = String::new();

    for (n, &i) in order.iter().enumerate() {
        let card = &collection.cards[i];
        println!("[{}/{}] {}", n + 1, order.len(), card.deck);
        println!();
        println!("{}", card.front);
        println!();

        let started = Instant::now();
        let mut hint_used = false;
        loop {
            print!("Press Enter to reveal (h for a hint)...");
            io::stdout().flush()?;
            buf.clear();
            stdin.read_line(&mut buf)?;
            if buf.trim() == "h" && !hint_used {
                hint_used = true;
                println!("Hint: {}", hint(&card.back));
                continue;
            }
            break;
        }
        let answer_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        println!("{}", card.back);
        println!();

        let quality = loop {
            print!("Rate (1=blackout, 2=wrong, 3=hard, 4=good, 5=perfect): ");
            io::stdout().flush()?;
            buf.clear();
            if stdin.read_line(&mut buf)? == 0 {
                bail!("stdin closed mid-session");
            }
            match buf.trim().parse::<u8>().map(Quality::try_from) {
                Ok(Ok(q)) => break q,
                Ok(Err(e)) => println!("{e}"),
                Err(_) => println!("Please enter a number from 1 to 5."),
            }
        };
        counts[usize::from(quality.value() - 1)] += 1;

        let submission = ReviewSubmission {
            quality,
            hint_used,
            answer_ms,
        };
        collection
            .review(i, submission, Utc::now(), config)
            .context("saving review")?;
        println!();
    }

    println!("Session complete!");
    println!(
        "  Blackout: {}, Wrong: {}, Hard: {}, Good: {}, Perfect: {}",
        counts[0], counts[1], counts[2], counts[3], counts[4]
    );
    Ok(())
}

fn hint(answer: &str) -> String {
    let shown: String = answer.chars().take(3).collect();
    format!("{shown}...")
}

use tillroll::{
    config::{parse_date, DatabaseConfig, DateFilter, GroupOrder, TransactionQuery, DEFAULT_CHUNK_SIZE},
    engine::stream::TransactionStream,
    error::PipelineError,
    line::RawLine,
    report::Report,
    stream_transactions, Session, Transaction,
};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Parser;
use std::io::stdout;
use std::path::PathBuf;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Parser)]
#[command(name = "tillroll")]
#[command(about = "Rebuild point-of-sale transactions from their line records", long_about = None)]
struct Cli {
    /// SQLite point-of-sale store
    #[arg(long, env = "TILLROLL_DATABASE")]
    database: Option<PathBuf>,

    /// CSV export of the line table, read instead of the store
    #[arg(long, conflicts_with_all = ["start", "end", "on"])]
    csv: Option<PathBuf>,

    /// First day to include (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Single day to include (YYYY-MM-DD or MM/DD/YYYY)
    #[arg(long, value_parser = parse_date)]
    on: Option<NaiveDate>,

    /// Line rows fetched per query
    #[arg(long, env = "TILLROLL_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Fail if transaction ids are not strictly descending
    #[arg(long)]
    strict_order: bool,

    /// Print one catalog item instead of transactions
    #[arg(long, conflicts_with = "list_items")]
    item: Option<String>,

    /// Print the whole item catalog instead of transactions
    #[arg(long)]
    list_items: bool,

    /// Include deleted items in --list-items
    #[arg(long, requires = "list_items")]
    include_deleted: bool,
}

impl Cli {
    fn filter(&self) -> DateFilter {
        DateFilter {
            start: self.start,
            end: self.end,
            on: self.on,
        }
    }

    fn order(&self) -> GroupOrder {
        if self.strict_order {
            GroupOrder::Descending
        } else {
            GroupOrder::Unchecked
        }
    }

    fn database(&self) -> anyhow::Result<DatabaseConfig> {
        match &self.database {
            Some(path) => Ok(DatabaseConfig::new(path)),
            None => bail!("no store given: pass --database or set TILLROLL_DATABASE"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if cli.item.is_some() || cli.list_items {
        return print_catalog(&cli);
    }
    process_transactions(&cli).await
}

fn print_catalog(cli: &Cli) -> anyhow::Result<()> {
    let mut session = Session::open(&cli.database()?).context("opening store")?;

    let result = write_catalog(&mut session, cli);
    after_close(result, session.close())
}

fn write_catalog(session: &mut Session, cli: &Cli) -> anyhow::Result<()> {
    let items = match &cli.item {
        Some(item_num) => vec![session.item(item_num)?],
        None => session.items(cli.include_deleted)?,
    };

    let mut writer = csv::Writer::from_writer(stdout());
    for item in &items {
        writer.serialize(item)?;
    }
    writer.flush()?;
    Ok(())
}

/// Combines the outcome of work on a session with the outcome of closing
/// it. The work error wins; a close error behind it is only logged.
fn after_close<T>(
    result: anyhow::Result<T>,
    closed: Result<(), PipelineError>,
) -> anyhow::Result<T> {
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(anyhow::Error::new(e).context("closing store")),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_error)) => {
            log::warn!("Closing store also failed: {}", close_error);
            Err(e)
        }
    }
}

async fn process_transactions(cli: &Cli) -> anyhow::Result<()> {
    let query = TransactionQuery::new(cli.filter())
        .with_chunk_size(cli.chunk_size)
        .with_order(cli.order());

    let (tx_channel, mut rx) = mpsc::channel::<Transaction>(CHANNEL_CAPACITY);

    let reporter = tokio::spawn(async move {
        let mut report = Report::new(stdout())?;

        while let Some(tx) = rx.recv().await {
            report.record(&tx)?;
        }

        report.finish()
    });

    let produced = match &cli.csv {
        Some(path) => {
            log::info!("Processing transactions from: {}", path.display());
            let stream = stream_transactions(path, query.order)
                .with_context(|| format!("opening {}", path.display()))?;
            forward(stream, &tx_channel).await
        }
        None => {
            let mut session = Session::open(&cli.database()?).context("opening store")?;
            log::info!("{} line records selected", session.count_lines(&query.filter)?);

            let result = match session.transactions(&query) {
                Ok(stream) => forward(stream, &tx_channel).await,
                Err(e) => Err(e.into()),
            };
            after_close(result, session.close())
        }
    };

    // Closing the sender lets the report task drain and finish.
    drop(tx_channel);
    let summary = reporter.await.context("report task panicked")??;
    produced?;

    log::info!("Summary: {}", summary);
    Ok(())
}

async fn forward<I>(
    mut stream: TransactionStream<I>,
    channel: &mpsc::Sender<Transaction>,
) -> anyhow::Result<()>
where
    I: Iterator<Item = Result<RawLine, PipelineError>>,
{
    while let Some(tx) = stream.next_transaction()? {
        if channel.send(tx).await.is_err() {
            stream.close();
            bail!("report task stopped early");
        }
    }
    Ok(())
}

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_foldseek::alphafold::AlphafoldHttpClient;
use kira_foldseek::classify::{IdentifierSets, bucket_hit_files, load_accessions, load_query_ids};
use kira_foldseek::config::{ConfigLoader, ResolvedConfig};
use kira_foldseek::domain::AlignmentMode;
use kira_foldseek::error::KiraError;
use kira_foldseek::expression::{Thresholds, default_list_paths, partition_file};
use kira_foldseek::fasta::split_fasta_file;
use kira_foldseek::foldseek::FoldseekHttpClient;
use kira_foldseek::hits::{LayoutKind, hit_files_in};
use kira_foldseek::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_foldseek::pipeline::{Pipeline, SearchRequest};
use kira_foldseek::poller::ThreadSleeper;
use kira_foldseek::structure::StructureHttpClient;
use kira_foldseek::summary::summarize;
use kira_foldseek::top_hits::{
    ModelNaming, TopHitsResult, download_models, load_hits, run_top_hits, top_n_by_bitscore,
};
use kira_foldseek::uniprot::{REQUEST_DELAY, UniprotHttpClient, download_fasta_batch};

#[derive(Parser)]
#[command(name = "kira-fs")]
#[command(about = "Foldseek structural search pipeline: submit, poll, download, mine uncharacterized hits")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Submit a structure to Foldseek and extract uncharacterized hits")]
    Search(SearchArgs),
    #[command(about = "Split a differential-expression CSV into accession lists")]
    Partition(PartitionArgs),
    #[command(about = "Sort hit lines into all/upregulated/downregulated/significant lists")]
    Bucket(BucketArgs),
    #[command(about = "FASTA helpers")]
    Fasta(FastaArgs),
    #[command(about = "Select top hits and download their AlphaFold models or PDB entries")]
    TopHits(TopHitsArgs),
    #[command(about = "Classify hits of downloaded models into a CSV summary")]
    Summarize(SummarizeArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// PDB id, UniProt accession, or local structure file
    input: String,

    /// Result archive path (.tar.gz is appended when missing)
    #[arg(default_value = "foldseek_results")]
    output: String,

    #[arg(long, value_enum)]
    mode: Option<AlignmentMode>,

    #[arg(long)]
    poll_interval: Option<u64>,

    #[arg(long)]
    max_attempts: Option<u32>,

    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[derive(Args)]
struct PartitionArgs {
    input: PathBuf,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 0.05)]
    p_value: f64,

    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    up: f64,

    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    down: f64,
}

#[derive(Args)]
struct BucketArgs {
    #[arg(long)]
    results_dir: PathBuf,

    /// Directory holding the accession lists written by `partition`
    #[arg(long, default_value = ".")]
    lists_dir: PathBuf,

    #[arg(long, value_enum, default_value = "easy-search")]
    layout: LayoutKind,

    /// Defaults to --results-dir
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args)]
struct FastaArgs {
    #[command(subcommand)]
    command: FastaCommand,
}

#[derive(Subcommand)]
enum FastaCommand {
    #[command(about = "Download UniProt FASTA for an accession list")]
    Fetch {
        accessions: PathBuf,
        #[arg(long, default_value = "proteins.fasta")]
        output: PathBuf,
    },
    #[command(about = "Split FASTA records into characterized and uncharacterized")]
    Split {
        input: PathBuf,
        #[arg(long, default_value = "characterizedfasta.txt")]
        characterized: PathBuf,
        #[arg(long, default_value = "uncharacterizedfasta.txt")]
        uncharacterized: PathBuf,
    },
}

#[derive(Args)]
struct TopHitsArgs {
    /// Hit files; every .m8 in --results-dir is used when none are given
    files: Vec<PathBuf>,

    #[arg(long)]
    results_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "easy-search")]
    layout: LayoutKind,

    #[arg(long)]
    evalue: Option<f64>,

    /// Rank all hits by bitscore and take the first N instead of best-per-query
    #[arg(long)]
    top: Option<usize>,

    #[arg(long, default_value = "top_hit_structures")]
    output_dir: PathBuf,

    #[arg(long, default_value = "downloaded_af_models_summary.csv")]
    summary: PathBuf,
}

#[derive(Args)]
struct SummarizeArgs {
    #[arg(long)]
    results_dir: PathBuf,

    #[arg(long, default_value = "top_hit_structures")]
    models_dir: PathBuf,

    #[arg(long)]
    upregulated: PathBuf,

    #[arg(long)]
    downregulated: PathBuf,

    #[arg(long)]
    significant: PathBuf,

    /// Read the identifier sets from hit lists (first column) instead of accession lists
    #[arg(long)]
    from_hit_lists: bool,

    #[arg(long, value_enum, default_value = "easy-search")]
    layout: LayoutKind,

    #[arg(long, default_value = "top_hits_summary_final.csv")]
    output: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InputNotFound(_) | KiraError::NoMappedStructure(_) => 2,
        KiraError::FoldseekHttp(_)
        | KiraError::Submission(_)
        | KiraError::RemoteJob { .. }
        | KiraError::DownloadStatus { .. }
        | KiraError::PdbeHttp(_)
        | KiraError::PdbeStatus { .. }
        | KiraError::RcsbHttp(_)
        | KiraError::RcsbStatus { .. }
        | KiraError::AlphafoldHttp(_)
        | KiraError::AlphafoldStatus { .. }
        | KiraError::UniprotHttp(_)
        | KiraError::UniprotStatus { .. } => 3,
        KiraError::PollTimeout { .. } => 4,
        KiraError::ArchiveFormat(_) => 5,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Search(args) => run_search(args, config, output_mode),
        Commands::Partition(args) => run_partition(args, output_mode),
        Commands::Bucket(args) => run_bucket(args, output_mode),
        Commands::Fasta(args) => run_fasta(args, &config, output_mode),
        Commands::TopHits(args) => run_top_hits_command(args, &config, output_mode),
        Commands::Summarize(args) => run_summarize(args, output_mode),
    }
}

fn run_search(
    args: SearchArgs,
    mut config: ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(secs) = args.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(attempts) = args.max_attempts {
        config.max_poll_attempts = attempts;
    }
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }

    let foldseek = FoldseekHttpClient::new(&config.endpoints.foldseek)?;
    let structures = StructureHttpClient::new(&config.endpoints.pdbe, &config.endpoints.rcsb)?;
    let pipeline = Pipeline::new(foldseek, structures, ThreadSleeper, config);
    let request = SearchRequest {
        input: args.input,
        output: args.output,
        mode: args.mode,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = pipeline.run(&request, &JsonOutput)?;
            JsonOutput::print(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let summary = pipeline.run(&request, &ConsoleOutput)?;
            ConsoleOutput::print_search_summary(&summary);
        }
    }
    Ok(())
}

fn run_partition(args: PartitionArgs, output_mode: OutputMode) -> miette::Result<()> {
    let thresholds = Thresholds {
        p_value: args.p_value,
        up_log2: args.up,
        down_log2: args.down,
    };
    let result = partition_file(&args.input, &args.out_dir, &thresholds)?;
    print_result(output_mode, "partition", &result)
}

fn run_bucket(args: BucketArgs, output_mode: OutputMode) -> miette::Result<()> {
    let [up, down, significant] = default_list_paths(&args.lists_dir);
    let sets = IdentifierSets::new(
        load_accessions(&up)?,
        load_accessions(&down)?,
        load_accessions(&significant)?,
    );
    let files = hit_files_in(&args.results_dir)?;
    let out_dir = args.out_dir.unwrap_or_else(|| args.results_dir.clone());
    let result = bucket_hit_files(&files, &args.layout.layout(), &sets, &out_dir)?;
    print_result(output_mode, "bucket", &result)
}

fn run_fasta(
    args: FastaArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match args.command {
        FastaCommand::Fetch { accessions, output } => {
            let accessions = load_accessions(&accessions)?;
            tracing::info!("loaded {} accessions", accessions.len());
            let client = UniprotHttpClient::new(&config.endpoints.uniprot)?;
            let result =
                download_fasta_batch(&client, &ThreadSleeper, &accessions, &output, REQUEST_DELAY)?;
            print_result(output_mode, "fasta fetch", &result)
        }
        FastaCommand::Split {
            input,
            characterized,
            uncharacterized,
        } => {
            let counts = split_fasta_file(&input, &characterized, &uncharacterized)?;
            print_result(output_mode, "fasta split", &counts)
        }
    }
}

fn run_top_hits_command(
    args: TopHitsArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let files = match (&args.results_dir, args.files.is_empty()) {
        (Some(dir), true) => hit_files_in(dir)?,
        (None, true) => {
            return Err(miette::Report::msg(
                "no hit files given (pass files or --results-dir)",
            ));
        }
        (_, false) => args.files.clone(),
    };
    let layout = args.layout.layout();
    let client = AlphafoldHttpClient::new(&config.endpoints.alphafold)?;
    let structures = StructureHttpClient::new(&config.endpoints.pdbe, &config.endpoints.rcsb)?;

    let result = match args.top {
        Some(n) => {
            let hits = load_hits(&files, &layout)?;
            let top = top_n_by_bitscore(&hits, n);
            let models = download_models(
                &client,
                &structures,
                &top,
                &args.output_dir,
                ModelNaming::Ranked,
            )?;
            TopHitsResult {
                loaded: hits.len(),
                selected: top.len(),
                downloaded: models.len(),
                summary_path: None,
            }
        }
        None => run_top_hits(
            &client,
            &structures,
            &files,
            &layout,
            args.evalue.unwrap_or(config.evalue_cutoff),
            &args.output_dir,
            &args.summary,
        )?,
    };
    print_result(output_mode, "top hits", &result)
}

fn run_summarize(args: SummarizeArgs, output_mode: OutputMode) -> miette::Result<()> {
    let load: fn(&Path) -> Result<Vec<String>, KiraError> = if args.from_hit_lists {
        load_query_ids
    } else {
        load_accessions
    };
    let sets = IdentifierSets::new(
        load(&args.upregulated)?,
        load(&args.downregulated)?,
        load(&args.significant)?,
    );
    let files = hit_files_in(&args.results_dir)?;
    let result = summarize(
        &files,
        &args.layout.layout(),
        &args.models_dir,
        &sets,
        &args.output,
    )?;
    print_result(output_mode, "summary", &result)
}

fn print_result<T: serde::Serialize>(
    output_mode: OutputMode,
    label: &str,
    value: &T,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print(value).into_diagnostic(),
        OutputMode::Interactive => ConsoleOutput::print_value(label, value).into_diagnostic(),
    }
}

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use galaxy_data_manager::app::{
    AddOptions, App, LibraryAddOptions, RemoveOptions,
};
use galaxy_data_manager::config::{ConfigLoader, global_config_path};
use galaxy_data_manager::domain::{
    CustomSortHandling, DataSpec, FastaSortingMethod, FolderPath,
};
use galaxy_data_manager::error::GdmError;
use galaxy_data_manager::galaxy::{GalaxyClient, GalaxyHttpClient};
use galaxy_data_manager::output::JsonOutput;

#[derive(Parser)]
#[command(name = "galaxy-dm")]
#[command(about = "Manage bioinformatics reference data in a Galaxy server's data tables and libraries")]
#[command(version, author)]
struct Cli {
    /// Name of the Galaxy instance in the config file
    #[arg(short, long, global = true, env = "GALAXY_DM_INSTANCE")]
    instance: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enables verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Add entries to Galaxy data tables")]
    Add(AddArgs),
    #[command(about = "Remove entries from Galaxy data tables")]
    Rm(RmArgs),
    #[command(about = "Add files to a Galaxy data library")]
    AddLib(AddLibArgs),
    #[command(about = "Remove a folder or a whole Galaxy data library")]
    RmLib(RmLibArgs),
    #[command(about = "Create the global configuration file")]
    Init(InitArgs),
}

#[derive(Args)]
struct AddArgs {
    /// table:/path/to/data[:Display name] specifiers; escape a literal colon as \:
    files: Vec<String>,

    /// Dbkey to use (i.e. genome build like 'hg19')
    #[arg(short, long)]
    dbkey: Option<String>,

    /// Display name for the dbkey (default: guessed from BioMAJ env vars)
    #[arg(short = 'n', long)]
    dbkey_display_name: Option<String>,

    /// Path to a fasta file with the full reference genome
    #[arg(short, long)]
    genome_fasta: Option<String>,

    /// Display name for the full reference genome
    #[arg(long)]
    genome_fasta_name: Option<String>,

    /// Method used to sort the genome fasta file
    #[arg(short = 's', long, value_enum, default_value_t = FastaSortingMethod::AsIs)]
    fasta_sorting_method: FastaSortingMethod,

    /// Ordered comma separated sequence identifiers (requires '-s custom')
    #[arg(long)]
    fasta_custom_sort_list: Option<String>,

    /// How to handle identifiers missing from the custom sort list
    #[arg(long, value_enum, default_value_t = CustomSortHandling::Discard)]
    fasta_custom_sort_handling: CustomSortHandling,

    /// Don't check that the source files exist locally
    #[arg(long)]
    no_file_check: bool,

    /// STAR indices were made with an annotation
    #[arg(long)]
    star_with_gtf: bool,

    /// Version of STAR used to create the index
    #[arg(long)]
    star_version: Option<String>,

    /// Don't use BioMAJ env variables to guess file names
    #[arg(long)]
    no_biomaj_env: bool,
}

#[derive(Args)]
struct RmArgs {
    /// Id of the data to remove
    dbkey: String,

    /// Tables to remove data from (default: all known tables)
    tables: Vec<String>,

    /// Remove only exact matches instead of every id beginning with the dbkey
    #[arg(long)]
    exact: bool,
}

#[derive(Args)]
struct AddLibArgs {
    /// Files to add
    sources: Vec<String>,

    /// Name of the destination library (default: $dbname)
    #[arg(short, long)]
    library: Option<String>,

    /// Library folder where the data will be placed
    #[arg(short, long, default_value = "/")]
    folder: String,

    /// Restrict access to the given roles (comma separated); the whole
    /// library's permissions are overwritten
    #[arg(long)]
    roles: Option<String>,

    /// Library description (only used on creation)
    #[arg(long, default_value = "")]
    lib_desc: String,

    /// Library synopsis (only used on creation)
    #[arg(long, default_value = "")]
    lib_synopsis: String,

    /// Datatype of the files (default: auto detect)
    #[arg(long, default_value = "auto")]
    datatype: String,

    /// Don't check that the source files exist locally
    #[arg(long)]
    no_file_check: bool,

    /// Replace files already present in the library with the same name
    #[arg(long)]
    replace: bool,

    /// Don't use BioMAJ env variables to guess file names
    #[arg(long)]
    no_biomaj_env: bool,
}

#[derive(Args)]
struct RmLibArgs {
    /// Library to remove from
    library: String,

    /// Folder to remove (default: remove the whole library)
    #[arg(short, long)]
    folder: Option<String>,
}

#[derive(Args)]
struct InitArgs {
    /// Galaxy server URL (prompted when missing)
    #[arg(long)]
    url: Option<String>,

    /// Galaxy API key (prompted when missing)
    #[arg(long)]
    api_key: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(gdm) = report.downcast_ref::<GdmError>() {
            return ExitCode::from(map_exit_code(gdm));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GdmError) -> u8 {
    match error {
        GdmError::UnknownTable(_)
        | GdmError::RoleNotFound(_)
        | GdmError::LibraryNotFound(_)
        | GdmError::FolderNotFound(_)
        | GdmError::MissingConfig(_)
        | GdmError::UnknownInstance(_) => 2,
        GdmError::Connection(_)
        | GdmError::GalaxyStatus { .. }
        | GdmError::InvalidResponse(_)
        | GdmError::ConnectionExhausted
        | GdmError::JobFailed { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init(args) => run_init(args, cli.config.as_deref()),
        command => {
            let instance =
                ConfigLoader::resolve(cli.config.as_deref(), cli.instance.as_deref())
                    .into_diagnostic()?;
            let client =
                GalaxyHttpClient::new(&instance.url, &instance.apikey).into_diagnostic()?;
            let app = App::new(client);
            match command {
                Commands::Add(args) => run_add(args, &app),
                Commands::Rm(args) => run_rm(args, &app),
                Commands::AddLib(args) => run_add_lib(args, &app),
                Commands::RmLib(args) => run_rm_lib(args, &app),
                Commands::Init(_) => unreachable!("handled above"),
            }
        }
    }
}

fn run_add(args: AddArgs, app: &App<GalaxyHttpClient>) -> miette::Result<()> {
    let specs = args
        .files
        .iter()
        .map(|file| file.parse::<DataSpec>())
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;

    let options = AddOptions {
        dbkey: args.dbkey,
        dbkey_display_name: args.dbkey_display_name,
        genome_fasta: args.genome_fasta,
        genome_fasta_name: args.genome_fasta_name,
        fasta_sorting_method: args.fasta_sorting_method,
        fasta_custom_sort_list: args.fasta_custom_sort_list,
        fasta_custom_sort_handling: args.fasta_custom_sort_handling,
        star_with_gtf: args.star_with_gtf,
        star_version: args.star_version,
        no_file_check: args.no_file_check,
        no_biomaj_env: args.no_biomaj_env,
    };

    let result = app.add(&specs, &options).into_diagnostic()?;
    JsonOutput::print_add(&result).into_diagnostic()?;
    Ok(())
}

fn run_rm(args: RmArgs, app: &App<GalaxyHttpClient>) -> miette::Result<()> {
    let options = RemoveOptions {
        tables: args.tables,
        exact: args.exact,
    };
    let result = app.remove(&args.dbkey, &options).into_diagnostic()?;
    JsonOutput::print_remove(&result).into_diagnostic()?;
    Ok(())
}

fn run_add_lib(args: AddLibArgs, app: &App<GalaxyHttpClient>) -> miette::Result<()> {
    let folder: FolderPath = args.folder.parse().into_diagnostic()?;
    let roles = args
        .roles
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|role| !role.is_empty())
        .map(|role| role.to_string())
        .collect();

    let options = LibraryAddOptions {
        library: args.library,
        folder,
        roles,
        description: args.lib_desc,
        synopsis: args.lib_synopsis,
        file_type: args.datatype,
        no_file_check: args.no_file_check,
        replace: args.replace,
        no_biomaj_env: args.no_biomaj_env,
    };

    let result = app.add_library(&args.sources, &options).into_diagnostic()?;
    JsonOutput::print_library_add(&result).into_diagnostic()?;
    Ok(())
}

fn run_rm_lib(args: RmLibArgs, app: &App<GalaxyHttpClient>) -> miette::Result<()> {
    let folder = args
        .folder
        .as_deref()
        .map(|folder| folder.parse::<FolderPath>())
        .transpose()
        .into_diagnostic()?;

    let result = app
        .remove_library(&args.library, folder.as_ref())
        .into_diagnostic()?;
    JsonOutput::print_library_remove(&result).into_diagnostic()?;
    Ok(())
}

fn run_init(args: InitArgs, config: Option<&str>) -> miette::Result<()> {
    let config_path = match config {
        Some(path) => PathBuf::from(path),
        None => global_config_path(),
    };
    if config_path.exists() {
        return Err(GdmError::ConfigExists(config_path)).into_diagnostic();
    }

    let url = match args.url {
        Some(url) => url,
        None => prompt("url").into_diagnostic()?,
    };
    let apikey = match args.api_key {
        Some(key) => key,
        None => prompt("apikey").into_diagnostic()?,
    };

    info!("testing connection...");
    match GalaxyHttpClient::new(&url, &apikey)
        .and_then(|client| client.get_libraries().map(|_| ()))
    {
        Ok(()) => info!("ok, everything looks good"),
        Err(err) => {
            warn!("could not contact the instance: {err}");
            let answer = prompt("write the config anyway? [y/N]").into_diagnostic()?;
            if !confirmed(&answer) {
                return Err(err).into_diagnostic();
            }
        }
    }

    ConfigLoader::write_initial(&config_path, &url, &apikey).into_diagnostic()?;
    info!(
        "config written to {}, ready to go",
        config_path.display()
    );
    Ok(())
}

fn confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn prompt(label: &str) -> Result<String, GdmError> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{label}: ").map_err(|err| GdmError::Filesystem(err.to_string()))?;
    stderr
        .flush()
        .map_err(|err| GdmError::Filesystem(err.to_string()))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| GdmError::Filesystem(err.to_string()))?;
    Ok(line.trim().to_string())
}

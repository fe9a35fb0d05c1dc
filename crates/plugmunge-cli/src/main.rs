use clap::{Parser, Subcommand};
use plugmunge::{
    commands::{
        config::{self, ConfigAction},
        merge_config, prepare, queue, status,
    },
    init_tracing, GlobalOpts,
};
use plugmunge_logger as logger;

#[derive(Parser)]
#[command(name = "plugmunge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Plugin config munger",
    long_about = "plugmunge applies and reverts the config-file and edit-config changes plugins declare on native mobile project files."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure plugmunge
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Queue a plugin for install on the next prepare
    QueueInstall(queue::QueueInstallArgs),
    /// Queue a plugin for uninstall on the next prepare
    QueueUninstall(queue::QueueUninstallArgs),
    /// Apply queued plugin changes and the app manifest to the project files
    Prepare(prepare::PrepareArgs),
    /// Graft every recorded change again
    Reapply(prepare::ReapplyArgs),
    /// Show plugin status for a platform
    Status(status::StatusArgs),
    /// Merge one XML config document into another
    MergeConfig(merge_config::MergeConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    let result = match cli.command {
        Commands::Config { action } => config::handle_config(action, &cli.global),
        Commands::QueueInstall(args) => queue::handle_queue_install(args, &cli.global),
        Commands::QueueUninstall(args) => queue::handle_queue_uninstall(args, &cli.global),
        Commands::Prepare(args) => prepare::handle_prepare(args, &cli.global),
        Commands::Reapply(args) => prepare::handle_reapply(args, &cli.global),
        Commands::Status(args) => status::handle_status(args, &cli.global),
        Commands::MergeConfig(args) => merge_config::handle_merge_config(args, &cli.global),
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        if logger::get_verbosity() > 0 {
            logger::show_log_path();
        }
        std::process::exit(1);
    }
}

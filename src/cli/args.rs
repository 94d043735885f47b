use crate::cli::type_enums::Mode;
use clap::Parser;

/// Command line for `ubersetup`.
/// With no `--mode`, the help text is printed and the process exits successfully.
#[derive(Parser, Debug)]
#[command(name = "ubersetup")]
#[command(about = "Ubersetup your python environment.", long_about = None)]
pub struct Cli {
    /// Ubermode selection [possible values: setup, clear].
    #[arg(long)]
    pub(crate) mode: Option<Mode>,

    /// Enables detailed debug output.
    #[arg(short, long)]
    pub(crate) debug: bool,

    /// Path to a YAML configuration (defaults to `<base-dir>/ubersetup.yaml` if present).
    #[arg(long, env = "UBERSETUP_CONFIG")]
    pub(crate) config: Option<String>,

    /// Directory holding the requirement files and the `temp/` work area
    /// (defaults to the directory of the ubersetup executable).
    #[arg(long)]
    pub(crate) base_dir: Option<String>,
}

use clap::Parser;
use clap_complete::Shell;

/// command line of the harness binary
#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Args {
    /// generate a shell completion script and exit
    #[clap(long = "generate", arg_enum)]
    pub generator: Option<Shell>,

    /// extra config files merged over configs/default.toml, later wins
    pub config_names: Vec<String>,
}

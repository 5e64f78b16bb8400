use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blog",
    about = "Blog entries stored at derived addresses on a ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Ledger snapshot the commands run against
    #[arg(long, global = true, default_value = ".blog/ledger.json")]
    pub state: PathBuf,

    /// Hex-encoded ed25519 secret key of the acting identity
    #[arg(long, global = true, default_value = ".blog/id.key")]
    pub keypair: PathBuf,

    /// TOML client configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cluster name, overriding the configuration file
    #[arg(long, global = true)]
    pub cluster: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a new identity keypair
    Keygen(KeygenArgs),
    /// Print the derived address of an entry
    Address(AddressArgs),
    /// Create an entry owned by the acting identity
    Create(CreateArgs),
    /// Replace the description of an entry
    Update(UpdateArgs),
    /// Delete an entry
    Delete(DeleteArgs),
    /// List every entry
    List(ListArgs),
    /// Show the entry at an address
    Show(ShowArgs),
    /// Report whether the blog program is deployed
    Program(ProgramArgs),
    /// Deploy the blog program to the local ledger
    Deploy(DeployArgs),
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Overwrite an existing keypair file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AddressArgs {
    pub title: String,
    /// Owner identity (hex); defaults to the acting identity
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Args)]
pub struct CreateArgs {
    pub title: String,
    pub description: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub title: String,
    pub description: String,
    /// Address the caller believes the entry lives at
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub title: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only entries owned by this identity (hex)
    #[arg(long)]
    pub owner: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub address: String,
}

#[derive(Args)]
pub struct ProgramArgs {}

#[derive(Args)]
pub struct DeployArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_create() {
        let cli = Cli::try_parse_from(["blog", "create", "Hello", "First post"]).unwrap();
        if let Command::Create(args) = cli.command {
            assert_eq!(args.title, "Hello");
            assert_eq!(args.description, "First post");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_update_with_address() {
        let cli =
            Cli::try_parse_from(["blog", "update", "Hello", "Edited", "--address", "ab"]).unwrap();
        if let Command::Update(args) = cli.command {
            assert_eq!(args.address, Some("ab".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_address_for_other_owner() {
        let cli = Cli::try_parse_from(["blog", "address", "Hello", "--owner", "id:01"]).unwrap();
        if let Command::Address(args) = cli.command {
            assert_eq!(args.owner, Some("id:01".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["blog", "list"]).unwrap();
        assert_eq!(cli.state, PathBuf::from(".blog/ledger.json"));
        assert_eq!(cli.keypair, PathBuf::from(".blog/id.key"));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blog", "list", "--cluster", "devnet", "--format", "json", "--state", "/tmp/s.json",
        ])
        .unwrap();
        assert_eq!(cli.cluster, Some("devnet".into()));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.state, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn parse_keygen_force() {
        let cli = Cli::try_parse_from(["blog", "keygen", "--force"]).unwrap();
        assert!(matches!(cli.command, Command::Keygen(KeygenArgs { force: true })));
    }

    #[test]
    fn missing_description_is_an_error() {
        assert!(Cli::try_parse_from(["blog", "create", "Hello"]).is_err());
    }
}

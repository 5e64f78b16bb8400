use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use blog_client::{
    ClientConfig, Cluster, Confirmation, InMemoryLedger, KeypairSigner, ProgramPresence,
    RecordClient, RecordState,
};
use blog_crypto::{AddressResolver, SigningKey};
use blog_types::{PublicIdentity, StorageAddress, NAMESPACE_TAG};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Keygen(args) => cmd_keygen(&cli, args),
        Command::Address(args) => cmd_address(&Session::open(&cli)?, &cli, args),
        Command::Create(args) => cmd_create(&Session::open(&cli)?, &cli, args).await,
        Command::Update(args) => cmd_update(&Session::open(&cli)?, &cli, args).await,
        Command::Delete(args) => cmd_delete(&Session::open(&cli)?, &cli, args).await,
        Command::List(args) => cmd_list(&Session::open(&cli)?, args).await,
        Command::Show(args) => cmd_show(&Session::open(&cli)?, args).await,
        Command::Program(_) => cmd_program(&Session::open(&cli)?).await,
        Command::Deploy(_) => cmd_deploy(&Session::open(&cli)?),
    }
}

/// Client configuration plus the file-backed local ledger it talks to.
struct Session {
    config: ClientConfig,
    ledger: Arc<InMemoryLedger>,
    state: PathBuf,
    format: OutputFormat,
}

impl Session {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let cluster = cli.cluster.as_deref().map(Cluster::from_name).transpose()?;
        let config = match &cli.config {
            Some(path) => {
                let mut config = ClientConfig::load(path)?;
                if let Some(cluster) = cluster {
                    config.cluster = cluster;
                }
                config
            }
            None => ClientConfig::for_cluster(cluster.unwrap_or_default()),
        };
        let endpoint = config.cluster.endpoint().to_string();
        let ledger = if cli.state.exists() {
            InMemoryLedger::load(endpoint, &cli.state)
                .with_context(|| format!("loading ledger state from {}", cli.state.display()))?
        } else {
            debug!(path = %cli.state.display(), "no ledger state yet, starting empty");
            InMemoryLedger::new(endpoint)
        };
        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            state: cli.state.clone(),
            format: cli.format,
        })
    }

    fn client(&self, signer: KeypairSigner) -> anyhow::Result<RecordClient> {
        Ok(RecordClient::new(
            self.config.clone(),
            self.ledger.clone(),
            Arc::new(signer),
        )?)
    }

    /// A client signing with the keypair at `path`, and the identity it
    /// writes as.
    fn writer(&self, path: &Path) -> anyhow::Result<(RecordClient, PublicIdentity)> {
        let client = self.client(load_signer(path)?)?;
        let owner = client
            .default_owner()
            .context("signer holds no identity to write as")?;
        Ok((client, owner))
    }

    /// A client for read-only commands; it never signs anything.
    fn reader(&self) -> anyhow::Result<RecordClient> {
        self.client(KeypairSigner::generate())
    }

    fn save(&self) -> anyhow::Result<()> {
        if let Some(dir) = self.state.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        self.ledger
            .save(&self.state)
            .with_context(|| format!("saving ledger state to {}", self.state.display()))?;
        Ok(())
    }
}

fn load_signer(path: &Path) -> anyhow::Result<KeypairSigner> {
    let hex = std::fs::read_to_string(path).with_context(|| {
        format!(
            "reading keypair {} (run `blog keygen` first)",
            path.display()
        )
    })?;
    let key = SigningKey::from_hex(hex.trim())
        .with_context(|| format!("keypair {} is not a hex secret key", path.display()))?;
    Ok(KeypairSigner::new(key))
}

fn parse_identity(s: &str) -> anyhow::Result<PublicIdentity> {
    PublicIdentity::from_hex(s).with_context(|| format!("invalid identity {s}"))
}

fn parse_address(s: &str) -> anyhow::Result<StorageAddress> {
    StorageAddress::from_hex(s).with_context(|| format!("invalid address {s}"))
}

fn record_json(address: &StorageAddress, record: &RecordState) -> serde_json::Value {
    json!({
        "address": address.to_hex(),
        "owner": record.owner.to_hex(),
        "title": record.title,
        "description": record.description,
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_confirmation(
    session: &Session,
    verb: &str,
    address: &StorageAddress,
    confirmation: &Confirmation,
) -> anyhow::Result<()> {
    let explorer = session.config.cluster.explorer_url(&confirmation.signature);
    match session.format {
        OutputFormat::Json => print_json(&json!({
            "action": verb,
            "address": address.to_hex(),
            "signature": confirmation.signature.to_hex(),
            "slot": confirmation.slot,
            "logs": confirmation.logs,
            "explorer": explorer,
        })),
        OutputFormat::Text => {
            println!("{} {} {}", "✓".green().bold(), verb, address.to_hex().cyan());
            println!("  Slot: {}", confirmation.slot);
            println!("  Signature: {}", confirmation.signature.to_hex().yellow());
            println!("  Explorer: {}", explorer.blue());
            for line in &confirmation.logs {
                println!("  {} {}", "log:".dimmed(), line);
            }
            Ok(())
        }
    }
}

fn cmd_keygen(cli: &Cli, args: &KeygenArgs) -> anyhow::Result<()> {
    if cli.keypair.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            cli.keypair.display()
        );
    }
    if let Some(dir) = cli.keypair.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let key = SigningKey::generate();
    std::fs::write(&cli.keypair, key.to_hex())?;
    let identity = key.identity();
    match cli.format {
        OutputFormat::Json => print_json(&json!({
            "identity": identity.to_hex(),
            "keypair": cli.keypair.display().to_string(),
        })),
        OutputFormat::Text => {
            println!("{} Generated identity {}", "✓".green().bold(), identity.to_hex().cyan());
            println!("  Keypair: {}", cli.keypair.display());
            Ok(())
        }
    }
}

fn cmd_address(session: &Session, cli: &Cli, args: &AddressArgs) -> anyhow::Result<()> {
    let owner = match &args.owner {
        Some(owner) => parse_identity(owner)?,
        None => load_signer(&cli.keypair)?.identity(),
    };
    let resolver = AddressResolver::new(session.config.program_id()?);
    let (address, bump) = resolver.resolve_with_bump(NAMESPACE_TAG, &owner, &args.title)?;
    match session.format {
        OutputFormat::Json => print_json(&json!({
            "address": address.to_hex(),
            "bump": bump,
            "owner": owner.to_hex(),
            "title": args.title,
            "program": resolver.program_id().to_hex(),
        })),
        OutputFormat::Text => {
            println!("{}", address.to_hex().cyan());
            println!("  Owner: {}  Title: {}  Bump: {}", owner.short_id(), args.title.bold(), bump);
            Ok(())
        }
    }
}

async fn cmd_create(session: &Session, cli: &Cli, args: &CreateArgs) -> anyhow::Result<()> {
    let (client, owner) = session.writer(&cli.keypair)?;
    let confirmation = client.create(&args.title, &args.description, &owner).await?;
    session.save()?;
    let address = client.address_of(&owner, &args.title)?;
    print_confirmation(session, "Created", &address, &confirmation)
}

async fn cmd_update(session: &Session, cli: &Cli, args: &UpdateArgs) -> anyhow::Result<()> {
    let (client, owner) = session.writer(&cli.keypair)?;
    let address = match &args.address {
        Some(address) => parse_address(address)?,
        None => client.address_of(&owner, &args.title)?,
    };
    let confirmation = client
        .update(&address, &args.title, &args.description, &owner)
        .await?;
    session.save()?;
    print_confirmation(session, "Updated", &address, &confirmation)
}

async fn cmd_delete(session: &Session, cli: &Cli, args: &DeleteArgs) -> anyhow::Result<()> {
    let (client, owner) = session.writer(&cli.keypair)?;
    let address = client.address_of(&owner, &args.title)?;
    let confirmation = client.delete(&args.title, &owner).await?;
    session.save()?;
    print_confirmation(session, "Deleted", &address, &confirmation)
}

async fn cmd_list(session: &Session, args: &ListArgs) -> anyhow::Result<()> {
    let client = session.reader()?;
    let owner = args.owner.as_deref().map(parse_identity).transpose()?;
    let records: Vec<_> = client
        .list_all()
        .await?
        .into_iter()
        .filter(|(_, record)| owner.map_or(true, |o| record.owner == o))
        .collect();

    match session.format {
        OutputFormat::Json => print_json(&json!(records
            .iter()
            .map(|(address, record)| record_json(address, record))
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            if records.is_empty() {
                if client.program_presence().await? == ProgramPresence::Absent {
                    println!(
                        "Program {} is not deployed on {} (run `blog deploy`).",
                        client.program_id().to_hex().yellow(),
                        client.endpoint().bold()
                    );
                } else {
                    println!("No entries.");
                }
                return Ok(());
            }
            for (address, record) in &records {
                println!(
                    "{}  {}  {}",
                    address.short_hex().cyan(),
                    record.owner.short_id().dimmed(),
                    record.title.bold()
                );
                println!("    {}", record.description);
            }
            Ok(())
        }
    }
}

async fn cmd_show(session: &Session, args: &ShowArgs) -> anyhow::Result<()> {
    let address = parse_address(&args.address)?;
    let record = session.reader()?.get_one(&address).await?;
    match session.format {
        OutputFormat::Json => print_json(&record_json(&address, &record)),
        OutputFormat::Text => {
            println!("{}", record.title.bold());
            println!("  Address: {}", address.to_hex().cyan());
            println!("  Owner: {}", record.owner.to_hex());
            println!("  {}", record.description);
            Ok(())
        }
    }
}

async fn cmd_program(session: &Session) -> anyhow::Result<()> {
    let client = session.reader()?;
    let presence = client.program_presence().await?;
    match session.format {
        OutputFormat::Json => print_json(&json!({
            "program": client.program_id().to_hex(),
            "cluster": session.config.cluster.name(),
            "endpoint": client.endpoint(),
            "deployed": presence == ProgramPresence::Present,
        })),
        OutputFormat::Text => {
            let status = match presence {
                ProgramPresence::Present => "deployed".green(),
                ProgramPresence::Absent => "not deployed".red(),
            };
            println!(
                "Program {} on {} ({}): {}",
                client.program_id().to_hex().yellow(),
                session.config.cluster.name().bold(),
                client.endpoint(),
                status
            );
            Ok(())
        }
    }
}

fn cmd_deploy(session: &Session) -> anyhow::Result<()> {
    let program_id = session.config.program_id()?;
    session.ledger.deploy(program_id);
    session.save()?;
    match session.format {
        OutputFormat::Json => print_json(&json!({ "program": program_id.to_hex() })),
        OutputFormat::Text => {
            println!("{} Deployed program {}", "✓".green().bold(), program_id.to_hex().yellow());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_client::RemoteStore;
    use clap::Parser;

    fn cli(dir: &Path, args: &[&str]) -> Cli {
        let state = dir.join("ledger.json");
        let keypair = dir.join("id.key");
        let mut argv = vec![
            "blog".to_string(),
            "--state".into(),
            state.display().to_string(),
            "--keypair".into(),
            keypair.display().to_string(),
        ];
        argv.extend(args.iter().map(|s| s.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn state_persists_across_commands() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["keygen"])).await.unwrap();
        run_command(cli(dir.path(), &["deploy"])).await.unwrap();
        run_command(cli(dir.path(), &["create", "Hello", "First post"]))
            .await
            .unwrap();
        run_command(cli(dir.path(), &["update", "Hello", "Edited"]))
            .await
            .unwrap();

        let session = Session::open(&cli(dir.path(), &["list"])).unwrap();
        let records = session.reader().unwrap().list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.description, "Edited");

        run_command(cli(dir.path(), &["delete", "Hello"])).await.unwrap();
        let session = Session::open(&cli(dir.path(), &["list"])).unwrap();
        assert!(session.ledger.is_empty());
    }

    #[tokio::test]
    async fn create_without_keypair_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(cli(dir.path(), &["create", "Hello", "x"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blog keygen"));
    }

    #[tokio::test]
    async fn keygen_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["keygen"])).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("id.key")).unwrap();
        assert!(run_command(cli(dir.path(), &["keygen"])).await.is_err());
        run_command(cli(dir.path(), &["keygen", "--force"])).await.unwrap();
        assert_ne!(std::fs::read_to_string(dir.path().join("id.key")).unwrap(), first);
    }

    #[tokio::test]
    async fn create_before_deploy_fails_and_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["keygen"])).await.unwrap();
        assert!(run_command(cli(dir.path(), &["create", "Hello", "x"]))
            .await
            .is_err());
        assert!(!dir.path().join("ledger.json").exists());
    }

    #[test]
    fn cluster_flag_selects_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::open(&cli(dir.path(), &["--cluster", "devnet", "program"])).unwrap();
        assert_eq!(session.config.cluster, Cluster::Devnet);
        assert_eq!(session.ledger.endpoint(), Cluster::Devnet.endpoint());
    }

    #[tokio::test]
    async fn writes_act_as_the_keypair_identity() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["keygen"])).await.unwrap();
        let args = cli(dir.path(), &["create", "Hello", "x"]);
        let expected = load_signer(&args.keypair).unwrap().identity();
        let (_, owner) = Session::open(&args).unwrap().writer(&args.keypair).unwrap();
        assert_eq!(owner, expected);
    }
}

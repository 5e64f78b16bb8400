use std::path::Path;

use blog_types::{ProgramId, TxSignature};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Program id the blog program is deployed under.
pub const BLOG_PROGRAM_ID: ProgramId = ProgramId::from_bytes([
    0x56, 0x49, 0x37, 0x80, 0x89, 0x3a, 0x23, 0x85, 0x49, 0x3f, 0xe2, 0xe0, 0xe9, 0xa5, 0xa4, 0xca,
    0x62, 0x35, 0x52, 0x75, 0xb4, 0xbb, 0xeb, 0x8b, 0x46, 0x9e, 0x34, 0x6c, 0x1d, 0x4f, 0xd7, 0x3b,
]);

const EXPLORER_BASE: &str = "https://explorer.solana.com";

/// Ledger cluster the client talks to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Localnet,
    Devnet,
    Testnet,
    Mainnet,
    Custom { name: String, url: String },
}

impl Cluster {
    pub fn name(&self) -> &str {
        match self {
            Self::Localnet => "localnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
            Self::Mainnet => "mainnet-beta",
            Self::Custom { name, .. } => name,
        }
    }

    /// RPC endpoint of the cluster.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Localnet => "http://127.0.0.1:8899",
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Testnet => "https://api.testnet.solana.com",
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Custom { url, .. } => url,
        }
    }

    /// Program id the blog program has on this cluster when none is
    /// configured. Every known cluster runs the same deployment.
    pub fn default_program_id(&self) -> ProgramId {
        BLOG_PROGRAM_ID
    }

    /// Link to a transaction in the block explorer.
    pub fn explorer_url(&self, signature: &TxSignature) -> String {
        match self {
            Self::Mainnet => format!("{EXPLORER_BASE}/tx/{signature}"),
            Self::Devnet | Self::Testnet => {
                format!("{EXPLORER_BASE}/tx/{signature}?cluster={}", self.name())
            }
            Self::Localnet | Self::Custom { .. } => format!(
                "{EXPLORER_BASE}/tx/{signature}?cluster=custom&customUrl={}",
                self.endpoint()
            ),
        }
    }

    /// Parse a cluster name as accepted on the command line.
    pub fn from_name(name: &str) -> ClientResult<Self> {
        match name {
            "localnet" | "local" => Ok(Self::Localnet),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            other => Err(ClientError::Config(format!("unknown cluster: {other}"))),
        }
    }
}

/// Construction-time configuration for [`RecordClient`](crate::RecordClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub cluster: Cluster,
    /// Hex program id; overrides the cluster default.
    pub program_id: Option<String>,
    /// How long to wait for a submitted transaction to confirm.
    pub confirm_timeout_ms: u64,
    /// Capacity of each cache subscriber's channel.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            program_id: None,
            confirm_timeout_ms: 30_000,
            channel_capacity: 64,
        }
    }
}

impl ClientConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        Self {
            cluster,
            ..Self::default()
        }
    }

    /// The program id in effect: the configured one, else the cluster default.
    pub fn program_id(&self) -> ClientResult<ProgramId> {
        match &self.program_id {
            Some(hex) => ProgramId::from_hex(hex)
                .map_err(|e| ClientError::Config(format!("program_id: {e}"))),
            None => Ok(self.cluster.default_program_id()),
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.program_id()?;
        if self.confirm_timeout_ms == 0 {
            return Err(ClientError::Config(
                "confirm_timeout_ms must be positive".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ClientError::Config(
                "channel_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ClientResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ClientConfig::default();
        assert_eq!(c.cluster, Cluster::Localnet);
        assert_eq!(c.confirm_timeout_ms, 30_000);
        assert_eq!(c.program_id().unwrap(), BLOG_PROGRAM_ID);
        c.validate().unwrap();
    }

    #[test]
    fn toml_with_custom_cluster_and_program() {
        let program = ProgramId::from_bytes([2; 32]);
        let text = format!(
            r#"
            program_id = "{}"
            confirm_timeout_ms = 500

            [cluster.custom]
            name = "staging"
            url = "http://staging:8899"
            "#,
            program.to_hex()
        );
        let c = ClientConfig::from_toml_str(&text).unwrap();
        assert_eq!(c.cluster.endpoint(), "http://staging:8899");
        assert_eq!(c.cluster.name(), "staging");
        assert_eq!(c.program_id().unwrap(), program);
        assert_eq!(c.confirm_timeout_ms, 500);
        assert_eq!(c.channel_capacity, 64);
    }

    #[test]
    fn toml_unit_cluster() {
        let c = ClientConfig::from_toml_str(r#"cluster = "devnet""#).unwrap();
        assert_eq!(c.cluster, Cluster::Devnet);
        assert_eq!(c.program_id().unwrap(), BLOG_PROGRAM_ID);
    }

    #[test]
    fn invalid_program_id_is_config_error() {
        let err = ClientConfig::from_toml_str(r#"program_id = "xyz""#).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(ClientConfig::from_toml_str("confirm_timeout_ms = 0").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.toml");
        std::fs::write(&path, "cluster = \"testnet\"\n").unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap().cluster, Cluster::Testnet);
        assert!(ClientConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn cluster_names_parse() {
        assert_eq!(Cluster::from_name("mainnet").unwrap(), Cluster::Mainnet);
        assert!(Cluster::from_name("moon").is_err());
    }

    #[test]
    fn explorer_links() {
        let sig = TxSignature::from_bytes([1; 64]);
        assert!(Cluster::Devnet.explorer_url(&sig).ends_with("?cluster=devnet"));
        assert!(!Cluster::Mainnet.explorer_url(&sig).contains('?'));
        assert!(Cluster::Localnet
            .explorer_url(&sig)
            .contains("customUrl=http://127.0.0.1:8899"));
    }
}

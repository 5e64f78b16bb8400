/// Domain-separated 8-byte type tag.
///
/// Account data and instruction payloads start with a discriminator so the
/// ledger can tell record types and instructions apart without parsing the
/// rest of the bytes. Each tag is the BLAKE3 hash of `"<namespace>:<name>"`,
/// truncated to 8 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Discriminator([u8; 8]);

impl Discriminator {
    /// Length of a discriminator in bytes.
    pub const LEN: usize = 8;

    /// Tag for an account type, e.g. `Discriminator::account("BlogEntryState")`.
    pub fn account(name: &str) -> Self {
        Self::derive("account", name)
    }

    /// Tag for an instruction, e.g. `Discriminator::instruction("create_blog")`.
    pub fn instruction(name: &str) -> Self {
        Self::derive("global", name)
    }

    fn derive(namespace: &str, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(namespace.as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        let mut tag = [0u8; 8];
        tag.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        Self(tag)
    }

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Returns `true` if `data` starts with this tag.
    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= Self::LEN && data[..Self::LEN] == self.0
    }
}

impl std::fmt::Display for Discriminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_separated() {
        assert_ne!(
            Discriminator::account("create_blog"),
            Discriminator::instruction("create_blog")
        );
    }

    #[test]
    fn matches_prefix_only() {
        let tag = Discriminator::account("BlogEntryState");
        let mut data = tag.as_bytes().to_vec();
        data.extend_from_slice(b"payload");
        assert!(tag.matches(&data));
        assert!(!tag.matches(&data[..4]));
        assert!(!Discriminator::account("Other").matches(&data));
    }

    #[test]
    fn derivation_is_stable() {
        assert_eq!(
            Discriminator::instruction("update_blog"),
            Discriminator::instruction("update_blog")
        );
    }
}

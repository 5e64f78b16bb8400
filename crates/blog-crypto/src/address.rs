use blog_types::{
    validate_title, LogicalKey, ProgramId, PublicIdentity, StorageAddress, TypeError,
    MAX_SEED_LEN,
};

use crate::error::ResolveError;

/// Maximum number of seeds in one derivation (the bump is not counted).
pub const MAX_SEEDS: usize = 16;

/// Marker appended to every derivation so derived addresses can never collide
/// with hashes computed for other purposes.
const DERIVED_ADDRESS_MARKER: &[u8] = b"blog-derived-address-v1";

/// Derives record addresses from logical keys.
///
/// The address of a record is a pure function of
/// `(namespace tag, owner, title, program id)`: no directory is needed to
/// find a record, a single lookup at the derived address answers whether it
/// exists. Derivation hashes the seeds, a one-byte bump and the program id
/// with BLAKE3, and accepts the first bump (counting down from 255) whose hash
/// is *not* a valid ed25519 point. Such an address has no private key, so
/// only the owning program can act on the account.
///
/// The resolver holds nothing but the program id; two resolvers built with
/// the same id produce byte-identical output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressResolver {
    program_id: ProgramId,
}

impl AddressResolver {
    pub const fn new(program_id: ProgramId) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    /// Address of the record `(owner, title)` under `namespace_tag`.
    ///
    /// Fails with [`ResolveError::InvalidKey`] if the tag or title cannot be
    /// used as a seed.
    pub fn resolve(
        &self,
        namespace_tag: &str,
        owner: &PublicIdentity,
        title: &str,
    ) -> Result<StorageAddress, ResolveError> {
        self.resolve_with_bump(namespace_tag, owner, title)
            .map(|(address, _)| address)
    }

    /// Like [`resolve`](Self::resolve), also returning the bump that was used.
    pub fn resolve_with_bump(
        &self,
        namespace_tag: &str,
        owner: &PublicIdentity,
        title: &str,
    ) -> Result<(StorageAddress, u8), ResolveError> {
        validate_seed("namespace tag", namespace_tag.as_bytes())?;
        validate_title(title)?;
        Self::find_program_address(
            &[namespace_tag.as_bytes(), &owner.as_bytes()[..], title.as_bytes()],
            &self.program_id,
        )
    }

    /// Address of a record in the `blog` namespace.
    pub fn resolve_key(&self, key: &LogicalKey) -> Result<StorageAddress, ResolveError> {
        self.resolve(blog_types::NAMESPACE_TAG, &key.owner, &key.title)
    }

    /// Search bumps 255 down to 0 for the first off-curve address.
    pub fn find_program_address(
        seeds: &[&[u8]],
        program_id: &ProgramId,
    ) -> Result<(StorageAddress, u8), ResolveError> {
        if seeds.len() > MAX_SEEDS {
            return Err(ResolveError::TooManySeeds {
                count: seeds.len(),
                max: MAX_SEEDS,
            });
        }
        for seed in seeds {
            validate_seed("seed", seed)?;
        }
        (0..=u8::MAX)
            .rev()
            .find_map(|bump| {
                Self::create_program_address(seeds, bump, program_id).map(|addr| (addr, bump))
            })
            .ok_or(ResolveError::NoViableBump)
    }

    /// Hash seeds with a fixed bump. Returns `None` when the result lies on
    /// the ed25519 curve and is therefore unusable as a derived address.
    pub fn create_program_address(
        seeds: &[&[u8]],
        bump: u8,
        program_id: &ProgramId,
    ) -> Option<StorageAddress> {
        let mut hasher = blake3::Hasher::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(&[bump]);
        hasher.update(program_id.as_bytes());
        hasher.update(DERIVED_ADDRESS_MARKER);
        let candidate = *hasher.finalize().as_bytes();
        if is_on_curve(&candidate) {
            None
        } else {
            Some(StorageAddress::from_bytes(candidate))
        }
    }

    /// Returns `true` if `address` is the derived address of `(owner, title)`.
    pub fn verify(
        &self,
        address: &StorageAddress,
        namespace_tag: &str,
        owner: &PublicIdentity,
        title: &str,
    ) -> bool {
        self.resolve(namespace_tag, owner, title)
            .map(|derived| derived == *address)
            .unwrap_or(false)
    }
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    ed25519_dalek::VerifyingKey::from_bytes(bytes).is_ok()
}

fn validate_seed(field: &'static str, seed: &[u8]) -> Result<(), TypeError> {
    if seed.len() > MAX_SEED_LEN {
        return Err(TypeError::FieldTooLong {
            field,
            max: MAX_SEED_LEN,
            actual: seed.len(),
        });
    }
    Ok(())
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Entity a piece of artwork belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Album,
    Artist,
    Collection,
    Playlist,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Album => "album",
            OwnerKind::Artist => "artist",
            OwnerKind::Collection => "collection",
            OwnerKind::Playlist => "playlist",
        }
    }
}

/// Logical artwork variant, each bounded by a maximum pixel dimension.
///
/// Grid and Detail artwork for the same owner are independent cache entries;
/// fetching one never populates the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkVariant {
    /// Thumbnail used in grid views.
    Grid,
    /// Full-size artwork for detail and now-playing views.
    Detail,
}

impl ArtworkVariant {
    pub const ALL: [ArtworkVariant; 2] = [ArtworkVariant::Grid, ArtworkVariant::Detail];

    pub fn max_pixel_size(&self) -> u32 {
        match self {
            ArtworkVariant::Grid => 1024,
            ArtworkVariant::Detail => 2048,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkVariant::Grid => "grid",
            ArtworkVariant::Detail => "detail",
        }
    }
}

/// Deterministic cache identity for one piece of artwork.
///
/// The string form serves as the index map key; the file name is a SHA-256
/// digest of that string, so owner IDs containing path-unsafe characters
/// never leak into on-disk names. Distinct logical artworks collide only
/// through a hash collision, which is a negligible, accepted risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtworkKey {
    owner_id: String,
    owner_kind: OwnerKind,
    variant: ArtworkVariant,
}

impl ArtworkKey {
    pub fn new(
        owner_id: impl Into<String>,
        owner_kind: OwnerKind,
        variant: ArtworkVariant,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_kind,
            variant,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn owner_kind(&self) -> OwnerKind {
        self.owner_kind
    }

    pub fn variant(&self) -> ArtworkVariant {
        self.variant
    }

    /// Pixel bound doubling as the on-disk directory bucket.
    pub fn size_bucket(&self) -> u32 {
        self.variant.max_pixel_size()
    }

    /// Stable string form; any single component change yields a different key.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}|{}|{}",
            self.owner_kind.as_str(),
            self.owner_id,
            self.variant.as_str(),
            self.variant.max_pixel_size()
        )
    }

    /// Filesystem-safe file name derived from the string form.
    pub fn file_name(&self) -> String {
        let digest = Sha256::digest(self.cache_key().as_bytes());
        format!("{}.png", hex::encode(digest))
    }
}

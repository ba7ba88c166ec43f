//! Content-derived identifiers for tree items and descriptions
//!
//! Ids are a namespaced hash of a canonical path, so they survive process
//! restarts and re-materializations as long as the path is unchanged.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Characters escaped in path segments and representation components.
pub const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Stable, content-derived route from a declared root to a domain node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CanonicalPath {
    segments: Vec<String>,
}

impl CanonicalPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Segments are escaped so that `["a/b"]` and `["a", "b"]` render differently.
impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}", utf8_percent_encode(segment, COMPONENT))?;
        }
        Ok(())
    }
}

/// Maps canonical paths to stable opaque identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCodec {
    namespace: Uuid,
}

impl Default for IdentityCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAMESPACE)
    }
}

impl IdentityCodec {
    /// Namespace used when configuration does not name one.
    pub const DEFAULT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b7d_4e0a_9c3f_5d8e_1a2b_7c40);

    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> Uuid {
        self.namespace
    }

    /// Compute the id of a canonical path.
    ///
    /// SHA-256 over `namespace ‖ path`, truncated to 128 bits and stamped as a
    /// version 8 UUID.
    pub fn id_of(&self, path: &CanonicalPath) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(path.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Uuid::new_v8(bytes).to_string()
    }
}

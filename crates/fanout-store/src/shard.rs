use fanout_types::path;

use crate::error::{StoreError, StoreResult};

/// Number of hex characters in a BLAKE3 digest, the most a shard path can use.
const MAX_SHARD_CHARS: usize = 64;

/// Content-addressable path sharding.
///
/// An opaque id is hashed with BLAKE3 and the leading hex characters of the
/// digest are cut into `depth` segments of `width` characters each. The id
/// itself is appended as the leaf:
///
/// ```text
/// resolve("/feeds", "alice")  ->  /feeds/<h0h1>/<h2h3>/<h4h5>/alice
/// ```
///
/// Because each segment is `width` hex characters, no directory above the
/// leaf level holds more than `16^width` children regardless of how many ids
/// are stored. Resolution is a pure function, so the same id always lands on
/// the same path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardedPathResolver {
    depth: usize,
    width: usize,
}

impl ShardedPathResolver {
    pub const DEFAULT_DEPTH: usize = 3;
    pub const DEFAULT_WIDTH: usize = 2;

    /// Create a resolver, rejecting shapes the digest cannot fill.
    pub fn new(depth: usize, width: usize) -> StoreResult<Self> {
        if depth == 0 || width == 0 {
            return Err(StoreError::Config(format!(
                "shard depth and width must be non-zero (depth={depth}, width={width})"
            )));
        }
        if depth.saturating_mul(width) > MAX_SHARD_CHARS {
            return Err(StoreError::Config(format!(
                "shard depth*width must not exceed {MAX_SHARD_CHARS} (depth={depth}, width={width})"
            )));
        }
        Ok(Self { depth, width })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Upper bound on children of any shard directory: `16^width`.
    pub fn fan_out(&self) -> u64 {
        16u64.saturating_pow(self.width as u32)
    }

    /// The shard segments for `id`, without root or leaf.
    pub fn segments(&self, id: &str) -> Vec<String> {
        let digest = hex::encode(blake3::hash(id.as_bytes()).as_bytes());
        (0..self.depth)
            .map(|level| digest[level * self.width..(level + 1) * self.width].to_string())
            .collect()
    }

    /// Full sharded path of `id` under `root`.
    pub fn resolve(&self, root: &str, id: &str) -> String {
        let mut out = root.trim_end_matches('/').to_string();
        for segment in self.segments(id) {
            out.push('/');
            out.push_str(&segment);
        }
        path::join(&out, id)
    }
}

impl Default for ShardedPathResolver {
    fn default() -> Self {
        Self {
            depth: Self::DEFAULT_DEPTH,
            width: Self::DEFAULT_WIDTH,
        }
    }
}

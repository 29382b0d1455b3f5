use crate::auth::Session;
use crate::error::VaultError;
use crate::kv::KvClient;
use crate::paths::{self, KvOperation};

enum Pending {
    Probe { path: String, depth: usize },
    Leaf(String),
}

/// Depth-first discovery of every leaf secret under a prefix.
///
/// Leaves come out in logical form (no `data`/`metadata` segment), so the
/// same tree yields the same paths on either engine version. The walker is
/// consumed as it goes and cannot be restarted.
///
/// A failed listing of the prefix itself ends the walk with an error; a
/// subfolder that cannot be listed is logged and left out.
pub struct TreeWalker<'a> {
    kv: KvClient<'a>,
    pending: Vec<Pending>,
    max_depth: Option<usize>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(session: &'a Session, prefix: &str) -> Self {
        let root = paths::as_prefix(&paths::logical_path(prefix));
        Self {
            kv: KvClient::new(session),
            pending: vec![Pending::Probe {
                path: root,
                depth: 0,
            }],
            max_depth: None,
        }
    }

    /// Fails the walk instead of descending past `depth` levels below the
    /// prefix. Unlimited unless set.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Next leaf path, or `None` once the tree is exhausted.
    pub async fn next_leaf(&mut self) -> Result<Option<String>, VaultError> {
        while let Some(pending) = self.pending.pop() {
            let (path, depth) = match pending {
                Pending::Leaf(path) => return Ok(Some(path)),
                Pending::Probe { path, depth } => (path, depth),
            };

            if let Some(limit) = self.max_depth {
                if depth > limit {
                    return Err(VaultError::operation(
                        KvOperation::List,
                        path,
                        format!("tree deeper than {limit} levels"),
                    ));
                }
            }

            match self.kv.read_data(&path).await {
                Ok(Some((_, data))) if !data.is_empty() => {
                    let leaf = paths::logical_path(path.trim_end_matches(paths::SEPARATOR));
                    tracing::debug!(path = %leaf, "secret found");
                    return Ok(Some(leaf));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(path = %path, error = %e, "read probe failed"),
            }

            let children = match self.kv.list(&path).await {
                Ok(children) => children,
                Err(e) if depth > 0 => {
                    tracing::warn!(path = %path, error = %e, "cannot list subtree, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(children) = children else {
                tracing::debug!(path = %path, "path is empty or missing");
                continue;
            };

            for child in children.iter().rev() {
                let child_path = format!("{path}{child}");
                if paths::is_subtree(child) {
                    self.pending.push(Pending::Probe {
                        path: child_path,
                        depth: depth + 1,
                    });
                } else {
                    self.pending.push(Pending::Leaf(child_path));
                }
            }
        }
        Ok(None)
    }

    /// Drains the walker into a list.
    pub async fn collect(mut self) -> Result<Vec<String>, VaultError> {
        let mut leaves = Vec::new();
        while let Some(leaf) = self.next_leaf().await? {
            leaves.push(leaf);
        }
        Ok(leaves)
    }
}

/// Every leaf secret under `prefix`, in traversal order.
pub async fn list_leaves(session: &Session, prefix: &str) -> Result<Vec<String>, VaultError> {
    TreeWalker::new(session, prefix).collect().await
}

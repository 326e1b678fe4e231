//! Path sandboxing.
//!
//! Every path is checked against a [`SecurityContext`] before it is read or
//! written. A strict production context and a relaxed test context differ
//! only in their values; [`SecurityGuard`] has a single code path.

use crate::config::SecurityOptions;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// How symbolic links inside the sandbox are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymlinkPolicy {
    /// Follow links without re-checking their targets
    Allow,
    /// Reject any link below an allowed root
    Deny,
    /// Resolve links and re-check the target against the roots
    #[default]
    #[serde(alias = "resolve_and_recheck")]
    Resolve,
}

/// The kind of access a path is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reading an existing regular file
    Read,
    /// Creating or replacing a file
    Write,
    /// Enumerating an existing directory
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Root {
    lexical: PathBuf,
    canonical: PathBuf,
}

impl Root {
    fn new(path: &Path) -> Result<Self> {
        let lexical = normalize_lexically(&absolutize(path)?);
        let canonical = fs::canonicalize(&lexical).unwrap_or_else(|_| lexical.clone());
        Ok(Self { lexical, canonical })
    }

    /// Depth of `path` below this root, if it lies within it.
    fn depth_of(&self, path: &Path) -> Option<usize> {
        path.strip_prefix(&self.canonical)
            .or_else(|_| path.strip_prefix(&self.lexical))
            .ok()
            .map(|rest| rest.components().count())
    }
}

/// Sandbox policy values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    roots: Vec<Root>,
    max_file_size: u64,
    symlink_policy: SymlinkPolicy,
    max_depth: usize,
}

impl SecurityContext {
    /// Default limits for the given roots.
    pub fn new<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let defaults = SecurityOptions::default();
        let roots = roots
            .into_iter()
            .map(|root| Root::new(root.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            roots,
            max_file_size: defaults.max_file_size,
            symlink_policy: defaults.symlink_policy,
            max_depth: defaults.max_depth,
        })
    }

    /// Build a context from configuration. No roots means the current directory.
    pub fn from_options(options: &SecurityOptions) -> Result<Self> {
        let context = if options.allowed_roots.is_empty() {
            Self::new([std::env::current_dir()?])?
        } else {
            Self::new(&options.allowed_roots)?
        };
        Ok(context
            .with_max_file_size(options.max_file_size)
            .with_symlink_policy(options.symlink_policy)
            .with_max_depth(options.max_depth))
    }

    /// A permissive context for scratch directories: no size or depth limit,
    /// links re-checked against the root.
    pub fn relaxed<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self::new([root])?
            .with_max_file_size(u64::MAX)
            .with_max_depth(usize::MAX))
    }

    /// Set the maximum readable file size in bytes.
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Set the symlink policy.
    pub fn with_symlink_policy(mut self, policy: SymlinkPolicy) -> Self {
        self.symlink_policy = policy;
        self
    }

    /// Set the maximum depth below a root.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Add another allowed root.
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Result<Self> {
        self.roots.push(Root::new(root.as_ref())?);
        Ok(self)
    }

    /// Allowed roots in canonical form.
    pub fn allowed_roots(&self) -> Vec<&Path> {
        self.roots.iter().map(|r| r.canonical.as_path()).collect()
    }

    /// Maximum readable file size.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Symlink policy.
    pub fn symlink_policy(&self) -> SymlinkPolicy {
        self.symlink_policy
    }

    /// Maximum depth below a root.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn depth_within_roots(&self, path: &Path) -> Option<usize> {
        self.roots.iter().filter_map(|root| root.depth_of(path)).min()
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let lexical = normalize_lexically(&root);
        let canonical = fs::canonicalize(&lexical).unwrap_or_else(|_| lexical.clone());
        let defaults = SecurityOptions::default();
        Self {
            roots: vec![Root { lexical, canonical }],
            max_file_size: defaults.max_file_size,
            symlink_policy: defaults.symlink_policy,
            max_depth: defaults.max_depth,
        }
    }
}

/// Validates paths against a [`SecurityContext`].
#[derive(Debug, Clone)]
pub struct SecurityGuard {
    context: SecurityContext,
}

impl SecurityGuard {
    /// Create a guard for a context.
    pub fn new(context: SecurityContext) -> Self {
        Self { context }
    }

    /// The context this guard enforces.
    pub fn context(&self) -> &SecurityContext {
        &self.context
    }

    /// Validate `path` for `access`, returning the resolved path to use.
    pub fn validate_path<P: AsRef<Path>>(&self, path: P, access: Access) -> Result<PathBuf> {
        validate_path(path.as_ref(), &self.context, access)
    }
}

/// Validate `path` for `access` under `context`.
///
/// Fails with [`Error::Security`] when the path escapes every allowed root
/// (lexically or through a link), violates the symlink policy, is nested too
/// deep, or is a file larger than the size limit. Missing inputs are
/// reported as [`Error::Io`].
pub fn validate_path(path: &Path, context: &SecurityContext, access: Access) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::security(path, "empty path"));
    }

    let absolute = absolutize(path)?;
    let lexical = normalize_lexically(&absolute);
    if context.depth_within_roots(&lexical).is_none() {
        return Err(Error::security(path, "path is outside the allowed roots"));
    }

    let resolved = match context.symlink_policy {
        SymlinkPolicy::Allow => lexical,
        SymlinkPolicy::Deny => {
            reject_symlinks(path, &lexical, context)?;
            lexical
        }
        SymlinkPolicy::Resolve => resolve_existing(path, &absolute)?,
    };

    let depth = context
        .depth_within_roots(&resolved)
        .ok_or_else(|| Error::security(path, "path resolves outside the allowed roots"))?;
    if depth > context.max_depth {
        return Err(Error::security(
            path,
            format!("path depth {} exceeds limit {}", depth, context.max_depth),
        ));
    }

    match access {
        Access::Read => {
            let meta = fs::metadata(&resolved)?;
            if !meta.is_file() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a regular file", path.display()),
                )));
            }
            if meta.len() > context.max_file_size {
                return Err(Error::security(
                    path,
                    format!(
                        "file size {} exceeds limit {}",
                        meta.len(),
                        context.max_file_size
                    ),
                ));
            }
        }
        Access::List => {
            let meta = fs::metadata(&resolved)?;
            if !meta.is_dir() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} is not a directory", path.display()),
                )));
            }
        }
        Access::Write => {
            if let Ok(meta) = fs::metadata(&resolved) {
                if meta.is_dir() {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{} is a directory", path.display()),
                    )));
                }
            }
        }
    }

    Ok(resolved)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolve `absolute` one component at a time against the filesystem.
///
/// Existing components are followed physically, links included, so a `..`
/// always steps out of the real parent. Components below the first missing
/// one are appended as given. A `..` after a missing component cannot be
/// resolved and is rejected.
fn resolve_existing(original: &Path, absolute: &Path) -> Result<PathBuf> {
    let mut resolved = PathBuf::new();
    let mut missing = false;

    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if missing {
                    return Err(Error::security(
                        original,
                        "parent reference below a missing directory",
                    ));
                }
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                if missing {
                    continue;
                }
                match fs::symlink_metadata(&resolved) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        resolved = fs::canonicalize(&resolved).map_err(|_| {
                            Error::security(original, "dangling symbolic link")
                        })?;
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => missing = true,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(resolved)
}

/// Reject links anywhere below a root on the normalized path.
fn reject_symlinks(original: &Path, normalized: &Path, context: &SecurityContext) -> Result<()> {
    let mut current = PathBuf::new();
    for component in normalized.components() {
        current.push(component.as_os_str());
        let below_root = matches!(context.depth_within_roots(&current), Some(d) if d > 0);
        if !below_root {
            continue;
        }
        if let Ok(meta) = fs::symlink_metadata(&current) {
            if meta.file_type().is_symlink() {
                return Err(Error::security(
                    original,
                    format!("symbolic link at {} is not allowed", current.display()),
                ));
            }
        }
    }
    Ok(())
}

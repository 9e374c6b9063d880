use crate::error::{AutoloadError, Result};
use glob::Pattern;
use std::fmt;
use std::fs::{self, File, OpenOptions, ReadDir};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, FilterEntry, WalkDir};

/// Absolute path that existed when it was resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePath(PathBuf);

impl SourcePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for SourcePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// How a file handle is opened by [`PathResolver::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    Write,
    Append,
    ReadWrite,
}

impl OpenMode {
    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).truncate(true),
            OpenMode::Append => options.append(true),
            OpenMode::ReadWrite => options.read(true).write(true),
        };
        options
    }
}

/// An opened directory
#[derive(Debug)]
pub struct DirectoryHandle {
    path: SourcePath,
    entries: ReadDir,
}

impl DirectoryHandle {
    pub fn path(&self) -> &SourcePath {
        &self.path
    }

    /// Direct children of the directory, in filesystem order
    pub fn entries(self) -> ReadDir {
        self.entries
    }
}

/// An opened regular file, closed when dropped
#[derive(Debug)]
pub struct FileHandle {
    path: SourcePath,
    file: File,
}

impl FileHandle {
    pub fn path(&self) -> &SourcePath {
        &self.path
    }

    pub fn read_to_string(&mut self) -> Result<String> {
        let mut content = String::new();
        self.file.read_to_string(&mut content)?;
        Ok(content)
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

/// Result of [`PathResolver::open`]
#[derive(Debug)]
pub enum Handle {
    Directory(DirectoryHandle),
    File(FileHandle),
}

impl Handle {
    pub fn path(&self) -> &SourcePath {
        match self {
            Handle::Directory(dir) => dir.path(),
            Handle::File(file) => file.path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Directory(_))
    }
}

/// Resolves paths against a fixed, canonical root directory.
///
/// Relative paths may not leave the root lexically: `..` and absolute
/// segments are reported as not found. Symlinks below the root are followed,
/// and every path handed out is canonical so one file has one path.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver rooted at `root`, which must exist
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let canonical = canonicalize(root, None)?;
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `segments` onto the root and canonicalize the result.
    ///
    /// Paths reached through a symlink below the root resolve to the
    /// symlink's target, matching what [`PathResolver::glob_recursive`] yields.
    pub fn resolve<I, S>(&self, segments: I) -> Result<SourcePath>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut relative = PathBuf::new();
        for segment in segments {
            relative.push(segment);
        }

        if !stays_below_root(&relative) {
            return Err(AutoloadError::path_not_found(relative, &self.root));
        }

        let joined = if relative.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(&relative)
        };

        let resolved = canonicalize(&joined, Some((relative.as_path(), self.root.as_path())))?;
        Ok(SourcePath(resolved))
    }

    /// Open `path` as a directory handle or, for anything else, a file handle
    pub fn open<P: AsRef<Path>>(&self, path: P, mode: OpenMode) -> Result<Handle> {
        let resolved = self.resolve([path.as_ref()])?;

        if resolved.as_path().is_dir() {
            let entries = fs::read_dir(resolved.as_path())?;
            Ok(Handle::Directory(DirectoryHandle {
                path: resolved,
                entries,
            }))
        } else {
            let file = mode.options().open(resolved.as_path())?;
            Ok(Handle::File(FileHandle {
                path: resolved,
                file,
            }))
        }
    }

    /// Lazily walk the root, yielding regular files whose name matches `pattern`.
    ///
    /// Directories are visited before their children and siblings in file
    /// name order. Symlinks are followed; dot entries are skipped.
    pub fn glob_recursive(&self, pattern: &str) -> Result<GlobIter> {
        let pattern = Pattern::new(pattern)?;

        let root = match self.open("", OpenMode::Read)? {
            Handle::Directory(dir) => dir.path,
            Handle::File(file) => return Err(AutoloadError::NotADirectory(file.path.0)),
        };

        let entries = WalkDir::new(root.as_path())
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool);

        Ok(GlobIter { entries, pattern })
    }
}

fn canonicalize(path: &Path, context: Option<(&Path, &Path)>) -> Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(match context {
            Some((relative, root)) => AutoloadError::path_not_found(relative, root),
            None => AutoloadError::PathNotFound {
                path: path.to_path_buf(),
                root: None,
            },
        }),
        Err(e) => Err(e.into()),
    }
}

/// Only plain names and `.` segments; no `..`, root or prefix components
fn stays_below_root(relative: &Path) -> bool {
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0
        || !entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Iterator returned by [`PathResolver::glob_recursive`]
pub struct GlobIter {
    entries: FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
    pattern: Pattern,
}

impl Iterator for GlobIter {
    type Item = Result<SourcePath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(AutoloadError::Io(e.into()))),
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let matches = entry
                .file_name()
                .to_str()
                .map(|name| self.pattern.matches(name))
                .unwrap_or(false);

            if matches {
                return Some(canonicalize(entry.path(), None).map(SourcePath));
            }
        }
    }
}

//! FileIO process: a cache of open files keyed by path.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::context::StepContext;
use crate::handler::{HandlerData, HandlerKind};
use crate::process::{Process, StepTable};
use crate::step;
use crate::step::{StepOutput, StepResult};
use crate::sync::{Arc, Mutex};

/// Open file shared between the cache and the handlers that requested it.
pub type SharedFile = Arc<Mutex<File>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only.
    Read,
    /// Append, creating the file and its parent directories as needed.
    Append,
}

/// Opens `path`, or hands out the cached file if it is already open.
///
/// A file that cannot be opened finishes with `success() == false`; it is
/// not a step failure.
#[derive(Debug)]
pub struct Open {
    path: PathBuf,
    mode: OpenMode,
    file: Option<SharedFile>,
    success: bool,
}

impl HandlerData for Open {
    const KIND: HandlerKind = HandlerKind::Open;
}

impl Open {
    pub fn new(path: impl Into<PathBuf>, mode: OpenMode) -> Self {
        Self {
            path: path.into(),
            mode,
            file: None,
            success: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn file(&self) -> Option<&SharedFile> {
        self.file.as_ref()
    }
}

/// Drops the cached file for `path`. Closing an uncached path succeeds.
#[derive(Debug)]
pub struct Close {
    path: PathBuf,
    success: bool,
}

impl HandlerData for Close {
    const KIND: HandlerKind = HandlerKind::Close;
}

impl Close {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            success: false,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Default)]
pub struct FileIoProcess {
    files: HashMap<PathBuf, SharedFile>,
}

impl FileIoProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently held open.
    pub fn open_files(&self) -> usize {
        self.files.len()
    }

    fn open_cached(&mut self, _ctx: &mut StepContext<'_>, req: &mut Open) -> StepOutput<Self, Open> {
        match self.files.get(&req.path) {
            Some(file) => {
                req.file = Some(Arc::clone(file));
                req.success = true;
                Ok(StepResult::Done)
            }
            None => Ok(StepResult::Continue(step!(Self::open_file))),
        }
    }

    fn open_file(&mut self, _ctx: &mut StepContext<'_>, req: &mut Open) -> StepOutput<Self, Open> {
        match open(&req.path, req.mode) {
            Ok(file) => {
                let file = Arc::new(Mutex::new(file));
                self.files.insert(req.path.clone(), Arc::clone(&file));
                req.file = Some(file);
                req.success = true;
            }
            Err(err) => {
                debug!("cannot open {}: {err}", req.path.display());
                req.file = None;
                req.success = false;
            }
        }
        Ok(StepResult::Done)
    }

    fn close(&mut self, _ctx: &mut StepContext<'_>, req: &mut Close) -> StepOutput<Self, Close> {
        self.files.remove(&req.path);
        req.success = true;
        Ok(StepResult::Done)
    }
}

fn open(path: &Path, mode: OpenMode) -> io::Result<File> {
    match mode {
        OpenMode::Read => File::open(path),
        OpenMode::Append => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new().create(true).append(true).open(path)
        }
    }
}

impl Process for FileIoProcess {
    const NAME: &'static str = "FileIO";

    fn table(table: &mut StepTable<Self>) {
        table
            .defaults()
            .on(step!(Self::open_cached))
            .on(step!(Self::close));
    }
}

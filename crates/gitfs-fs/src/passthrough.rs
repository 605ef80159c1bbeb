//! Passthrough operations on the working tree
//!
//! Each operation forwards to the matching operating-system call on the
//! backing path and reports failures as the untouched `std::io::Error`, so
//! the raw errno (EACCES, ENOENT, EINVAL, ...) reaches the filesystem caller
//! exactly as the OS produced it.
//!
//! Paths are mount-relative (`/notes/todo.txt`). Only `read` and `write`
//! take the [`WorktreeLock`]; everything else runs unguarded.

use std::ffi::OsString;
use std::fs::{self, DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::errno::Errno;
use nix::sys::stat::{Mode, SFlag, UtimensatFlags};
use nix::sys::statvfs::statvfs;
use nix::sys::time::TimeSpec;
use nix::unistd::AccessFlags;

use crate::{HandleTable, NormalizedPath, WorktreeLock};

/// Kind of a directory entry, independent of the FUSE binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
    Symlink,
    NamedPipe,
    CharDevice,
    BlockDevice,
    Socket,
}

impl EntryKind {
    pub fn from_file_type(ft: fs::FileType) -> Self {
        if ft.is_dir() {
            Self::Directory
        } else if ft.is_symlink() {
            Self::Symlink
        } else if ft.is_fifo() {
            Self::NamedPipe
        } else if ft.is_char_device() {
            Self::CharDevice
        } else if ft.is_block_device() {
            Self::BlockDevice
        } else if ft.is_socket() {
            Self::Socket
        } else {
            Self::RegularFile
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

/// Filesystem statistics as reported by `statvfs(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub bsize: u32,
    pub namelen: u32,
    pub frsize: u32,
}

/// Forwards filesystem operations to a directory on local disk.
#[derive(Debug)]
pub struct Passthrough {
    root: PathBuf,
    handles: HandleTable,
    lock: WorktreeLock,
}

impl Passthrough {
    /// Create a passthrough rooted at `root`.
    ///
    /// `lock` should be the same lock handed to the sync engine.
    pub fn new(root: &NormalizedPath, lock: WorktreeLock) -> Self {
        Self {
            root: root.to_native(),
            handles: HandleTable::new(),
            lock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock(&self) -> &WorktreeLock {
        &self.lock
    }

    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Map a mount-relative path onto the backing directory.
    ///
    /// Parent-directory components are refused with EACCES so no request can
    /// reach outside the working tree.
    pub fn resolve(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.as_ref().components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(io::Error::from_raw_os_error(libc::EACCES));
                }
            }
        }
        Ok(resolved)
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    /// `lstat(2)`; symlinks are reported as themselves.
    pub fn getattr(&self, path: impl AsRef<Path>) -> io::Result<Metadata> {
        fs::symlink_metadata(self.resolve(path)?)
    }

    /// `fstat(2)` on an open handle.
    pub fn fgetattr(&self, fh: u64) -> io::Result<Metadata> {
        self.handle(fh)?.metadata()
    }

    /// `access(2)`; a denied check reports EACCES, not a generic failure.
    pub fn access(&self, path: impl AsRef<Path>, mask: i32) -> io::Result<()> {
        let path = self.resolve(path)?;
        nix::unistd::access(&path, AccessFlags::from_bits_truncate(mask))
            .map_err(|_| Errno::EACCES.into())
    }

    pub fn readlink(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        fs::read_link(self.resolve(path)?)
    }

    pub fn chmod(&self, path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
        fs::set_permissions(self.resolve(path)?, Permissions::from_mode(mode))
    }

    /// `lchown(2)`; `None` leaves that id unchanged.
    pub fn chown(&self, path: impl AsRef<Path>, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::lchown(self.resolve(path)?, uid, gid)
    }

    /// Truncate through the open handle when there is one, else by path.
    pub fn truncate(&self, path: impl AsRef<Path>, size: u64, fh: Option<u64>) -> io::Result<()> {
        match fh {
            Some(fh) => self.handle(fh)?.set_len(size),
            None => OpenOptions::new()
                .write(true)
                .open(self.resolve(path)?)?
                .set_len(size),
        }
    }

    /// `utimensat(2)` without following symlinks; `None` leaves a time as is.
    pub fn utimens(
        &self,
        path: impl AsRef<Path>,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()> {
        let path = self.resolve(path)?;
        nix::sys::stat::utimensat(
            None,
            &path,
            &to_timespec(atime)?,
            &to_timespec(mtime)?,
            UtimensatFlags::NoFollowSymlink,
        )?;
        Ok(())
    }

    pub fn statfs(&self, path: impl AsRef<Path>) -> io::Result<FsStats> {
        let st = statvfs(&self.resolve(path)?)?;
        Ok(FsStats {
            blocks: st.blocks() as u64,
            bfree: st.blocks_free() as u64,
            bavail: st.blocks_available() as u64,
            files: st.files() as u64,
            ffree: st.files_free() as u64,
            bsize: st.block_size() as u32,
            namelen: st.name_max() as u32,
            frsize: st.fragment_size() as u32,
        })
    }

    // ---------------------------------------------------------------------
    // Namespace
    // ---------------------------------------------------------------------

    /// List a directory, `.` and `..` first.
    pub fn readdir(&self, path: impl AsRef<Path>) -> io::Result<Vec<DirEntry>> {
        let dir = self.resolve(path)?;
        let mut entries = vec![
            DirEntry {
                name: ".".into(),
                kind: EntryKind::Directory,
            },
            DirEntry {
                name: "..".into(),
                kind: EntryKind::Directory,
            },
        ];
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name(),
                kind: EntryKind::from_file_type(entry.file_type()?),
            });
        }
        Ok(entries)
    }

    pub fn mkdir(&self, path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(self.resolve(path)?)
    }

    /// `mknod(2)`; `mode` carries both the file type and permission bits.
    pub fn mknod(&self, path: impl AsRef<Path>, mode: u32, rdev: u64) -> io::Result<()> {
        let mode = mode as libc::mode_t;
        nix::sys::stat::mknod(
            &self.resolve(path)?,
            SFlag::from_bits_truncate(mode & libc::S_IFMT),
            Mode::from_bits_truncate(mode & !libc::S_IFMT),
            rdev as libc::dev_t,
        )?;
        Ok(())
    }

    pub fn unlink(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::remove_file(self.resolve(path)?)
    }

    pub fn rmdir(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::remove_dir(self.resolve(path)?)
    }

    /// Create a symlink at `link` pointing to `target`.
    ///
    /// `target` is stored verbatim, as the OS call would.
    pub fn symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
        std::os::unix::fs::symlink(target, self.resolve(link)?)
    }

    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
        fs::rename(self.resolve(from)?, self.resolve(to)?)
    }

    /// Create a hard link `new` referring to `existing`.
    pub fn link(&self, existing: impl AsRef<Path>, new: impl AsRef<Path>) -> io::Result<()> {
        fs::hard_link(self.resolve(existing)?, self.resolve(new)?)
    }

    // ---------------------------------------------------------------------
    // Handles
    // ---------------------------------------------------------------------

    /// `open(2)` with the caller's flags; returns a handle.
    pub fn open(&self, path: impl AsRef<Path>, flags: i32) -> io::Result<u64> {
        let file = open_options(flags).open(self.resolve(path)?)?;
        Ok(self.handles.insert(file))
    }

    /// Create and open a file for writing with the given permission bits.
    pub fn create(&self, path: impl AsRef<Path>, mode: u32, flags: i32) -> io::Result<u64> {
        let mut options = open_options(flags | libc::O_CREAT);
        if flags & libc::O_ACCMODE == libc::O_RDONLY {
            options.read(false).write(true);
        }
        let file = options.mode(mode).open(self.resolve(path)?)?;
        Ok(self.handles.insert(file))
    }

    /// Read up to `size` bytes at `offset`.
    pub fn read(&self, fh: u64, offset: u64, size: u32) -> io::Result<Vec<u8>> {
        let file = self.handle(fh)?;
        let _guard = self.lock.acquire();

        let mut reader: &File = &file;
        reader.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(size as usize);
        reader.take(u64::from(size)).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write `data` at `offset`; returns the number of bytes written.
    pub fn write(&self, fh: u64, offset: u64, data: &[u8]) -> io::Result<usize> {
        let file = self.handle(fh)?;
        let _guard = self.lock.acquire();

        let mut writer: &File = &file;
        writer.seek(SeekFrom::Start(offset))?;
        writer.write_all(data)?;
        Ok(data.len())
    }

    /// Called on every `close(2)` of a descriptor; syncs like `fsync`.
    pub fn flush(&self, fh: u64) -> io::Result<()> {
        self.handle(fh)?.sync_all()
    }

    pub fn fsync(&self, fh: u64, datasync: bool) -> io::Result<()> {
        let file = self.handle(fh)?;
        if datasync { file.sync_data() } else { file.sync_all() }
    }

    /// Drop the handle; the descriptor closes once no read or write on it is
    /// still running.
    pub fn release(&self, fh: u64) -> io::Result<()> {
        self.handles
            .remove(fh)
            .map(drop)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    fn handle(&self, fh: u64) -> io::Result<Arc<File>> {
        self.handles
            .get(fh)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }
}

fn open_options(flags: i32) -> OpenOptions {
    let mut options = OpenOptions::new();
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => options.write(true),
        libc::O_RDWR => options.read(true).write(true),
        _ => options.read(true),
    };
    options.custom_flags(flags & !libc::O_ACCMODE);
    options
}

/// `None` leaves the time unchanged.
fn to_timespec(time: Option<SystemTime>) -> io::Result<TimeSpec> {
    let Some(time) = time else {
        return Ok(TimeSpec::UTIME_OMIT);
    };
    let since_epoch = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| io::Error::from(Errno::EINVAL))?;
    Ok(TimeSpec::from_duration(since_epoch))
}

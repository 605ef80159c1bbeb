//! FUSE adapter over the passthrough layer
//!
//! Translates inode-based kernel requests into path-based passthrough calls.
//! Errors are replied with the errno of the underlying OS call.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;
use tokio::sync::oneshot;

use gitfs_fs::Passthrough;
use gitfs_fs::passthrough::EntryKind;

use crate::inode_table::InodeTable;

/// Attribute cache lifetime. Git can change files behind the kernel's back,
/// so keep this short.
const TTL: Duration = Duration::from_secs(1);

/// Filesystem handed to `fuser`.
pub struct GitFs {
    passthrough: Passthrough,
    inodes: InodeTable,
    unmounted: Option<oneshot::Sender<()>>,
}

impl GitFs {
    /// `unmounted` fires once the kernel tears the session down.
    pub fn new(passthrough: Passthrough, unmounted: oneshot::Sender<()>) -> Self {
        Self {
            passthrough,
            inodes: InodeTable::new(),
            unmounted: Some(unmounted),
        }
    }

    fn path(&self, ino: u64) -> Result<PathBuf, c_int> {
        self.inodes
            .get_path(ino)
            .map(Path::to_path_buf)
            .ok_or(libc::ENOENT)
    }

    fn child(&self, parent: u64, name: &OsStr) -> Result<PathBuf, c_int> {
        Ok(self.path(parent)?.join(name))
    }

    /// Stat `path` and register it, for replies that introduce an entry.
    fn entry(&mut self, path: &Path) -> Result<FileAttr, c_int> {
        let metadata = self.passthrough.getattr(path).map_err(errno)?;
        let ino = self.inodes.get_or_create(path);
        Ok(to_file_attr(ino, &metadata))
    }
}

/// Mount options for a gitfs session.
pub fn mount_options(fs_name: &str, allow_other: bool) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(fs_name.to_string()),
        MountOption::Subtype("gitfs".to_string()),
        MountOption::RW,
        MountOption::AutoUnmount,
    ];
    if allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

fn errno(e: io::Error) -> c_int {
    e.raw_os_error().unwrap_or(libc::EIO)
}

fn file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::Directory => FileType::Directory,
        EntryKind::RegularFile => FileType::RegularFile,
        EntryKind::Symlink => FileType::Symlink,
        EntryKind::NamedPipe => FileType::NamedPipe,
        EntryKind::CharDevice => FileType::CharDevice,
        EntryKind::BlockDevice => FileType::BlockDevice,
        EntryKind::Socket => FileType::Socket,
    }
}

fn timestamp(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = nsecs.clamp(0, 999_999_999) as u32;
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nanos as u64)
    }
}

fn to_file_attr(ino: u64, metadata: &Metadata) -> FileAttr {
    FileAttr {
        ino,
        size: metadata.size(),
        blocks: metadata.blocks(),
        atime: timestamp(metadata.atime(), metadata.atime_nsec()),
        mtime: timestamp(metadata.mtime(), metadata.mtime_nsec()),
        ctime: timestamp(metadata.ctime(), metadata.ctime_nsec()),
        crtime: UNIX_EPOCH,
        kind: file_type(EntryKind::from_file_type(metadata.file_type())),
        perm: (metadata.mode() & 0o7777) as u16,
        nlink: metadata.nlink() as u32,
        uid: metadata.uid(),
        gid: metadata.gid(),
        rdev: metadata.rdev() as u32,
        blksize: metadata.blksize() as u32,
        flags: 0,
    }
}

fn to_system_time(time: TimeOrNow) -> SystemTime {
    match time {
        TimeOrNow::SpecificTime(time) => time,
        TimeOrNow::Now => SystemTime::now(),
    }
}

impl Filesystem for GitFs {
    fn destroy(&mut self) {
        tracing::debug!(root = %self.passthrough.root().display(), "filesystem unmounted");
        if let Some(tx) = self.unmounted.take() {
            let _ = tx.send(());
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.child(parent, name).and_then(|path| self.entry(&path)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, fh: Option<u64>, reply: ReplyAttr) {
        let result = match fh {
            Some(fh) => self.passthrough.fgetattr(fh).map_err(errno),
            None => self
                .path(ino)
                .and_then(|path| self.passthrough.getattr(path).map_err(errno)),
        };
        match result {
            Ok(metadata) => reply.attr(&TTL, &to_file_attr(ino, &metadata)),
            Err(e) => reply.error(e),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let result = (|| {
            let path = self.path(ino)?;
            if let Some(mode) = mode {
                self.passthrough.chmod(&path, mode).map_err(errno)?;
            }
            if uid.is_some() || gid.is_some() {
                self.passthrough.chown(&path, uid, gid).map_err(errno)?;
            }
            if let Some(size) = size {
                self.passthrough.truncate(&path, size, fh).map_err(errno)?;
            }
            if atime.is_some() || mtime.is_some() {
                self.passthrough
                    .utimens(&path, atime.map(to_system_time), mtime.map(to_system_time))
                    .map_err(errno)?;
            }
            self.passthrough.getattr(&path).map_err(errno)
        })();
        match result {
            Ok(metadata) => reply.attr(&TTL, &to_file_attr(ino, &metadata)),
            Err(e) => reply.error(e),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let result = self
            .path(ino)
            .and_then(|path| self.passthrough.readlink(path).map_err(errno));
        match result {
            Ok(target) => reply.data(target.as_os_str().as_encoded_bytes()),
            Err(e) => reply.error(e),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.passthrough
                .mknod(&path, mode, u64::from(rdev))
                .map_err(errno)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            self.passthrough.mkdir(&path, mode).map_err(errno)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self.child(parent, name).and_then(|path| {
            self.passthrough.unlink(&path).map_err(errno)?;
            self.inodes.remove_by_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self.child(parent, name).and_then(|path| {
            self.passthrough.rmdir(&path).map_err(errno)?;
            self.inodes.remove_by_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let result = self.child(parent, link_name).and_then(|path| {
            self.passthrough.symlink(&path, target).map_err(errno)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        // RENAME_NOREPLACE / RENAME_EXCHANGE have no portable passthrough
        if flags != 0 {
            reply.error(libc::EINVAL);
            return;
        }
        let result = self.child(parent, name).and_then(|from| {
            let to = self.child(newparent, newname)?;
            self.passthrough.rename(&from, &to).map_err(errno)?;
            self.inodes.rename(&from, &to);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let result = self.path(ino).and_then(|existing| {
            let new = self.child(newparent, newname)?;
            self.passthrough.link(&existing, &new).map_err(errno)?;
            self.entry(&new)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(e),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let result = self
            .path(ino)
            .and_then(|path| self.passthrough.open(path, flags).map_err(errno));
        match result {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.passthrough.read(fh, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.passthrough.write(fh, offset, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.passthrough.flush(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.passthrough.release(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        match self.passthrough.fsync(fh, datasync) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path(ino) {
            Ok(path) => path,
            Err(e) => return reply.error(e),
        };
        let entries = match self.passthrough.readdir(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(errno(e)),
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (index, entry) in entries.into_iter().enumerate().skip(skip) {
            let entry_ino = match entry.name.to_str() {
                Some(".") => ino,
                Some("..") => self.inodes.get_or_create(&InodeTable::parent_path(&path)),
                _ => self.inodes.get_or_create(&path.join(&entry.name)),
            };
            let next_offset = (index + 1) as i64;
            if reply.add(entry_ino, next_offset, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.passthrough.statfs(Path::new("")) {
            Ok(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen,
                st.frsize,
            ),
            Err(e) => reply.error(errno(e)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let result = self
            .path(ino)
            .and_then(|path| self.passthrough.access(path, mask).map_err(errno));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let result = self.child(parent, name).and_then(|path| {
            let fh = self.passthrough.create(&path, mode, flags).map_err(errno)?;
            match self.entry(&path) {
                Ok(attr) => Ok((attr, fh)),
                Err(e) => {
                    let _ = self.passthrough.release(fh);
                    Err(e)
                }
            }
        });
        match result {
            Ok((attr, fh)) => reply.created(&TTL, &attr, 0, fh, 0),
            Err(e) => reply.error(e),
        }
    }
}

//! Download into a zip archive
//!
//! Compression and every write to the output run on tokio's blocking pool; the
//! async side only fetches object bodies and hands chunks to the worker.

use std::collections::HashSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::DirectorySync;
use crate::error::{Error, Result};
use crate::events::Operation;
use crate::path::{VirtualPrefix, archive_entry_name, is_folder_marker};
use crate::report::{ItemOutcome, TransferReport};
use crate::traits::ObjectStore;

/// Chunk size for copying object bodies into archive entries
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Chunks queued for the zip worker before the download side waits
const WORKER_QUEUE_DEPTH: usize = 8;

impl<S: ObjectStore> DirectorySync<S> {
    /// Write every object under `prefix` into a zip archive on `writer`
    ///
    /// Entry names are the keys with the prefix stripped. A failed download
    /// leaves its entry in the archive, empty or truncated. On success the
    /// writer is returned positioned at its start, ready to be read back.
    ///
    /// `writer` is moved to a blocking thread for the duration of the call,
    /// so it may perform blocking I/O.
    pub async fn download_to_archive<W>(
        &self,
        writer: W,
        prefix: Option<&str>,
    ) -> Result<(W, TransferReport)>
    where
        W: Write + Seek + Send + 'static,
    {
        self.ensure_container().await?;
        self.write_archive(writer, prefix).await
    }

    /// Write every object under `prefix` into a zip file at `path`
    ///
    /// The file's parent directory is created if needed. The file is only
    /// created once the container is known to exist.
    pub async fn download_to_archive_file(
        &self,
        path: impl AsRef<Path>,
        prefix: Option<&str>,
    ) -> Result<TransferReport> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.ensure_local_dir(parent).await?;
        }

        self.ensure_container().await?;

        tracing::debug!(path = %path.display(), "Creating zip archive");
        let file = tokio::fs::File::create(path).await?.into_std().await;
        let (file, report) = self.write_archive(file, prefix).await?;
        tokio::task::spawn_blocking(move || file.sync_all())
            .await
            .map_err(worker_failed)??;
        Ok(report)
    }

    async fn write_archive<W>(&self, writer: W, prefix: Option<&str>) -> Result<(W, TransferReport)>
    where
        W: Write + Seek + Send + 'static,
    {
        let prefix = VirtualPrefix::parse(prefix);
        let keys = self.list_keys(prefix.as_ref()).await?;

        let archive = ArchiveWorker::spawn(writer);
        let mut report = TransferReport::new(Operation::Archive);
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut names = HashSet::new();

        for key in keys.into_iter().filter(|k| !is_folder_marker(k)) {
            let entry = match archive_entry_name(&key, prefix.as_ref()) {
                Ok(entry) => entry,
                Err(e) => {
                    self.record(&mut report, ItemOutcome::failed(key, "", e));
                    continue;
                }
            };

            // Raw prefix matching can map two keys onto one name
            if !names.insert(entry.clone()) {
                let e = Error::InvalidPath(format!("Duplicate archive entry '{entry}'"));
                self.record(&mut report, ItemOutcome::failed(key, entry, e));
                continue;
            }

            if let Err(e) = archive.start_entry(&entry).await {
                self.record(&mut report, ItemOutcome::failed(key, entry, e));
                continue;
            }

            let copied = self.copy_into_entry(&key, &archive, &mut buf).await;
            let ended = archive.end_entry().await;
            let outcome = match copied.and_then(|size| ended.map(|()| size)) {
                Ok(size) => ItemOutcome::transferred(key, entry, size),
                Err(e) => ItemOutcome::failed(key, entry, e),
            };
            self.record(&mut report, outcome);
        }

        let writer = archive.finish().await?;
        Ok((writer, report))
    }

    async fn copy_into_entry<W>(&self, key: &str, archive: &ArchiveWorker<W>, buf: &mut [u8]) -> Result<u64> {
        let mut reader = self.store.get_object(key).await?;
        let mut total = 0u64;
        loop {
            let n = reader.read(buf).await?;
            if n == 0 {
                break;
            }
            archive.write(buf[..n].to_vec()).await?;
            total += n as u64;
        }
        Ok(total)
    }
}

enum Command {
    Start(String, oneshot::Sender<Result<()>>),
    Data(Vec<u8>),
    /// Close the current entry, replying with the first write error in it
    End(oneshot::Sender<Result<()>>),
}

/// Handle to a zip writer running on the blocking pool
struct ArchiveWorker<W> {
    commands: mpsc::Sender<Command>,
    worker: JoinHandle<Result<W>>,
}

impl<W: Write + Seek + Send + 'static> ArchiveWorker<W> {
    fn spawn(writer: W) -> Self {
        let (commands, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
        let worker = tokio::task::spawn_blocking(move || run_zip_writer(writer, rx));
        Self { commands, worker }
    }
}

impl<W> ArchiveWorker<W> {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::General("Archive writer stopped".into()))
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<()>>) -> Command,
    ) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response
            .await
            .map_err(|_| Error::General("Archive writer stopped".into()))?
    }

    async fn start_entry(&self, name: &str) -> Result<()> {
        self.request(|reply| Command::Start(name.to_string(), reply))
            .await
    }

    async fn write(&self, data: Vec<u8>) -> Result<()> {
        self.send(Command::Data(data)).await
    }

    async fn end_entry(&self) -> Result<()> {
        self.request(Command::End).await
    }

    /// Write the central directory and hand back the rewound writer
    async fn finish(self) -> Result<W> {
        let Self { commands, worker } = self;
        drop(commands);
        worker.await.map_err(worker_failed)?
    }
}

fn worker_failed(e: tokio::task::JoinError) -> Error {
    Error::General(format!("Archive writer task failed: {e}"))
}

/// Blocking side of [`ArchiveWorker`]; runs until the command channel closes
fn run_zip_writer<W: Write + Seek>(writer: W, mut commands: mpsc::Receiver<Command>) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entry_error = None;

    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Start(name, reply) => {
                entry_error = None;
                let _ = reply.send(zip.start_file(name, options).map_err(Error::from));
            }
            Command::Data(data) => {
                if entry_error.is_none()
                    && let Err(e) = zip.write_all(&data)
                {
                    entry_error = Some(Error::from(e));
                }
            }
            Command::End(reply) => {
                let _ = reply.send(entry_error.take().map_or(Ok(()), Err));
            }
        }
    }

    let mut writer = zip.finish()?;
    writer.seek(SeekFrom::Start(0))?;
    Ok(writer)
}

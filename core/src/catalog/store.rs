use std::io::Write;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, Instrument};

use crate::model::MediaRecord;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not read catalog {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write catalog {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog {path} is not a valid record list")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog actor is not running")]
    ActorGone,
}

#[derive(Debug)]
pub enum CatalogMessage {
    Append {
        record: MediaRecord,
        reply: oneshot::Sender<Result<(), CatalogError>>,
    },
    List {
        reply: oneshot::Sender<Result<Vec<MediaRecord>, CatalogError>>,
    },
}

/// Handle to the single task that owns the catalog file. Every read-modify-write goes through
/// its mailbox, so appends from concurrent ingestions are applied one after another.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    send: mpsc::Sender<CatalogMessage>,
}

impl CatalogHandle {
    pub fn new(path: PathBuf) -> Self {
        let (send, recv) = mpsc::channel(1000);
        let actor = CatalogActor { path, recv };
        let span = tracing::info_span!("catalog", path = %actor.path);
        tokio::spawn(run_catalog_actor(actor).instrument(span));
        Self { send }
    }

    /// Read the catalog, append `record` and write the whole list back.
    pub async fn append(&self, record: MediaRecord) -> Result<(), CatalogError> {
        let (reply, recv) = oneshot::channel();
        self.send
            .send(CatalogMessage::Append { record, reply })
            .await
            .map_err(|_| CatalogError::ActorGone)?;
        recv.await.map_err(|_| CatalogError::ActorGone)?
    }

    /// All records in insertion order.
    pub async fn list(&self) -> Result<Vec<MediaRecord>, CatalogError> {
        let (reply, recv) = oneshot::channel();
        self.send
            .send(CatalogMessage::List { reply })
            .await
            .map_err(|_| CatalogError::ActorGone)?;
        recv.await.map_err(|_| CatalogError::ActorGone)?
    }
}

struct CatalogActor {
    path: PathBuf,
    recv: mpsc::Receiver<CatalogMessage>,
}

async fn run_catalog_actor(mut actor: CatalogActor) {
    while let Some(msg) = actor.recv.recv().await {
        match msg {
            CatalogMessage::Append { record, reply } => {
                let res = append_record(&actor.path, record).await;
                // requester may have gone away, the write happened regardless
                let _ = reply.send(res);
            }
            CatalogMessage::List { reply } => {
                let _ = reply.send(read_records(&actor.path).await);
            }
        }
    }
    debug!("all catalog handles dropped, stopping");
}

#[instrument(skip(record), fields(id = %record.id))]
async fn append_record(path: &Path, record: MediaRecord) -> Result<(), CatalogError> {
    let mut records = read_records(path).await?;
    records.push(record);
    write_records(path, records).await
}

/// Missing file is initialized to an empty list.
async fn read_records(path: &Path) -> Result<Vec<MediaRecord>, CatalogError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CatalogError::Corrupt {
            path: path.to_owned(),
            source,
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            write_records(path, Vec::new()).await?;
            Ok(Vec::new())
        }
        Err(source) => Err(CatalogError::Read {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Write to a temp file next to the catalog and rename it into place, so readers never see a
/// half-written list.
async fn write_records(path: &Path, records: Vec<MediaRecord>) -> Result<(), CatalogError> {
    let path = path.to_owned();
    let write_err = |path: &Path, source| CatalogError::Write {
        path: path.to_owned(),
        source,
    };
    tokio::task::spawn_blocking(move || {
        let dir = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| write_err(&path, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(&path, e))?;
        serde_json::to_writer_pretty(&mut tmp, &records)
            .map_err(|e| write_err(&path, e.into()))?;
        tmp.write_all(b"\n").map_err(|e| write_err(&path, e))?;
        tmp.as_file().sync_all().map_err(|e| write_err(&path, e))?;
        tmp.persist(&path).map_err(|e| write_err(&path, e.error))?;
        Ok(())
    })
    .await
    .map_err(|join_err| CatalogError::Write {
        path: PathBuf::new(),
        source: std::io::Error::new(std::io::ErrorKind::Other, join_err),
    })?
}

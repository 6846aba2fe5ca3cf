use std::sync::Arc;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use chrono::Utc;
use eyre::{eyre, Context, Report};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Instrument};

use super::{
    artifacts::IngestArtifacts,
    error::IngestError,
    request::IngestRequest,
    source::{resolve_source, ResolvedSource},
    title::{resolve_display_name, TitleInputs},
};
use crate::{
    catalog::CatalogHandle,
    config::{Config, IngestConfig},
    model::{MediaId, MediaRecord},
    processing::{
        video::{
            ffmpeg::{FFmpeg, MediaTranscoder},
            ffprobe::{FFProbe, MediaProbe, ProbeResult},
            transcode::{CANONICAL_EXTENSION, CANONICAL_VIDEO_CODEC},
        },
        yt_dlp::{MediaDownloader, YtDlp},
    },
};

/// Appended to the media id to name transcoder output: `<id>-normalized.mp4`.
pub const NORMALIZED_FILE_SUFFIX: &str = "-normalized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum IngestStage {
    Resolving,
    Probing,
    Deciding,
    Passthrough,
    Transcoding,
    Cleaning,
    Committing,
}

/// The external programs the pipeline drives.
#[derive(Clone)]
pub struct IngestCommands {
    pub probe: Arc<dyn MediaProbe>,
    pub transcoder: Arc<dyn MediaTranscoder>,
    pub downloader: Arc<dyn MediaDownloader>,
}

impl IngestCommands {
    pub fn from_config(config: &Config) -> Self {
        let bin_paths = &config.bin_paths;
        Self {
            probe: Arc::new(FFProbe {
                bin_path: bin_paths.ffprobe.clone(),
                timeout: config.ingest.probe_timeout,
            }),
            transcoder: Arc::new(FFmpeg::canonical(
                bin_paths.ffmpeg.clone(),
                config.ingest.transcode_timeout,
            )),
            downloader: Arc::new(YtDlp {
                bin_path: bin_paths.yt_dlp.clone(),
                timeout: config.ingest.download_timeout,
            }),
        }
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    config: Arc<IngestConfig>,
    commands: IngestCommands,
    catalog: CatalogHandle,
    permits: Arc<Semaphore>,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig, commands: IngestCommands, catalog: CatalogHandle) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config: Arc::new(config),
            commands,
            catalog,
            permits,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Run the ingestion on its own task and wait for it.
    ///
    /// If the returned future is dropped (the client went away) the running subprocess is left
    /// to finish, but the ingestion is cancelled: it cleans up instead of committing.
    pub async fn ingest_detached(&self, request: IngestRequest) -> Result<MediaRecord, IngestError> {
        let cancel = CancellationToken::new();
        let cancel_on_drop = cancel.clone().drop_guard();
        let pipeline = self.clone();
        let task = tokio::spawn(
            async move { pipeline.ingest(request, cancel).await }.in_current_span(),
        );
        let result = task.await;
        cancel_on_drop.disarm();
        result.unwrap_or_else(|join_err| {
            Err(IngestError::StorageFailed(
                Report::new(join_err).wrap_err("ingestion task did not complete"),
            ))
        })
    }

    /// Resolve, probe, maybe transcode, and commit one clip.
    ///
    /// Either exactly one record is appended and its file exists, or nothing is appended and
    /// every file this ingestion created (including the upload it was handed) is gone.
    #[instrument(skip_all, fields(id = %request.id))]
    pub async fn ingest(
        &self,
        request: IngestRequest,
        cancel: CancellationToken,
    ) -> Result<MediaRecord, IngestError> {
        let mut artifacts = IngestArtifacts::default();
        if let Some(upload) = &request.upload {
            artifacts.track(&upload.path);
        }
        let mut stage = IngestStage::Resolving;
        let result = match self.permits.acquire().await {
            Ok(_permit) => {
                self.run(&request, &cancel, &mut artifacts, &mut stage)
                    .await
            }
            Err(_) => Err(IngestError::StorageFailed(eyre!(
                "ingestion pool is shut down"
            ))),
        };
        if let Err(err) = &result {
            warn!(%stage, kind = %err.kind(), details = %err.details(), "ingestion failed, cleaning up");
            artifacts.remove_all().await;
        }
        result
    }

    async fn run(
        &self,
        request: &IngestRequest,
        cancel: &CancellationToken,
        artifacts: &mut IngestArtifacts,
        stage: &mut IngestStage,
    ) -> Result<MediaRecord, IngestError> {
        *stage = IngestStage::Resolving;
        let source = resolve_source(
            request,
            &self.config,
            self.commands.downloader.as_ref(),
            artifacts,
        )
        .await?;
        check_cancelled(cancel)?;

        *stage = IngestStage::Probing;
        let probe = match self.commands.probe.probe(&source.path).await {
            Ok(probe) => probe,
            Err(report) => {
                // only metadata is lost; the decision below treats unknown codecs as foreign
                warn!(path = %source.path, ?report, "could not probe source, continuing without metadata");
                ProbeResult::default()
            }
        };
        check_cancelled(cancel)?;

        *stage = IngestStage::Deciding;
        let final_path = if self.config.normalize.requires_transcode(&probe) {
            *stage = IngestStage::Transcoding;
            self.transcode(request.id, &source.path, artifacts).await?
        } else {
            *stage = IngestStage::Passthrough;
            debug!(path = %source.path, "source already in canonical profile");
            source.path.clone()
        };

        *stage = IngestStage::Cleaning;
        for temp in &source.temp_artifacts {
            artifacts.remove(temp).await;
        }
        check_cancelled(cancel)?;

        *stage = IngestStage::Committing;
        let record = self.commit(request, &source, &probe, &final_path).await?;
        artifacts.release(&final_path);
        info!(display_name = %record.display_name, url = %record.relative_url, "ingested");
        Ok(record)
    }

    async fn transcode(
        &self,
        id: MediaId,
        source: &Path,
        artifacts: &mut IngestArtifacts,
    ) -> Result<PathBuf, IngestError> {
        let output = self.config.media_dir.join(format!(
            "{}{}.{}",
            id, NORMALIZED_FILE_SUFFIX, CANONICAL_EXTENSION
        ));
        if output == source {
            return Err(IngestError::TranscodeFailed(eyre!(
                "transcoder output would overwrite its input {}",
                source
            )));
        }
        artifacts.track(&output);
        self.commands
            .transcoder
            .transcode(source, &output)
            .await
            .map_err(IngestError::TranscodeFailed)?;
        let output_probe = self
            .commands
            .probe
            .probe(&output)
            .await
            .wrap_err("could not probe transcoder output")
            .map_err(IngestError::ProbeFailed)?;
        if output_probe.video_codec() != Some(CANONICAL_VIDEO_CODEC) {
            return Err(IngestError::TranscodeFailed(eyre!(
                "transcoder output has video codec {:?}, expected {}",
                output_probe.video_codec(),
                CANONICAL_VIDEO_CODEC
            )));
        }
        // the source is superseded only once the output is confirmed good
        artifacts.remove(source).await;
        Ok(output)
    }

    async fn commit(
        &self,
        request: &IngestRequest,
        source: &ResolvedSource,
        probe: &ProbeResult,
        final_path: &Path,
    ) -> Result<MediaRecord, IngestError> {
        let file_name = final_path.file_name().ok_or_else(|| {
            IngestError::StorageFailed(eyre!("final path {} has no file name", final_path))
        })?;
        let metadata = tokio::fs::metadata(final_path)
            .await
            .wrap_err(format!("final file {} is missing", final_path))
            .map_err(IngestError::StorageFailed)?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(IngestError::StorageFailed(eyre!(
                "final file {} is empty or not a regular file",
                final_path
            )));
        }
        let created_at = Utc::now();
        let display_name = resolve_display_name(&TitleInputs {
            explicit: request.title.as_deref(),
            embedded: probe.title(),
            kind: source.kind,
            created_at,
            original_name: source.original_name.as_deref(),
            final_path,
            generated_titles: self.config.generated_titles,
        });
        let record = MediaRecord {
            id: request.id,
            display_name,
            relative_url: self.config.relative_url(file_name),
            created_at,
            source_kind: source.kind,
            codec_tags: (!probe.format_tags.is_empty()).then(|| probe.format_tags.clone()),
        };
        self.catalog
            .append(record.clone())
            .await
            .map_err(|err| IngestError::StorageFailed(Report::new(err)))?;
        Ok(record)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), IngestError> {
    if cancel.is_cancelled() {
        Err(IngestError::Cancelled)
    } else {
        Ok(())
    }
}

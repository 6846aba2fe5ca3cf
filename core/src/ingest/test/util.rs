use std::sync::Arc;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use itertools::Itertools;
use tempfile::TempDir;

use crate::{
    catalog::CatalogHandle,
    config::IngestConfig,
    ingest::{IngestCommands, IngestPipeline, IngestRequest, NormalizePolicy, UploadedFile},
    model::MediaId,
    processing::{
        mock::{probe_result, DownloaderMock, ProbeMock, TranscodeBehavior, TranscoderMock},
        video::ffprobe::ProbeResult,
    },
};

pub struct Harness {
    // keeps the directory alive for the duration of the test
    _dir: TempDir,
    pub media_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub probe: Arc<ProbeMock>,
    pub transcoder: Arc<TranscoderMock>,
    pub downloader: Arc<DownloaderMock>,
    pub pipeline: IngestPipeline,
}

pub struct HarnessBuilder {
    probe: ProbeMock,
    transcoder: TranscoderMock,
    downloader: DownloaderMock,
    normalize: NormalizePolicy,
    generated_titles: bool,
    max_concurrent: usize,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            probe: ProbeMock::sources_look_like(h264_aac(None)),
            transcoder: TranscoderMock::new(TranscodeBehavior::Succeed),
            downloader: DownloaderMock::producing(&[(".mp4", b"remote bytes")]),
            normalize: NormalizePolicy::IfNeeded,
            generated_titles: true,
            max_concurrent: 4,
        }
    }
}

impl HarnessBuilder {
    pub fn probe(mut self, probe: ProbeMock) -> Self {
        self.probe = probe;
        self
    }

    pub fn transcoder(mut self, transcoder: TranscoderMock) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn downloader(mut self, downloader: DownloaderMock) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn normalize(mut self, normalize: NormalizePolicy) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn generated_titles(mut self, generated_titles: bool) -> Self {
        self.generated_titles = generated_titles;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let root = PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let media_dir = root.join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        let catalog_path = root.join("catalog.json");
        let config = IngestConfig {
            normalize: self.normalize,
            generated_titles: self.generated_titles,
            max_concurrent: self.max_concurrent,
            ..IngestConfig::with_media_dir(media_dir.clone())
        };
        let probe = Arc::new(self.probe);
        let transcoder = Arc::new(self.transcoder);
        let downloader = Arc::new(self.downloader);
        let commands = IngestCommands {
            probe: probe.clone(),
            transcoder: transcoder.clone(),
            downloader: downloader.clone(),
        };
        let pipeline = IngestPipeline::new(config, commands, CatalogHandle::new(catalog_path.clone()));
        Harness {
            _dir: dir,
            media_dir,
            catalog_path,
            probe,
            transcoder,
            downloader,
            pipeline,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Write an upload the way the HTTP layer does: `<media_dir>/<id>.<ext>`.
    pub fn write_upload(&self, ext: &str, bytes: &[u8], content_type: &str) -> IngestRequest {
        let id = MediaId::generate();
        let path = self.media_dir.join(format!("{}.{}", id, ext));
        std::fs::write(&path, bytes).unwrap();
        IngestRequest::upload(
            id,
            UploadedFile {
                path,
                content_type: Some(content_type.to_string()),
                file_name: Some(format!("holiday.{}", ext)),
            },
            None,
        )
    }

    pub fn media_files(&self) -> Vec<String> {
        list_file_names(&self.media_dir)
    }

    pub fn catalog_on_disk(&self) -> Vec<crate::model::MediaRecord> {
        match std::fs::read(&self.catalog_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => panic!("reading catalog: {}", err),
        }
    }
}

pub fn list_file_names(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .sorted()
        .collect()
}

pub fn h264_aac(title: Option<&str>) -> ProbeResult {
    probe_result("h264", Some("aac"), title)
}

pub fn hevc_opus(title: Option<&str>) -> ProbeResult {
    probe_result("hevc", Some("opus"), title)
}

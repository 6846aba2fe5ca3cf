use std::{collections::HashSet, time::Duration};

use claims::assert_ok;
use pretty_assertions::assert_eq;

use super::util::{hevc_opus, Harness};
use crate::processing::mock::{ProbeMock, TranscodeBehavior, TranscoderMock};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingestions_each_get_their_own_record_and_file() {
    const N: usize = 12;
    let h = Harness::builder()
        .probe(ProbeMock::sources_look_like(hevc_opus(None)))
        .transcoder(
            TranscoderMock::new(TranscodeBehavior::Succeed).with_delay(Duration::from_millis(20)),
        )
        .max_concurrent(3)
        .build();
    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let request = h.write_upload("mov", format!("clip {}", i).as_bytes(), "video/quicktime");
            let pipeline = h.pipeline.clone();
            tokio::spawn(async move { pipeline.ingest_detached(request).await })
        })
        .collect();
    let mut records = Vec::new();
    for result in futures::future::join_all(tasks).await {
        records.push(assert_ok!(result.unwrap()));
    }
    let urls: HashSet<_> = records.iter().map(|r| r.relative_url.clone()).collect();
    assert_eq!(urls.len(), N);
    assert_eq!(h.media_files().len(), N);
    let listed = assert_ok!(h.pipeline.catalog().list().await);
    assert_eq!(listed.len(), N);
    let listed_ids: HashSet<_> = listed.iter().map(|r| r.id).collect();
    let returned_ids: HashSet<_> = records.iter().map(|r| r.id).collect();
    assert_eq!(listed_ids, returned_ids);
    for record in &records {
        let name = record.relative_url.trim_start_matches("/files/");
        assert!(h.media_dir.join(name).is_file(), "{} missing", name);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_the_caller_cancels_without_killing_the_encoder() {
    let h = Harness::builder()
        .probe(ProbeMock::sources_look_like(hevc_opus(None)))
        .transcoder(
            TranscoderMock::new(TranscodeBehavior::Succeed).with_delay(Duration::from_millis(300)),
        )
        .build();
    let request = h.write_upload("mov", b"hevc bytes", "video/quicktime");
    let pipeline = h.pipeline.clone();
    let caller = tokio::spawn(async move { pipeline.ingest_detached(request).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    // the ingestion keeps running in the background until the encoder is done
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !h.media_files().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(h.transcoder.calls(), 1);
    assert_eq!(h.media_files(), Vec::<String>::new());
    assert_eq!(assert_ok!(h.pipeline.catalog().list().await), vec![]);
}

use std::time::Duration;

use eyre::{eyre, Report};
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum ProcessResult {
    RanToEnd(std::process::Output),
    /// The wall-clock limit expired and the process was killed.
    TimedOut,
    OtherError(Report),
}

/// Run process to completion or until `timeout` expires, whichever comes first.
/// Returns process output even if stdout/stderr are piped to null, in which case they will be
/// empty.
///
/// Dropping the returned future does not kill the child: the wait runs on its own task so the
/// process is always reaped.
#[cfg(target_family = "unix")]
pub async fn run_process(child: tokio::process::Child, timeout: Duration) -> ProcessResult {
    let pid = match child.id() {
        Some(pid) => pid,
        None => return ProcessResult::OtherError(eyre!("child process was already reaped")),
    };
    let (send, mut recv) = oneshot::channel();
    tokio::task::spawn(async move {
        // receiver is gone if our caller was dropped, nothing to report to
        let _ = send.send(child.wait_with_output().await);
    });
    tokio::select! {
        result = &mut recv => match result {
            Ok(Ok(output)) => ProcessResult::RanToEnd(output),
            Ok(Err(wait_err)) => ProcessResult::OtherError(
                Report::new(wait_err).wrap_err("error waiting for child process"),
            ),
            Err(_) => ProcessResult::OtherError(eyre!("process wait task stopped unexpectedly")),
        },
        _ = tokio::time::sleep(timeout) => {
            let raw_pid = match i32::try_from(pid) {
                Ok(p) => p,
                Err(_) => return ProcessResult::OtherError(eyre!("pid {} out of range", pid)),
            };
            if let Err(err) = kill(Pid::from_raw(raw_pid), Signal::SIGKILL) {
                tracing::error!(%err, pid, "Error sending SIGKILL to timed out process");
            }
            // reap it so no zombie is left behind
            let _ = recv.await;
            ProcessResult::TimedOut
        }
    }
}

#[cfg(test)]
mod test {
    use std::process::Stdio;

    use claims::assert_matches;
    use tokio::process::Command;

    use super::*;

    #[tokio::test]
    async fn process_that_finishes_in_time_reports_output() {
        let child = Command::new("sh")
            .args(["-c", "echo hello"])
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let result = run_process(child, Duration::from_secs(10)).await;
        match result {
            ProcessResult::RanToEnd(output) => {
                assert!(output.status.success());
                assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn process_exceeding_limit_is_killed() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let start = std::time::Instant::now();
        let result = run_process(child, Duration::from_millis(100)).await;
        assert_matches!(result, ProcessResult::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}

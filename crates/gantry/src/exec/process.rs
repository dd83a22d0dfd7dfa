//! Spawning a container's command and relaying its output.

use std::process::Stdio;

use bytes::Bytes;
use gantry_common::{GantryError, GantryResult};
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStdout, Command};

use crate::registry::Container;
use crate::stream::{InputStream, OutputStream};

/// Executes a container's command as a child process.
///
/// A run moves through idle, starting, running, and a terminal completed or
/// failed outcome:
///
/// 1. The idle-to-starting transition is an atomic check-then-set on the
///    container's running flag; a container that is not idle rejects the
///    run before anything is spawned.
/// 2. The child is spawned with stdin and stdout piped. Two tasks run for
///    the duration of the execution: one drains child stdout to the
///    caller's output sink, one closes the child's stdin and drops the
///    caller's input stream — stdin relay is deliberately disabled, so
///    every run is non-interactive and bytes sent as standard input are
///    discarded.
/// 3. The process is reaped first. A non-success exit is the final result;
///    only after a clean exit is the output-copy task's result consulted,
///    since the output stream can legitimately keep producing until the
///    process truly exits.
///
/// The running flag is released on every exit path by the token acquired in
/// step 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run the container's command, streaming its stdout to `output`.
    ///
    /// # Errors
    ///
    /// [`GantryError::AlreadyRunning`] if an execution is in flight,
    /// [`GantryError::Spawn`] if the process cannot start,
    /// [`GantryError::ProcessExit`] on a non-success exit status,
    /// [`GantryError::StreamCopy`] if relaying output failed after a clean
    /// exit.
    pub async fn run(
        &self,
        container: &Container,
        input: Option<InputStream>,
        output: OutputStream,
    ) -> GantryResult<()> {
        let Some(_token) = container.try_begin_run() else {
            return Err(GantryError::AlreadyRunning {
                id: container.id.clone(),
            });
        };

        tracing::debug!(
            container_id = %container.id,
            command = %container.command_line(),
            "spawning process"
        );
        let mut child = Command::new(&container.command)
            .args(&container.arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| GantryError::Spawn {
                command: container.command.clone(),
                source,
            })?;

        let child_stdin = child.stdin.take();
        let Some(child_stdout) = child.stdout.take() else {
            return Err(GantryError::StreamCopy(std::io::Error::other(
                "child stdout unavailable",
            )));
        };

        let copy_out = tokio::spawn(copy_output(child_stdout, output));
        let discard_in = tokio::spawn(async move {
            // stdin relay disabled: close both ends so the child sees EOF
            // and the caller's input bytes are dropped.
            drop(child_stdin);
            drop(input);
            Ok::<(), std::io::Error>(())
        });

        let status = child.wait().await?;
        if !status.success() {
            tracing::debug!(container_id = %container.id, %status, "process failed");
            return Err(GantryError::ProcessExit { status });
        }

        // The discard task cannot fail today; its result is still checked
        // ahead of the copy result.
        if let Ok(Err(err)) = discard_in.await {
            return Err(GantryError::StreamCopy(err));
        }
        match copy_out.await {
            Ok(Ok(bytes)) => {
                tracing::debug!(container_id = %container.id, bytes, "process completed");
                Ok(())
            }
            Ok(Err(err)) => Err(GantryError::StreamCopy(err)),
            Err(join) => Err(GantryError::StreamCopy(std::io::Error::other(join))),
        }
    }
}

/// Drain `source` to `sink` until EOF, returning the byte count.
async fn copy_output(mut source: ChildStdout, sink: OutputStream) -> std::io::Result<u64> {
    let mut buf = [0u8; 4096];
    let mut total = 0u64;
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        sink.write_all(Bytes::copy_from_slice(&buf[..n])).await?;
        total += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::FixedEstimator;
    use crate::registry::Registry;
    use crate::stream::OutputReceiver;

    fn test_container(command: &str, arguments: &[&str]) -> Container {
        let mut registry = Registry::new(Box::new(FixedEstimator {
            layer_size: 1,
            files_changed: 1,
            bytes_changed: 1,
        }));
        registry.add_layer("base", "download", None);
        let arguments: Vec<String> = arguments.iter().map(ToString::to_string).collect();
        registry
            .add_container(command, &arguments, &["base".to_string()])
            .unwrap()
    }

    fn collect(mut rx: OutputReceiver) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(Ok(chunk)) = rx.recv().await {
                collected.extend_from_slice(&chunk);
            }
            String::from_utf8_lossy(&collected).into_owned()
        })
    }

    #[tokio::test]
    async fn output_is_relayed() {
        let container = test_container("echo", &["hello", "world"]);
        let (output, rx) = OutputStream::channel(16);
        let collected = collect(rx);

        ProcessRunner.run(&container, None, output).await.unwrap();
        assert_eq!(collected.await.unwrap(), "hello world\n");
        assert!(!container.is_running());
    }

    #[tokio::test]
    async fn failing_process_reports_error_and_releases_flag() {
        let container = test_container("false", &[]);
        let (output, rx) = OutputStream::channel(16);
        let collected = collect(rx);

        let err = ProcessRunner.run(&container, None, output).await.unwrap_err();
        assert!(matches!(err, GantryError::ProcessExit { .. }));
        assert!(!container.is_running());
        drop(collected);
    }

    #[tokio::test]
    async fn missing_binary_reports_spawn_failure() {
        let container = test_container("gantry-test-no-such-binary", &[]);
        let (output, _rx) = OutputStream::channel(16);

        let err = ProcessRunner.run(&container, None, output).await.unwrap_err();
        assert!(matches!(err, GantryError::Spawn { .. }));
        assert!(!container.is_running());
    }

    #[tokio::test]
    async fn caller_input_is_discarded() {
        // `cat` with no input of its own exits as soon as stdin closes; if
        // the caller's bytes were relayed it would echo them instead.
        let container = test_container("cat", &[]);
        let (output, rx) = OutputStream::channel(16);
        let collected = collect(rx);

        let input: InputStream = Box::new(std::io::Cursor::new(b"ignored".to_vec()));
        ProcessRunner
            .run(&container, Some(input), output)
            .await
            .unwrap();
        assert_eq!(collected.await.unwrap(), "");
    }

    #[tokio::test]
    async fn second_run_is_rejected_while_executing() {
        let container = test_container("sleep", &["1"]);
        let (output, _rx) = OutputStream::channel(16);
        let first = {
            let container = container.clone();
            tokio::spawn(async move { ProcessRunner.run(&container, None, output).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(container.is_running());

        let (second_output, _rx2) = OutputStream::channel(16);
        let err = ProcessRunner
            .run(&container, None, second_output)
            .await
            .unwrap_err();
        assert!(matches!(err, GantryError::AlreadyRunning { .. }));

        first.await.unwrap().unwrap();
        assert!(!container.is_running());
    }
}

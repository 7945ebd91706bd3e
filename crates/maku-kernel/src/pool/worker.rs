//! Worker process loop.
//!
//! A worker reads task frames from its stdin and answers each with one
//! result frame on its stdout. Commands run through `sh -c`, short-
//! circuiting the sequence on the first non-zero status. The protocol owns
//! the worker's stdout, so captured command output is forwarded to stderr,
//! which the worker inherits from the parent terminal.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use maku_types::TaskResult;

use super::frame;

/// Run the worker loop until EOF or the shutdown sentinel.
pub fn run(input: &mut impl Read, output: &mut impl Write) -> io::Result<()> {
    while let Some(task) = frame::read_task(input)? {
        let mut exit_code = 0;

        for command in &task.commands {
            let status = match run_command(command) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("maku worker: failed to run command: {err}");
                    127
                }
            };
            if status != 0 {
                exit_code = status;
                break;
            }
        }

        let result = TaskResult { node: task.node, exit_code };
        output.write_all(&frame::encode_result(result))?;
        output.flush()?;
    }

    Ok(())
}

/// Run one shell command, forwarding its captured output to stderr.
fn run_command(command: &str) -> io::Result<i32> {
    let out = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()?;

    let mut stderr = io::stderr().lock();
    stderr.write_all(&out.stdout)?;
    stderr.write_all(&out.stderr)?;

    // no exit code means the command died to a signal
    Ok(out.status.code().unwrap_or(-1))
}

// codecam-decode/src/process.rs
// ------------------------------------------------------------
// Out-of-process decoder. Wire format, per request:
//   stdin : {"width":W,"height":H,"format":"rgb8","len":N}\n <N raw bytes>
//   stdout: one JSON array per line, e.g. ["ABC123"]\n
// ------------------------------------------------------------

use crate::{DecodeError, Decoder, Result, Symbol};
use codecam_sample::PixelPayload;
use serde::Serialize;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

#[derive(Serialize)]
struct FrameHeader<'a> {
    width: u32,
    height: u32,
    format: &'a str,
    len: usize,
}

/// Decoder running in a child process; killed when dropped.
pub struct ProcessDecoder {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl ProcessDecoder {
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program.as_ref())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DecodeError::Failed("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DecodeError::Failed("child stdout not captured".into()))?;

        log::info!("decoder process {:?} started (pid {})", program.as_ref(), child.id());
        Ok(Self { child, stdin, stdout: BufReader::new(stdout), line: String::new() })
    }

    /// Parse a command line such as `zbar-pipe --rgb` into program + args.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DecodeError::Failed("empty decoder command".into()))?;
        Self::spawn(program, parts)
    }

    fn exit_code(&mut self) -> Option<i32> {
        self.child.try_wait().ok().flatten().and_then(|status| status.code())
    }
}

impl Decoder for ProcessDecoder {
    fn decode(&mut self, payload: &PixelPayload) -> Result<Vec<Symbol>> {
        let header = serde_json::to_string(&FrameHeader {
            width: payload.width,
            height: payload.height,
            format: "rgb8",
            len: payload.data.len(),
        })?;

        let sent = self
            .stdin
            .write_all(header.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.write_all(&payload.data))
            .and_then(|_| self.stdin.flush());
        if let Err(e) = sent {
            return match self.exit_code() {
                Some(code) => Err(DecodeError::Exited(Some(code))),
                None => Err(DecodeError::Io(e)),
            };
        }

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(DecodeError::Exited(self.exit_code()));
        }
        Ok(serde_json::from_str(self.line.trim())?)
    }
}

impl Drop for ProcessDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> PixelPayload {
        PixelPayload { width: 2, height: 2, data: vec![7; 12] }
    }

    fn shell(script: &str) -> ProcessDecoder {
        ProcessDecoder::spawn("sh", ["-c", script]).unwrap()
    }

    #[test]
    fn reads_one_json_array_per_request() {
        let mut decoder = shell(r#"read -r header; echo '["ABC123"]'; cat > /dev/null"#);
        let symbols = decoder.decode(&payload()).unwrap();
        assert_eq!(symbols, vec![json!("ABC123")]);
    }

    #[test]
    fn header_describes_the_frame() {
        // Echo the header back inside an array.
        let mut decoder = shell(r#"read -r header; echo "[$header]"; cat > /dev/null"#);
        let symbols = decoder.decode(&payload()).unwrap();
        assert_eq!(
            symbols,
            vec![json!({ "width": 2, "height": 2, "format": "rgb8", "len": 12 })]
        );
    }

    #[test]
    fn garbage_output_is_an_error() {
        let mut decoder = shell(r#"read -r header; echo 'no symbols here'; cat > /dev/null"#);
        assert!(matches!(decoder.decode(&payload()), Err(DecodeError::Json(_))));
    }

    #[test]
    fn dead_process_is_an_error() {
        let mut decoder = shell("exit 3");
        assert!(decoder.decode(&payload()).is_err());
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(ProcessDecoder::from_command_line("   ").is_err());
    }
}

//! Line-based terminal prompts.

use anyhow::{bail, Context, Result};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg, Termios};
use std::io::{self, BufRead, Write};
use std::os::fd::AsFd;

/// Print `label` and read one line from stdin, without the line ending.
pub fn read_line(label: &str) -> Result<String> {
    if !label.is_empty() {
        eprint!("{label}");
        io::stderr().flush().ok();
    }
    let mut line = String::new();
    let n = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    if n == 0 {
        bail!("stdin closed");
    }
    Ok(strip_line_ending(&line).to_string())
}

/// Like [`read_line`], but the typed text is not echoed when stdin is a
/// terminal.
pub fn read_password(label: &str) -> Result<String> {
    let _quiet = EchoOff::new(io::stdin());
    read_line(label)
}

/// Terminal echo switched off until drop. Only the newline is echoed.
struct EchoOff<F: AsFd> {
    fd: F,
    saved: Termios,
}

impl<F: AsFd> EchoOff<F> {
    /// `None` when `fd` is not a terminal.
    fn new(fd: F) -> Option<Self> {
        let saved = tcgetattr(&fd).ok()?;
        let mut quiet = saved.clone();
        quiet.local_flags.remove(LocalFlags::ECHO);
        quiet.local_flags.insert(LocalFlags::ECHONL);
        if let Err(e) = tcsetattr(&fd, SetArg::TCSANOW, &quiet) {
            tracing::debug!(error = %e, "cannot disable terminal echo");
            return None;
        }
        Some(Self { fd, saved })
    }
}

impl<F: AsFd> Drop for EchoOff<F> {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(&self.fd, SetArg::TCSANOW, &self.saved) {
            tracing::warn!(error = %e, "cannot restore terminal echo");
        }
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm(question: &str) -> Result<bool> {
    let answer = read_line(&format!("{question} [y/N] "))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_echo_left_alone_off_terminal() {
        let null = std::fs::File::open("/dev/null").unwrap();
        assert!(EchoOff::new(&null).is_none());
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending("pw\r\n"), "pw");
        assert_eq!(strip_line_ending("pw\n"), "pw");
        assert_eq!(strip_line_ending(" pw "), " pw ");
    }
}

//! Запуск внешних процессов с передачей данных через stdin/stdout

use std::io::{self, Write};
use std::process::{Command, Output, Stdio};
use std::thread;

/// Запустить команду, передать `input` в stdin и собрать вывод
///
/// stdin пишется из отдельного потока, иначе процесс, который пишет в stdout
/// раньше, чем дочитал вход, может заблокироваться на заполненном канале.
pub fn pipe_through(command: &mut Command, input: &[u8]) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin unavailable"))?;
    let payload = input.to_vec();
    let writer = thread::Builder::new()
        .name("pipe-stdin".to_string())
        .spawn(move || {
            let result = stdin.write_all(&payload);
            drop(stdin);
            result
        })?;

    let output = child.wait_with_output()?;
    match writer.join() {
        Ok(Ok(())) => {}
        // Процесс мог закрыть stdin раньше, код выхода тогда важнее
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")),
    }
    Ok(output)
}

/// Последняя непустая строка stderr для сообщений об ошибках
pub fn stderr_tail(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_through_cat() {
        let output = pipe_through(&mut Command::new("cat"), "안녕하세요".as_bytes()).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "안녕하세요".as_bytes());
    }

    #[test]
    fn test_stderr_tail() {
        let output = Command::new("sh")
            .args(["-c", "echo first >&2; echo last >&2; exit 3"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(stderr_tail(&output), "last");
    }
}

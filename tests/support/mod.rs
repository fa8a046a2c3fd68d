//! Shared harness for polar integration tests: a scripted HTTP server, an
//! isolated home directory and the built binary path.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type HarnessResult<T> = Result<T, String>;

static HOME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Path of the `polar` binary built for this test run.
pub fn polar_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_polar"))
}

/// Throwaway `$HOME` so the token cache and global config stay isolated.
pub struct TempHome {
    pub root: PathBuf,
}

impl TempHome {
    pub fn create(label: &str) -> HarnessResult<Self> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let root = std::env::temp_dir().join(format!(
            "polar-it-{label}-{}-{millis}-{}",
            std::process::id(),
            HOME_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root).map_err(|e| format!("failed creating temp home: {e}"))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.root.join(".polar").join("tokens.json")
    }

    pub fn write(&self, relative: &str, content: &str) -> HarnessResult<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("failed creating {parent:?}: {e}"))?;
        }
        fs::write(&path, content).map_err(|e| format!("failed writing {path:?}: {e}"))?;
        Ok(path)
    }
}

impl Drop for TempHome {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// One request seen by [`ScriptedServer`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub request_line: String,
    pub body: String,
}

impl SeenRequest {
    /// Decode a form-encoded body into `(key, value)` pairs.
    pub fn form_value(&self, key: &str) -> Option<String> {
        let url = reqwest::Url::parse(&format!("http://form.invalid/?{}", self.body)).ok()?;
        url.query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }
}

/// Local HTTP server answering requests in order from a fixed script of
/// `(status, json body)` pairs; the last entry repeats.
pub struct ScriptedServer {
    address: String,
    shutdown: Arc<AtomicBool>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ScriptedServer {
    pub fn start(script: Vec<(u16, String)>) -> HarnessResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|e| format!("failed binding scripted server: {e}"))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| format!("failed setting nonblocking listener: {e}"))?;
        let addr = listener
            .local_addr()
            .map_err(|e| format!("failed getting scripted server addr: {e}"))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let shutdown_flag = Arc::clone(&shutdown);
        let seen_requests = Arc::clone(&seen);
        let thread = thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = stream.set_nonblocking(false);
                        let Ok(request) = read_request(&mut stream) else {
                            continue;
                        };
                        let index = {
                            let mut seen = seen_requests.lock().unwrap();
                            seen.push(request);
                            seen.len() - 1
                        };
                        if let Some((status, body)) = script.get(index).or_else(|| script.last())
                        {
                            let _ = write_response(&mut stream, *status, body);
                        }
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
        });

        Ok(Self {
            address: format!("http://{addr}"),
            shutdown,
            seen,
            thread: Some(thread),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(host) = self.address.strip_prefix("http://") {
            let _ = TcpStream::connect(host).and_then(|s| s.shutdown(Shutdown::Both));
        }
        if let Some(join) = self.thread.take() {
            let _ = join.join();
        }
    }
}

/// Issue a bare `GET` on a fresh connection and return the response text.
pub fn http_get(host: &str, target: &str) -> HarnessResult<String> {
    let mut stream =
        TcpStream::connect(host).map_err(|e| format!("failed connecting to {host}: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("failed setting read timeout: {e}"))?;
    let request = format!("GET {target} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .map_err(|e| format!("failed writing request: {e}"))?;
    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    Ok(response)
}

fn read_request(stream: &mut TcpStream) -> HarnessResult<SeenRequest> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("failed setting read timeout: {e}"))?;
    let mut buffer = Vec::<u8>::new();
    let mut temp = [0u8; 2048];
    let mut header_end: Option<usize> = None;
    let mut content_length = 0usize;

    loop {
        let n = stream
            .read(&mut temp)
            .map_err(|e| format!("failed reading request bytes: {e}"))?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&temp[..n]);
        if header_end.is_none() {
            if let Some(idx) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                header_end = Some(idx);
                let head = String::from_utf8_lossy(&buffer[..idx]).to_string();
                content_length = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.trim()
                            .eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
            }
        }
        if let Some(idx) = header_end {
            if buffer.len().saturating_sub(idx + 4) >= content_length {
                break;
            }
        }
    }

    let idx = header_end.ok_or_else(|| "malformed HTTP request (missing header end)".to_string())?;
    let head = String::from_utf8_lossy(&buffer[..idx]).to_string();
    Ok(SeenRequest {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buffer[idx + 4..]).to_string(),
    })
}

fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> HarnessResult<()> {
    let reason = if status < 400 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream
        .write_all(response.as_bytes())
        .map_err(|e| format!("failed writing response: {e}"))?;
    let _ = stream.flush();
    Ok(())
}

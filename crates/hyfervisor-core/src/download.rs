//! Restore image download.

use crate::error::{CoreError, Result};
use futures_util::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Timeout for establishing the connection. Restore images are large, so the
/// transfer itself is not bounded.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes to download (if known).
    pub total: Option<u64>,
}

impl DownloadProgress {
    /// Returns progress as a percentage (0-100), or None if total is unknown.
    pub fn percentage(&self) -> Option<u8> {
        self.total.map(|t| {
            if t == 0 {
                100
            } else {
                ((self.downloaded * 100) / t).min(100) as u8
            }
        })
    }
}

/// Progress callback type.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(format!("hyfervisor/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CoreError::Download(format!("failed to create HTTP client: {}", e)))
}

/// Downloads `url` to `dest` with progress reporting.
///
/// The body is streamed into `<dest>.tmp`, which is renamed over `dest` once
/// complete, so an interrupted download never leaves a truncated `dest`.
pub async fn download_file(
    url: &str,
    dest: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    tracing::info!("Downloading: {}", url);

    let client = build_http_client()?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CoreError::Download(format!("failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(CoreError::Download(format!(
            "download failed with status {}: {}",
            response.status(),
            url
        )));
    }

    let temp_path = temp_path_for(dest);
    let downloaded = match stream_to_file(response, &temp_path, progress).await {
        Ok(downloaded) => downloaded,
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    fs::rename(&temp_path, dest).await?;
    tracing::debug!("Downloaded {} to {}", format_bytes(downloaded), dest.display());

    Ok(())
}

/// `<dest>.tmp`, next to `dest`.
fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Writes the response body to `path`, returning the byte count.
async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64> {
    let total_size = response.content_length();
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(path).await?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CoreError::Download(format!("download error: {}", e)))?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(cb) = progress {
            cb(DownloadProgress {
                downloaded,
                total: total_size,
            });
        }
    }
    file.flush().await?;

    if let Some(total) = total_size {
        if downloaded != total {
            return Err(CoreError::Download(format!(
                "incomplete download: got {} of {} bytes",
                downloaded, total
            )));
        }
    }
    Ok(downloaded)
}

/// Formats bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let progress = DownloadProgress {
            downloaded: 50,
            total: Some(200),
        };
        assert_eq!(progress.percentage(), Some(25));

        let unknown = DownloadProgress {
            downloaded: 50,
            total: None,
        };
        assert_eq!(unknown.percentage(), None);

        let empty = DownloadProgress {
            downloaded: 0,
            total: Some(0),
        };
        assert_eq!(empty.percentage(), Some(100));

        let over = DownloadProgress {
            downloaded: 300,
            total: Some(200),
        };
        assert_eq!(over.percentage(), Some(100));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(1073741824), "1.0 GB");
    }

    #[tokio::test]
    async fn test_unreachable_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("RestoreImage.ipsw");
        let result = download_file("http://127.0.0.1:9/RestoreImage.ipsw", &dest, None).await;
        assert!(matches!(result, Err(CoreError::Download(_))));
        assert!(!dest.exists());
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("/vms/VM.bundle/RestoreImage.ipsw")),
            Path::new("/vms/VM.bundle/RestoreImage.ipsw.tmp")
        );
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1024\r\n\r\npartial")
                .await
                .unwrap();
        });

        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("RestoreImage.ipsw");
        let url = format!("http://{}/RestoreImage.ipsw", addr);
        let result = download_file(&url, &dest, None).await;
        server.await.unwrap();

        assert!(matches!(result, Err(CoreError::Download(_))));
        assert!(!dest.exists());
        assert!(!temp_path_for(&dest).exists());
    }
}

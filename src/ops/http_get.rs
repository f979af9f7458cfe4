//! Timed HTTP GET checked against a reference file.
//!
//! One transfer per run. The body is streamed into a private temporary file
//! and then compared byte for byte with `<refs-folder>/<refName>`. A
//! non-2xx status is not an error: its body is compared like any other and
//! will normally differ.

use crate::error::{BenchError, Result};
use crate::utils::temp_folder;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const COMPARE_CHUNK: usize = 64 * 1024;

/// Elapsed transfer time and whether the body matched the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpGetOutcome {
    pub seconds: f64,
    pub differs: bool,
}

#[derive(Debug, Clone)]
pub struct HttpGetOp {
    url: String,
    reference: PathBuf,
    timeout: Duration,
}

impl HttpGetOp {
    pub fn new(url: impl Into<String>, reference: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            reference: reference.into(),
            timeout,
        }
    }

    /// Download the URL, time the transfer and compare the body.
    pub async fn run(&self) -> Result<HttpGetOutcome> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|source| self.http_error(source))?;

        let folder = temp_folder();
        let mut body = tempfile::Builder::new()
            .prefix("sbench_http_get.")
            .tempfile_in(&folder)
            .map_err(|source| BenchError::io(&folder, source))?;
        debug!("Saving {} into {}", self.url, body.path().display());

        let start = Instant::now();
        let mut response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| self.http_error(source))?;
        let status = response.status();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| self.http_error(source))?
        {
            body.write_all(&chunk)
                .map_err(|source| BenchError::io(body.path(), source))?;
        }
        let seconds = start.elapsed().as_secs_f64();

        if !status.is_success() {
            info!("{} answered with status {}", self.url, status);
        }
        body.flush()
            .map_err(|source| BenchError::io(body.path(), source))?;

        let downloaded = body
            .reopen()
            .map_err(|source| BenchError::io(body.path(), source))?;
        let reference = File::open(&self.reference).map_err(|source| BenchError::Reference {
            path: self.reference.clone(),
            source,
        })?;
        let differs = contents_differ(reference, downloaded)
            .map_err(|source| BenchError::io(&self.reference, source))?;
        debug!("Downloaded content differs from reference: {}", differs);

        Ok(HttpGetOutcome { seconds, differs })
    }

    fn http_error(&self, source: reqwest::Error) -> BenchError {
        BenchError::Http {
            url: self.url.clone(),
            source,
        }
    }
}

/// `true` when the two streams differ in any byte or in length.
pub fn contents_differ<A: Read, B: Read>(a: A, b: B) -> std::io::Result<bool> {
    let mut a = BufReader::new(a);
    let mut b = BufReader::new(b);
    let mut left = vec![0u8; COMPARE_CHUNK];
    let mut right = vec![0u8; COMPARE_CHUNK];

    loop {
        let n = super::read_full(&mut a, &mut left)?;
        let m = super::read_full(&mut b, &mut right)?;
        if n != m || left[..n] != right[..m] {
            return Ok(true);
        }
        if n < COMPARE_CHUNK {
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_contents() {
        let data = vec![7u8; COMPARE_CHUNK * 2 + 13];
        assert!(!contents_differ(&data[..], &data[..]).unwrap());
        assert!(!contents_differ(&b""[..], &b""[..]).unwrap());
    }

    #[test]
    fn test_single_byte_difference() {
        let a = vec![1u8; COMPARE_CHUNK + 100];
        let mut b = a.clone();
        b[COMPARE_CHUNK + 50] = 2;
        assert!(contents_differ(&a[..], &b[..]).unwrap());
    }

    #[test]
    fn test_length_difference() {
        assert!(contents_differ(&b"abc"[..], &b"abcd"[..]).unwrap());
        let a = vec![0u8; COMPARE_CHUNK];
        let b = vec![0u8; COMPARE_CHUNK + 1];
        assert!(contents_differ(&a[..], &b[..]).unwrap());
    }
}

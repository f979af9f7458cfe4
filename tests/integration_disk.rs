use anyhow::Result;
use sbench::{cli::Args, BenchError, BenchmarkConfig, BenchmarkKind, BenchmarkRunner};
use std::io::Write;

fn args(kind: BenchmarkKind, params: String, threads: usize) -> Args {
    Args {
        kind,
        params,
        threads,
        seed: Some(11),
        ..Default::default()
    }
}

/// A file shorter than times*threads*size is rejected before any worker runs.
#[tokio::test]
async fn random_read_rejects_small_file() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&[0u8; 4096])?;
    let params = format!("100,4096,{}", file.path().display());

    let config = BenchmarkConfig::from_args(&args(BenchmarkKind::DiskReadRandom, params, 4))?;
    let err = BenchmarkRunner::new(config).run().await.unwrap_err();

    assert!(matches!(err, BenchError::FileTooSmall { .. }));
    assert!(err.to_string().contains("100*4*4096 = 1638400"));
    Ok(())
}

/// Write into a fresh folder, then read a prepared file both ways.
#[tokio::test]
async fn write_then_read_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let folder = dir.path().join("sbench.d");

    let params = format!("8,4096,{}", folder.display());
    let config = BenchmarkConfig::from_args(&args(BenchmarkKind::DiskWrite, params, 2))?;
    let outcome = BenchmarkRunner::new(config).run().await?;
    assert_eq!(outcome.workers.len(), 2);
    assert!(folder.is_dir());
    assert_eq!(std::fs::read_dir(&folder)?.count(), 0);

    let data = folder.join("data");
    std::fs::write(&data, vec![0xA5u8; 8 * 2 * 4096])?;
    for kind in [BenchmarkKind::DiskReadSeq, BenchmarkKind::DiskReadRandom] {
        let params = format!("8,4096,{}", data.display());
        let config = BenchmarkConfig::from_args(&args(kind, params, 2))?;
        let outcome = BenchmarkRunner::new(config).run().await?;
        assert_eq!(outcome.workers.len(), 2);
    }
    Ok(())
}

/// Reading a file that does not exist fails without running.
#[tokio::test]
async fn read_missing_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let params = format!("1,1,{}", dir.path().join("absent").display());
    let config = BenchmarkConfig::from_args(&args(BenchmarkKind::DiskReadSeq, params, 1))?;
    let err = BenchmarkRunner::new(config).run().await.unwrap_err();
    assert!(matches!(err, BenchError::MissingFile { .. }));
    Ok(())
}

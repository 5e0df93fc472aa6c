use std::path::PathBuf;

use litengine::LocalStorage;
use litengine::MemoryStorage;
use litengine::Storage;
use litengine::StorageError;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

async fn write_all(storage: &dyn Storage, uri: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let mut writer = storage.open_for_write(uri).await?;
    writer.write_all(bytes).await?;
    writer.shutdown().await?;
    Ok(())
}

async fn read_all(storage: &dyn Storage, uri: &str) -> anyhow::Result<Vec<u8>> {
    let mut reader = storage.open_for_read(uri).await?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await?;
    Ok(out)
}

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("litengine-{}-{:016x}", name, rand_suffix()))
}

fn rand_suffix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        ^ u64::from(std::process::id())
}

// --- Memory Storage ---

#[tokio::test]
async fn test_memory_write_then_read() -> anyhow::Result<()> {
    let storage = MemoryStorage::new("raw");
    let uri = storage.new_uri("data.bin");
    assert!(uri.starts_with("memory://raw/"));
    assert!(uri.ends_with("/data.bin"));
    assert!(!storage.exists(&uri).await?);

    write_all(&storage, &uri, b"hello").await?;
    assert!(storage.exists(&uri).await?);
    assert_eq!(read_all(&storage, &uri).await?, b"hello");
    assert_eq!(storage.get(&uri).as_deref(), Some(&b"hello"[..]));
    Ok(())
}

#[tokio::test]
async fn test_memory_uris_are_unique() {
    let storage = MemoryStorage::new("raw");
    assert_ne!(storage.new_uri("a"), storage.new_uri("a"));
}

#[tokio::test]
async fn test_memory_bytes_visible_after_shutdown_only() -> anyhow::Result<()> {
    let storage = MemoryStorage::new("raw");
    let uri = storage.new_uri("late");
    let mut writer = storage.open_for_write(&uri).await?;
    writer.write_all(b"abc").await?;
    assert!(storage.is_empty());
    writer.shutdown().await?;
    assert_eq!(storage.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_memory_missing_object() {
    let storage = MemoryStorage::new("raw");
    let uri = storage.new_uri("missing");
    let result = storage.open_for_read(&uri).await;
    assert!(matches!(result, Err(StorageError::NotFound(u)) if u == uri));
}

#[tokio::test]
async fn test_memory_rejects_foreign_uri() {
    let storage = MemoryStorage::new("raw");
    let result = storage.open_for_write("s3://bucket/key").await;
    assert!(matches!(result, Err(StorageError::InvalidUri(_))));
}

// --- Local Storage ---

#[tokio::test]
async fn test_local_write_then_read() -> anyhow::Result<()> {
    let root = scratch_dir("local");
    let storage = LocalStorage::new(&root, "raw");
    let uri = storage.new_uri("out.txt");
    assert!(uri.starts_with("file://"));

    write_all(&storage, &uri, b"line\n").await?;
    assert!(storage.exists(&uri).await?);
    assert_eq!(read_all(&storage, &uri).await?, b"line\n");

    tokio::fs::remove_dir_all(&root).await?;
    Ok(())
}

#[tokio::test]
async fn test_local_missing_file() {
    let root = scratch_dir("missing");
    let storage = LocalStorage::new(&root, "raw");
    let uri = storage.new_uri("nothing");
    let result = storage.open_for_read(&uri).await;
    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_local_refuses_escape() {
    let root = scratch_dir("escape");
    let storage = LocalStorage::new(&root, "raw");

    let outside = format!("file://{}/../elsewhere", root.display());
    assert!(matches!(storage.open_for_write(&outside).await, Err(StorageError::InvalidUri(_))));

    let foreign = "file:///etc/passwd";
    assert!(matches!(storage.open_for_read(foreign).await, Err(StorageError::InvalidUri(_))));

    let wrong_scheme = "memory://raw/x";
    assert!(matches!(storage.exists(wrong_scheme).await, Err(StorageError::InvalidUri(_))));
}

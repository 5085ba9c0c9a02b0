use crate::protocol::pairing::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, PairingCredential, StoredPairing,
};

fn pairing(value: u64) -> StoredPairing {
    StoredPairing {
        credential: PairingCredential::from_u64(value),
        service_name: Some("0F1E2D3C4B5A6978".to_string()),
    }
}

#[tokio::test]
async fn test_memory_store_roundtrip() {
    let mut store = MemoryCredentialStore::new();
    assert!(store.load("library").await.is_none());

    store.save("library", &pairing(7)).await.unwrap();
    assert_eq!(store.load("library").await, Some(pairing(7)));
    assert_eq!(store.list_servers().await, vec!["library".to_string()]);

    store.remove("library").await.unwrap();
    assert!(store.load("library").await.is_none());
}

#[tokio::test]
async fn test_file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pairings.json");

    {
        let mut store = FileCredentialStore::new(&path).await.unwrap();
        store.save("10.0.0.2:3689", &pairing(42)).await.unwrap();
    }

    let store = FileCredentialStore::new(&path).await.unwrap();
    assert_eq!(store.load("10.0.0.2:3689").await, Some(pairing(42)));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("0x000000000000002A"));
}

#[tokio::test]
async fn test_file_store_remove() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairings.json");

    let mut store = FileCredentialStore::new(&path).await.unwrap();
    store.save("a", &pairing(1)).await.unwrap();
    store.save("b", &pairing(2)).await.unwrap();
    store.remove("a").await.unwrap();

    let reopened = FileCredentialStore::new(&path).await.unwrap();
    assert!(reopened.load("a").await.is_none());
    assert_eq!(reopened.list_servers().await, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_file_store_rejects_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairings.json");
    std::fs::write(&path, b"{not json").unwrap();

    assert!(FileCredentialStore::new(&path).await.is_err());
}
